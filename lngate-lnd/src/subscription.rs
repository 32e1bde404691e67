//! Long lived subscriptions on LND's streaming endpoints.
//!
//! Every subscription owns one tokio task. The task connects, decodes frames
//! and pushes events onto a bounded channel until the body ends, the node
//! reports an error or the subscription is dropped. There is no reconnect:
//! after the single error event the subscription is closed for good.

use std::{
    fmt::{self, Display, Formatter},
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    task::{Context, Poll},
    time::Duration,
};

use futures::{
    stream::{self, BoxStream},
    Stream, StreamExt,
};
use lngate_core::{error::CoreError, invoice::InvoiceUpdate, payment::PaymentUpdate};
use serde::de::DeserializeOwned;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    error::LndError,
    framing::{decode_frame, Frame, FrameDecoder},
};

/// Handle to an open subscription.
///
/// Events arrive in the order the node sent them. Dropping the handle stops
/// the background task and discards whatever wasn't received yet.
#[derive(Debug)]
pub struct Subscription<T> {
    events: mpsc::Receiver<Result<T, LndError>>,
    skipped_frames: Arc<AtomicU64>,
    worker: JoinHandle<()>,
}

impl<T> Subscription<T> {
    /// Next event, or `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<Result<T, LndError>> {
        self.events.recv().await
    }

    /// Frames that were received but could not be turned into an event.
    pub fn skipped_frames(&self) -> u64 {
        self.skipped_frames.load(Ordering::Relaxed)
    }

    pub fn skipped_frames_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.skipped_frames)
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T, LndError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// Settings of a single subscription worker.
#[derive(Debug, Clone)]
pub(crate) struct StreamOptions {
    pub name: &'static str,
    pub buffer: usize,
    pub idle_timeout: Option<Duration>,
}

/// Spawns the worker for `request` and returns the handle to its events.
///
/// Frames are decoded as `W` and turned into events by `convert`. Frames
/// failing either step are counted as skipped.
pub(crate) fn spawn<W, T, F>(
    request: reqwest::RequestBuilder,
    options: StreamOptions,
    convert: F,
) -> Subscription<T>
where
    W: DeserializeOwned + Send + 'static,
    T: Send + 'static,
    F: Fn(W) -> Result<T, CoreError> + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel(options.buffer.max(1));
    let skipped_frames = Arc::new(AtomicU64::new(0));
    let worker = tokio::spawn(run(
        request,
        options,
        convert,
        tx,
        Arc::clone(&skipped_frames),
    ));

    Subscription {
        events: rx,
        skipped_frames,
        worker,
    }
}

async fn run<W, T, F>(
    request: reqwest::RequestBuilder,
    options: StreamOptions,
    convert: F,
    tx: mpsc::Sender<Result<T, LndError>>,
    skipped_frames: Arc<AtomicU64>,
) where
    W: DeserializeOwned,
    F: Fn(W) -> Result<T, CoreError>,
{
    let name = options.name;
    if let Err(err) = pump(request, &options, &convert, &tx, &skipped_frames).await {
        warn!("{name} subscription failed: {err}");
        // the receiver may already be gone, nothing left to tell then
        let _ = tx.send(Err(err)).await;
    }
    info!("{name} subscription closed");
}

/// Reads the body until it ends. `Ok` means a clean close, either by the node
/// or because the receiver went away.
async fn pump<W, T, F>(
    request: reqwest::RequestBuilder,
    options: &StreamOptions,
    convert: &F,
    tx: &mpsc::Sender<Result<T, LndError>>,
    skipped_frames: &AtomicU64,
) -> Result<(), LndError>
where
    W: DeserializeOwned,
    F: Fn(W) -> Result<T, CoreError>,
{
    let name = options.name;
    let response = idle(options.idle_timeout, request.send()).await??;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LndError::Gateway {
            status: status.as_u16(),
            body,
        });
    }
    info!("{name} subscription open");

    let mut body = std::pin::pin!(response.bytes_stream());
    let mut decoder = FrameDecoder::new();
    let mut dropped = 0;

    loop {
        let chunk = match idle(options.idle_timeout, body.next()).await? {
            Some(chunk) => chunk?,
            None => break,
        };

        let frames = decoder.push(&chunk);
        if decoder.dropped() > dropped {
            debug!("{name}: dropped oversized frame");
            skipped_frames.fetch_add(decoder.dropped() - dropped, Ordering::Relaxed);
            dropped = decoder.dropped();
        }
        for frame in frames {
            if !deliver(name, &frame, convert, tx, skipped_frames).await? {
                return Ok(());
            }
        }
    }

    if let Some(frame) = decoder.finish() {
        deliver(name, &frame, convert, tx, skipped_frames).await?;
    }
    Ok(())
}

/// Decodes one frame and forwards it. Returns `false` once nobody listens.
async fn deliver<W, T, F>(
    name: &str,
    frame: &[u8],
    convert: &F,
    tx: &mpsc::Sender<Result<T, LndError>>,
    skipped_frames: &AtomicU64,
) -> Result<bool, LndError>
where
    W: DeserializeOwned,
    F: Fn(W) -> Result<T, CoreError>,
{
    let event = match decode_frame::<W>(frame) {
        Frame::Item(item) => convert(item).map_err(|err| err.to_string()),
        Frame::Malformed(reason) => Err(reason),
        Frame::Error(message) => return Err(LndError::Stream(message)),
    };

    match event {
        Ok(event) => Ok(tx.send(Ok(event)).await.is_ok()),
        Err(reason) => {
            debug!("{name}: skipping frame: {reason}");
            skipped_frames.fetch_add(1, Ordering::Relaxed);
            Ok(true)
        }
    }
}

async fn idle<F: Future>(timeout: Option<Duration>, fut: F) -> Result<F::Output, LndError> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| LndError::IdleTimeout(timeout)),
        None => Ok(fut.await),
    }
}

/// Which subscription of a [`PaymentFeed`] an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    Invoices,
    Payments,
}

impl Display for FeedSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invoices => write!(f, "invoices"),
            Self::Payments => write!(f, "payments"),
        }
    }
}

#[derive(Debug)]
pub enum PaymentFeedEvent {
    Invoice(InvoiceUpdate),
    Payment(PaymentUpdate),
    Error { source: FeedSource, error: LndError },
}

/// Invoice and payment subscriptions merged into a single stream.
///
/// A failing or finished source does not end the other one. The feed ends
/// when both sources are closed.
pub struct PaymentFeed {
    events: BoxStream<'static, PaymentFeedEvent>,
    invoice_skips: Arc<AtomicU64>,
    payment_skips: Arc<AtomicU64>,
}

impl PaymentFeed {
    pub fn new(
        invoices: Subscription<InvoiceUpdate>,
        payments: Subscription<PaymentUpdate>,
    ) -> Self {
        let invoice_skips = invoices.skipped_frames_counter();
        let payment_skips = payments.skipped_frames_counter();

        let invoices = invoices.map(|event| match event {
            Ok(update) => PaymentFeedEvent::Invoice(update),
            Err(error) => PaymentFeedEvent::Error {
                source: FeedSource::Invoices,
                error,
            },
        });
        let payments = payments.map(|event| match event {
            Ok(update) => PaymentFeedEvent::Payment(update),
            Err(error) => PaymentFeedEvent::Error {
                source: FeedSource::Payments,
                error,
            },
        });

        Self {
            events: stream::select(invoices, payments).boxed(),
            invoice_skips,
            payment_skips,
        }
    }

    pub async fn recv(&mut self) -> Option<PaymentFeedEvent> {
        self.events.next().await
    }

    /// Skipped frames of both sources together.
    pub fn skipped_frames(&self) -> u64 {
        self.invoice_skips.load(Ordering::Relaxed) + self.payment_skips.load(Ordering::Relaxed)
    }
}

impl Stream for PaymentFeed {
    type Item = PaymentFeedEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_next_unpin(cx)
    }
}

impl fmt::Debug for PaymentFeed {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentFeed")
            .field("skipped_frames", &self.skipped_frames())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::AtomicU64, Arc};

    use futures::StreamExt;
    use lngate_core::{
        invoice::InvoiceUpdate,
        payment::{PaymentStatus, PaymentUpdate},
    };
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    use super::{FeedSource, PaymentFeed, PaymentFeedEvent, Subscription};
    use crate::error::LndError;

    type Sender<T> = mpsc::Sender<Result<T, LndError>>;

    // subscription fed by hand instead of a network worker
    fn channel<T: Send + 'static>() -> (Sender<T>, Subscription<T>) {
        let (tx, rx) = mpsc::channel(8);
        let subscription = Subscription {
            events: rx,
            skipped_frames: Arc::new(AtomicU64::new(0)),
            worker: tokio::spawn(async {}),
        };
        (tx, subscription)
    }

    fn invoice_update(hash: &str) -> InvoiceUpdate {
        InvoiceUpdate {
            payment_hash: hash.to_owned(),
            amount: 1_000,
            memo: "coffee".to_owned(),
            settled: true,
            settle_date: Some(1_700_000_100),
            created_at: 1_700_000_000,
            expiry: 3600,
        }
    }

    fn payment_update(hash: &str) -> PaymentUpdate {
        PaymentUpdate::new(
            hash.to_owned(),
            500,
            PaymentStatus::Completed,
            Some("preimage".to_owned()),
            None,
        )
    }

    #[tokio::test]
    async fn test_subscription_as_stream() -> anyhow::Result<()> {
        let (tx, subscription) = channel::<u64>();
        tx.send(Ok(1)).await?;
        tx.send(Ok(2)).await?;
        drop(tx);

        let events: Vec<u64> = subscription
            .map(|event| event.map_err(anyhow::Error::from))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<anyhow::Result<_>>()?;
        assert_eq!(vec![1, 2], events);
        Ok(())
    }

    #[tokio::test]
    async fn test_feed_survives_failing_source() -> anyhow::Result<()> {
        let (invoice_tx, invoices) = channel();
        let (payment_tx, payments) = channel();
        let mut feed = PaymentFeed::new(invoices, payments);

        invoice_tx
            .send(Err(LndError::Stream("connection reset".to_owned())))
            .await?;
        drop(invoice_tx);

        let event = feed.recv().await;
        assert!(matches!(
            event,
            Some(PaymentFeedEvent::Error {
                source: FeedSource::Invoices,
                error: LndError::Stream(_),
            })
        ));

        payment_tx.send(Ok(payment_update("hash1"))).await?;
        match feed.recv().await {
            Some(PaymentFeedEvent::Payment(update)) => assert_eq!("hash1", update.payment_hash),
            other => panic!("unexpected event {other:?}"),
        }

        drop(payment_tx);
        assert!(feed.recv().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_feed_carries_both_sources() -> anyhow::Result<()> {
        let (invoice_tx, invoices) = channel();
        let (payment_tx, payments) = channel();
        let feed = PaymentFeed::new(invoices, payments);

        invoice_tx.send(Ok(invoice_update("inv1"))).await?;
        payment_tx.send(Ok(payment_update("pay1"))).await?;
        drop(invoice_tx);
        drop(payment_tx);

        let events = feed.collect::<Vec<_>>().await;
        assert_eq!(2, events.len());
        assert!(events
            .iter()
            .any(|e| matches!(e, PaymentFeedEvent::Invoice(u) if u.payment_hash == "inv1")));
        assert!(events
            .iter()
            .any(|e| matches!(e, PaymentFeedEvent::Payment(u) if u.payment_hash == "pay1")));
        Ok(())
    }

    #[tokio::test]
    async fn test_dropping_subscription_aborts_worker() -> anyhow::Result<()> {
        let (_tx, rx) = mpsc::channel::<Result<u64, LndError>>(1);
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let worker = tokio::spawn(async move {
            let _done = done_tx;
            futures::future::pending::<()>().await;
        });
        let subscription = Subscription {
            events: rx,
            skipped_frames: Arc::new(AtomicU64::new(0)),
            worker,
        };

        drop(subscription);
        // the sender half is dropped together with the aborted task
        assert!(done_rx.await.is_err());
        Ok(())
    }
}
