use std::sync::Arc;

use async_trait::async_trait;
use lngate_core::{
    balance::Balance,
    invoice::{DecodedInvoice, Invoice, InvoiceUpdate},
    payment::{Payment, PaymentUpdate},
};
use reqwest::{Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::{
    config::LndSettings,
    credentials::{load_certificate, Credentials, MACAROON_HEADER},
    error::LndError,
    gateway::LightningGateway,
    model::{
        AddInvoiceRequest, AddInvoiceResponse, ChannelBalanceResponse, InvoiceFrame,
        PayReqResponse, PaymentFrame, SendPaymentRequest, SendPaymentResponse,
    },
    subscription::{self, PaymentFeed, StreamOptions, Subscription},
};

/// Client for LND's REST proxy.
///
/// Clones share the HTTP connection pool and the macaroon cache.
#[derive(Debug, Clone)]
pub struct LndClient {
    settings: Arc<LndSettings>,
    credentials: Arc<Credentials>,
    reqwest_client: reqwest::Client,
}

impl LndClient {
    /// Builds the HTTP client and trusts the configured TLS certificate.
    ///
    /// The macaroon is not read here but on the first request.
    pub fn new(settings: LndSettings) -> Result<Self, LndError> {
        let credentials = Credentials::new(settings.macaroon_path().map(Into::into));
        Self::with_credentials(settings, credentials)
    }

    pub fn with_credentials(
        settings: LndSettings,
        credentials: Credentials,
    ) -> Result<Self, LndError> {
        if settings.rest_url.cannot_be_a_base() {
            return Err(LndError::Configuration(format!(
                "invalid LND_REST_URL {}",
                settings.rest_url
            )));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(cert_path) = settings.tls_cert_path() {
            builder = builder.add_root_certificate(load_certificate(cert_path)?);
        }
        let reqwest_client = builder.build()?;

        info!("lnd client for {}", settings.rest_url);
        Ok(Self {
            settings: Arc::new(settings),
            credentials: Arc::new(credentials),
            reqwest_client,
        })
    }

    pub fn settings(&self) -> &LndSettings {
        &self.settings
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// `{base}/v1/{segments...}`, every segment percent encoded on its own.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, LndError> {
        let mut url = self.settings.rest_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                LndError::Configuration(format!("invalid LND_REST_URL {}", self.settings.rest_url))
            })?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    async fn authenticated(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<RequestBuilder, LndError> {
        let macaroon = self.credentials.macaroon().await?;
        let url = self.endpoint(segments)?;
        debug!("{method} {url}");
        Ok(self
            .reqwest_client
            .request(method, url)
            .header(MACAROON_HEADER, macaroon))
    }

    async fn make_get<R: DeserializeOwned>(&self, segments: &[&str]) -> Result<R, LndError> {
        let request = self.authenticated(Method::GET, segments).await?;
        extract_response_data(request.send().await?).await
    }

    async fn make_post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<R, LndError> {
        let request = self.authenticated(Method::POST, segments).await?;
        extract_response_data(request.json(body).send().await?).await
    }

    fn stream_options(&self, name: &'static str) -> StreamOptions {
        StreamOptions {
            name,
            buffer: self.settings.stream_buffer,
            idle_timeout: self.settings.stream_idle_timeout(),
        }
    }

    /// Opens the invoice subscription.
    ///
    /// Missing credentials fail here; connection problems arrive as the
    /// subscription's single error event.
    pub async fn subscribe_invoices(&self) -> Result<Subscription<InvoiceUpdate>, LndError> {
        let request = self
            .authenticated(Method::GET, &["invoices", "subscribe"])
            .await?;
        Ok(subscription::spawn(
            request,
            self.stream_options("invoices"),
            |frame: InvoiceFrame| InvoiceUpdate::try_from(frame),
        ))
    }

    pub async fn subscribe_payments(&self) -> Result<Subscription<PaymentUpdate>, LndError> {
        let request = self.authenticated(Method::GET, &["payments"]).await?;
        Ok(subscription::spawn(
            request,
            self.stream_options("payments"),
            |frame: PaymentFrame| Ok(PaymentUpdate::from(frame)),
        ))
    }

    /// Opens both subscriptions and merges them into one feed.
    pub async fn subscribe_to_payments(&self) -> Result<PaymentFeed, LndError> {
        let invoices = self.subscribe_invoices().await?;
        let payments = self.subscribe_payments().await?;
        Ok(PaymentFeed::new(invoices, payments))
    }
}

async fn extract_response_data<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, LndError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(LndError::Gateway {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl LightningGateway for LndClient {
    async fn create_invoice(&self, amount: u64, memo: String) -> Result<Invoice, LndError> {
        if amount == 0 {
            return Err(LndError::InvalidAmount(amount));
        }

        let expiry = self.settings.invoice_expiry;
        let response: AddInvoiceResponse = self
            .make_post(
                &["invoices"],
                &AddInvoiceRequest {
                    value: amount,
                    memo: &memo,
                    expiry,
                },
            )
            .await?;

        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let invoice = response.into_invoice(amount, memo, expiry, now)?;
        info!(
            "created invoice {} over {} sat",
            invoice.payment_hash, invoice.amount
        );
        Ok(invoice)
    }

    async fn pay_invoice(&self, payment_request: String) -> Result<Payment, LndError> {
        let response: SendPaymentResponse = self
            .make_post(
                &["channels", "transactions"],
                &SendPaymentRequest {
                    payment_request: &payment_request,
                },
            )
            .await?;

        let payment = response.into_payment(payment_request);
        info!("payment {} is {}", payment.payment_hash, payment.status);
        Ok(payment)
    }

    async fn get_balance(&self) -> Result<Balance, LndError> {
        let response: ChannelBalanceResponse = self.make_get(&["balance", "channel"]).await?;
        Ok(response.into())
    }

    async fn decode_invoice(&self, payment_request: String) -> Result<DecodedInvoice, LndError> {
        let response: PayReqResponse = self.make_get(&["payreq", &payment_request]).await?;
        Ok(response.into_decoded(payment_request))
    }
}
