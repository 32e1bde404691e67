use chrono::{TimeZone, Utc};
use console::{style, Term};
use lngate_core::{
    balance::Balance,
    invoice::{DecodedInvoice, InvoiceUpdate},
    payment::{Payment, PaymentStatus, PaymentUpdate},
};
use lngate_lnd::{FeedSource, LndError, PaymentFeedEvent};
use num_format::{Locale, ToFormattedString};
use qrcode::{render::unicode, QrCode};

pub fn format_sat(amount: u64) -> String {
    format!("{} (sat)", amount.to_formatted_string(&Locale::en))
}

/// Renders a unix timestamp as UTC, `-` for 0.
pub fn format_timestamp(timestamp: u64) -> String {
    if timestamp == 0 {
        return "-".to_owned();
    }
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map_or_else(
            || timestamp.to_string(),
            |time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
}

pub fn qr_code(payment_request: &str) -> anyhow::Result<String> {
    Ok(QrCode::new(payment_request.to_uppercase())?
        .render::<unicode::Dense1x2>()
        .quiet_zone(true)
        .build())
}

/// Current unix time in seconds.
pub fn now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

pub fn describe_decoded(decoded: &DecodedInvoice, now: u64) -> Vec<String> {
    let memo = if decoded.memo.is_empty() {
        "-"
    } else {
        decoded.memo.as_str()
    };
    let expires = format_timestamp(decoded.expires_at());
    let expires = if decoded.is_expired(now) {
        format!("{expires} (expired)")
    } else {
        expires
    };
    vec![
        format!("Amount:      {}", format_sat(decoded.amount)),
        format!("Memo:        {memo}"),
        format!("Hash:        {}", decoded.payment_hash),
        format!("Destination: {}", decoded.destination),
        format!("Created:     {}", format_timestamp(decoded.timestamp)),
        format!("Expires:     {expires}"),
    ]
}

pub fn describe_balance(balance: &Balance) -> Vec<String> {
    vec![
        format!("Total:       {}", format_sat(balance.total_balance)),
        format!("Confirmed:   {}", format_sat(balance.confirmed_balance)),
        format!("Unconfirmed: {}", format_sat(balance.unconfirmed_balance)),
    ]
}

pub fn describe_payment(payment: &Payment) -> String {
    match &payment.status {
        PaymentStatus::Completed => format!(
            "Invoice has been paid: {} preimage {}",
            format_sat(payment.amount),
            payment.preimage.as_deref().unwrap_or("-")
        ),
        PaymentStatus::Failed => format!(
            "Error: payment failed: {}",
            payment.error.as_deref().unwrap_or("unknown reason")
        ),
        status => format!("Payment is {status}"),
    }
}

fn describe_invoice_update(update: &InvoiceUpdate) -> String {
    if update.settled {
        format!(
            "invoice {} settled {} at {}",
            update.payment_hash,
            format_sat(update.amount),
            format_timestamp(update.settle_date.unwrap_or_default())
        )
    } else {
        format!(
            "invoice {} open {} {}",
            update.payment_hash,
            format_sat(update.amount),
            update.memo
        )
    }
}

fn describe_payment_update(update: &PaymentUpdate) -> String {
    let detail = update
        .preimage
        .as_deref()
        .or(update.error.as_deref())
        .unwrap_or_default();
    format!(
        "payment {} {} {} {detail}",
        update.payment_hash,
        update.status,
        format_sat(update.amount)
    )
    .trim_end()
    .to_owned()
}

pub fn describe_event(event: &PaymentFeedEvent) -> String {
    match event {
        PaymentFeedEvent::Invoice(update) => describe_invoice_update(update),
        PaymentFeedEvent::Payment(update) => describe_payment_update(update),
        PaymentFeedEvent::Error { source, error } => describe_stream_error(*source, error),
    }
}

pub fn describe_stream_error(source: FeedSource, error: &LndError) -> String {
    format!("{source} subscription closed: {error}")
}

pub fn write_lines(term: &Term, lines: &[String]) -> anyhow::Result<()> {
    for line in lines {
        term.write_line(line)?;
    }
    Ok(())
}

pub fn write_event(term: &Term, event: &PaymentFeedEvent) -> anyhow::Result<()> {
    let line = describe_event(event);
    let line = match event {
        PaymentFeedEvent::Error { .. } => style(line).red().to_string(),
        PaymentFeedEvent::Invoice(update) if update.settled => style(line).green().to_string(),
        _ => line,
    };
    term.write_line(&line)?;
    Ok(())
}
