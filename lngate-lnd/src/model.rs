//! Request and response shapes of the LND REST surface.
//!
//! LND encodes 64-bit integers as decimal strings; every integer field below
//! accepts a string or a plain JSON number and defaults to 0 when absent.

use lngate_core::{
    balance::Balance,
    encoding::{hash_to_hex, normalize_hash},
    error::CoreError,
    invoice::{DecodedInvoice, Invoice, InvoiceUpdate},
    payment::{Payment, PaymentStatus, PaymentUpdate},
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

#[derive(Debug, Serialize)]
pub struct AddInvoiceRequest<'a> {
    pub value: u64,
    pub memo: &'a str,
    pub expiry: u64,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub struct AddInvoiceResponse {
    pub payment_request: String,
    /// base64
    pub r_hash: String,
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub add_index: Option<u64>,
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub expiration: Option<u64>,
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub timestamp: Option<u64>,
}

impl AddInvoiceResponse {
    /// `expiry` and `now` fill in what the node left out of the response.
    pub fn into_invoice(
        self,
        amount: u64,
        memo: String,
        expiry: u64,
        now: u64,
    ) -> Result<Invoice, CoreError> {
        Ok(Invoice {
            payment_hash: hash_to_hex(&self.r_hash)?,
            payment_request: self.payment_request,
            amount,
            memo,
            expiry: self.expiration.unwrap_or(expiry),
            created_at: self.timestamp.unwrap_or(now),
            add_index: self.add_index,
            settled: None,
            settle_date: None,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SendPaymentRequest<'a> {
    pub payment_request: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct SendPaymentResponse {
    #[serde(default)]
    pub payment_hash: String,
    #[serde(default)]
    pub payment_preimage: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "payment_error")]
    pub failure_reason: Option<String>,
}

impl SendPaymentResponse {
    pub fn into_payment(self, payment_request: String) -> Payment {
        let status = PaymentStatus::from_report(
            self.status.as_deref(),
            self.payment_preimage.as_deref(),
            self.failure_reason.as_deref(),
        );
        Payment::new(
            normalize_hash(&self.payment_hash),
            payment_request,
            0,
            status,
            self.payment_preimage.as_deref().map(normalize_hash),
            self.failure_reason,
        )
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub struct ChannelBalanceResponse {
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default)]
    pub total_balance: u64,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default)]
    pub confirmed_balance: u64,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default)]
    pub unconfirmed_balance: u64,
}

impl From<ChannelBalanceResponse> for Balance {
    fn from(balance: ChannelBalanceResponse) -> Self {
        Self::new(
            balance.total_balance,
            balance.confirmed_balance,
            balance.unconfirmed_balance,
        )
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub struct PayReqResponse {
    #[serde(default)]
    pub destination: String,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default)]
    pub num_satoshis: u64,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default)]
    pub timestamp: u64,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default)]
    pub expiry: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub payment_hash: String,
}

impl PayReqResponse {
    pub fn into_decoded(self, payment_request: String) -> DecodedInvoice {
        DecodedInvoice {
            payment_request,
            amount: self.num_satoshis,
            memo: self.description.unwrap_or_default(),
            payment_hash: self.payment_hash,
            timestamp: self.timestamp,
            expiry: self.expiry,
            destination: self.destination,
        }
    }
}

/// Invoice as it appears on the invoice subscription.
#[serde_as]
#[derive(Debug, Deserialize)]
pub struct LndInvoice {
    #[serde(default)]
    pub memo: String,
    pub r_hash: String,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default)]
    pub value: u64,
    #[serde(default)]
    pub settled: bool,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default)]
    pub settle_date: u64,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default)]
    pub creation_date: u64,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default)]
    pub expiry: u64,
    #[serde(default)]
    pub state: Option<String>,
}

impl LndInvoice {
    fn reports_settlement(&self) -> bool {
        self.settled || self.state.as_deref() == Some("SETTLED")
    }
}

/// One frame of the invoice subscription. The node either nests the invoice
/// next to an `is_settle` marker or sends the bare invoice.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InvoiceFrame {
    Wrapped {
        invoice: LndInvoice,
        #[serde(default)]
        is_settle: bool,
    },
    Bare(LndInvoice),
}

impl TryFrom<InvoiceFrame> for InvoiceUpdate {
    type Error = CoreError;

    fn try_from(frame: InvoiceFrame) -> Result<Self, Self::Error> {
        let (invoice, is_settle) = match frame {
            InvoiceFrame::Wrapped { invoice, is_settle } => (invoice, is_settle),
            InvoiceFrame::Bare(invoice) => {
                let is_settle = invoice.reports_settlement();
                (invoice, is_settle)
            }
        };

        Ok(Self {
            payment_hash: hash_to_hex(&invoice.r_hash)?,
            amount: invoice.value,
            settled: invoice.reports_settlement(),
            settle_date: is_settle.then_some(invoice.settle_date),
            created_at: invoice.creation_date,
            expiry: invoice.expiry,
            memo: invoice.memo,
        })
    }
}

/// One frame of the payment subscription.
#[serde_as]
#[derive(Debug, Deserialize)]
pub struct PaymentFrame {
    pub payment_hash: String,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default, alias = "value_sat")]
    pub value: u64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_preimage: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl From<PaymentFrame> for PaymentUpdate {
    fn from(frame: PaymentFrame) -> Self {
        let status = PaymentStatus::from_report(
            frame.status.as_deref(),
            frame.payment_preimage.as_deref(),
            frame.failure_reason.as_deref(),
        );
        Self::new(
            normalize_hash(&frame.payment_hash),
            frame.value,
            status,
            frame.payment_preimage.as_deref().map(normalize_hash),
            frame.failure_reason,
        )
    }
}

#[cfg(test)]
mod tests {
    use lngate_core::{
        balance::Balance,
        invoice::InvoiceUpdate,
        payment::{PaymentStatus, PaymentUpdate},
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{
        AddInvoiceResponse, ChannelBalanceResponse, InvoiceFrame, PayReqResponse, PaymentFrame,
        SendPaymentResponse,
    };

    #[test]
    fn test_add_invoice_response() -> anyhow::Result<()> {
        let response: AddInvoiceResponse = serde_json::from_value(json!({
            "payment_request": "lnbc1000n1pwk7q8g",
            "r_hash": "aGVsbG8gd29ybGQ=",
            "add_index": "1",
            "expiration": "3600",
            "timestamp": "1700000000",
        }))?;

        let invoice = response.into_invoice(1_000, "Test payment".to_owned(), 600, 42)?;
        assert_eq!("68656c6c6f20776f726c64", invoice.payment_hash);
        assert_eq!(1_000, invoice.amount);
        assert_eq!("Test payment", invoice.memo);
        assert_eq!(3600, invoice.expiry);
        assert_eq!(1_700_000_000, invoice.created_at);
        assert_eq!(Some(1), invoice.add_index);
        Ok(())
    }

    #[test]
    fn test_add_invoice_response_fallbacks() -> anyhow::Result<()> {
        let response: AddInvoiceResponse = serde_json::from_value(json!({
            "payment_request": "lnbc1000n1pwk7q8g",
            "r_hash": "aGVsbG8gd29ybGQ=",
        }))?;

        let invoice = response.into_invoice(1_000, "Test".to_owned(), 600, 42)?;
        assert_eq!(600, invoice.expiry);
        assert_eq!(42, invoice.created_at);
        assert_eq!(None, invoice.add_index);
        Ok(())
    }

    #[test]
    fn test_add_invoice_response_invalid_hash() -> anyhow::Result<()> {
        let response: AddInvoiceResponse = serde_json::from_value(json!({
            "payment_request": "lnbc1000n1pwk7q8g",
            "r_hash": "***",
        }))?;
        assert!(response
            .into_invoice(1_000, "Test".to_owned(), 600, 42)
            .is_err());
        Ok(())
    }

    #[test]
    fn test_send_payment_success() -> anyhow::Result<()> {
        let response: SendPaymentResponse = serde_json::from_value(json!({
            "payment_hash": "hash123",
            "payment_preimage": "preimage456",
            "status": "completed",
        }))?;
        let payment = response.into_payment("lnbc1000n1".to_owned());
        assert_eq!(PaymentStatus::Completed, payment.status);
        assert_eq!("hash123", payment.payment_hash);
        assert_eq!(Some("preimage456".to_owned()), payment.preimage);
        assert_eq!(None, payment.error);
        assert_eq!(0, payment.amount);
        Ok(())
    }

    #[test]
    fn test_send_payment_lnd_payment_error() -> anyhow::Result<()> {
        let response: SendPaymentResponse = serde_json::from_value(json!({
            "payment_hash": "",
            "payment_preimage": "",
            "payment_error": "no_route",
        }))?;
        let payment = response.into_payment("lnbc1000n1".to_owned());
        assert_eq!(PaymentStatus::Failed, payment.status);
        assert_eq!(Some("no_route".to_owned()), payment.error);
        assert_eq!(None, payment.preimage);
        Ok(())
    }

    #[test]
    fn test_send_payment_base64_preimage() -> anyhow::Result<()> {
        let preimage = format!("{}=", "A".repeat(43));
        let response: SendPaymentResponse = serde_json::from_value(json!({
            "payment_hash": preimage,
            "payment_preimage": preimage,
        }))?;
        let payment = response.into_payment("lnbc1000n1".to_owned());
        assert_eq!(PaymentStatus::Completed, payment.status);
        assert_eq!(Some("0".repeat(64)), payment.preimage);
        assert_eq!("0".repeat(64), payment.payment_hash);
        Ok(())
    }

    #[test]
    fn test_send_payment_without_status_and_no_failure() -> anyhow::Result<()> {
        let response: SendPaymentResponse = serde_json::from_value(json!({
            "payment_hash": "hash123",
            "payment_preimage": "",
            "failure_reason": "FAILURE_REASON_NONE",
        }))?;
        let payment = response.into_payment("lnbc1000n1".to_owned());
        assert_eq!(PaymentStatus::Pending, payment.status);
        assert_eq!(None, payment.error);
        assert_eq!(None, payment.preimage);
        Ok(())
    }

    #[test]
    fn test_channel_balance() -> anyhow::Result<()> {
        let response: ChannelBalanceResponse = serde_json::from_value(json!({
            "total_balance": "100000",
            "confirmed_balance": "80000",
            "unconfirmed_balance": "20000",
        }))?;
        assert_eq!(Balance::new(100_000, 80_000, 20_000), response.into());
        Ok(())
    }

    #[test]
    fn test_channel_balance_large_values() -> anyhow::Result<()> {
        let response: ChannelBalanceResponse = serde_json::from_value(json!({
            "total_balance": u64::MAX.to_string(),
            "confirmed_balance": 9_007_199_254_740_993u64,
        }))?;
        let balance: Balance = response.into();
        assert_eq!(u64::MAX, balance.total_balance);
        assert_eq!(9_007_199_254_740_993, balance.confirmed_balance);
        assert_eq!(0, balance.unconfirmed_balance);
        Ok(())
    }

    #[test]
    fn test_pay_req_empty_description() -> anyhow::Result<()> {
        let response: PayReqResponse = serde_json::from_value(json!({
            "destination": "03abcdef",
            "num_satoshis": "5000",
            "timestamp": "1700000000",
            "expiry": "3600",
            "description": "",
            "payment_hash": "abc123",
        }))?;
        let decoded = response.into_decoded("lnbc5000n1".to_owned());
        assert_eq!("", decoded.memo);
        assert_eq!(5_000, decoded.amount);
        assert_eq!("abc123", decoded.payment_hash);
        assert_eq!("lnbc5000n1", decoded.payment_request);
        Ok(())
    }

    #[test]
    fn test_wrapped_invoice_frame() -> anyhow::Result<()> {
        let frame: InvoiceFrame = serde_json::from_value(json!({
            "invoice": {
                "memo": "coffee",
                "r_hash": "aGVsbG8gd29ybGQ=",
                "value": "2100",
                "settled": true,
                "settle_date": "1700000100",
                "creation_date": "1700000000",
                "expiry": "3600",
            },
            "is_settle": true,
        }))?;

        let update = InvoiceUpdate::try_from(frame)?;
        assert_eq!(
            InvoiceUpdate {
                payment_hash: "68656c6c6f20776f726c64".to_owned(),
                amount: 2_100,
                memo: "coffee".to_owned(),
                settled: true,
                settle_date: Some(1_700_000_100),
                created_at: 1_700_000_000,
                expiry: 3600,
            },
            update
        );
        Ok(())
    }

    #[test]
    fn test_settle_date_only_on_settlement() -> anyhow::Result<()> {
        let frame: InvoiceFrame = serde_json::from_value(json!({
            "invoice": {
                "memo": "coffee",
                "r_hash": "aGVsbG8gd29ybGQ=",
                "value": "2100",
                "settled": false,
                "settle_date": "0",
                "creation_date": "1700000000",
                "expiry": "3600",
            },
            "is_settle": false,
        }))?;

        let update = InvoiceUpdate::try_from(frame)?;
        assert!(!update.settled);
        assert_eq!(None, update.settle_date);
        Ok(())
    }

    #[test]
    fn test_bare_invoice_frame_with_state() -> anyhow::Result<()> {
        let frame: InvoiceFrame = serde_json::from_value(json!({
            "memo": "coffee",
            "r_hash": "aGVsbG8gd29ybGQ=",
            "value": 2100,
            "settle_date": 1700000100,
            "creation_date": 1700000000,
            "expiry": 3600,
            "state": "SETTLED",
        }))?;

        let update = InvoiceUpdate::try_from(frame)?;
        assert!(update.settled);
        assert_eq!(Some(1_700_000_100), update.settle_date);
        Ok(())
    }

    #[test]
    fn test_unrelated_object_is_not_an_invoice_frame() {
        let frame = serde_json::from_value::<InvoiceFrame>(json!({ "foo": 1 }));
        assert!(frame.is_err());
    }

    #[test]
    fn test_payment_frame() -> anyhow::Result<()> {
        let frame: PaymentFrame = serde_json::from_value(json!({
            "payment_hash": "hash123",
            "value": "1000",
            "status": "failed",
            "failure_reason": "FAILURE_REASON_NO_ROUTE",
        }))?;

        assert_eq!(
            PaymentUpdate {
                payment_hash: "hash123".to_owned(),
                amount: 1_000,
                status: PaymentStatus::Failed,
                preimage: None,
                error: Some("FAILURE_REASON_NO_ROUTE".to_owned()),
            },
            PaymentUpdate::from(frame)
        );
        Ok(())
    }

    #[test]
    fn test_in_flight_payment_frame() -> anyhow::Result<()> {
        let frame: PaymentFrame = serde_json::from_value(json!({
            "payment_hash": "hash123",
            "value": "1000",
            "status": "IN_FLIGHT",
            "payment_preimage": "",
            "failure_reason": "FAILURE_REASON_NONE",
        }))?;

        let update = PaymentUpdate::from(frame);
        assert_eq!(PaymentStatus::Pending, update.status);
        assert_eq!(None, update.error);
        assert_eq!(None, update.preimage);
        Ok(())
    }
}
