use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Failure reason LND reports for payments that did not fail (yet).
pub const FAILURE_REASON_NONE: &str = "FAILURE_REASON_NONE";

/// Empty reasons and [`FAILURE_REASON_NONE`] count as no reason at all.
pub fn is_failure_reason(reason: &str) -> bool {
    !reason.is_empty() && reason != FAILURE_REASON_NONE
}

/// Lifecycle state of an outgoing payment.
///
/// Statuses the node reports that don't map onto pending, completed or
/// failed are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Other(String),
}

impl PaymentStatus {
    pub fn from_node(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "completed" | "succeeded" => Self::Completed,
            "failed" => Self::Failed,
            "pending" | "in_flight" | "initiated" => Self::Pending,
            _ => Self::Other(status.to_owned()),
        }
    }

    /// Derives the status from a node report that may omit the status field.
    ///
    /// An explicit status always wins. Without one, a failure reason other
    /// than [`FAILURE_REASON_NONE`] means failed and a preimage means
    /// completed.
    pub fn from_report(
        status: Option<&str>,
        preimage: Option<&str>,
        failure_reason: Option<&str>,
    ) -> Self {
        match status.filter(|s| !s.is_empty()) {
            Some(status) => Self::from_node(status),
            None if failure_reason.is_some_and(is_failure_reason) => Self::Failed,
            None if preimage.is_some_and(|p| !p.is_empty()) => Self::Completed,
            None => Self::Pending,
        }
    }

    /// Completed and failed payments never change status again.
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Other(status) => status,
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for PaymentStatus {
    fn from(status: String) -> Self {
        Self::from_node(&status)
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        status.as_str().to_owned()
    }
}

// preimage only on completed, failure reason only on failed or unknown statuses
fn outcome_fields(
    status: &PaymentStatus,
    preimage: Option<String>,
    failure_reason: Option<String>,
) -> (Option<String>, Option<String>) {
    let preimage = preimage.filter(|p| !p.is_empty());
    let failure_reason = failure_reason.filter(|r| is_failure_reason(r));
    match status {
        PaymentStatus::Completed => (preimage, None),
        PaymentStatus::Pending => (None, None),
        PaymentStatus::Failed | PaymentStatus::Other(_) => (None, failure_reason),
    }
}

/// Result of paying an invoice.
///
/// `amount` is 0 when the payment was sent without decoding the invoice
/// first: the node doesn't report it on the send call.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_hash: String,
    pub payment_request: String,
    /// amount in sat
    pub amount: u64,
    pub status: PaymentStatus,
    pub preimage: Option<String>,
    pub error: Option<String>,
}

impl Payment {
    pub fn new(
        payment_hash: String,
        payment_request: String,
        amount: u64,
        status: PaymentStatus,
        preimage: Option<String>,
        failure_reason: Option<String>,
    ) -> Self {
        let (preimage, error) = outcome_fields(&status, preimage, failure_reason);
        Self {
            payment_hash,
            payment_request,
            amount,
            status,
            preimage,
            error,
        }
    }

    pub fn with_amount(self, amount: u64) -> Self {
        Self { amount, ..self }
    }

    /// Folds a streamed update into this payment.
    ///
    /// Updates for other hashes and updates arriving after the payment
    /// reached a final status are ignored and `false` is returned.
    pub fn apply_update(&mut self, update: &PaymentUpdate) -> bool {
        if update.payment_hash != self.payment_hash || self.status.is_final() {
            return false;
        }

        self.status = update.status.clone();
        self.preimage = update.preimage.clone();
        self.error = update.error.clone();
        if self.amount == 0 {
            self.amount = update.amount;
        }
        true
    }
}

/// Payment state pushed by the node on the payment subscription.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub payment_hash: String,
    pub amount: u64,
    pub status: PaymentStatus,
    pub preimage: Option<String>,
    pub error: Option<String>,
}

impl PaymentUpdate {
    pub fn new(
        payment_hash: String,
        amount: u64,
        status: PaymentStatus,
        preimage: Option<String>,
        failure_reason: Option<String>,
    ) -> Self {
        let (preimage, error) = outcome_fields(&status, preimage, failure_reason);
        Self {
            payment_hash,
            amount,
            status,
            preimage,
            error,
        }
    }
}
