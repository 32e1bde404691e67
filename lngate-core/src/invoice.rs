use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// An invoice created on the node.
///
/// `payment_hash` is lowercase hex. `amount`, `memo` and `payment_hash` are
/// fixed at creation; only the settlement fields change afterwards.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub payment_request: String,
    pub payment_hash: String,
    /// amount in sat
    pub amount: u64,
    pub memo: String,
    /// expiry in seconds, relative to `created_at`
    pub expiry: u64,
    /// unix timestamp in seconds
    pub created_at: u64,
    pub add_index: Option<u64>,
    pub settled: Option<bool>,
    pub settle_date: Option<u64>,
}

impl Invoice {
    pub fn is_settled(&self) -> bool {
        self.settled.unwrap_or(false)
    }

    pub const fn expires_at(&self) -> u64 {
        self.created_at.saturating_add(self.expiry)
    }

    /// Folds a streamed update into this invoice.
    ///
    /// Returns `false` if the update belongs to another payment hash or the
    /// invoice is already settled. Amount and memo are never taken over.
    pub fn apply_update(&mut self, update: &InvoiceUpdate) -> bool {
        if update.payment_hash != self.payment_hash || self.is_settled() {
            return false;
        }

        if update.settled {
            self.settled = Some(true);
            self.settle_date = update.settle_date.or(self.settle_date);
        }
        true
    }
}

/// Read-only view of a payment request as parsed by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedInvoice {
    pub payment_request: String,
    /// amount in sat, 0 for invoices without amount
    pub amount: u64,
    pub memo: String,
    pub payment_hash: String,
    pub timestamp: u64,
    pub expiry: u64,
    /// public key of the node the payment request pays to
    pub destination: String,
}

impl DecodedInvoice {
    pub const fn expires_at(&self) -> u64 {
        self.timestamp.saturating_add(self.expiry)
    }

    /// `now` is a unix timestamp in seconds.
    pub const fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at()
    }
}

/// Invoice state pushed by the node on the invoice subscription.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceUpdate {
    pub payment_hash: String,
    pub amount: u64,
    pub memo: String,
    pub settled: bool,
    /// only set when the update reports a settlement
    pub settle_date: Option<u64>,
    pub created_at: u64,
    pub expiry: u64,
}
