//! Shared types for the lngate LND gateway.
//!
//! Everything in here is a plain value: invoices, payments and balances are
//! returned to the caller, who owns their lifecycle (storage, display, retry).
//! Streamed updates ([`invoice::InvoiceUpdate`], [`payment::PaymentUpdate`])
//! can be folded into previously returned values with `apply_update`.
pub mod balance;
pub mod encoding;
pub mod error;
pub mod invoice;
pub mod payment;
