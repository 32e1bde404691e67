//! Authenticated REST and streaming client for an LND node.
//!
//! [`client::LndClient`] implements the request/response operations of
//! [`gateway::LightningGateway`] and opens the invoice and payment
//! subscriptions.

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod framing;
pub mod gateway;
pub mod model;
pub mod subscription;

pub use client::LndClient;
pub use config::LndSettings;
pub use error::LndError;
pub use gateway::{pay_decoded_invoice, pay_invoice_with_amount, LightningGateway};
pub use subscription::{FeedSource, PaymentFeed, PaymentFeedEvent, Subscription};
