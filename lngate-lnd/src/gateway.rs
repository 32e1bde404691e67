use async_trait::async_trait;
use lngate_core::{
    balance::Balance,
    invoice::{DecodedInvoice, Invoice},
    payment::Payment,
};

#[cfg(test)]
use mockall::automock;

use crate::error::LndError;

/// Request/response operations a lightning node offers to the gateway.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LightningGateway: Send + Sync {
    /// Creates an invoice over `amount` sat. Zero amounts are rejected.
    async fn create_invoice(&self, amount: u64, memo: String) -> Result<Invoice, LndError>;

    /// Pays a payment request. The returned amount is always 0, use
    /// [`pay_invoice_with_amount`] when the amount matters.
    async fn pay_invoice(&self, payment_request: String) -> Result<Payment, LndError>;

    async fn get_balance(&self) -> Result<Balance, LndError>;

    async fn decode_invoice(&self, payment_request: String) -> Result<DecodedInvoice, LndError>;
}

/// Decodes the payment request first and pays it afterwards, so the returned
/// payment carries the invoice amount.
pub async fn pay_invoice_with_amount<G>(
    gateway: &G,
    payment_request: String,
) -> Result<Payment, LndError>
where
    G: LightningGateway + ?Sized,
{
    let decoded = gateway.decode_invoice(payment_request).await?;
    pay_decoded_invoice(gateway, &decoded).await
}

/// Pays an invoice that was decoded earlier, e.g. to show it to the user
/// before paying.
pub async fn pay_decoded_invoice<G>(
    gateway: &G,
    decoded: &DecodedInvoice,
) -> Result<Payment, LndError>
where
    G: LightningGateway + ?Sized,
{
    let payment = gateway
        .pay_invoice(decoded.payment_request.clone())
        .await?;
    Ok(payment.with_amount(decoded.amount))
}
