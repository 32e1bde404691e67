use clap::{Parser, Subcommand};
use console::{style, Term};
use dialoguer::Confirm;
use futures::StreamExt;
use lngate_lnd::{
    pay_decoded_invoice, FeedSource, LightningGateway, LndClient, LndSettings, PaymentFeedEvent,
};
use lngatecli::cli;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Parser)]
#[command(arg_required_else_help(true))]
struct Opts {
    #[clap(flatten)]
    lnd: LndSettings,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Create a lightning invoice
    CreateInvoice {
        amount: u64,
        #[clap(default_value = "")]
        memo: String,
        /// Expiry in seconds, overrides LND_INVOICE_EXPIRY
        #[clap(long)]
        expiry: Option<u64>,
    },

    /// Pay a lightning invoice
    Pay {
        invoice: String,
        /// Pay without asking for confirmation
        #[clap(short, long)]
        yes: bool,
    },

    /// Decode a lightning invoice
    Decode { invoice: String },

    /// Show channel balance
    Balance,

    /// Print invoice and payment events until ctrl-c
    Subscribe {
        #[clap(long, conflicts_with = "payments_only")]
        invoices_only: bool,
        #[clap(long)]
        payments_only: bool,
    },

    /// Show version and configuration
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let term = Term::stdout();

    let settings = match &opts.command {
        Command::CreateInvoice {
            expiry: Some(expiry),
            ..
        } => opts.lnd.clone().with_invoice_expiry(*expiry),
        _ => opts.lnd.clone(),
    };

    if let Command::Info = opts.command {
        term.write_line(&format!(
            "Version: {}",
            style(env!("CARGO_PKG_VERSION")).cyan()
        ))?;
        term.write_line(&format!("Settings: {settings}"))?;
        return Ok(());
    }

    let client = LndClient::new(settings)?;

    match opts.command {
        Command::CreateInvoice { amount, memo, .. } => {
            let invoice = client.create_invoice(amount, memo).await?;
            term.write_line(&format!(
                "Invoice over {}:\n\n{}",
                style(cli::format_sat(invoice.amount)).cyan(),
                invoice.payment_request
            ))?;
            term.write_line(&cli::qr_code(&invoice.payment_request)?)?;
            term.write_line(&format!("Payment hash: {}", invoice.payment_hash))?;
            term.write_line(&format!(
                "Expires: {}",
                cli::format_timestamp(invoice.expires_at())
            ))?;
        }
        Command::Pay { invoice, yes } => {
            let decoded = client.decode_invoice(invoice).await?;
            cli::write_lines(&term, &cli::describe_decoded(&decoded, cli::now()))?;

            if decoded.is_expired(cli::now()) {
                term.write_line("Error: invoice has expired")?;
                return Ok(());
            }

            let pay_confirmed = yes
                || Confirm::new()
                    .with_prompt(format!(
                        "Pay lightning invoice over {}?",
                        cli::format_sat(decoded.amount)
                    ))
                    .interact()?;
            if !pay_confirmed {
                return Ok(());
            }

            let payment = pay_decoded_invoice(&client, &decoded).await?;
            term.write_line(&cli::describe_payment(&payment))?;
        }
        Command::Decode { invoice } => {
            let decoded = client.decode_invoice(invoice).await?;
            cli::write_lines(&term, &cli::describe_decoded(&decoded, cli::now()))?;
        }
        Command::Balance => {
            let balance = client.get_balance().await?;
            cli::write_lines(&term, &cli::describe_balance(&balance))?;
        }
        Command::Subscribe {
            invoices_only,
            payments_only,
        } => {
            let mut events = if invoices_only {
                client
                    .subscribe_invoices()
                    .await?
                    .map(|event| match event {
                        Ok(update) => PaymentFeedEvent::Invoice(update),
                        Err(error) => PaymentFeedEvent::Error {
                            source: FeedSource::Invoices,
                            error,
                        },
                    })
                    .boxed()
            } else if payments_only {
                client
                    .subscribe_payments()
                    .await?
                    .map(|event| match event {
                        Ok(update) => PaymentFeedEvent::Payment(update),
                        Err(error) => PaymentFeedEvent::Error {
                            source: FeedSource::Payments,
                            error,
                        },
                    })
                    .boxed()
            } else {
                client.subscribe_to_payments().await?.boxed()
            };

            term.write_line("Waiting for events, press ctrl-c to stop")?;
            loop {
                tokio::select! {
                    event = events.next() => match event {
                        Some(event) => cli::write_event(&term, &event)?,
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            tracing::info!("subscribe stopped");
        }
        Command::Info => {}
    }

    Ok(())
}
