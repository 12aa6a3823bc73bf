use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::Write;

use crate::application::{LedgerConfig, LedgerService, RepaymentPolicy};
use crate::domain::{
    Cents, FinancingRequest, Invoice, InvoiceId, Principal, format_cents, parse_cents,
};
use crate::io::Exporter;

/// Invoice Ledger - supply-chain invoice financing
#[derive(Parser)]
#[command(name = "invoice-ledger")]
#[command(about = "A ledger for invoices and the financing raised against them")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "LEDGER_DATABASE", default_value = "ledger.db")]
    pub database: String,

    /// Principal making the call (issuer, financier, ...)
    #[arg(long = "as", env = "LEDGER_PRINCIPAL", global = true)]
    pub principal: Option<String>,

    /// Refuse repayments until the invoice payment has been confirmed
    #[arg(long, global = true)]
    pub require_confirmed_payment: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Invoice commands
    #[command(subcommand)]
    Invoice(InvoiceCommands),

    /// Financing commands
    #[command(subcommand)]
    Financing(FinancingCommands),

    /// Verify ledger integrity
    Check,

    /// Export the ledger
    Export {
        /// What to export: json (full snapshot), invoices, financing
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum InvoiceCommands {
    /// Issue a new invoice as the calling principal
    Issue {
        /// Invoice ID (must be unique)
        id: String,

        /// Invoice amount (e.g., "1000.00" or "1000")
        #[arg(short, long)]
        amount: String,

        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        due: String,
    },

    /// Show an invoice
    Show {
        /// Invoice ID
        id: String,
    },

    /// List all invoices
    List,

    /// Confirm the buyer has paid an invoice (issuer only)
    ConfirmPayment {
        /// Invoice ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum FinancingCommands {
    /// Request financing against an invoice (issuer only)
    Request {
        /// Invoice ID
        id: String,

        /// Amount to finance (at most the invoice amount)
        #[arg(short, long)]
        amount: String,
    },

    /// Approve and fund a pending request (anyone but the issuer)
    Approve {
        /// Invoice ID
        id: String,
    },

    /// Repay financing (issuer only)
    Repay {
        /// Invoice ID
        id: String,

        /// Amount to repay
        #[arg(short, long)]
        amount: String,

        /// Value actually transferred with this repayment (defaults to the amount)
        #[arg(long)]
        value: Option<String>,
    },

    /// Show the financing request for an invoice
    Show {
        /// Invoice ID
        id: String,
    },

    /// List all financing requests
    List,
}

impl Cli {
    fn config(&self) -> LedgerConfig {
        let policy = if self.require_confirmed_payment {
            RepaymentPolicy::RequireConfirmedPayment
        } else {
            RepaymentPolicy::Unordered
        };
        LedgerConfig::default().with_repayment_policy(policy)
    }

    fn caller(&self) -> Result<Principal> {
        match self.principal.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => Ok(Principal::new(p)),
            _ => bail!("No caller given. Pass --as <principal> or set LEDGER_PRINCIPAL"),
        }
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config();

        if matches!(self.command, Commands::Init) {
            LedgerService::init(&self.database, config).await?;
            println!("Database initialized: {}", self.database);
            return Ok(());
        }

        let mut service = LedgerService::connect(&self.database, config)
            .await
            .with_context(|| format!("Failed to open ledger '{}'. Run init first", self.database))?;

        match &self.command {
            Commands::Init => {}

            Commands::Invoice(cmd) => {
                run_invoice_command(&mut service, cmd, || self.caller()).await?;
            }

            Commands::Financing(cmd) => {
                run_financing_command(&mut service, cmd, || self.caller()).await?;
            }

            Commands::Check => {
                run_check_command(&service).await?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                run_export_command(&service, export_type, output.as_deref())?;
            }
        }

        Ok(())
    }
}

async fn run_invoice_command(
    service: &mut LedgerService,
    cmd: &InvoiceCommands,
    caller: impl Fn() -> Result<Principal>,
) -> Result<()> {
    match cmd {
        InvoiceCommands::Issue { id, amount, due } => {
            let amount = parse_cents(amount).context("Invalid amount format. Use '50.00' or '50'")?;
            let due_date = parse_date(due)
                .with_context(|| format!("Invalid due date '{}'. Use YYYY-MM-DD", due))?;

            let invoice = service
                .issue_invoice(&caller()?, InvoiceId::new(id.as_str()), amount, due_date)
                .await?;
            println!(
                "Issued invoice {}: {} due {}",
                invoice.invoice_id,
                format_cents(invoice.amount),
                invoice.due_date.format("%Y-%m-%d")
            );
        }

        InvoiceCommands::Show { id } => {
            let invoice = service.get_invoice(&InvoiceId::new(id.as_str()))?;
            print_invoice(&invoice);
            if let Ok(request) = service.get_financing_request(&invoice.invoice_id) {
                println!();
                print_financing_request(&request);
            }
        }

        InvoiceCommands::List => {
            let invoices = service.list_invoices();
            let now = service.facade().current_time();
            if invoices.is_empty() {
                println!("No invoices found.");
            } else {
                println!(
                    "{:<16} {:<16} {:>14} {:<12} {:<6} {:<7}",
                    "ID", "ISSUER", "AMOUNT", "DUE", "PAID", "OVERDUE"
                );
                println!("{}", "-".repeat(76));
                for invoice in invoices {
                    println!(
                        "{:<16} {:<16} {:>14} {:<12} {:<6} {:<7}",
                        invoice.invoice_id,
                        invoice.issuer,
                        format_cents(invoice.amount),
                        invoice.due_date.format("%Y-%m-%d"),
                        if invoice.paid { "yes" } else { "no" },
                        if invoice.is_overdue(now) { "yes" } else { "" }
                    );
                }
            }
        }

        InvoiceCommands::ConfirmPayment { id } => {
            let invoice = service
                .confirm_payment(&caller()?, &InvoiceId::new(id.as_str()))
                .await?;
            println!("Confirmed payment of invoice {}", invoice.invoice_id);
        }
    }

    Ok(())
}

async fn run_financing_command(
    service: &mut LedgerService,
    cmd: &FinancingCommands,
    caller: impl Fn() -> Result<Principal>,
) -> Result<()> {
    match cmd {
        FinancingCommands::Request { id, amount } => {
            let amount = parse_cents(amount).context("Invalid amount format. Use '50.00' or '50'")?;
            let request = service
                .request_financing(&caller()?, &InvoiceId::new(id.as_str()), amount)
                .await?;
            println!(
                "Requested {} of financing against invoice {}",
                format_cents(request.requested_amount),
                request.invoice_id
            );
        }

        FinancingCommands::Approve { id } => {
            let request = service
                .approve_financing(&caller()?, &InvoiceId::new(id.as_str()))
                .await?;
            println!(
                "Approved financing for invoice {}: {} disbursed",
                request.invoice_id,
                format_cents(request.financed_amount)
            );
        }

        FinancingCommands::Repay { id, amount, value } => {
            let repay_amount =
                parse_cents(amount).context("Invalid amount format. Use '50.00' or '50'")?;
            let transferred_value = match value {
                Some(v) => parse_cents(v).context("Invalid value format. Use '50.00' or '50'")?,
                None => repay_amount,
            };

            let request = service
                .repay_loan(
                    &caller()?,
                    &InvoiceId::new(id.as_str()),
                    repay_amount,
                    transferred_value,
                )
                .await?;

            if request.paid {
                println!(
                    "Repaid {}: financing for invoice {} is closed",
                    format_cents(repay_amount),
                    request.invoice_id
                );
            } else {
                println!(
                    "Repaid {}: {} still outstanding on invoice {}",
                    format_cents(repay_amount),
                    format_cents(request.outstanding_amount),
                    request.invoice_id
                );
            }
        }

        FinancingCommands::Show { id } => {
            let request = service.get_financing_request(&InvoiceId::new(id.as_str()))?;
            print_financing_request(&request);
        }

        FinancingCommands::List => {
            let requests = service.list_financing_requests();
            if requests.is_empty() {
                println!("No financing requests found.");
            } else {
                println!(
                    "{:<16} {:<10} {:<16} {:>14} {:>14}",
                    "INVOICE", "STATE", "FINANCIER", "REQUESTED", "OUTSTANDING"
                );
                println!("{}", "-".repeat(74));
                for request in requests {
                    println!(
                        "{:<16} {:<10} {:<16} {:>14} {:>14}",
                        request.invoice_id,
                        request.state(),
                        request
                            .financier
                            .as_ref()
                            .map(|p| p.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        format_cents(request.requested_amount),
                        format_cents(request.outstanding_amount)
                    );
                }
            }
        }
    }

    Ok(())
}

fn format_total(total: Option<Cents>) -> String {
    total.map(format_cents).unwrap_or_else(|| "overflow".to_string())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    let report = service.check_stored_integrity().await?;

    println!("Ledger Integrity Check");
    println!("======================");
    println!("Invoices:            {}", report.invoice_count);
    println!("  paid:              {}", report.paid_invoices);
    println!("Financing requests:  {}", report.request_count);
    println!("  open:              {}", report.open_requests);
    println!("  closed:            {}", report.closed_requests);
    println!("Total financed:      {}", format_total(report.total_financed));
    println!("Total outstanding:   {}", format_total(report.total_outstanding));
    println!();

    if report.is_ok() {
        println!("Status: OK");
        Ok(())
    } else {
        println!("Status: {} violation(s)", report.violations.len());
        for violation in &report.violations {
            println!("  - {}", violation);
        }
        bail!("Ledger integrity check failed")
    }
}

fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create file: {}", path))?,
        ),
        None => Box::new(std::io::stdout()),
    };

    let exporter = Exporter::new(service.facade());
    let count = match export_type {
        "json" => exporter.export_json(writer)?,
        "invoices" => exporter.export_invoices_csv(writer)?,
        "financing" => exporter.export_financing_csv(writer)?,
        other => bail!(
            "Unknown export type '{}'. Valid types: json, invoices, financing",
            other
        ),
    };

    if let Some(path) = output {
        eprintln!("Exported {} record(s) to {}", count, path);
    }
    Ok(())
}

fn print_invoice(invoice: &Invoice) {
    println!("Invoice: {}", invoice.invoice_id);
    println!("  Issuer:   {}", invoice.issuer);
    println!("  Amount:   {}", format_cents(invoice.amount));
    println!("  Due:      {}", invoice.due_date.format("%Y-%m-%d %H:%M:%S"));
    println!(
        "  Issued:   {}",
        invoice.issued_at.format("%Y-%m-%d %H:%M:%S")
    );
    match invoice.paid_at {
        Some(at) => println!("  Paid:     yes ({})", at.format("%Y-%m-%d %H:%M:%S")),
        None => println!("  Paid:     no"),
    }
}

fn print_financing_request(request: &FinancingRequest) {
    println!("Financing for invoice {}", request.invoice_id);
    println!("  State:        {}", request.state());
    if let Some(financier) = &request.financier {
        println!("  Financier:    {}", financier);
    }
    println!("  Requested:    {}", format_cents(request.requested_amount));
    println!("  Financed:     {}", format_cents(request.financed_amount));
    println!("  Repaid:       {}", format_cents(request.repaid_amount()));
    println!("  Outstanding:  {}", format_cents(request.outstanding_amount));
}

/// Parse a date given as YYYY-MM-DD (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .context("Invalid time of day")
}
