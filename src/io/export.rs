use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerFacade;
use crate::domain::{FinancingRequest, Invoice, format_cents};

/// Full ledger snapshot for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub ledger_time: DateTime<Utc>,
    pub invoices: Vec<Invoice>,
    pub financing_requests: Vec<FinancingRequest>,
}

/// Exporter for converting ledger contents to JSON or CSV
pub struct Exporter<'a> {
    ledger: &'a LedgerFacade,
}

impl<'a> Exporter<'a> {
    pub fn new(ledger: &'a LedgerFacade) -> Self {
        Self { ledger }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            ledger_time: self.ledger.ledger_time(),
            invoices: self.ledger.list_invoices(),
            financing_requests: self.ledger.list_financing_requests(),
        }
    }

    /// Export the whole ledger as pretty-printed JSON
    pub fn export_json<W: Write>(&self, writer: W) -> Result<usize> {
        let snapshot = self.snapshot();
        let count = snapshot.invoices.len() + snapshot.financing_requests.len();
        serde_json::to_writer_pretty(writer, &snapshot)?;
        Ok(count)
    }

    /// Export invoices to CSV format
    pub fn export_invoices_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let invoices = self.ledger.list_invoices();
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "invoice_id",
            "issuer",
            "amount",
            "due_date",
            "paid",
            "issued_at",
            "paid_at",
        ])?;

        for invoice in &invoices {
            csv_writer.write_record(&[
                invoice.invoice_id.to_string(),
                invoice.issuer.to_string(),
                format_cents(invoice.amount),
                invoice.due_date.to_rfc3339(),
                invoice.paid.to_string(),
                invoice.issued_at.to_rfc3339(),
                invoice
                    .paid_at
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(invoices.len())
    }

    /// Export financing requests to CSV format
    pub fn export_financing_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let requests = self.ledger.list_financing_requests();
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "invoice_id",
            "state",
            "financier",
            "requested_amount",
            "financed_amount",
            "outstanding_amount",
            "paid",
            "requested_at",
            "approved_at",
            "closed_at",
        ])?;

        for request in &requests {
            csv_writer.write_record(&[
                request.invoice_id.to_string(),
                request.state().to_string(),
                request
                    .financier
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
                format_cents(request.requested_amount),
                format_cents(request.financed_amount),
                format_cents(request.outstanding_amount),
                request.paid.to_string(),
                request.requested_at.to_rfc3339(),
                request
                    .approved_at
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default(),
                request
                    .closed_at
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(requests.len())
    }
}
