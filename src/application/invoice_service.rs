use chrono::{DateTime, Utc};

use crate::domain::{
    Action, Cents, Invoice, InvoiceId, LedgerError, Principal, authorize,
};
use crate::storage::LedgerStore;

/// Invoice issuance and lookups.
pub struct InvoiceService;

impl InvoiceService {
    /// Issue a new invoice owned by `caller`.
    pub fn issue_invoice(
        store: &mut LedgerStore,
        caller: &Principal,
        invoice_id: InvoiceId,
        amount: Cents,
        due_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Invoice, LedgerError> {
        if invoice_id.is_blank() {
            return Err(LedgerError::InvalidArgument(
                "Invoice id must not be empty".to_string(),
            ));
        }
        if amount == 0 {
            return Err(LedgerError::InvalidArgument(
                "Invoice amount must be positive".to_string(),
            ));
        }
        if due_date <= now {
            return Err(LedgerError::InvalidArgument(format!(
                "Due date {} must be after {}",
                due_date.to_rfc3339(),
                now.to_rfc3339()
            )));
        }
        if store.contains_invoice(&invoice_id) {
            return Err(LedgerError::DuplicateKey(invoice_id));
        }

        let invoice = Invoice::new(invoice_id, caller.clone(), amount, due_date, now);

        // Holds by construction; kept so every mutation goes through the same gate
        if !authorize(caller, Action::IssueInvoice, &invoice).is_allowed() {
            return Err(LedgerError::Unauthorized {
                principal: caller.clone(),
                action: Action::IssueInvoice,
                invoice_id: invoice.invoice_id,
            });
        }

        store.insert_invoice(invoice.clone())?;
        Ok(invoice)
    }

    pub fn get_invoice(store: &LedgerStore, invoice_id: &InvoiceId) -> Result<Invoice, LedgerError> {
        store.get_invoice(invoice_id).cloned()
    }

    pub fn list_invoices(store: &LedgerStore) -> Vec<Invoice> {
        store.list_invoices()
    }
}
