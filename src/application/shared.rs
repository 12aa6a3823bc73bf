use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{
    Cents, FinancingRequest, IntegrityReport, Invoice, InvoiceId, LedgerError, Principal,
};

use super::LedgerFacade;

/// Cloneable handle for hosts that drive one ledger from many tasks.
///
/// Each mutation runs under the write lock, which gives the total order the
/// ledger relies on. Queries share the read lock and never see a record mid-update.
/// The facade itself never awaits, so the lock is held only for the call.
#[derive(Clone)]
pub struct SharedLedger {
    inner: Arc<RwLock<LedgerFacade>>,
}

impl SharedLedger {
    pub fn new(facade: LedgerFacade) -> Self {
        Self {
            inner: Arc::new(RwLock::new(facade)),
        }
    }

    pub async fn issue_invoice(
        &self,
        caller: &Principal,
        invoice_id: InvoiceId,
        amount: Cents,
        due_date: DateTime<Utc>,
    ) -> Result<Invoice, LedgerError> {
        self.inner
            .write()
            .await
            .issue_invoice(caller, invoice_id, amount, due_date)
    }

    pub async fn request_financing(
        &self,
        caller: &Principal,
        invoice_id: &InvoiceId,
        requested_amount: Cents,
    ) -> Result<FinancingRequest, LedgerError> {
        self.inner
            .write()
            .await
            .request_financing(caller, invoice_id, requested_amount)
    }

    pub async fn approve_financing(
        &self,
        caller: &Principal,
        invoice_id: &InvoiceId,
    ) -> Result<FinancingRequest, LedgerError> {
        self.inner
            .write()
            .await
            .approve_financing(caller, invoice_id)
    }

    pub async fn confirm_payment(
        &self,
        caller: &Principal,
        invoice_id: &InvoiceId,
    ) -> Result<Invoice, LedgerError> {
        self.inner.write().await.confirm_payment(caller, invoice_id)
    }

    pub async fn repay_loan(
        &self,
        caller: &Principal,
        invoice_id: &InvoiceId,
        repay_amount: Cents,
        transferred_value: Cents,
    ) -> Result<FinancingRequest, LedgerError> {
        self.inner
            .write()
            .await
            .repay_loan(caller, invoice_id, repay_amount, transferred_value)
    }

    pub async fn get_invoice(&self, invoice_id: &InvoiceId) -> Result<Invoice, LedgerError> {
        self.inner.read().await.get_invoice(invoice_id)
    }

    pub async fn list_invoices(&self) -> Vec<Invoice> {
        self.inner.read().await.list_invoices()
    }

    pub async fn get_financing_request(
        &self,
        invoice_id: &InvoiceId,
    ) -> Result<FinancingRequest, LedgerError> {
        self.inner.read().await.get_financing_request(invoice_id)
    }

    pub async fn list_financing_requests(&self) -> Vec<FinancingRequest> {
        self.inner.read().await.list_financing_requests()
    }

    pub async fn check_integrity(&self) -> IntegrityReport {
        self.inner.read().await.check_integrity()
    }
}
