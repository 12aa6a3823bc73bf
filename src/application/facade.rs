use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{
    Action, Cents, FinancingRequest, IntegrityReport, Invoice, InvoiceId, LedgerError, Principal,
    check_integrity, format_cents,
};
use crate::storage::LedgerStore;

use super::{Clock, FinancingService, InvoiceService, LedgerConfig, SystemClock};

/// The single callable surface of the ledger.
///
/// Mutators take `&mut self` and queries `&self`, so a host holding the facade
/// gets the required per-record serialization from the borrow rules alone.
/// Hosts that share it between tasks wrap it in [`super::SharedLedger`].
pub struct LedgerFacade {
    store: LedgerStore,
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
    /// Highest clock reading committed by a successful mutation
    ledger_time: DateTime<Utc>,
}

impl LedgerFacade {
    /// Create an empty ledger driven by the wall clock.
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        Self::from_store(LedgerStore::new(), DateTime::<Utc>::MIN_UTC, config, clock)
    }

    /// Resume a ledger from previously stored records.
    pub fn from_store(
        store: LedgerStore,
        ledger_time: DateTime<Utc>,
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
            ledger_time,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn ledger_time(&self) -> DateTime<Utc> {
        self.ledger_time
    }

    /// Current ledger time: the clock reading, never earlier than a time already committed.
    pub fn current_time(&self) -> DateTime<Utc> {
        self.clock.now().max(self.ledger_time)
    }

    fn apply<T>(
        &mut self,
        action: Action,
        caller: &Principal,
        invoice_id: &InvoiceId,
        op: impl FnOnce(&mut LedgerStore, &LedgerConfig, DateTime<Utc>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let now = self.current_time();
        match op(&mut self.store, &self.config, now) {
            Ok(value) => {
                self.ledger_time = now;
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(
                    action = %action,
                    caller = %caller,
                    invoice_id = %invoice_id,
                    kind = err.kind(),
                    "ledger call rejected: {}",
                    err
                );
                Err(err)
            }
        }
    }

    // ========================
    // Mutations
    // ========================

    pub fn issue_invoice(
        &mut self,
        caller: &Principal,
        invoice_id: InvoiceId,
        amount: Cents,
        due_date: DateTime<Utc>,
    ) -> Result<Invoice, LedgerError> {
        let id = invoice_id.clone();
        let invoice = self.apply(Action::IssueInvoice, caller, &id, |store, _, now| {
            InvoiceService::issue_invoice(store, caller, invoice_id, amount, due_date, now)
        })?;

        tracing::info!(
            invoice_id = %invoice.invoice_id,
            issuer = %invoice.issuer,
            amount = %format_cents(invoice.amount),
            due_date = %invoice.due_date.to_rfc3339(),
            "invoice issued"
        );
        Ok(invoice)
    }

    pub fn request_financing(
        &mut self,
        caller: &Principal,
        invoice_id: &InvoiceId,
        requested_amount: Cents,
    ) -> Result<FinancingRequest, LedgerError> {
        let request = self.apply(Action::RequestFinancing, caller, invoice_id, |store, _, now| {
            FinancingService::request_financing(store, caller, invoice_id, requested_amount, now)
        })?;

        tracing::info!(
            invoice_id = %invoice_id,
            requested = %format_cents(request.requested_amount),
            "financing requested"
        );
        Ok(request)
    }

    pub fn approve_financing(
        &mut self,
        caller: &Principal,
        invoice_id: &InvoiceId,
    ) -> Result<FinancingRequest, LedgerError> {
        let request = self.apply(Action::ApproveFinancing, caller, invoice_id, |store, _, now| {
            FinancingService::approve_financing(store, caller, invoice_id, now)
        })?;

        tracing::info!(
            invoice_id = %invoice_id,
            financier = %caller,
            financed = %format_cents(request.financed_amount),
            "financing approved"
        );
        Ok(request)
    }

    pub fn confirm_payment(
        &mut self,
        caller: &Principal,
        invoice_id: &InvoiceId,
    ) -> Result<Invoice, LedgerError> {
        let invoice = self.apply(Action::ConfirmPayment, caller, invoice_id, |store, _, now| {
            FinancingService::confirm_payment(store, caller, invoice_id, now)
        })?;

        tracing::info!(invoice_id = %invoice_id, "invoice payment confirmed");
        Ok(invoice)
    }

    /// Repay part or all of an approved financing. `transferred_value` is the
    /// value the host has already moved for this call.
    pub fn repay_loan(
        &mut self,
        caller: &Principal,
        invoice_id: &InvoiceId,
        repay_amount: Cents,
        transferred_value: Cents,
    ) -> Result<FinancingRequest, LedgerError> {
        let request = self.apply(Action::RepayLoan, caller, invoice_id, |store, config, now| {
            FinancingService::repay_loan(
                store,
                config.repayment_policy,
                caller,
                invoice_id,
                repay_amount,
                transferred_value,
                now,
            )
        })?;

        tracing::info!(
            invoice_id = %invoice_id,
            repaid = %format_cents(repay_amount),
            outstanding = %format_cents(request.outstanding_amount),
            closed = request.paid,
            "loan repayment applied"
        );
        Ok(request)
    }

    // ========================
    // Queries
    // ========================

    pub fn get_invoice(&self, invoice_id: &InvoiceId) -> Result<Invoice, LedgerError> {
        InvoiceService::get_invoice(&self.store, invoice_id)
    }

    pub fn list_invoices(&self) -> Vec<Invoice> {
        InvoiceService::list_invoices(&self.store)
    }

    pub fn get_financing_request(
        &self,
        invoice_id: &InvoiceId,
    ) -> Result<FinancingRequest, LedgerError> {
        FinancingService::get_financing_request(&self.store, invoice_id)
    }

    pub fn list_financing_requests(&self) -> Vec<FinancingRequest> {
        FinancingService::list_financing_requests(&self.store)
    }

    pub fn check_integrity(&self) -> IntegrityReport {
        check_integrity(self.store.invoices(), self.store.financing_requests())
    }
}
