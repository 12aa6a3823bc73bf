use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{
    Cents, FinancingRequest, IntegrityReport, Invoice, InvoiceId, LedgerError, Principal,
};
use crate::storage::{MAX_STORED_AMOUNT, Repository};

use super::{AppError, Clock, LedgerConfig, LedgerFacade, SystemClock};

/// Single-writer host that keeps a [`LedgerFacade`] in step with a SQLite database.
///
/// Every successful mutation writes the changed record back before returning.
/// This is the primary interface for the CLI.
pub struct LedgerService {
    repo: Repository,
    facade: LedgerFacade,
    poisoned: bool,
}

impl LedgerService {
    /// Load the ledger held by `repo`.
    pub async fn load(
        repo: Repository,
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let facade = Self::load_facade(&repo, config, clock).await?;
        Ok(Self {
            repo,
            facade,
            poisoned: false,
        })
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str, config: LedgerConfig) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Self::load(repo, config, Arc::new(SystemClock)).await
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, config: LedgerConfig) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Self::load(repo, config, Arc::new(SystemClock)).await
    }

    async fn load_facade(
        repo: &Repository,
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<LedgerFacade, AppError> {
        let store = repo.load_store().await?;
        let ledger_time = repo
            .get_ledger_time()
            .await?
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(LedgerFacade::from_store(store, ledger_time, config, clock))
    }

    pub fn facade(&self) -> &LedgerFacade {
        &self.facade
    }

    /// True once a failed write could not be undone by reloading. Every
    /// further mutation is refused.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn ensure_writable(&self) -> Result<(), AppError> {
        if self.poisoned {
            return Err(AppError::Poisoned);
        }
        Ok(())
    }

    fn ensure_storable(amount: Cents) -> Result<(), AppError> {
        if amount > MAX_STORED_AMOUNT {
            return Err(LedgerError::InvalidArgument(format!(
                "amount {} exceeds the storable maximum {}",
                amount, MAX_STORED_AMOUNT
            ))
            .into());
        }
        Ok(())
    }

    /// Write a mutated invoice back. If the write fails, memory is rebuilt from
    /// the database so it never runs ahead of what is stored.
    async fn persist_invoice(&mut self, invoice: &Invoice) -> Result<(), AppError> {
        let ledger_time = self.facade.ledger_time();
        if let Err(err) = self.repo.persist_invoice(invoice, ledger_time).await {
            self.rollback().await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn persist_financing_request(
        &mut self,
        request: &FinancingRequest,
    ) -> Result<(), AppError> {
        let ledger_time = self.facade.ledger_time();
        if let Err(err) = self
            .repo
            .persist_financing_request(request, ledger_time)
            .await
        {
            self.rollback().await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn rollback(&mut self) {
        let config = *self.facade.config();
        let clock = self.facade.clock();
        match Self::load_facade(&self.repo, config, clock).await {
            Ok(facade) => self.facade = facade,
            Err(err) => {
                tracing::error!("failed to reload ledger after write error: {err}");
                self.poisoned = true;
            }
        }
    }

    // ========================
    // Mutations
    // ========================

    pub async fn issue_invoice(
        &mut self,
        caller: &Principal,
        invoice_id: InvoiceId,
        amount: Cents,
        due_date: DateTime<Utc>,
    ) -> Result<Invoice, AppError> {
        self.ensure_writable()?;
        Self::ensure_storable(amount)?;
        let invoice = self
            .facade
            .issue_invoice(caller, invoice_id, amount, due_date)?;
        self.persist_invoice(&invoice).await?;
        Ok(invoice)
    }

    pub async fn request_financing(
        &mut self,
        caller: &Principal,
        invoice_id: &InvoiceId,
        requested_amount: Cents,
    ) -> Result<FinancingRequest, AppError> {
        self.ensure_writable()?;
        Self::ensure_storable(requested_amount)?;
        let request = self
            .facade
            .request_financing(caller, invoice_id, requested_amount)?;
        self.persist_financing_request(&request).await?;
        Ok(request)
    }

    pub async fn approve_financing(
        &mut self,
        caller: &Principal,
        invoice_id: &InvoiceId,
    ) -> Result<FinancingRequest, AppError> {
        self.ensure_writable()?;
        let request = self.facade.approve_financing(caller, invoice_id)?;
        self.persist_financing_request(&request).await?;
        Ok(request)
    }

    pub async fn confirm_payment(
        &mut self,
        caller: &Principal,
        invoice_id: &InvoiceId,
    ) -> Result<Invoice, AppError> {
        self.ensure_writable()?;
        let invoice = self.facade.confirm_payment(caller, invoice_id)?;
        self.persist_invoice(&invoice).await?;
        Ok(invoice)
    }

    pub async fn repay_loan(
        &mut self,
        caller: &Principal,
        invoice_id: &InvoiceId,
        repay_amount: Cents,
        transferred_value: Cents,
    ) -> Result<FinancingRequest, AppError> {
        self.ensure_writable()?;
        let request =
            self.facade
                .repay_loan(caller, invoice_id, repay_amount, transferred_value)?;
        self.persist_financing_request(&request).await?;
        Ok(request)
    }

    // ========================
    // Queries
    // ========================

    pub fn get_invoice(&self, invoice_id: &InvoiceId) -> Result<Invoice, LedgerError> {
        self.facade.get_invoice(invoice_id)
    }

    pub fn list_invoices(&self) -> Vec<Invoice> {
        self.facade.list_invoices()
    }

    pub fn get_financing_request(
        &self,
        invoice_id: &InvoiceId,
    ) -> Result<FinancingRequest, LedgerError> {
        self.facade.get_financing_request(invoice_id)
    }

    pub fn list_financing_requests(&self) -> Vec<FinancingRequest> {
        self.facade.list_financing_requests()
    }

    /// Check the in-memory ledger against every cross-record invariant.
    pub fn check_integrity(&self) -> IntegrityReport {
        self.facade.check_integrity()
    }

    /// Check the records as stored on disk, bypassing the loaded state.
    pub async fn check_stored_integrity(&self) -> Result<IntegrityReport, AppError> {
        let invoices = self.repo.list_invoices().await?;
        let requests = self.repo.list_financing_requests().await?;
        Ok(crate::domain::check_integrity(&invoices, &requests))
    }
}
