// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use invoice_ledger::application::{LedgerConfig, LedgerService};
use invoice_ledger::domain::{Cents, InvoiceId, Principal};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    test_service_with(LedgerConfig::default()).await
}

pub async fn test_service_with(config: LedgerConfig) -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = LedgerService::init(&db_path(&temp_dir), config).await?;
    Ok((service, temp_dir))
}

/// Reopen the database behind a test service.
pub async fn reopen(temp_dir: &TempDir) -> Result<LedgerService> {
    Ok(LedgerService::connect(&db_path(temp_dir), LedgerConfig::default()).await?)
}

/// Second connection to the same database, for tampering with it behind the service.
pub async fn raw_pool(temp_dir: &TempDir) -> Result<SqlitePool> {
    Ok(SqlitePool::connect(&format!("sqlite:{}", db_path(temp_dir))).await?)
}

fn db_path(temp_dir: &TempDir) -> String {
    temp_dir
        .path()
        .join("test.db")
        .to_str()
        .unwrap()
        .to_string()
}

pub fn in_days(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}

pub fn seller() -> Principal {
    Principal::new("seller")
}

pub fn bank() -> Principal {
    Principal::new("bank")
}

pub fn inv(id: &str) -> InvoiceId {
    InvoiceId::new(id)
}

/// Test fixture: an invoice with approved financing
pub struct FundedInvoice;

impl FundedInvoice {
    /// Issue `id` for `amount`, request `financed` against it and approve as the bank.
    pub async fn create(
        service: &mut LedgerService,
        id: &str,
        amount: Cents,
        financed: Cents,
    ) -> Result<()> {
        service
            .issue_invoice(&seller(), inv(id), amount, in_days(30))
            .await?;
        service
            .request_financing(&seller(), &inv(id), financed)
            .await?;
        service.approve_financing(&bank(), &inv(id)).await?;
        Ok(())
    }
}
