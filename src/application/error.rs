use thiserror::Error;

use crate::domain::LedgerError;

/// Errors surfaced by the persistent ledger host.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),

    /// A write failed and the ledger could not be reloaded afterwards.
    #[error("Ledger is out of step with the database; reconnect to continue")]
    Poisoned,
}

impl AppError {
    /// The ledger failure behind this error, if it came from the core.
    pub fn ledger_error(&self) -> Option<&LedgerError> {
        match self {
            AppError::Ledger(err) => Some(err),
            AppError::Database(_) | AppError::Poisoned => None,
        }
    }
}
