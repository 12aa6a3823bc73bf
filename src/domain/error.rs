use thiserror::Error;

use super::{Action, AmountError, Cents, InvoiceId, Principal};

/// Failures reported by ledger operations. A failed call never changes state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invoice already exists: {0}")]
    DuplicateKey(InvoiceId),

    #[error("Financing already requested for invoice: {0}")]
    AlreadyExists(InvoiceId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{principal} is not allowed to {action} on invoice {invoice_id}")]
    Unauthorized {
        principal: Principal,
        action: Action,
        invoice_id: InvoiceId,
    },

    #[error("Invalid state for invoice {invoice_id}: {reason}")]
    InvalidState {
        invoice_id: InvoiceId,
        reason: String,
    },

    #[error("Transferred value {transferred} does not match declared amount {declared}")]
    AmountMismatch { declared: Cents, transferred: Cents },

    #[error("Amount overflow: {a} + {b}")]
    Overflow { a: Cents, b: Cents },

    #[error("Amount underflow: {a} - {b}")]
    Underflow { a: Cents, b: Cents },
}

impl LedgerError {
    pub(crate) fn invalid_state(invoice_id: &InvoiceId, reason: impl Into<String>) -> Self {
        LedgerError::InvalidState {
            invoice_id: invoice_id.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invoice_not_found(invoice_id: &InvoiceId) -> Self {
        LedgerError::NotFound(format!("invoice {}", invoice_id))
    }

    pub(crate) fn request_not_found(invoice_id: &InvoiceId) -> Self {
        LedgerError::NotFound(format!("financing request for invoice {}", invoice_id))
    }

    /// Stable short name, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::InvalidArgument(_) => "invalid_argument",
            LedgerError::DuplicateKey(_) => "duplicate_key",
            LedgerError::AlreadyExists(_) => "already_exists",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::Unauthorized { .. } => "unauthorized",
            LedgerError::InvalidState { .. } => "invalid_state",
            LedgerError::AmountMismatch { .. } => "amount_mismatch",
            LedgerError::Overflow { .. } => "overflow",
            LedgerError::Underflow { .. } => "underflow",
        }
    }
}

impl From<AmountError> for LedgerError {
    fn from(err: AmountError) -> Self {
        match err {
            AmountError::Overflow { a, b } => LedgerError::Overflow { a, b },
            AmountError::Underflow { a, b } => LedgerError::Underflow { a, b },
        }
    }
}
