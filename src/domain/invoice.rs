use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, Principal};

/// Opaque invoice identifier chosen by the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(String);

impl InvoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank identifiers are never valid keys.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InvoiceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// An invoice issued by a seller. Everything except the paid flag is fixed at issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: InvoiceId,
    /// Seller who created the invoice; also the party that repays financing
    pub issuer: Principal,
    /// Face value in cents (always positive)
    pub amount: Cents,
    pub due_date: DateTime<Utc>,
    /// Set once when the issuer acknowledges the buyer's payment
    pub paid: bool,
    /// Ledger time at issuance
    pub issued_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Create an unpaid invoice. Range checks belong to the issuing service.
    pub fn new(
        invoice_id: InvoiceId,
        issuer: Principal,
        amount: Cents,
        due_date: DateTime<Utc>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            invoice_id,
            issuer,
            amount,
            due_date,
            paid: false,
            issued_at,
            paid_at: None,
        }
    }

    pub fn is_issued_by(&self, principal: &Principal) -> bool {
        &self.issuer == principal
    }

    /// Return a copy of this invoice marked as paid at the given time.
    pub fn mark_paid(&self, at: DateTime<Utc>) -> Self {
        Self {
            paid: true,
            paid_at: Some(at),
            ..self.clone()
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.paid && now > self.due_date
    }
}
