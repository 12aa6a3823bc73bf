use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AmountError, Cents, InvoiceId, Principal, checked_sub};

/// Lifecycle position of a financing request, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinancingState {
    /// Raised by the issuer, no financier yet
    Requested,
    /// Funded, nothing repaid yet
    Approved,
    /// Partially repaid
    Repaying,
    /// Fully repaid
    Closed,
}

impl FinancingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinancingState::Requested => "requested",
            FinancingState::Approved => "approved",
            FinancingState::Repaying => "repaying",
            FinancingState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for FinancingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Financing raised against an invoice. Keyed by the invoice it references;
/// an invoice carries at most one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancingRequest {
    pub invoice_id: InvoiceId,
    /// Party that approved and funded the request
    pub financier: Option<Principal>,
    pub requested_amount: Cents,
    /// Amount disbursed to the issuer, set once on approval
    pub financed_amount: Cents,
    /// Amount the issuer still owes the financier
    pub outstanding_amount: Cents,
    /// True once the outstanding amount has been repaid to zero
    pub paid: bool,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl FinancingRequest {
    /// Create an unfunded request. Range checks belong to the financing service.
    pub fn new(invoice_id: InvoiceId, requested_amount: Cents, requested_at: DateTime<Utc>) -> Self {
        Self {
            invoice_id,
            financier: None,
            requested_amount,
            financed_amount: 0,
            outstanding_amount: 0,
            paid: false,
            requested_at,
            approved_at: None,
            closed_at: None,
        }
    }

    pub fn state(&self) -> FinancingState {
        if self.financier.is_none() {
            FinancingState::Requested
        } else if self.paid {
            FinancingState::Closed
        } else if self.outstanding_amount < self.financed_amount {
            FinancingState::Repaying
        } else {
            FinancingState::Approved
        }
    }

    pub fn is_approved(&self) -> bool {
        self.financier.is_some()
    }

    /// Total repaid so far.
    pub fn repaid_amount(&self) -> Cents {
        self.financed_amount.saturating_sub(self.outstanding_amount)
    }

    /// Return the funded version of this request: the full requested amount is
    /// disbursed and becomes outstanding.
    pub fn approve(&self, financier: Principal, at: DateTime<Utc>) -> Self {
        Self {
            financier: Some(financier),
            financed_amount: self.requested_amount,
            outstanding_amount: self.requested_amount,
            approved_at: Some(at),
            ..self.clone()
        }
    }

    /// Return this request with `amount` repaid. Closes it when nothing remains.
    pub fn apply_repayment(&self, amount: Cents, at: DateTime<Utc>) -> Result<Self, AmountError> {
        let outstanding_amount = checked_sub(self.outstanding_amount, amount)?;
        let paid = outstanding_amount == 0;

        Ok(Self {
            outstanding_amount,
            paid,
            closed_at: if paid { Some(at) } else { None },
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request(amount: Cents) -> FinancingRequest {
        FinancingRequest::new("INV1".into(), amount, Utc::now())
    }

    #[test]
    fn test_new_request_is_unfunded() {
        let request = sample_request(600);

        assert_eq!(request.state(), FinancingState::Requested);
        assert_eq!(request.financed_amount, 0);
        assert_eq!(request.outstanding_amount, 0);
        assert!(request.financier.is_none());
        assert!(!request.paid);
    }

    #[test]
    fn test_approve_disburses_requested_amount() {
        let request = sample_request(600).approve(Principal::new("bank"), Utc::now());

        assert_eq!(request.state(), FinancingState::Approved);
        assert_eq!(request.financier, Some(Principal::new("bank")));
        assert_eq!(request.financed_amount, 600);
        assert_eq!(request.outstanding_amount, 600);
        assert!(request.approved_at.is_some());
    }

    #[test]
    fn test_partial_then_full_repayment() {
        let now = Utc::now();
        let approved = sample_request(600).approve(Principal::new("bank"), now);

        let partial = approved.apply_repayment(200, now).unwrap();
        assert_eq!(partial.state(), FinancingState::Repaying);
        assert_eq!(partial.outstanding_amount, 400);
        assert_eq!(partial.repaid_amount(), 200);
        assert!(!partial.paid);
        assert!(partial.closed_at.is_none());

        let closed = partial.apply_repayment(400, now).unwrap();
        assert_eq!(closed.state(), FinancingState::Closed);
        assert_eq!(closed.outstanding_amount, 0);
        assert!(closed.paid);
        assert_eq!(closed.closed_at, Some(now));
    }

    #[test]
    fn test_over_repayment_underflows() {
        let approved = sample_request(600).approve(Principal::new("bank"), Utc::now());

        assert_eq!(
            approved.apply_repayment(700, Utc::now()),
            Err(AmountError::Underflow { a: 600, b: 700 })
        );
    }
}
