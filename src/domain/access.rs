use serde::{Deserialize, Serialize};

use super::Invoice;

/// Authenticated identifier of a calling party, as presented by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Mutating actions subject to access checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    IssueInvoice,
    RequestFinancing,
    ApproveFinancing,
    ConfirmPayment,
    RepayLoan,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::IssueInvoice => "issue_invoice",
            Action::RequestFinancing => "request_financing",
            Action::ApproveFinancing => "approve_financing",
            Action::ConfirmPayment => "confirm_payment",
            Action::RepayLoan => "repay_loan",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Resolve whether `principal` may perform `action` on `invoice`.
///
/// Every action except financing approval belongs to the issuer. Approval is the
/// reverse: anyone but the issuer, so a seller can never finance their own invoice.
/// For issuance the invoice is the one being created, whose issuer is the caller.
pub fn authorize(principal: &Principal, action: Action, invoice: &Invoice) -> Decision {
    let is_issuer = invoice.is_issued_by(principal);
    let allowed = match action {
        Action::IssueInvoice
        | Action::RequestFinancing
        | Action::ConfirmPayment
        | Action::RepayLoan => is_issuer,
        Action::ApproveFinancing => !is_issuer,
    };

    if allowed {
        Decision::Allow
    } else {
        Decision::Deny
    }
}
