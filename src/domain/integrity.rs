use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{Cents, FinancingRequest, Invoice, InvoiceId, checked_add};

/// A broken cross-record invariant found while checking a ledger snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    DuplicateInvoice {
        invoice_id: InvoiceId,
    },
    DuplicateRequest {
        invoice_id: InvoiceId,
    },
    NonPositiveInvoiceAmount {
        invoice_id: InvoiceId,
    },
    DueDateNotAfterIssuance {
        invoice_id: InvoiceId,
    },
    OrphanRequest {
        invoice_id: InvoiceId,
    },
    RequestedExceedsInvoice {
        invoice_id: InvoiceId,
        requested: Cents,
        invoice_amount: Cents,
    },
    FinancedExceedsRequested {
        invoice_id: InvoiceId,
        financed: Cents,
        requested: Cents,
    },
    OutstandingExceedsFinanced {
        invoice_id: InvoiceId,
        outstanding: Cents,
        financed: Cents,
    },
    /// Unapproved request carrying money, or approved request without funding
    FundingStateMismatch {
        invoice_id: InvoiceId,
    },
    /// `paid` disagrees with the outstanding amount reaching zero
    PaidFlagMismatch {
        invoice_id: InvoiceId,
        outstanding: Cents,
        paid: bool,
    },
    /// A ledger-wide total does not fit in `Cents`
    TotalOverflow {
        total: LedgerTotal,
    },
}

/// Ledger-wide sums carried by an [`IntegrityReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerTotal {
    Financed,
    Outstanding,
}

impl LedgerTotal {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerTotal::Financed => "financed",
            LedgerTotal::Outstanding => "outstanding",
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::DuplicateInvoice { invoice_id } => {
                write!(f, "invoice {} appears more than once", invoice_id)
            }
            Violation::DuplicateRequest { invoice_id } => {
                write!(f, "invoice {} has more than one financing request", invoice_id)
            }
            Violation::NonPositiveInvoiceAmount { invoice_id } => {
                write!(f, "invoice {} has a zero amount", invoice_id)
            }
            Violation::DueDateNotAfterIssuance { invoice_id } => {
                write!(f, "invoice {} is due before it was issued", invoice_id)
            }
            Violation::OrphanRequest { invoice_id } => {
                write!(f, "financing request references missing invoice {}", invoice_id)
            }
            Violation::RequestedExceedsInvoice {
                invoice_id,
                requested,
                invoice_amount,
            } => write!(
                f,
                "invoice {}: requested {} exceeds invoice amount {}",
                invoice_id, requested, invoice_amount
            ),
            Violation::FinancedExceedsRequested {
                invoice_id,
                financed,
                requested,
            } => write!(
                f,
                "invoice {}: financed {} exceeds requested {}",
                invoice_id, financed, requested
            ),
            Violation::OutstandingExceedsFinanced {
                invoice_id,
                outstanding,
                financed,
            } => write!(
                f,
                "invoice {}: outstanding {} exceeds financed {}",
                invoice_id, outstanding, financed
            ),
            Violation::FundingStateMismatch { invoice_id } => write!(
                f,
                "invoice {}: funding amounts disagree with approval state",
                invoice_id
            ),
            Violation::PaidFlagMismatch {
                invoice_id,
                outstanding,
                paid,
            } => write!(
                f,
                "invoice {}: paid={} with {} outstanding",
                invoice_id, paid, outstanding
            ),
            Violation::TotalOverflow { total } => {
                write!(f, "total {} amount overflows", total.as_str())
            }
        }
    }
}

/// Summary of a ledger integrity check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub invoice_count: usize,
    pub request_count: usize,
    pub paid_invoices: usize,
    pub open_requests: usize,
    pub closed_requests: usize,
    /// `None` when the sum overflows
    pub total_financed: Option<Cents>,
    pub total_outstanding: Option<Cents>,
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Check every cross-record invariant over a snapshot of the ledger.
pub fn check_integrity(invoices: &[Invoice], requests: &[FinancingRequest]) -> IntegrityReport {
    let mut violations = Vec::new();
    let mut by_id: HashMap<&InvoiceId, &Invoice> = HashMap::new();

    for invoice in invoices {
        if by_id.insert(&invoice.invoice_id, invoice).is_some() {
            violations.push(Violation::DuplicateInvoice {
                invoice_id: invoice.invoice_id.clone(),
            });
        }
        if invoice.amount == 0 {
            violations.push(Violation::NonPositiveInvoiceAmount {
                invoice_id: invoice.invoice_id.clone(),
            });
        }
        if invoice.due_date <= invoice.issued_at {
            violations.push(Violation::DueDateNotAfterIssuance {
                invoice_id: invoice.invoice_id.clone(),
            });
        }
    }

    let mut seen_requests = HashSet::new();
    let mut total_financed = Some(0);
    let mut total_outstanding = Some(0);
    let mut open_requests = 0;
    let mut closed_requests = 0;

    for request in requests {
        let invoice_id = &request.invoice_id;
        if !seen_requests.insert(invoice_id) {
            violations.push(Violation::DuplicateRequest {
                invoice_id: invoice_id.clone(),
            });
        }

        match by_id.get(invoice_id) {
            Some(invoice) if request.requested_amount > invoice.amount => {
                violations.push(Violation::RequestedExceedsInvoice {
                    invoice_id: invoice_id.clone(),
                    requested: request.requested_amount,
                    invoice_amount: invoice.amount,
                });
            }
            Some(_) => {}
            None => violations.push(Violation::OrphanRequest {
                invoice_id: invoice_id.clone(),
            }),
        }

        if request.financed_amount > request.requested_amount {
            violations.push(Violation::FinancedExceedsRequested {
                invoice_id: invoice_id.clone(),
                financed: request.financed_amount,
                requested: request.requested_amount,
            });
        }
        if request.outstanding_amount > request.financed_amount {
            violations.push(Violation::OutstandingExceedsFinanced {
                invoice_id: invoice_id.clone(),
                outstanding: request.outstanding_amount,
                financed: request.financed_amount,
            });
        }

        let funded = request.financed_amount > 0;
        if request.is_approved() != funded {
            violations.push(Violation::FundingStateMismatch {
                invoice_id: invoice_id.clone(),
            });
        }

        let settled = request.is_approved() && request.outstanding_amount == 0;
        if request.paid != settled {
            violations.push(Violation::PaidFlagMismatch {
                invoice_id: invoice_id.clone(),
                outstanding: request.outstanding_amount,
                paid: request.paid,
            });
        }

        if request.paid {
            closed_requests += 1;
        } else {
            open_requests += 1;
        }
        total_financed = total_financed.and_then(|t| checked_add(t, request.financed_amount).ok());
        total_outstanding =
            total_outstanding.and_then(|t| checked_add(t, request.outstanding_amount).ok());
    }

    if total_financed.is_none() {
        violations.push(Violation::TotalOverflow {
            total: LedgerTotal::Financed,
        });
    }
    if total_outstanding.is_none() {
        violations.push(Violation::TotalOverflow {
            total: LedgerTotal::Outstanding,
        });
    }

    IntegrityReport {
        invoice_count: invoices.len(),
        request_count: requests.len(),
        paid_invoices: invoices.iter().filter(|i| i.paid).count(),
        open_requests,
        closed_requests,
        total_financed,
        total_outstanding,
        violations,
    }
}
