use chrono::{DateTime, Utc};

use crate::domain::{
    Action, Cents, FinancingRequest, FinancingState, Invoice, InvoiceId, LedgerError, Principal,
    authorize,
};
use crate::storage::LedgerStore;

use super::RepaymentPolicy;

/// The financing lifecycle: request, approve, confirm payment, repay.
///
/// Every operation validates against a borrowed view of the store and only then
/// writes a single replacement record, so a rejected call leaves no trace.
pub struct FinancingService;

fn require(caller: &Principal, action: Action, invoice: &Invoice) -> Result<(), LedgerError> {
    if authorize(caller, action, invoice).is_allowed() {
        Ok(())
    } else {
        Err(LedgerError::Unauthorized {
            principal: caller.clone(),
            action,
            invoice_id: invoice.invoice_id.clone(),
        })
    }
}

impl FinancingService {
    /// Open a financing request against an invoice. Only the issuer may ask.
    pub fn request_financing(
        store: &mut LedgerStore,
        caller: &Principal,
        invoice_id: &InvoiceId,
        requested_amount: Cents,
        now: DateTime<Utc>,
    ) -> Result<FinancingRequest, LedgerError> {
        let invoice = store.get_invoice(invoice_id)?;
        require(caller, Action::RequestFinancing, invoice)?;

        if store.contains_financing_request(invoice_id) {
            return Err(LedgerError::AlreadyExists(invoice_id.clone()));
        }
        if requested_amount == 0 || requested_amount > invoice.amount {
            return Err(LedgerError::InvalidArgument(format!(
                "Requested amount {} must be between 1 and the invoice amount {}",
                requested_amount, invoice.amount
            )));
        }

        let request = FinancingRequest::new(invoice_id.clone(), requested_amount, now);
        store.insert_financing_request(request.clone())?;
        Ok(request)
    }

    /// Fund a pending request. The financier must not be the issuer.
    pub fn approve_financing(
        store: &mut LedgerStore,
        caller: &Principal,
        invoice_id: &InvoiceId,
        now: DateTime<Utc>,
    ) -> Result<FinancingRequest, LedgerError> {
        let request = store.get_financing_request(invoice_id)?;
        if request.state() != FinancingState::Requested {
            return Err(LedgerError::invalid_state(
                invoice_id,
                format!("financing is already {}", request.state()),
            ));
        }

        let invoice = store.get_invoice(invoice_id)?;
        require(caller, Action::ApproveFinancing, invoice)?;

        let approved = request.approve(caller.clone(), now);
        store.replace_financing_request(approved.clone())?;
        Ok(approved)
    }

    /// Record that the buyer has paid the underlying invoice.
    pub fn confirm_payment(
        store: &mut LedgerStore,
        caller: &Principal,
        invoice_id: &InvoiceId,
        now: DateTime<Utc>,
    ) -> Result<Invoice, LedgerError> {
        let invoice = store.get_invoice(invoice_id)?;
        require(caller, Action::ConfirmPayment, invoice)?;

        if invoice.paid {
            return Err(LedgerError::invalid_state(
                invoice_id,
                "payment already confirmed",
            ));
        }

        let paid = invoice.mark_paid(now);
        store.replace_invoice(paid.clone())?;
        Ok(paid)
    }

    /// Apply a repayment from the issuer to the financier.
    ///
    /// `transferred_value` is the amount the host confirms actually moved with
    /// this call; it must equal `repay_amount` exactly.
    pub fn repay_loan(
        store: &mut LedgerStore,
        policy: RepaymentPolicy,
        caller: &Principal,
        invoice_id: &InvoiceId,
        repay_amount: Cents,
        transferred_value: Cents,
        now: DateTime<Utc>,
    ) -> Result<FinancingRequest, LedgerError> {
        let request = store.get_financing_request(invoice_id)?;
        match request.state() {
            FinancingState::Requested => {
                return Err(LedgerError::invalid_state(
                    invoice_id,
                    "financing has not been approved",
                ));
            }
            FinancingState::Closed => {
                return Err(LedgerError::invalid_state(
                    invoice_id,
                    "financing is already repaid",
                ));
            }
            FinancingState::Approved | FinancingState::Repaying => {}
        }
        if request.outstanding_amount == 0 {
            return Err(LedgerError::invalid_state(invoice_id, "nothing outstanding"));
        }

        let invoice = store.get_invoice(invoice_id)?;
        require(caller, Action::RepayLoan, invoice)?;

        if policy == RepaymentPolicy::RequireConfirmedPayment && !invoice.paid {
            return Err(LedgerError::invalid_state(
                invoice_id,
                "invoice payment has not been confirmed",
            ));
        }

        if repay_amount == 0 || repay_amount > request.outstanding_amount {
            return Err(LedgerError::InvalidArgument(format!(
                "Repayment {} must be between 1 and the outstanding amount {}",
                repay_amount, request.outstanding_amount
            )));
        }
        if transferred_value != repay_amount {
            return Err(LedgerError::AmountMismatch {
                declared: repay_amount,
                transferred: transferred_value,
            });
        }

        let repaid = request.apply_repayment(repay_amount, now)?;
        store.replace_financing_request(repaid.clone())?;
        Ok(repaid)
    }

    pub fn get_financing_request(
        store: &LedgerStore,
        invoice_id: &InvoiceId,
    ) -> Result<FinancingRequest, LedgerError> {
        store.get_financing_request(invoice_id).cloned()
    }

    pub fn list_financing_requests(store: &LedgerStore) -> Vec<FinancingRequest> {
        store.list_financing_requests()
    }
}
