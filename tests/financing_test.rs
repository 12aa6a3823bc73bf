mod common;

use anyhow::Result;
use common::{FundedInvoice, bank, in_days, inv, seller, test_service, test_service_with};
use invoice_ledger::application::{LedgerConfig, RepaymentPolicy};
use invoice_ledger::domain::{FinancingState, LedgerError, Principal};

#[tokio::test]
async fn test_full_financing_lifecycle() -> Result<()> {
    let (mut service, _temp) = test_service().await?;

    let invoice = service
        .issue_invoice(&seller(), inv("INV1"), 1000, in_days(30))
        .await?;
    assert!(!invoice.paid);

    let request = service
        .request_financing(&seller(), &inv("INV1"), 600)
        .await?;
    assert_eq!(request.state(), FinancingState::Requested);

    let approved = service
        .approve_financing(&Principal::new("financierA"), &inv("INV1"))
        .await?;
    assert_eq!(approved.financed_amount, 600);
    assert_eq!(approved.outstanding_amount, 600);
    assert_eq!(approved.financier, Some(Principal::new("financierA")));

    let closed = service
        .repay_loan(&seller(), &inv("INV1"), 600, 600)
        .await?;
    assert_eq!(closed.outstanding_amount, 0);
    assert!(closed.paid);
    assert_eq!(closed.state(), FinancingState::Closed);

    Ok(())
}

#[tokio::test]
async fn test_over_repayment_rejected_without_mutation() -> Result<()> {
    let (mut service, _temp) = test_service().await?;
    FundedInvoice::create(&mut service, "INV1", 1000, 600).await?;

    let err = service
        .repay_loan(&seller(), &inv("INV1"), 700, 700)
        .await
        .unwrap_err();

    assert!(matches!(
        err.ledger_error(),
        Some(LedgerError::InvalidArgument(_))
    ));
    let request = service.get_financing_request(&inv("INV1"))?;
    assert_eq!(request.outstanding_amount, 600);
    assert!(!request.paid);

    Ok(())
}

#[tokio::test]
async fn test_outstanding_non_increasing_until_closed() -> Result<()> {
    let (mut service, _temp) = test_service().await?;
    FundedInvoice::create(&mut service, "INV1", 1000, 600).await?;

    let mut previous = 600;
    for amount in [100, 250, 1, 249] {
        let request = service
            .repay_loan(&seller(), &inv("INV1"), amount, amount)
            .await?;
        assert!(request.outstanding_amount <= previous);
        assert_eq!(request.outstanding_amount == 0, request.paid);
        assert!(request.financed_amount <= request.requested_amount);
        previous = request.outstanding_amount;
    }

    assert_eq!(previous, 0);
    assert!(service.get_financing_request(&inv("INV1"))?.paid);

    Ok(())
}

#[tokio::test]
async fn test_amount_mismatch_leaves_state() -> Result<()> {
    let (mut service, _temp) = test_service().await?;
    FundedInvoice::create(&mut service, "INV1", 1000, 600).await?;

    let err = service
        .repay_loan(&seller(), &inv("INV1"), 300, 200)
        .await
        .unwrap_err();

    assert_eq!(
        err.ledger_error(),
        Some(&LedgerError::AmountMismatch {
            declared: 300,
            transferred: 200
        })
    );
    assert_eq!(
        service
            .get_financing_request(&inv("INV1"))?
            .outstanding_amount,
        600
    );

    Ok(())
}

#[tokio::test]
async fn test_self_approval_unauthorized() -> Result<()> {
    let (mut service, _temp) = test_service().await?;
    service
        .issue_invoice(&seller(), inv("INV1"), 1000, in_days(30))
        .await?;
    service
        .request_financing(&seller(), &inv("INV1"), 500)
        .await?;

    let err = service
        .approve_financing(&seller(), &inv("INV1"))
        .await
        .unwrap_err();

    assert!(matches!(
        err.ledger_error(),
        Some(LedgerError::Unauthorized { .. })
    ));
    assert_eq!(
        service.get_financing_request(&inv("INV1"))?.state(),
        FinancingState::Requested
    );

    Ok(())
}

#[tokio::test]
async fn test_double_approval_invalid_state() -> Result<()> {
    let (mut service, _temp) = test_service().await?;
    FundedInvoice::create(&mut service, "INV1", 1000, 600).await?;

    let err = service
        .approve_financing(&bank(), &inv("INV1"))
        .await
        .unwrap_err();

    assert!(matches!(
        err.ledger_error(),
        Some(LedgerError::InvalidState { .. })
    ));

    Ok(())
}

#[tokio::test]
async fn test_duplicate_invoice_keeps_original() -> Result<()> {
    let (mut service, _temp) = test_service().await?;
    let original = service
        .issue_invoice(&seller(), inv("INV1"), 1000, in_days(30))
        .await?;

    let err = service
        .issue_invoice(&Principal::new("other"), inv("INV1"), 5, in_days(3))
        .await
        .unwrap_err();

    assert_eq!(
        err.ledger_error(),
        Some(&LedgerError::DuplicateKey(inv("INV1")))
    );
    assert_eq!(service.get_invoice(&inv("INV1"))?, original);

    Ok(())
}

#[tokio::test]
async fn test_confirm_payment_independent_of_financing() -> Result<()> {
    let (mut service, _temp) = test_service().await?;
    FundedInvoice::create(&mut service, "INV1", 1000, 600).await?;

    // Repayment before the buyer has paid is allowed by default
    service.repay_loan(&seller(), &inv("INV1"), 100, 100).await?;

    let invoice = service.confirm_payment(&seller(), &inv("INV1")).await?;
    assert!(invoice.paid);

    let request = service.repay_loan(&seller(), &inv("INV1"), 500, 500).await?;
    assert!(request.paid);

    Ok(())
}

#[tokio::test]
async fn test_strict_policy_blocks_early_repayment() -> Result<()> {
    let config =
        LedgerConfig::default().with_repayment_policy(RepaymentPolicy::RequireConfirmedPayment);
    let (mut service, _temp) = test_service_with(config).await?;
    FundedInvoice::create(&mut service, "INV1", 1000, 600).await?;

    let err = service
        .repay_loan(&seller(), &inv("INV1"), 600, 600)
        .await
        .unwrap_err();
    assert!(matches!(
        err.ledger_error(),
        Some(LedgerError::InvalidState { .. })
    ));

    service.confirm_payment(&seller(), &inv("INV1")).await?;
    let request = service.repay_loan(&seller(), &inv("INV1"), 600, 600).await?;
    assert!(request.paid);

    Ok(())
}

#[tokio::test]
async fn test_integrity_holds_after_mixed_operations() -> Result<()> {
    let (mut service, _temp) = test_service().await?;
    FundedInvoice::create(&mut service, "INV1", 1000, 600).await?;
    FundedInvoice::create(&mut service, "INV2", 400, 400).await?;
    service
        .issue_invoice(&seller(), inv("INV3"), 250, in_days(10))
        .await?;
    service
        .request_financing(&seller(), &inv("INV3"), 100)
        .await?;
    service.repay_loan(&seller(), &inv("INV2"), 400, 400).await?;
    service.repay_loan(&seller(), &inv("INV1"), 50, 50).await?;
    let err = service
        .repay_loan(&seller(), &inv("INV1"), 9999, 9999)
        .await
        .unwrap_err();
    assert!(matches!(
        err.ledger_error(),
        Some(LedgerError::InvalidArgument(_))
    ));

    let report = service.check_integrity();
    assert!(report.is_ok(), "{:?}", report.violations);
    assert_eq!(report.invoice_count, 3);
    assert_eq!(report.request_count, 3);
    assert_eq!(report.closed_requests, 1);
    assert_eq!(report.total_financed, Some(1000));
    assert_eq!(report.total_outstanding, Some(550));

    let stored = service.check_stored_integrity().await?;
    assert!(stored.is_ok());
    assert_eq!(stored.total_outstanding, Some(550));

    Ok(())
}
