mod common;

use anyhow::Result;
use common::{FundedInvoice, in_days, inv, raw_pool, reopen, seller, test_service};
use invoice_ledger::application::AppError;
use invoice_ledger::domain::{FinancingState, LedgerError};

#[tokio::test]
async fn test_records_survive_reopen() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    FundedInvoice::create(&mut service, "INV1", 1000, 600).await?;
    service.repay_loan(&seller(), &inv("INV1"), 250, 250).await?;
    service.confirm_payment(&seller(), &inv("INV1")).await?;

    let expected_invoices = service.list_invoices();
    let expected_requests = service.list_financing_requests();
    drop(service);

    let reopened = reopen(&temp).await?;
    assert_eq!(reopened.list_invoices(), expected_invoices);
    assert_eq!(reopened.list_financing_requests(), expected_requests);

    let request = reopened.get_financing_request(&inv("INV1"))?;
    assert_eq!(request.state(), FinancingState::Repaying);
    assert_eq!(request.outstanding_amount, 350);
    assert!(reopened.get_invoice(&inv("INV1"))?.paid);

    Ok(())
}

#[tokio::test]
async fn test_insertion_order_survives_reopen() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    for id in ["ZETA", "ALPHA", "MID"] {
        service
            .issue_invoice(&seller(), inv(id), 100, in_days(5))
            .await?;
    }
    // Updating a record must not move it
    service.confirm_payment(&seller(), &inv("ZETA")).await?;
    drop(service);

    let reopened = reopen(&temp).await?;
    let ids: Vec<String> = reopened
        .list_invoices()
        .iter()
        .map(|i| i.invoice_id.to_string())
        .collect();
    assert_eq!(ids, vec!["ZETA", "ALPHA", "MID"]);

    Ok(())
}

#[tokio::test]
async fn test_rejected_calls_are_not_persisted() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    FundedInvoice::create(&mut service, "INV1", 1000, 600).await?;
    let err = service
        .repay_loan(&seller(), &inv("INV1"), 600, 599)
        .await
        .unwrap_err();
    assert!(matches!(
        err.ledger_error(),
        Some(LedgerError::AmountMismatch { .. })
    ));
    let err = service
        .issue_invoice(&seller(), inv("INV1"), 1, in_days(1))
        .await
        .unwrap_err();
    assert_eq!(
        err.ledger_error(),
        Some(&LedgerError::DuplicateKey(inv("INV1")))
    );
    drop(service);

    let reopened = reopen(&temp).await?;
    assert_eq!(reopened.list_invoices().len(), 1);
    assert_eq!(reopened.get_invoice(&inv("INV1"))?.amount, 1000);
    assert_eq!(
        reopened
            .get_financing_request(&inv("INV1"))?
            .outstanding_amount,
        600
    );

    Ok(())
}

#[tokio::test]
async fn test_ledger_time_persisted() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    service
        .issue_invoice(&seller(), inv("INV1"), 100, in_days(5))
        .await?;
    let ledger_time = service.facade().ledger_time();
    drop(service);

    let reopened = reopen(&temp).await?;
    assert_eq!(reopened.facade().ledger_time(), ledger_time);

    Ok(())
}

#[tokio::test]
async fn test_unstorable_amount_rejected() -> Result<()> {
    let (mut service, temp) = test_service().await?;

    let err = service
        .issue_invoice(&seller(), inv("BIG"), u64::MAX, in_days(5))
        .await
        .unwrap_err();

    assert!(matches!(
        err.ledger_error(),
        Some(LedgerError::InvalidArgument(_))
    ));
    assert!(service.list_invoices().is_empty());
    drop(service);

    let reopened = reopen(&temp).await?;
    assert!(reopened.list_invoices().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_failed_write_restores_stored_state() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    service
        .issue_invoice(&seller(), inv("INV1"), 100, in_days(5))
        .await?;
    let ledger_time = service.facade().ledger_time();

    let pool = raw_pool(&temp).await?;
    sqlx::query(
        "CREATE TRIGGER freeze_payments BEFORE UPDATE ON invoices WHEN NEW.paid = 1 \
         BEGIN SELECT RAISE(ABORT, 'payments frozen'); END",
    )
    .execute(&pool)
    .await?;

    let err = service
        .confirm_payment(&seller(), &inv("INV1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(_)));

    // Memory is back to what the database holds
    assert!(!service.get_invoice(&inv("INV1"))?.paid);
    assert_eq!(service.facade().ledger_time(), ledger_time);
    assert!(!service.is_poisoned());

    // Unaffected writes still go through
    service
        .issue_invoice(&seller(), inv("INV2"), 200, in_days(5))
        .await?;
    assert_eq!(service.list_invoices().len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_failed_reload_poisons_service() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    service
        .issue_invoice(&seller(), inv("INV1"), 100, in_days(5))
        .await?;

    let pool = raw_pool(&temp).await?;
    sqlx::query("DROP TABLE ledger_meta").execute(&pool).await?;

    let err = service
        .issue_invoice(&seller(), inv("INV2"), 200, in_days(5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(_)));
    assert!(service.is_poisoned());

    let err = service
        .confirm_payment(&seller(), &inv("INV1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Poisoned));
    assert_eq!(err.ledger_error(), None);

    Ok(())
}
