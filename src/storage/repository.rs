use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::domain::{Cents, FinancingRequest, Invoice, InvoiceId, Principal};

use super::{LedgerStore, MIGRATION_001_INITIAL};

const LEDGER_TIME_KEY: &str = "ledger_time";

/// Largest amount an INTEGER column can hold.
pub const MAX_STORED_AMOUNT: Cents = i64::MAX as Cents;

/// Repository persisting invoices, financing requests and the ledger time mark.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Loading
    // ========================

    /// Rebuild the in-memory store from the database, in insertion order.
    pub async fn load_store(&self) -> Result<LedgerStore> {
        let mut store = LedgerStore::new();

        for invoice in self.list_invoices().await? {
            store
                .insert_invoice(invoice)
                .context("Stored invoices are inconsistent")?;
        }
        for request in self.list_financing_requests().await? {
            store
                .insert_financing_request(request)
                .context("Stored financing requests are inconsistent")?;
        }

        Ok(store)
    }

    pub async fn get_ledger_time(&self) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT value FROM ledger_meta WHERE name = ?")
            .bind(LEDGER_TIME_KEY)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch ledger time")?;

        row.map(|row| parse_timestamp(&row.get::<String, _>("value")))
            .transpose()
            .context("Invalid ledger time")
    }

    // ========================
    // Writing
    // ========================

    /// Write an invoice and the ledger time in one transaction.
    pub async fn persist_invoice(&self, invoice: &Invoice, ledger_time: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        Self::upsert_invoice(&mut tx, invoice).await?;
        Self::upsert_ledger_time(&mut tx, ledger_time).await?;
        tx.commit().await.context("Failed to commit invoice")?;
        Ok(())
    }

    /// Write a financing request and the ledger time in one transaction.
    pub async fn persist_financing_request(
        &self,
        request: &FinancingRequest,
        ledger_time: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        Self::upsert_financing_request(&mut tx, request).await?;
        Self::upsert_ledger_time(&mut tx, ledger_time).await?;
        tx.commit()
            .await
            .context("Failed to commit financing request")?;
        Ok(())
    }

    async fn upsert_invoice(conn: &mut SqliteConnection, invoice: &Invoice) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO invoices (invoice_id, issuer, amount, due_date, paid, issued_at, paid_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(invoice_id) DO UPDATE SET
                issuer = excluded.issuer,
                amount = excluded.amount,
                due_date = excluded.due_date,
                paid = excluded.paid,
                issued_at = excluded.issued_at,
                paid_at = excluded.paid_at
            "#,
        )
        .bind(invoice.invoice_id.as_str())
        .bind(invoice.issuer.as_str())
        .bind(to_db_amount(invoice.amount)?)
        .bind(invoice.due_date.to_rfc3339())
        .bind(invoice.paid)
        .bind(invoice.issued_at.to_rfc3339())
        .bind(invoice.paid_at.map(|dt| dt.to_rfc3339()))
        .execute(&mut *conn)
        .await
        .context("Failed to save invoice")?;
        Ok(())
    }

    async fn upsert_financing_request(
        conn: &mut SqliteConnection,
        request: &FinancingRequest,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO financing_requests (invoice_id, financier, requested_amount, financed_amount, outstanding_amount, paid, requested_at, approved_at, closed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(invoice_id) DO UPDATE SET
                financier = excluded.financier,
                requested_amount = excluded.requested_amount,
                financed_amount = excluded.financed_amount,
                outstanding_amount = excluded.outstanding_amount,
                paid = excluded.paid,
                requested_at = excluded.requested_at,
                approved_at = excluded.approved_at,
                closed_at = excluded.closed_at
            "#,
        )
        .bind(request.invoice_id.as_str())
        .bind(request.financier.as_ref().map(|p| p.as_str().to_string()))
        .bind(to_db_amount(request.requested_amount)?)
        .bind(to_db_amount(request.financed_amount)?)
        .bind(to_db_amount(request.outstanding_amount)?)
        .bind(request.paid)
        .bind(request.requested_at.to_rfc3339())
        .bind(request.approved_at.map(|dt| dt.to_rfc3339()))
        .bind(request.closed_at.map(|dt| dt.to_rfc3339()))
        .execute(&mut *conn)
        .await
        .context("Failed to save financing request")?;
        Ok(())
    }

    async fn upsert_ledger_time(conn: &mut SqliteConnection, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_meta (name, value) VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(LEDGER_TIME_KEY)
        .bind(at.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to save ledger time")?;
        Ok(())
    }

    // ========================
    // Queries
    // ========================

    /// List all invoices in insertion order.
    pub async fn list_invoices(&self) -> Result<Vec<Invoice>> {
        let rows = sqlx::query(
            r#"
            SELECT invoice_id, issuer, amount, due_date, paid, issued_at, paid_at
            FROM invoices
            ORDER BY seq
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list invoices")?;

        rows.iter().map(Self::row_to_invoice).collect()
    }

    /// List all financing requests in insertion order.
    pub async fn list_financing_requests(&self) -> Result<Vec<FinancingRequest>> {
        let rows = sqlx::query(
            r#"
            SELECT invoice_id, financier, requested_amount, financed_amount, outstanding_amount, paid, requested_at, approved_at, closed_at
            FROM financing_requests
            ORDER BY seq
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list financing requests")?;

        rows.iter().map(Self::row_to_financing_request).collect()
    }

    fn row_to_invoice(row: &sqlx::sqlite::SqliteRow) -> Result<Invoice> {
        let due_date_str: String = row.get("due_date");
        let issued_at_str: String = row.get("issued_at");
        let paid_at_str: Option<String> = row.get("paid_at");

        Ok(Invoice {
            invoice_id: InvoiceId::new(row.get::<String, _>("invoice_id")),
            issuer: Principal::new(row.get::<String, _>("issuer")),
            amount: from_db_amount(row.get("amount"))?,
            due_date: parse_timestamp(&due_date_str).context("Invalid due_date timestamp")?,
            paid: row.get::<i32, _>("paid") != 0,
            issued_at: parse_timestamp(&issued_at_str).context("Invalid issued_at timestamp")?,
            paid_at: paid_at_str
                .map(|s| parse_timestamp(&s))
                .transpose()
                .context("Invalid paid_at timestamp")?,
        })
    }

    fn row_to_financing_request(row: &sqlx::sqlite::SqliteRow) -> Result<FinancingRequest> {
        let requested_at_str: String = row.get("requested_at");
        let approved_at_str: Option<String> = row.get("approved_at");
        let closed_at_str: Option<String> = row.get("closed_at");
        let financier: Option<String> = row.get("financier");

        Ok(FinancingRequest {
            invoice_id: InvoiceId::new(row.get::<String, _>("invoice_id")),
            financier: financier.map(Principal::new),
            requested_amount: from_db_amount(row.get("requested_amount"))?,
            financed_amount: from_db_amount(row.get("financed_amount"))?,
            outstanding_amount: from_db_amount(row.get("outstanding_amount"))?,
            paid: row.get::<i32, _>("paid") != 0,
            requested_at: parse_timestamp(&requested_at_str)
                .context("Invalid requested_at timestamp")?,
            approved_at: approved_at_str
                .map(|s| parse_timestamp(&s))
                .transpose()
                .context("Invalid approved_at timestamp")?,
            closed_at: closed_at_str
                .map(|s| parse_timestamp(&s))
                .transpose()
                .context("Invalid closed_at timestamp")?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

// SQLite integers are signed; amounts above i64::MAX cannot be stored.
fn to_db_amount(amount: Cents) -> Result<i64> {
    i64::try_from(amount).with_context(|| format!("Amount {} exceeds storage range", amount))
}

fn from_db_amount(value: i64) -> Result<Cents> {
    Cents::try_from(value).with_context(|| format!("Negative amount {} in database", value))
}
