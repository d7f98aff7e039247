//! Postgres invoice store for invoicing-service.

use crate::error::InvoicingError;
use crate::models::{Invoice, InvoiceItem, InvoiceStatus, PaymentInfo, StatusSummary};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::sequencer::format_invoice_number;
use crate::services::store::InvoiceStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = r#"
    invoice_id, user_id, customer_id, invoice_number, status, issue_date, due_date,
    currency, discount_bp, subtotal, discount_amount, total,
    account_name, account_number, bank_name, routing_number, note, created_at, updated_at
"#;

#[derive(Debug, FromRow)]
struct InvoiceRow {
    invoice_id: Uuid,
    user_id: Uuid,
    customer_id: Uuid,
    invoice_number: String,
    status: String,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    currency: String,
    discount_bp: i64,
    subtotal: i64,
    discount_amount: i64,
    total: i64,
    account_name: String,
    account_number: String,
    bank_name: String,
    routing_number: String,
    note: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InvoiceRow {
    fn into_invoice(self, items: Vec<InvoiceItem>) -> Invoice {
        Invoice {
            invoice_id: self.invoice_id,
            user_id: self.user_id,
            customer_id: self.customer_id,
            invoice_number: self.invoice_number,
            status: InvoiceStatus::from_string(&self.status),
            issue_date: self.issue_date,
            due_date: self.due_date,
            currency: self.currency,
            items,
            discount_bp: self.discount_bp,
            subtotal: self.subtotal,
            discount_amount: self.discount_amount,
            total: self.total,
            payment_info: PaymentInfo {
                account_name: self.account_name,
                account_number: self.account_number,
                bank_name: self.bank_name,
                routing_number: self.routing_number,
            },
            note: self.note,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    invoice_id: Uuid,
    description: String,
    quantity: i64,
    unit_price: i64,
}

/// Invoice store backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgInvoiceStore {
    pool: PgPool,
}

impl PgInvoiceStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, InvoicingError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| InvoicingError::persistence("Failed to connect", e))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), InvoicingError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| InvoicingError::persistence("Migration failed", e))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn next_sequence_value(
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<i64, InvoicingError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE invoice_number_sequence
            SET current_value = current_value + 1
            WHERE id = 1
            RETURNING current_value
            "#,
        )
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            InvoicingError::SequencerFailure(anyhow::anyhow!(
                "Failed to increment invoice number sequence: {}",
                e
            ))
        })
    }

    async fn insert_items(
        tx: &mut Transaction<'_, Postgres>,
        invoice_id: Uuid,
        items: &[InvoiceItem],
    ) -> Result<(), InvoicingError> {
        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (invoice_id, position, description, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(invoice_id)
            .bind(position as i32)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut **tx)
            .await
            .map_err(|e| InvoicingError::persistence("Failed to insert invoice item", e))?;
        }
        Ok(())
    }

    async fn load_items(
        &self,
        invoice_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<InvoiceItem>>, InvoicingError> {
        if invoice_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT invoice_id, description, quantity, unit_price
            FROM invoice_items
            WHERE invoice_id = ANY($1)
            ORDER BY invoice_id, position
            "#,
        )
        .bind(invoice_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| InvoicingError::persistence("Failed to load invoice items", e))?;

        let mut items: HashMap<Uuid, Vec<InvoiceItem>> = HashMap::new();
        for row in rows {
            items.entry(row.invoice_id).or_default().push(InvoiceItem {
                description: row.description,
                quantity: row.quantity,
                unit_price: row.unit_price,
            });
        }
        Ok(items)
    }

    async fn attach_items(&self, rows: Vec<InvoiceRow>) -> Result<Vec<Invoice>, InvoicingError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.invoice_id).collect();
        let mut items = self.load_items(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let row_items = items.remove(&row.invoice_id).unwrap_or_default();
                row.into_invoice(row_items)
            })
            .collect())
    }
}

#[async_trait]
impl InvoiceStore for PgInvoiceStore {
    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.invoice_id, user_id = %invoice.user_id))]
    async fn create(&self, mut invoice: Invoice) -> Result<Invoice, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| InvoicingError::persistence("Failed to begin transaction", e))?;

        let value = Self::next_sequence_value(&mut tx).await?;
        invoice.invoice_number = format_invoice_number(value);

        sqlx::query(
            r#"
            INSERT INTO invoices (
                invoice_id, user_id, customer_id, invoice_number, status, issue_date, due_date,
                currency, discount_bp, subtotal, discount_amount, total,
                account_name, account_number, bank_name, routing_number, note, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(invoice.invoice_id)
        .bind(invoice.user_id)
        .bind(invoice.customer_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.status.as_str())
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(&invoice.currency)
        .bind(invoice.discount_bp)
        .bind(invoice.subtotal)
        .bind(invoice.discount_amount)
        .bind(invoice.total)
        .bind(&invoice.payment_info.account_name)
        .bind(&invoice.payment_info.account_number)
        .bind(&invoice.payment_info.bank_name)
        .bind(&invoice.payment_info.routing_number)
        .bind(&invoice.note)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| InvoicingError::persistence("Failed to create invoice", e))?;

        Self::insert_items(&mut tx, invoice.invoice_id, &invoice.items).await?;

        tx.commit()
            .await
            .map_err(|e| InvoicingError::persistence("Failed to commit invoice", e))?;

        timer.observe_duration();

        info!(invoice_number = %invoice.invoice_number, "Invoice created");

        Ok(invoice)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn get_by_id(&self, invoice_id: Uuid) -> Result<Option<Invoice>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE invoice_id = $1",
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| InvoicingError::persistence("Failed to get invoice", e))?;

        let invoice = match row {
            Some(row) => self.attach_items(vec![row]).await?.pop(),
            None => None,
        };

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.invoice_id))]
    async fn update(&self, invoice: Invoice) -> Result<Invoice, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| InvoicingError::persistence("Failed to begin transaction", e))?;

        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            UPDATE invoices
            SET customer_id = $2, status = $3, issue_date = $4, due_date = $5, currency = $6,
                discount_bp = $7, subtotal = $8, discount_amount = $9, total = $10,
                account_name = $11, account_number = $12, bank_name = $13, routing_number = $14,
                note = $15, updated_at = $16
            WHERE invoice_id = $1
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(invoice.invoice_id)
        .bind(invoice.customer_id)
        .bind(invoice.status.as_str())
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(&invoice.currency)
        .bind(invoice.discount_bp)
        .bind(invoice.subtotal)
        .bind(invoice.discount_amount)
        .bind(invoice.total)
        .bind(&invoice.payment_info.account_name)
        .bind(&invoice.payment_info.account_number)
        .bind(&invoice.payment_info.bank_name)
        .bind(&invoice.payment_info.routing_number)
        .bind(&invoice.note)
        .bind(invoice.updated_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| InvoicingError::persistence("Failed to update invoice", e))?
        .ok_or_else(|| InvoicingError::NotFound(format!("Invoice {}", invoice.invoice_id)))?;

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice.invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| InvoicingError::persistence("Failed to clear invoice items", e))?;

        Self::insert_items(&mut tx, invoice.invoice_id, &invoice.items).await?;

        tx.commit()
            .await
            .map_err(|e| InvoicingError::persistence("Failed to commit invoice update", e))?;

        timer.observe_duration();

        Ok(row.into_invoice(invoice.items))
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<Invoice>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE user_id = $1
            ORDER BY issue_date DESC, length(invoice_number) DESC, invoice_number DESC
            LIMIT $2 OFFSET $3
            "#,
            INVOICE_COLUMNS
        ))
        .bind(user_id)
        .bind(i64::from(limit))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| InvoicingError::persistence("Failed to list invoices", e))?;

        let invoices = self.attach_items(rows).await?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self))]
    async fn list_due_within(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Invoice>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_due_invoices"])
            .start_timer();

        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE due_date BETWEEN $1 AND $2
              AND status NOT IN ('paid', 'cancelled')
            ORDER BY due_date, invoice_id
            "#,
            INVOICE_COLUMNS
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| InvoicingError::persistence("Failed to scan due invoices", e))?;

        let invoices = self.attach_items(rows).await?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self))]
    async fn increment_sequence(&self) -> Result<i64, InvoicingError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            InvoicingError::SequencerFailure(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;
        let value = Self::next_sequence_value(&mut tx).await?;
        tx.commit().await.map_err(|e| {
            InvoicingError::SequencerFailure(anyhow::anyhow!("Failed to commit sequence: {}", e))
        })?;
        Ok(value)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn stats_for_user(&self, user_id: Uuid) -> Result<Vec<StatusSummary>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoice_stats"])
            .start_timer();

        let rows = sqlx::query_as::<_, (String, i64, i64)>(
            r#"
            SELECT status, COUNT(*) AS count, COALESCE(SUM(total), 0)::BIGINT AS total_amount
            FROM invoices
            WHERE user_id = $1
            GROUP BY status
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| InvoicingError::persistence("Failed to compute invoice stats", e))?;

        timer.observe_duration();

        Ok(rows
            .into_iter()
            .map(|(status, count, total_amount)| StatusSummary {
                status: InvoiceStatus::from_string(&status),
                count,
                total_amount,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), InvoicingError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| InvoicingError::persistence("Health check failed", e))?;
        Ok(())
    }
}
