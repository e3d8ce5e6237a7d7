//! Postgres implementation of the storage ports.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{
    BatchStatus, BillingBatch, FeeAdjustment, ManufacturingBatch, Owner, PetFilter, PetRecord,
    PetUpdate, ShippingBatch, TagReplacement, TagStatus, UpdateOutcome,
};
use crate::ports::{
    BatchRepository, CounterRepository, LedgerRepository, PetRepository, RepositoryError,
    RepositoryResult,
};

/// Postgres-backed record store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterRepository for PostgresStore {
    async fn increment(&self, name: &str) -> RepositoryResult<i64> {
        // Single statement, so concurrent callers serialise on the row lock.
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (name, value) VALUES ($1, 1)
            ON CONFLICT (name) DO UPDATE SET value = counters.value + 1
            RETURNING value
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(value)
    }
}

#[async_trait]
impl PetRepository for PostgresStore {
    async fn insert(&self, pet: &PetRecord) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pets (
                identifier, name, breed, medical_info, instructions, photo_url,
                owner_name, owner_mobile, owner_email, owner_address,
                bank_account_number, branch_code, account_holder_name,
                scan_url, tag_status, payment_status, monthly_fee,
                manufacturing_batch_ref, shipping_tracking_ref, replacement_count, replaces,
                created_at, last_payment_at, delivered_at, last_adjustment_at, last_reminder_sent_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26
            )
            "#,
        )
        .bind(&pet.identifier)
        .bind(&pet.name)
        .bind(&pet.breed)
        .bind(&pet.medical_info)
        .bind(&pet.instructions)
        .bind(&pet.photo_url)
        .bind(&pet.owner.name)
        .bind(&pet.owner.mobile)
        .bind(&pet.owner.email)
        .bind(&pet.owner.address)
        .bind(&pet.owner.bank_account_number)
        .bind(&pet.owner.branch_code)
        .bind(&pet.owner.account_holder_name)
        .bind(&pet.scan_url)
        .bind(pet.tag_status.as_str())
        .bind(pet.payment_status.as_str())
        .bind(&pet.monthly_fee)
        .bind(&pet.manufacturing_batch_ref)
        .bind(&pet.shipping_tracking_ref)
        .bind(pet.replacement_count)
        .bind(&pet.replaces)
        .bind(pet.created_at)
        .bind(pet.last_payment_at)
        .bind(pet.delivered_at)
        .bind(pet.last_adjustment_at)
        .bind(pet.last_reminder_sent_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, identifier: &str) -> RepositoryResult<Option<PetRecord>> {
        let row = sqlx::query_as::<_, PetRow>("SELECT * FROM pets WHERE identifier = $1")
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;

        row.map(PetRow::into_domain).transpose()
    }

    async fn list(&self, filter: &PetFilter) -> RepositoryResult<Vec<PetRecord>> {
        let rows = sqlx::query_as::<_, PetRow>(
            r#"
            SELECT * FROM pets
            WHERE ($1::text IS NULL OR tag_status = $1)
              AND ($2::text IS NULL OR payment_status = $2)
              AND ($3::timestamptz IS NULL OR last_adjustment_at IS NULL OR last_adjustment_at < $3)
              AND (NOT $4 OR tag_status <> 'replaced')
            ORDER BY created_at, identifier
            "#,
        )
        .bind(filter.tag_status.map(|status| status.as_str()))
        .bind(filter.payment_status.map(|status| status.as_str()))
        .bind(filter.not_adjusted_since)
        .bind(filter.exclude_replaced)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PetRow::into_domain).collect()
    }

    async fn update_one(
        &self,
        identifier: &str,
        update: &PetUpdate,
    ) -> RepositoryResult<UpdateOutcome> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PetRow>(
            "SELECT * FROM pets WHERE identifier = $1 FOR UPDATE",
        )
        .bind(identifier)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(UpdateOutcome::Missing);
        };

        let mut pet = row.into_domain()?;
        let outcome = update.apply_to(&mut pet);

        if outcome == UpdateOutcome::Modified {
            sqlx::query(
                r#"
                UPDATE pets SET
                    photo_url = $2,
                    tag_status = $3,
                    payment_status = $4,
                    monthly_fee = $5,
                    manufacturing_batch_ref = $6,
                    shipping_tracking_ref = $7,
                    last_payment_at = $8,
                    delivered_at = $9,
                    last_adjustment_at = $10,
                    last_reminder_sent_at = $11
                WHERE identifier = $1
                "#,
            )
            .bind(&pet.identifier)
            .bind(&pet.photo_url)
            .bind(pet.tag_status.as_str())
            .bind(pet.payment_status.as_str())
            .bind(&pet.monthly_fee)
            .bind(&pet.manufacturing_batch_ref)
            .bind(&pet.shipping_tracking_ref)
            .bind(pet.last_payment_at)
            .bind(pet.delivered_at)
            .bind(pet.last_adjustment_at)
            .bind(pet.last_reminder_sent_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }
}

#[async_trait]
impl BatchRepository for PostgresStore {
    async fn insert_manufacturing_batch(&self, batch: &ManufacturingBatch) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO manufacturing_batches (batch_id, pet_ids, notes, status, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&batch.batch_id)
        .bind(&batch.pet_ids)
        .bind(&batch.notes)
        .bind(batch.status.as_str())
        .bind(batch.created_at)
        .bind(batch.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_manufacturing_batch(
        &self,
        batch_id: &str,
    ) -> RepositoryResult<Option<ManufacturingBatch>> {
        let row = sqlx::query_as::<_, ManufacturingBatchRow>(
            "SELECT * FROM manufacturing_batches WHERE batch_id = $1",
        )
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ManufacturingBatchRow::into_domain).transpose()
    }

    async fn list_manufacturing_batches(&self) -> RepositoryResult<Vec<ManufacturingBatch>> {
        let rows = sqlx::query_as::<_, ManufacturingBatchRow>(
            "SELECT * FROM manufacturing_batches ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ManufacturingBatchRow::into_domain).collect()
    }

    async fn update_manufacturing_batch(
        &self,
        batch_id: &str,
        status: BatchStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE manufacturing_batches
            SET status = $2, completed_at = COALESCE($3, completed_at)
            WHERE batch_id = $1
            "#,
        )
        .bind(batch_id)
        .bind(status.as_str())
        .bind(completed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_shipping_batch(&self, batch: &ShippingBatch) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO shipping_batches (shipping_id, pet_ids, courier, tracking_number, shipping_address, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&batch.shipping_id)
        .bind(&batch.pet_ids)
        .bind(&batch.courier)
        .bind(&batch.tracking_number)
        .bind(&batch.shipping_address)
        .bind(batch.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_shipping_batches(&self) -> RepositoryResult<Vec<ShippingBatch>> {
        let rows = sqlx::query_as::<_, ShippingBatchRow>(
            "SELECT * FROM shipping_batches ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ShippingBatchRow::into_domain).collect())
    }
}

#[async_trait]
impl LedgerRepository for PostgresStore {
    async fn insert_replacement(&self, replacement: &TagReplacement) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tag_replacements (
                replacement_id, original_identifier, new_identifier, reason, fee, status, origin, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&replacement.replacement_id)
        .bind(&replacement.original_identifier)
        .bind(&replacement.new_identifier)
        .bind(replacement.reason.as_str())
        .bind(&replacement.fee)
        .bind(replacement.status.as_str())
        .bind(replacement.origin.as_str())
        .bind(replacement.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_replacements(
        &self,
        identifier: Option<&str>,
    ) -> RepositoryResult<Vec<TagReplacement>> {
        let rows = sqlx::query_as::<_, ReplacementRow>(
            r#"
            SELECT * FROM tag_replacements
            WHERE $1::text IS NULL OR original_identifier = $1 OR new_identifier = $1
            ORDER BY created_at
            "#,
        )
        .bind(identifier)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReplacementRow::into_domain).collect()
    }

    async fn update_replacement_status(
        &self,
        replacement_id: &str,
        status: TagStatus,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query("UPDATE tag_replacements SET status = $2 WHERE replacement_id = $1")
            .bind(replacement_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_billing_batch(&self, batch: &BillingBatch) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO billing_batches (batch_id, filename, customer_count, total_amount, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&batch.batch_id)
        .bind(&batch.filename)
        .bind(batch.customer_count)
        .bind(&batch.total_amount)
        .bind(batch.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_billing_batches(&self) -> RepositoryResult<Vec<BillingBatch>> {
        let rows = sqlx::query_as::<_, (String, String, i64, BigDecimal, DateTime<Utc>)>(
            "SELECT batch_id, filename, customer_count, total_amount, created_at FROM billing_batches ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(batch_id, filename, customer_count, total_amount, created_at)| BillingBatch {
                batch_id,
                filename,
                customer_count,
                total_amount,
                created_at,
            })
            .collect())
    }

    async fn insert_fee_adjustment(&self, adjustment: &FeeAdjustment) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fee_adjustments (adjustment_id, percentage, affected_count, applied_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&adjustment.adjustment_id)
        .bind(&adjustment.percentage)
        .bind(adjustment.affected_count)
        .bind(adjustment.applied_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_fee_adjustments(&self) -> RepositoryResult<Vec<FeeAdjustment>> {
        let rows = sqlx::query_as::<_, (String, BigDecimal, i64, DateTime<Utc>)>(
            "SELECT adjustment_id, percentage, affected_count, applied_at FROM fee_adjustments ORDER BY applied_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(adjustment_id, percentage, affected_count, applied_at)| FeeAdjustment {
                adjustment_id,
                percentage,
                affected_count,
                applied_at,
            })
            .collect())
    }
}

fn decode<T: std::str::FromStr<Err = crate::domain::UnknownVariant>>(raw: &str) -> RepositoryResult<T> {
    raw.parse()
        .map_err(|e: crate::domain::UnknownVariant| RepositoryError::Decode(e.to_string()))
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct PetRow {
    identifier: String,
    name: String,
    breed: String,
    medical_info: String,
    instructions: String,
    photo_url: Option<String>,
    owner_name: String,
    owner_mobile: String,
    owner_email: String,
    owner_address: String,
    bank_account_number: String,
    branch_code: String,
    account_holder_name: String,
    scan_url: String,
    tag_status: String,
    payment_status: String,
    monthly_fee: BigDecimal,
    manufacturing_batch_ref: Option<String>,
    shipping_tracking_ref: Option<String>,
    replacement_count: i32,
    replaces: Option<String>,
    created_at: DateTime<Utc>,
    last_payment_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    last_adjustment_at: Option<DateTime<Utc>>,
    last_reminder_sent_at: Option<DateTime<Utc>>,
}

impl PetRow {
    fn into_domain(self) -> RepositoryResult<PetRecord> {
        Ok(PetRecord {
            tag_status: decode(&self.tag_status)?,
            payment_status: decode(&self.payment_status)?,
            identifier: self.identifier,
            name: self.name,
            breed: self.breed,
            medical_info: self.medical_info,
            instructions: self.instructions,
            photo_url: self.photo_url,
            owner: Owner {
                name: self.owner_name,
                mobile: self.owner_mobile,
                email: self.owner_email,
                address: self.owner_address,
                bank_account_number: self.bank_account_number,
                branch_code: self.branch_code,
                account_holder_name: self.account_holder_name,
            },
            scan_url: self.scan_url,
            monthly_fee: self.monthly_fee,
            manufacturing_batch_ref: self.manufacturing_batch_ref,
            shipping_tracking_ref: self.shipping_tracking_ref,
            replacement_count: self.replacement_count,
            replaces: self.replaces,
            created_at: self.created_at,
            last_payment_at: self.last_payment_at,
            delivered_at: self.delivered_at,
            last_adjustment_at: self.last_adjustment_at,
            last_reminder_sent_at: self.last_reminder_sent_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ManufacturingBatchRow {
    batch_id: String,
    pet_ids: Vec<String>,
    notes: String,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl ManufacturingBatchRow {
    fn into_domain(self) -> RepositoryResult<ManufacturingBatch> {
        Ok(ManufacturingBatch {
            status: decode(&self.status)?,
            batch_id: self.batch_id,
            pet_ids: self.pet_ids,
            notes: self.notes,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShippingBatchRow {
    shipping_id: String,
    pet_ids: Vec<String>,
    courier: String,
    tracking_number: String,
    shipping_address: String,
    created_at: DateTime<Utc>,
}

impl ShippingBatchRow {
    fn into_domain(self) -> ShippingBatch {
        ShippingBatch {
            shipping_id: self.shipping_id,
            pet_ids: self.pet_ids,
            courier: self.courier,
            tracking_number: self.tracking_number,
            shipping_address: self.shipping_address,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReplacementRow {
    replacement_id: String,
    original_identifier: String,
    new_identifier: String,
    reason: String,
    fee: BigDecimal,
    status: String,
    origin: String,
    created_at: DateTime<Utc>,
}

impl ReplacementRow {
    fn into_domain(self) -> RepositoryResult<TagReplacement> {
        Ok(TagReplacement {
            reason: decode(&self.reason)?,
            status: decode(&self.status)?,
            origin: decode(&self.origin)?,
            replacement_id: self.replacement_id,
            original_identifier: self.original_identifier,
            new_identifier: self.new_identifier,
            fee: self.fee,
            created_at: self.created_at,
        })
    }
}
