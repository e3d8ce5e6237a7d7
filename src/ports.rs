//! Storage ports. Services depend on these traits; `adapters` provides the
//! Postgres, in-memory and filesystem implementations.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    BatchStatus, BillingBatch, FeeAdjustment, ManufacturingBatch, PetFilter, PetRecord,
    PetUpdate, ShippingBatch, TagReplacement, TagStatus, UpdateOutcome,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate record: {0}")]
    Conflict(String),

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("stored value could not be decoded: {0}")]
    Decode(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                RepositoryError::Decode(err.to_string())
            }
            _ => RepositoryError::Unavailable(err.to_string()),
        }
    }
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => RepositoryError::NotFound(err.to_string()),
            _ => RepositoryError::Unavailable(err.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Named durable counters.
#[async_trait]
pub trait CounterRepository: Send + Sync {
    /// Atomically increments the named counter (creating it at 0 first if needed)
    /// and returns the new value.
    async fn increment(&self, name: &str) -> RepositoryResult<i64>;
}

#[async_trait]
pub trait PetRepository: Send + Sync {
    /// Fails with `Conflict` if the identifier is already taken.
    async fn insert(&self, pet: &PetRecord) -> RepositoryResult<()>;

    async fn find(&self, identifier: &str) -> RepositoryResult<Option<PetRecord>>;

    async fn list(&self, filter: &PetFilter) -> RepositoryResult<Vec<PetRecord>>;

    async fn update_one(&self, identifier: &str, update: &PetUpdate)
        -> RepositoryResult<UpdateOutcome>;

    /// Applies the same update to each identifier in turn and returns how many
    /// records were modified. Not atomic across the set.
    async fn update_many(&self, identifiers: &[String], update: &PetUpdate) -> RepositoryResult<u64> {
        let mut modified = 0;
        for identifier in identifiers {
            if self.update_one(identifier, update).await? == UpdateOutcome::Modified {
                modified += 1;
            }
        }
        Ok(modified)
    }
}

#[async_trait]
pub trait BatchRepository: Send + Sync {
    async fn insert_manufacturing_batch(&self, batch: &ManufacturingBatch) -> RepositoryResult<()>;

    async fn find_manufacturing_batch(&self, batch_id: &str)
        -> RepositoryResult<Option<ManufacturingBatch>>;

    async fn list_manufacturing_batches(&self) -> RepositoryResult<Vec<ManufacturingBatch>>;

    /// Sets the batch status, and the completion time when given. Returns false if
    /// the batch does not exist.
    async fn update_manufacturing_batch(
        &self,
        batch_id: &str,
        status: BatchStatus,
        completed_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> RepositoryResult<bool>;

    async fn insert_shipping_batch(&self, batch: &ShippingBatch) -> RepositoryResult<()>;

    async fn list_shipping_batches(&self) -> RepositoryResult<Vec<ShippingBatch>>;
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn insert_replacement(&self, replacement: &TagReplacement) -> RepositoryResult<()>;

    /// Replacements whose original or new identifier is `identifier`, or all of them.
    async fn list_replacements(&self, identifier: Option<&str>)
        -> RepositoryResult<Vec<TagReplacement>>;

    async fn update_replacement_status(&self, replacement_id: &str, status: TagStatus)
        -> RepositoryResult<bool>;

    async fn insert_billing_batch(&self, batch: &BillingBatch) -> RepositoryResult<()>;

    async fn list_billing_batches(&self) -> RepositoryResult<Vec<BillingBatch>>;

    async fn insert_fee_adjustment(&self, adjustment: &FeeAdjustment) -> RepositoryResult<()>;

    async fn list_fee_adjustments(&self) -> RepositoryResult<Vec<FeeAdjustment>>;
}

/// Logical blob buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Photos,
    QrCodes,
    BillingExports,
    Reports,
    ShippingDocs,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Photos => "photos",
            Bucket::QrCodes => "qr_codes",
            Bucket::BillingExports => "billing_exports",
            Bucket::Reports => "reports",
            Bucket::ShippingDocs => "shipping_docs",
        }
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores the bytes and returns the logical path (`/{bucket}/{filename}`).
    async fn put(&self, bucket: Bucket, filename: &str, bytes: &[u8]) -> RepositoryResult<String>;

    async fn get(&self, bucket: Bucket, filename: &str) -> RepositoryResult<Vec<u8>>;
}

/// Everything the services need from a record store, implemented by one type.
pub trait TagStore: CounterRepository + PetRepository + BatchRepository + LedgerRepository {}

impl<T> TagStore for T where T: CounterRepository + PetRepository + BatchRepository + LedgerRepository {}
