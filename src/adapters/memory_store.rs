//! In-memory implementation of the storage ports.
//! Backs local runs without a database and the test-suite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::domain::{
    BatchStatus, BillingBatch, FeeAdjustment, ManufacturingBatch, PetFilter, PetRecord,
    PetUpdate, ShippingBatch, TagReplacement, TagStatus, UpdateOutcome,
};
use crate::ports::{
    BatchRepository, CounterRepository, LedgerRepository, PetRepository, RepositoryError,
    RepositoryResult,
};

#[derive(Default)]
struct MemoryState {
    counters: HashMap<String, i64>,
    pets: BTreeMap<String, PetRecord>,
    manufacturing_batches: Vec<ManufacturingBatch>,
    shipping_batches: Vec<ShippingBatch>,
    replacements: Vec<TagReplacement>,
    billing_batches: Vec<BillingBatch>,
    fee_adjustments: Vec<FeeAdjustment>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an unreachable store: every call fails with `Unavailable` until
    /// switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Sets a counter to a known value.
    pub async fn seed_counter(&self, name: &str, value: i64) {
        self.state
            .write()
            .await
            .counters
            .insert(name.to_string(), value);
    }

    fn check_available(&self) -> RepositoryResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterRepository for InMemoryStore {
    async fn increment(&self, name: &str) -> RepositoryResult<i64> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let counter = state.counters.entry(name.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

#[async_trait]
impl PetRepository for InMemoryStore {
    async fn insert(&self, pet: &PetRecord) -> RepositoryResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state.pets.contains_key(&pet.identifier) {
            return Err(RepositoryError::Conflict(pet.identifier.clone()));
        }
        state.pets.insert(pet.identifier.clone(), pet.clone());
        Ok(())
    }

    async fn find(&self, identifier: &str) -> RepositoryResult<Option<PetRecord>> {
        self.check_available()?;
        Ok(self.state.read().await.pets.get(identifier).cloned())
    }

    async fn list(&self, filter: &PetFilter) -> RepositoryResult<Vec<PetRecord>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .pets
            .values()
            .filter(|pet| filter.matches(pet))
            .cloned()
            .collect())
    }

    async fn update_one(
        &self,
        identifier: &str,
        update: &PetUpdate,
    ) -> RepositoryResult<UpdateOutcome> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let Some(pet) = state.pets.get_mut(identifier) else {
            return Ok(UpdateOutcome::Missing);
        };

        // Apply to a copy so a refused update leaves the stored record untouched.
        let mut candidate = pet.clone();
        let outcome = update.apply_to(&mut candidate);
        if outcome == UpdateOutcome::Modified {
            *pet = candidate;
        }
        Ok(outcome)
    }
}

#[async_trait]
impl BatchRepository for InMemoryStore {
    async fn insert_manufacturing_batch(&self, batch: &ManufacturingBatch) -> RepositoryResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state
            .manufacturing_batches
            .iter()
            .any(|existing| existing.batch_id == batch.batch_id)
        {
            return Err(RepositoryError::Conflict(batch.batch_id.clone()));
        }
        state.manufacturing_batches.push(batch.clone());
        Ok(())
    }

    async fn find_manufacturing_batch(
        &self,
        batch_id: &str,
    ) -> RepositoryResult<Option<ManufacturingBatch>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .manufacturing_batches
            .iter()
            .find(|batch| batch.batch_id == batch_id)
            .cloned())
    }

    async fn list_manufacturing_batches(&self) -> RepositoryResult<Vec<ManufacturingBatch>> {
        self.check_available()?;
        let mut batches = self.state.read().await.manufacturing_batches.clone();
        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(batches)
    }

    async fn update_manufacturing_batch(
        &self,
        batch_id: &str,
        status: BatchStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;
        match state
            .manufacturing_batches
            .iter_mut()
            .find(|batch| batch.batch_id == batch_id)
        {
            Some(batch) => {
                batch.status = status;
                if completed_at.is_some() {
                    batch.completed_at = completed_at;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_shipping_batch(&self, batch: &ShippingBatch) -> RepositoryResult<()> {
        self.check_available()?;
        self.state.write().await.shipping_batches.push(batch.clone());
        Ok(())
    }

    async fn list_shipping_batches(&self) -> RepositoryResult<Vec<ShippingBatch>> {
        self.check_available()?;
        let mut batches = self.state.read().await.shipping_batches.clone();
        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(batches)
    }
}

#[async_trait]
impl LedgerRepository for InMemoryStore {
    async fn insert_replacement(&self, replacement: &TagReplacement) -> RepositoryResult<()> {
        self.check_available()?;
        self.state.write().await.replacements.push(replacement.clone());
        Ok(())
    }

    async fn list_replacements(
        &self,
        identifier: Option<&str>,
    ) -> RepositoryResult<Vec<TagReplacement>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .replacements
            .iter()
            .filter(|replacement| match identifier {
                Some(id) => replacement.original_identifier == id || replacement.new_identifier == id,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn update_replacement_status(
        &self,
        replacement_id: &str,
        status: TagStatus,
    ) -> RepositoryResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;
        match state
            .replacements
            .iter_mut()
            .find(|replacement| replacement.replacement_id == replacement_id)
        {
            Some(replacement) => {
                replacement.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_billing_batch(&self, batch: &BillingBatch) -> RepositoryResult<()> {
        self.check_available()?;
        self.state.write().await.billing_batches.push(batch.clone());
        Ok(())
    }

    async fn list_billing_batches(&self) -> RepositoryResult<Vec<BillingBatch>> {
        self.check_available()?;
        Ok(self.state.read().await.billing_batches.clone())
    }

    async fn insert_fee_adjustment(&self, adjustment: &FeeAdjustment) -> RepositoryResult<()> {
        self.check_available()?;
        self.state.write().await.fee_adjustments.push(adjustment.clone());
        Ok(())
    }

    async fn list_fee_adjustments(&self) -> RepositoryResult<Vec<FeeAdjustment>> {
        self.check_available()?;
        Ok(self.state.read().await.fee_adjustments.clone())
    }
}
