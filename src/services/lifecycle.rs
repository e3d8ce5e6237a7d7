//! Tag lifecycle: status updates and the manufacturing / shipping batches that
//! drive them.
//!
//! Transitions are deliberately permissive. Any status may be set from any other
//! status; nothing checks that the target is the "next" one. What this module does
//! enforce are the side effects of reaching a status, and that a replaced tag never
//! moves again.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::domain::{
    BatchStatus, ManufacturingBatch, PetFilter, PetRecord, PetUpdate, ShippingBatch, TagStatus,
    UpdateOutcome,
};
use crate::domain::batch::batch_id;
use crate::error::AppError;
use crate::ports::{BatchRepository, PetRepository};

/// The update that moves a tag into `status`, with the stamps that belong to it.
pub fn transition(status: TagStatus, now: DateTime<Utc>) -> PetUpdate {
    PetUpdate {
        tag_status: Some(status),
        delivered_at: (status == TagStatus::Delivered).then_some(now),
        ..Default::default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReceipt {
    pub batch_id: String,
    /// Records actually modified.
    pub pet_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShippingReceipt {
    pub shipping_id: String,
    pub shipping_address: String,
    pub pet_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionReceipt {
    pub batch_id: String,
    pub completed_at: DateTime<Utc>,
    pub pet_count: u64,
}

pub struct TagLifecycle {
    pets: Arc<dyn PetRepository>,
    batches: Arc<dyn BatchRepository>,
}

impl TagLifecycle {
    pub fn new(pets: Arc<dyn PetRepository>, batches: Arc<dyn BatchRepository>) -> Self {
        Self { pets, batches }
    }

    pub async fn set_status(&self, identifier: &str, status: TagStatus) -> Result<(), AppError> {
        let outcome = self
            .pets
            .update_one(identifier, &transition(status, Utc::now()))
            .await?;

        match outcome {
            UpdateOutcome::Missing => Err(AppError::NotFound(format!("Pet {} not found", identifier))),
            UpdateOutcome::Frozen => Err(AppError::InvalidInput(format!(
                "Pet {} has been replaced; its tag status can no longer change",
                identifier
            ))),
            UpdateOutcome::Unchanged | UpdateOutcome::Modified => {
                tracing::info!(%identifier, %status, "tag status updated");
                Ok(())
            }
        }
    }

    /// Best-effort bulk update. Unknown and replaced identifiers are skipped; the
    /// returned count is the number of records actually modified.
    pub async fn bulk_set_status(
        &self,
        identifiers: &[String],
        status: TagStatus,
    ) -> Result<u64, AppError> {
        let identifiers = dedup(identifiers);
        let updated = self
            .pets
            .update_many(&identifiers, &transition(status, Utc::now()))
            .await?;

        tracing::info!(
            requested = identifiers.len(),
            updated,
            %status,
            "bulk tag status update"
        );
        Ok(updated)
    }

    /// Pets currently waiting for their tag to be printed.
    pub async fn print_queue(&self) -> Result<Vec<PetRecord>, AppError> {
        let filter = PetFilter {
            tag_status: Some(TagStatus::Ordered),
            ..Default::default()
        };
        Ok(self.pets.list(&filter).await?)
    }

    pub async fn create_manufacturing_batch(
        &self,
        identifiers: &[String],
        notes: &str,
    ) -> Result<BatchReceipt, AppError> {
        let identifiers = dedup(identifiers);
        if identifiers.is_empty() {
            return Err(AppError::InvalidInput(
                "a manufacturing batch needs at least one pet".to_string(),
            ));
        }

        let batch = ManufacturingBatch::new(
            identifiers.clone(),
            crate::validation::sanitize_string(notes),
            Utc::now(),
        );
        self.batches.insert_manufacturing_batch(&batch).await?;

        let update = PetUpdate {
            manufacturing_batch_ref: Some(batch.batch_id.clone()),
            ..transition(TagStatus::Printed, batch.created_at)
        };
        let pet_count = self.pets.update_many(&identifiers, &update).await?;

        tracing::info!(
            batch_id = %batch.batch_id,
            requested = identifiers.len(),
            pet_count,
            "manufacturing batch created"
        );
        Ok(BatchReceipt {
            batch_id: batch.batch_id,
            pet_count,
        })
    }

    pub async fn start_manufacturing_batch(&self, batch_id: &str) -> Result<(), AppError> {
        let found = self
            .batches
            .update_manufacturing_batch(batch_id, BatchStatus::InProduction, None)
            .await?;
        if !found {
            return Err(AppError::NotFound(format!("Manufacturing batch {} not found", batch_id)));
        }

        tracing::info!(%batch_id, "manufacturing batch in production");
        Ok(())
    }

    /// Marks the batch completed and moves every member tag to `manufactured`,
    /// whatever status it is in (replaced tags excepted).
    pub async fn complete_manufacturing_batch(
        &self,
        batch_id: &str,
    ) -> Result<CompletionReceipt, AppError> {
        let batch = self
            .batches
            .find_manufacturing_batch(batch_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Manufacturing batch {} not found", batch_id)))?;

        let completed_at = Utc::now();
        self.batches
            .update_manufacturing_batch(batch_id, BatchStatus::Completed, Some(completed_at))
            .await?;

        let pet_count = self
            .pets
            .update_many(&batch.pet_ids, &transition(TagStatus::Manufactured, completed_at))
            .await?;

        tracing::info!(%batch_id, pet_count, "manufacturing batch completed");
        Ok(CompletionReceipt {
            batch_id: batch.batch_id,
            completed_at,
            pet_count,
        })
    }

    pub async fn list_manufacturing_batches(&self) -> Result<Vec<ManufacturingBatch>, AppError> {
        Ok(self.batches.list_manufacturing_batches().await?)
    }

    /// Creates a shipping batch and moves every member tag to `shipped`.
    ///
    /// The whole batch ships to the address of the first listed pet. Members whose
    /// owner lives elsewhere are still shipped; the divergence is logged.
    pub async fn create_shipping_batch(
        &self,
        identifiers: &[String],
        courier: &str,
        tracking_number: &str,
    ) -> Result<ShippingReceipt, AppError> {
        let identifiers = dedup(identifiers);
        let courier = crate::validation::required_text("courier", courier, 100)?;
        let tracking_number = crate::validation::sanitize_string(tracking_number);

        let Some(first) = identifiers.first() else {
            return Err(AppError::InvalidInput(
                "a shipping batch needs at least one pet".to_string(),
            ));
        };
        let first_pet = self
            .pets
            .find(first)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pet {} not found", first)))?;
        let shipping_address = first_pet.owner.address.clone();

        let mut production_batches = BTreeSet::new();
        production_batches.extend(first_pet.manufacturing_batch_ref);
        let mut diverging = Vec::new();
        for identifier in identifiers.iter().skip(1) {
            if let Some(pet) = self.pets.find(identifier).await? {
                if pet.owner.address != shipping_address {
                    diverging.push(pet.identifier);
                }
                production_batches.extend(pet.manufacturing_batch_ref);
            }
        }
        if !diverging.is_empty() {
            tracing::warn!(
                first = %first,
                diverging = ?diverging,
                "shipping batch members have different owner addresses; using the first"
            );
        }

        let created_at = Utc::now();
        let batch = ShippingBatch {
            shipping_id: batch_id("SHP", created_at),
            pet_ids: identifiers.clone(),
            courier,
            tracking_number,
            shipping_address,
            created_at,
        };
        self.batches.insert_shipping_batch(&batch).await?;

        let update = PetUpdate {
            shipping_tracking_ref: Some(batch.shipping_id.clone()),
            ..transition(TagStatus::Shipped, created_at)
        };
        let pet_count = self.pets.update_many(&identifiers, &update).await?;

        for batch_id in &production_batches {
            self.mark_batch_shipped(batch_id).await?;
        }

        tracing::info!(
            shipping_id = %batch.shipping_id,
            courier = %batch.courier,
            pet_count,
            "shipping batch created"
        );
        Ok(ShippingReceipt {
            shipping_id: batch.shipping_id,
            shipping_address: batch.shipping_address,
            pet_count,
        })
    }

    pub async fn list_shipping_batches(&self) -> Result<Vec<ShippingBatch>, AppError> {
        Ok(self.batches.list_shipping_batches().await?)
    }

    /// A completed manufacturing batch becomes `shipped` once none of its
    /// members is still waiting to leave.
    async fn mark_batch_shipped(&self, batch_id: &str) -> Result<(), AppError> {
        let Some(batch) = self.batches.find_manufacturing_batch(batch_id).await? else {
            return Ok(());
        };
        if batch.status != BatchStatus::Completed {
            return Ok(());
        }

        for identifier in &batch.pet_ids {
            let waiting = self.pets.find(identifier).await?.is_some_and(|pet| {
                !matches!(
                    pet.tag_status,
                    TagStatus::Shipped | TagStatus::Delivered | TagStatus::Replaced
                )
            });
            if waiting {
                return Ok(());
            }
        }

        self.batches
            .update_manufacturing_batch(batch_id, BatchStatus::Shipped, None)
            .await?;
        tracing::info!(%batch_id, "manufacturing batch fully shipped");
        Ok(())
    }
}

/// Trims, drops blanks and repeats, keeps first-seen order.
fn dedup(identifiers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    identifiers
        .iter()
        .map(|identifier| identifier.trim().to_string())
        .filter(|identifier| !identifier.is_empty() && seen.insert(identifier.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivered_transition_carries_timestamp() {
        let now = Utc::now();
        let update = transition(TagStatus::Delivered, now);
        assert_eq!(update.tag_status, Some(TagStatus::Delivered));
        assert_eq!(update.delivered_at, Some(now));

        let update = transition(TagStatus::Shipped, now);
        assert_eq!(update.delivered_at, None);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let ids = vec![
            "PET000002".to_string(),
            " PET000001 ".to_string(),
            "PET000002".to_string(),
            "".to_string(),
        ];
        assert_eq!(dedup(&ids), vec!["PET000002", "PET000001"]);
    }
}
