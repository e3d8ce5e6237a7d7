//! Replacement of lost, damaged or stolen tags.

use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::TagSettings;
use crate::domain::{
    PetRecord, PetUpdate, ReplacementOrigin, ReplacementReason, TagReplacement, TagStatus,
    UpdateOutcome, PENDING_IDENTIFIER,
};
use crate::error::AppError;
use crate::ports::{LedgerRepository, PetRepository};
use crate::services::notifier::{Notification, NotificationDispatcher, TEMPLATE_REPLACEMENT};
use crate::services::sequence::SequenceAllocator;

#[derive(Debug, Clone, Serialize)]
pub struct ReplacementReceipt {
    pub replacement_id: String,
    pub original_identifier: String,
    pub new_identifier: String,
    pub scan_url: String,
    pub fee: BigDecimal,
}

pub struct ReplacementService {
    pets: Arc<dyn PetRepository>,
    ledger: Arc<dyn LedgerRepository>,
    sequence: SequenceAllocator,
    notifications: NotificationDispatcher,
    settings: TagSettings,
}

impl ReplacementService {
    pub fn new(
        pets: Arc<dyn PetRepository>,
        ledger: Arc<dyn LedgerRepository>,
        sequence: SequenceAllocator,
        notifications: NotificationDispatcher,
        settings: TagSettings,
    ) -> Self {
        Self {
            pets,
            ledger,
            sequence,
            notifications,
            settings,
        }
    }

    /// Issues a new identity for the pet and retires the original one.
    ///
    /// The successor is inserted before the original is marked replaced, so a
    /// failure in between can leave an extra `ordered` record but never a replaced
    /// original without a successor.
    pub async fn create_replacement(
        &self,
        original_identifier: &str,
        reason: ReplacementReason,
    ) -> Result<ReplacementReceipt, AppError> {
        let original = self.replaceable(original_identifier).await?;

        let new_identifier = self.sequence.next_identifier().await?;
        let now = Utc::now();
        let successor = original.successor(
            new_identifier.clone(),
            self.settings.scan_url(&new_identifier),
            now,
        );
        self.pets.insert(&successor).await?;

        let retire = PetUpdate {
            tag_status: Some(TagStatus::Replaced),
            ..Default::default()
        };
        match self.pets.update_one(&original.identifier, &retire).await? {
            UpdateOutcome::Modified | UpdateOutcome::Unchanged => {}
            outcome => {
                tracing::error!(
                    original = %original.identifier,
                    successor = %new_identifier,
                    ?outcome,
                    "original changed while its replacement was being issued"
                );
                return Err(AppError::InvalidInput(format!(
                    "Pet {} has already been replaced",
                    original.identifier
                )));
            }
        }

        let replacement = TagReplacement {
            replacement_id: Uuid::new_v4().to_string(),
            original_identifier: original.identifier.clone(),
            new_identifier: new_identifier.clone(),
            reason,
            fee: self.settings.replacement_fee.clone(),
            status: TagStatus::Ordered,
            origin: ReplacementOrigin::Admin,
            created_at: now,
        };
        self.ledger.insert_replacement(&replacement).await?;

        tracing::info!(
            original = %original.identifier,
            successor = %new_identifier,
            %reason,
            "tag replacement created"
        );

        self.notifications.dispatch(Notification {
            recipient: original.owner.email.clone(),
            subject: format!("Replacement tag for {}", original.name),
            template: TEMPLATE_REPLACEMENT.to_string(),
            context: serde_json::json!({
                "owner_name": original.owner.name,
                "pet_name": original.name,
                "original_identifier": original.identifier,
                "new_identifier": new_identifier,
                "reason": reason,
                "fee": replacement.fee.to_string(),
            }),
            attachments: Vec::new(),
        });

        Ok(ReplacementReceipt {
            replacement_id: replacement.replacement_id,
            original_identifier: replacement.original_identifier,
            scan_url: successor.scan_url,
            new_identifier,
            fee: replacement.fee,
        })
    }

    /// Records a customer's request. No identity is issued until an admin acts on it.
    pub async fn request_replacement(
        &self,
        original_identifier: &str,
        reason: ReplacementReason,
    ) -> Result<TagReplacement, AppError> {
        let original = self.replaceable(original_identifier).await?;

        let replacement = TagReplacement {
            replacement_id: Uuid::new_v4().to_string(),
            original_identifier: original.identifier,
            new_identifier: PENDING_IDENTIFIER.to_string(),
            reason,
            fee: self.settings.replacement_fee.clone(),
            status: TagStatus::Ordered,
            origin: ReplacementOrigin::Customer,
            created_at: Utc::now(),
        };
        self.ledger.insert_replacement(&replacement).await?;

        tracing::info!(
            original = %replacement.original_identifier,
            replacement_id = %replacement.replacement_id,
            %reason,
            "replacement requested by customer"
        );
        Ok(replacement)
    }

    pub async fn list_replacements(
        &self,
        identifier: Option<&str>,
    ) -> Result<Vec<TagReplacement>, AppError> {
        Ok(self.ledger.list_replacements(identifier).await?)
    }

    pub async fn update_replacement_status(
        &self,
        replacement_id: &str,
        status: TagStatus,
    ) -> Result<(), AppError> {
        if !self
            .ledger
            .update_replacement_status(replacement_id, status)
            .await?
        {
            return Err(AppError::NotFound(format!(
                "Replacement {} not found",
                replacement_id
            )));
        }
        tracing::info!(%replacement_id, %status, "replacement status updated");
        Ok(())
    }

    async fn replaceable(&self, identifier: &str) -> Result<PetRecord, AppError> {
        let pet = self
            .pets
            .find(identifier.trim())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pet {} not found", identifier)))?;

        if pet.is_replaced() {
            return Err(AppError::InvalidInput(format!(
                "Pet {} has already been replaced",
                pet.identifier
            )));
        }
        Ok(pet)
    }
}
