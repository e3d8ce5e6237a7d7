mod common;

use async_trait::async_trait;
use std::sync::Arc;

use common::{harness, register};
use pettag_core::config::TagSettings;
use pettag_core::domain::{
    PetFilter, PetRecord, PetUpdate, ReplacementOrigin, ReplacementReason, TagStatus,
    UpdateOutcome, PENDING_IDENTIFIER,
};
use pettag_core::error::AppError;
use pettag_core::ports::{PetRepository, RepositoryError, RepositoryResult};
use pettag_core::services::notifier::TEMPLATE_REPLACEMENT;
use pettag_core::services::{
    NotificationDispatcher, ReplacementService, SequenceAllocator, TracingNotifier,
};

/// Pet store that can refuse inserts or updates while reads keep working.
struct FailingPets {
    inner: Arc<dyn PetRepository>,
    fail_insert: bool,
    fail_update: bool,
}

#[async_trait]
impl PetRepository for FailingPets {
    async fn insert(&self, pet: &PetRecord) -> RepositoryResult<()> {
        if self.fail_insert {
            return Err(RepositoryError::Unavailable("insert refused".to_string()));
        }
        self.inner.insert(pet).await
    }

    async fn find(&self, identifier: &str) -> RepositoryResult<Option<PetRecord>> {
        self.inner.find(identifier).await
    }

    async fn list(&self, filter: &PetFilter) -> RepositoryResult<Vec<PetRecord>> {
        self.inner.list(filter).await
    }

    async fn update_one(
        &self,
        identifier: &str,
        update: &PetUpdate,
    ) -> RepositoryResult<UpdateOutcome> {
        if self.fail_update {
            return Err(RepositoryError::Unavailable("update refused".to_string()));
        }
        self.inner.update_one(identifier, update).await
    }
}

fn service_with(h: &common::Harness, fail_insert: bool, fail_update: bool) -> ReplacementService {
    ReplacementService::new(
        Arc::new(FailingPets {
            inner: h.store.clone(),
            fail_insert,
            fail_update,
        }),
        h.store.clone(),
        SequenceAllocator::new(h.store.clone()),
        NotificationDispatcher::new(Arc::new(TracingNotifier)),
        TagSettings::default(),
    )
}

#[tokio::test]
async fn test_replacement_retires_original_and_issues_successor() {
    let h = harness().await;
    let original = register(&h, "Rex").await;

    let receipt = h
        .state
        .replacements
        .create_replacement(&original, ReplacementReason::Lost)
        .await
        .unwrap();

    assert_eq!(receipt.original_identifier, original);
    assert_eq!(receipt.new_identifier, "PET000002");
    assert_eq!(receipt.scan_url, "http://localhost:3000/scan/PET000002");
    assert_eq!(receipt.fee.to_string(), "50.00");

    let old = h.store.find(&original).await.unwrap().unwrap();
    assert_eq!(old.tag_status, TagStatus::Replaced);
    assert_eq!(old.replacement_count, 0);

    let new = h.store.find(&receipt.new_identifier).await.unwrap().unwrap();
    assert_eq!(new.tag_status, TagStatus::Ordered);
    assert_eq!(new.replacement_count, 1);
    assert_eq!(new.replaces.as_deref(), Some(original.as_str()));
    assert_eq!(new.name, old.name);
    assert_eq!(new.owner, old.owner);
    assert!(new.created_at >= old.created_at);

    let audit = h
        .state
        .replacements
        .list_replacements(Some(&original))
        .await
        .unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].new_identifier, receipt.new_identifier);
    assert_eq!(audit[0].reason, ReplacementReason::Lost);
    assert_eq!(audit[0].origin, ReplacementOrigin::Admin);
    assert_eq!(audit[0].status, TagStatus::Ordered);

    let sent = h.notifications(2).await;
    assert!(sent.iter().any(|n| n.template == TEMPLATE_REPLACEMENT));
}

#[tokio::test]
async fn test_replacement_of_unknown_pet_consumes_no_identifier() {
    let h = harness().await;

    let err = h
        .state
        .replacements
        .create_replacement("PET000404", ReplacementReason::Damaged)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert_eq!(register(&h, "Rex").await, "PET000001");
}

#[tokio::test]
async fn test_replaced_pet_cannot_be_replaced_again() {
    let h = harness().await;
    let original = register(&h, "Rex").await;
    h.state
        .replacements
        .create_replacement(&original, ReplacementReason::Stolen)
        .await
        .unwrap();

    let err = h
        .state
        .replacements
        .create_replacement(&original, ReplacementReason::Stolen)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_replacement_chain_keeps_counting() {
    let h = harness().await;
    let first = register(&h, "Rex").await;
    h.state.lifecycle.set_status(&first, TagStatus::Delivered).await.unwrap();

    let second = h
        .state
        .replacements
        .create_replacement(&first, ReplacementReason::Damaged)
        .await
        .unwrap()
        .new_identifier;
    let third = h
        .state
        .replacements
        .create_replacement(&second, ReplacementReason::Lost)
        .await
        .unwrap()
        .new_identifier;

    let latest = h.store.find(&third).await.unwrap().unwrap();
    assert_eq!(latest.replacement_count, 2);
    assert_eq!(latest.replaces.as_deref(), Some(second.as_str()));
    assert!(latest.delivered_at.is_none());

    // The oldest identifier still resolves for finders.
    let view = h.state.registry.scan(&first).await.unwrap();
    assert_eq!(view.pet_name, "Rex");
}

#[tokio::test]
async fn test_customer_request_is_pending_and_leaves_original_alone() {
    let h = harness().await;
    let original = register(&h, "Rex").await;

    let request = h
        .state
        .replacements
        .request_replacement(&original, ReplacementReason::Lost)
        .await
        .unwrap();

    assert_eq!(request.new_identifier, PENDING_IDENTIFIER);
    assert!(request.is_pending());
    assert_eq!(request.origin, ReplacementOrigin::Customer);

    let pet = h.store.find(&original).await.unwrap().unwrap();
    assert_eq!(pet.tag_status, TagStatus::Ordered);
    assert_eq!(pet.replacement_count, 0);

    // No identifier was issued for the request.
    assert_eq!(register(&h, "Bella").await, "PET000002");
}

#[tokio::test]
async fn test_replacement_status_follows_production() {
    let h = harness().await;
    let original = register(&h, "Rex").await;
    let receipt = h
        .state
        .replacements
        .create_replacement(&original, ReplacementReason::Lost)
        .await
        .unwrap();

    h.state
        .replacements
        .update_replacement_status(&receipt.replacement_id, TagStatus::Shipped)
        .await
        .unwrap();
    let audit = h.state.replacements.list_replacements(None).await.unwrap();
    assert_eq!(audit[0].status, TagStatus::Shipped);

    let err = h
        .state
        .replacements
        .update_replacement_status("nope", TagStatus::Shipped)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_failed_retire_leaves_original_active_and_successor_stored() {
    let h = harness().await;
    let original = register(&h, "Rex").await;

    let err = service_with(&h, false, true)
        .create_replacement(&original, ReplacementReason::Lost)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StorageUnavailable(_)));

    let old = h.store.find(&original).await.unwrap().unwrap();
    assert_eq!(old.tag_status, TagStatus::Ordered);

    let successor = h.store.find("PET000002").await.unwrap().unwrap();
    assert_eq!(successor.replaces.as_deref(), Some(original.as_str()));
    assert!(h
        .state
        .replacements
        .list_replacements(Some(&original))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_failed_successor_insert_leaves_original_untouched() {
    let h = harness().await;
    let original = register(&h, "Rex").await;

    let err = service_with(&h, true, false)
        .create_replacement(&original, ReplacementReason::Damaged)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StorageUnavailable(_)));

    let old = h.store.find(&original).await.unwrap().unwrap();
    assert_eq!(old.tag_status, TagStatus::Ordered);
    assert!(h.store.find("PET000002").await.unwrap().is_none());
    assert_eq!(h.store.list(&PetFilter::default()).await.unwrap().len(), 1);
}
