use std::collections::HashSet;
use std::sync::Arc;

use pettag_core::adapters::InMemoryStore;
use pettag_core::error::AppError;
use pettag_core::services::sequence::{SequenceAllocator, PET_COUNTER};

#[tokio::test]
async fn test_identifiers_are_sequential_and_padded() {
    let store = Arc::new(InMemoryStore::new());
    let allocator = SequenceAllocator::new(store);

    let mut issued = Vec::new();
    for _ in 0..7 {
        issued.push(allocator.next_identifier().await.unwrap());
    }

    assert_eq!(issued[0], "PET000001");
    assert_eq!(issued[6], "PET000007");
}

#[tokio::test]
async fn test_concurrent_allocations_are_unique() {
    let store = Arc::new(InMemoryStore::new());
    let allocator = SequenceAllocator::new(store);

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let allocator = allocator.clone();
            tokio::spawn(async move { allocator.next_identifier().await.unwrap() })
        })
        .collect();

    let mut identifiers = HashSet::new();
    for handle in futures::future::join_all(handles).await {
        identifiers.insert(handle.unwrap());
    }

    assert_eq!(identifiers.len(), 50);
    assert!(identifiers.contains("PET000001"));
    assert!(identifiers.contains("PET000050"));
}

#[tokio::test]
async fn test_width_grows_past_six_digits() {
    let store = Arc::new(InMemoryStore::new());
    store.seed_counter(PET_COUNTER, 999_999).await;
    let allocator = SequenceAllocator::new(store);

    assert_eq!(allocator.next_identifier().await.unwrap(), "PET1000000");
}

#[tokio::test]
async fn test_unavailable_store_issues_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let allocator = SequenceAllocator::new(store.clone());

    store.set_unavailable(true);
    let err = allocator.next_identifier().await.unwrap_err();
    assert!(matches!(err, AppError::StorageUnavailable(_)));

    store.set_unavailable(false);
    assert_eq!(allocator.next_identifier().await.unwrap(), "PET000001");
}
