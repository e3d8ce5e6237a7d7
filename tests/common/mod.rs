#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;

use pettag_core::adapters::{InMemoryStore, LocalBlobStore};
use pettag_core::auth::StaticTokenAuthorizer;
use pettag_core::config::TagSettings;
use pettag_core::services::notifier::{Notification, Notifier};
use pettag_core::services::RegistrationRequest;
use pettag_core::AppState;

pub const ADMIN_TOKEN: &str = "test-admin-token";
pub const SESSION_SECRET: &str = "test-session-secret";

/// Keeps every notification it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: Notification) -> bool {
        self.sent.lock().await.push(notification);
        true
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
    pub storage: TempDir,
}

impl Harness {
    /// Notifications are dispatched on spawned tasks; give them a moment.
    pub async fn notifications(&self, at_least: usize) -> Vec<Notification> {
        for _ in 0..100 {
            let sent = self.notifier.sent.lock().await;
            if sent.len() >= at_least {
                return sent.clone();
            }
            drop(sent);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.notifier.sent.lock().await.clone()
    }
}

pub async fn harness() -> Harness {
    harness_with(TagSettings::default()).await
}

pub async fn harness_with(settings: TagSettings) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let storage = tempfile::tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());

    let state = AppState::build(
        store.clone(),
        Arc::new(LocalBlobStore::new(storage.path())),
        notifier.clone(),
        Arc::new(StaticTokenAuthorizer::new(ADMIN_TOKEN)),
        settings,
        SESSION_SECRET,
    );

    Harness {
        store,
        state,
        notifier,
        storage,
    }
}

pub fn registration(pet_name: &str) -> RegistrationRequest {
    RegistrationRequest {
        pet_name: pet_name.to_string(),
        breed: "Labrador".to_string(),
        medical_info: "Allergic to chicken".to_string(),
        instructions: "Call the owner".to_string(),
        owner_name: "Jane Doe".to_string(),
        mobile: "+27 82 123 4567".to_string(),
        email: "jane@example.com".to_string(),
        address: "1 Main Road, Cape Town".to_string(),
        bank_account_number: "123456789".to_string(),
        branch_code: "250655".to_string(),
        account_holder_name: "J Doe".to_string(),
    }
}

/// Registers a pet and returns its identifier.
pub async fn register(harness: &Harness, pet_name: &str) -> String {
    harness
        .state
        .registry
        .register(registration(pet_name))
        .await
        .unwrap()
        .identifier
}
