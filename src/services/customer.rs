//! Owner self-service: sign in with the pet identifier and the owner's email.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::SessionSigner;
use crate::domain::{PetRecord, TagReplacement};
use crate::error::AppError;
use crate::ports::{LedgerRepository, PetRepository};

#[derive(Debug, Clone, Serialize)]
pub struct CustomerSession {
    pub token: String,
    pub identifier: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerView {
    pub pet: PetRecord,
    pub replacements: Vec<TagReplacement>,
}

pub struct CustomerPortal {
    pets: Arc<dyn PetRepository>,
    ledger: Arc<dyn LedgerRepository>,
    sessions: SessionSigner,
}

impl CustomerPortal {
    pub fn new(
        pets: Arc<dyn PetRepository>,
        ledger: Arc<dyn LedgerRepository>,
        sessions: SessionSigner,
    ) -> Self {
        Self {
            pets,
            ledger,
            sessions,
        }
    }

    /// Unknown identifiers and wrong emails get the same answer.
    pub async fn login(&self, identifier: &str, email: &str) -> Result<CustomerSession, AppError> {
        let identifier = identifier.trim().to_ascii_uppercase();
        let pet = self.pets.find(&identifier).await?;

        let matches = pet
            .as_ref()
            .is_some_and(|pet| pet.owner.email.eq_ignore_ascii_case(email.trim()));
        if !matches {
            tracing::warn!(%identifier, "customer login rejected");
            return Err(AppError::Unauthorized("invalid pet id or email".to_string()));
        }

        let (token, expires_at) = self.sessions.issue(&identifier, Utc::now())?;
        tracing::info!(%identifier, "customer signed in");
        Ok(CustomerSession {
            token,
            identifier,
            expires_at,
        })
    }

    /// Resolves a session token to the identifier it was issued for.
    pub fn authenticate(&self, token: &str) -> Result<String, AppError> {
        self.sessions.verify(token, Utc::now())
    }

    pub async fn view(&self, identifier: &str) -> Result<CustomerView, AppError> {
        let pet = self
            .pets
            .find(identifier)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pet {} not found", identifier)))?;
        let replacements = self.ledger.list_replacements(Some(identifier)).await?;

        Ok(CustomerView { pet, replacements })
    }
}
