//! Registration of new pets and the read side of the registry.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::TagSettings;
use crate::domain::{
    Owner, PaymentStatus, PetFilter, PetRecord, PetUpdate, TagStatus, UpdateOutcome,
};
use crate::error::AppError;
use crate::ports::{BlobStore, Bucket, PetRepository};
use crate::services::notifier::{Notification, NotificationDispatcher, TEMPLATE_REGISTRATION};
use crate::services::sequence::SequenceAllocator;
use crate::validation::{
    optional_text, required_text, sanitize_string, validate_digits, validate_email,
    validate_mobile, ACCOUNT_NUMBER_MAX_LEN, ADDRESS_MAX_LEN, BRANCH_CODE_MAX_LEN, BREED_MAX_LEN,
    NAME_MAX_LEN, NOTES_MAX_LEN,
};

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    pub pet_name: String,
    pub breed: String,
    #[serde(default)]
    pub medical_info: String,
    #[serde(default)]
    pub instructions: String,
    pub owner_name: String,
    pub mobile: String,
    pub email: String,
    pub address: String,
    pub bank_account_number: String,
    pub branch_code: String,
    pub account_holder_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationReceipt {
    pub identifier: String,
    pub scan_url: String,
}

/// What a finder sees after scanning a tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanView {
    pub identifier: String,
    pub pet_name: String,
    pub photo_url: Option<String>,
    pub owner_name: String,
    pub owner_mobile: String,
}

impl From<&PetRecord> for ScanView {
    fn from(pet: &PetRecord) -> Self {
        Self {
            identifier: pet.identifier.clone(),
            pet_name: pet.name.clone(),
            photo_url: pet.photo_url.clone(),
            owner_name: pet.owner.name.clone(),
            owner_mobile: pet.owner.mobile.clone(),
        }
    }
}

/// A registration request after sanitising and validation.
struct PetDetails {
    name: String,
    breed: String,
    medical_info: String,
    instructions: String,
    owner: Owner,
}

impl RegistrationRequest {
    fn validate(self) -> Result<PetDetails, AppError> {
        let name = required_text("pet_name", &self.pet_name, NAME_MAX_LEN)?;
        let breed = required_text("breed", &self.breed, BREED_MAX_LEN)?;
        let medical_info = optional_text("medical_info", &self.medical_info, NOTES_MAX_LEN)?;
        let instructions = optional_text("instructions", &self.instructions, NOTES_MAX_LEN)?;

        let email = sanitize_string(&self.email).to_ascii_lowercase();
        validate_email(&email)?;
        let mobile = sanitize_string(&self.mobile);
        validate_mobile(&mobile)?;
        let bank_account_number = sanitize_string(&self.bank_account_number);
        validate_digits("bank_account_number", &bank_account_number, ACCOUNT_NUMBER_MAX_LEN)?;
        let branch_code = sanitize_string(&self.branch_code);
        validate_digits("branch_code", &branch_code, BRANCH_CODE_MAX_LEN)?;

        let owner = Owner {
            name: required_text("owner_name", &self.owner_name, NAME_MAX_LEN)?,
            mobile,
            email,
            address: required_text("address", &self.address, ADDRESS_MAX_LEN)?,
            bank_account_number,
            branch_code,
            account_holder_name: required_text(
                "account_holder_name",
                &self.account_holder_name,
                NAME_MAX_LEN,
            )?,
        };
        Ok(PetDetails {
            name,
            breed,
            medical_info,
            instructions,
            owner,
        })
    }
}

pub struct RegistrationService {
    pets: Arc<dyn PetRepository>,
    blobs: Arc<dyn BlobStore>,
    sequence: SequenceAllocator,
    notifications: NotificationDispatcher,
    settings: TagSettings,
}

impl RegistrationService {
    pub fn new(
        pets: Arc<dyn PetRepository>,
        blobs: Arc<dyn BlobStore>,
        sequence: SequenceAllocator,
        notifications: NotificationDispatcher,
        settings: TagSettings,
    ) -> Self {
        Self {
            pets,
            blobs,
            sequence,
            notifications,
            settings,
        }
    }

    /// Validates the request before an identifier is allocated, so a rejected
    /// registration never consumes one.
    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationReceipt, AppError> {
        let details = request.validate()?;

        let identifier = self.sequence.next_identifier().await?;
        let scan_url = self.settings.scan_url(&identifier);
        let now = Utc::now();

        let pet = PetRecord {
            identifier: identifier.clone(),
            name: details.name,
            breed: details.breed,
            medical_info: details.medical_info,
            instructions: details.instructions,
            photo_url: None,
            owner: details.owner,
            scan_url: scan_url.clone(),
            tag_status: TagStatus::Ordered,
            payment_status: PaymentStatus::Paid,
            monthly_fee: self.settings.default_monthly_fee.clone(),
            manufacturing_batch_ref: None,
            shipping_tracking_ref: None,
            replacement_count: 0,
            replaces: None,
            created_at: now,
            last_payment_at: Some(now),
            delivered_at: None,
            last_adjustment_at: None,
            last_reminder_sent_at: None,
        };
        self.pets.insert(&pet).await?;

        tracing::info!(%identifier, "pet registered");

        self.notifications.dispatch(Notification {
            recipient: pet.owner.email.clone(),
            subject: format!("{} is registered", pet.name),
            template: TEMPLATE_REGISTRATION.to_string(),
            context: serde_json::json!({
                "owner_name": pet.owner.name,
                "pet_name": pet.name,
                "pet_id": identifier,
                "scan_url": scan_url,
                "monthly_fee": crate::services::billing::to_cents(&pet.monthly_fee).to_string(),
            }),
            attachments: Vec::new(),
        });

        Ok(RegistrationReceipt {
            identifier,
            scan_url,
        })
    }

    /// Stores the photo as `{identifier}_{filename}` and links it to the pet.
    pub async fn attach_photo(
        &self,
        identifier: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<String, AppError> {
        if bytes.is_empty() {
            return Err(AppError::InvalidInput("photo is empty".to_string()));
        }
        let pet = self.get_pet(identifier).await?;

        let stored_name = format!("{}_{}", pet.identifier, filename.trim());
        let path = self.blobs.put(Bucket::Photos, &stored_name, bytes).await?;

        let update = PetUpdate {
            photo_url: Some(path.clone()),
            ..Default::default()
        };
        if self.pets.update_one(&pet.identifier, &update).await? == UpdateOutcome::Missing {
            return Err(AppError::NotFound(format!("Pet {} not found", identifier)));
        }

        tracing::info!(identifier = %pet.identifier, %path, "photo attached");
        Ok(path)
    }

    /// Replaced identifiers still resolve: old tags keep working for finders.
    pub async fn scan(&self, identifier: &str) -> Result<ScanView, AppError> {
        let pet = self.get_pet(identifier).await?;
        Ok(ScanView::from(&pet))
    }

    pub async fn get_pet(&self, identifier: &str) -> Result<PetRecord, AppError> {
        self.pets
            .find(identifier.trim())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pet {} not found", identifier)))
    }

    pub async fn list_pets(&self, filter: &PetFilter) -> Result<Vec<PetRecord>, AppError> {
        Ok(self.pets.list(filter).await?)
    }
}
