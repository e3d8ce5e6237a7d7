//! Pet record domain entity.
//! Framework-agnostic representation of a registered pet, its owner and its tag.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const IDENTIFIER_PREFIX: &str = "PET";
pub const IDENTIFIER_WIDTH: usize = 6;

/// Formats a sequence value as a public pet identifier, e.g. `7` -> `PET000007`.
/// Values that need more than six digits keep all of them.
pub fn format_identifier(sequence: i64) -> String {
    format!(
        "{}{:0width$}",
        IDENTIFIER_PREFIX,
        sequence,
        width = IDENTIFIER_WIDTH
    )
}

/// Error returned when a status string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Where a physical tag is in its life.
///
/// The admin operations accept any target status; the only transition that is
/// refused is one leaving `Replaced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagStatus {
    Ordered,
    Printed,
    Manufactured,
    Shipped,
    Delivered,
    Replaced,
}

impl TagStatus {
    pub const ALL: [TagStatus; 6] = [
        TagStatus::Ordered,
        TagStatus::Printed,
        TagStatus::Manufactured,
        TagStatus::Shipped,
        TagStatus::Delivered,
        TagStatus::Replaced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TagStatus::Ordered => "ordered",
            TagStatus::Printed => "printed",
            TagStatus::Manufactured => "manufactured",
            TagStatus::Shipped => "shipped",
            TagStatus::Delivered => "delivered",
            TagStatus::Replaced => "replaced",
        }
    }
}

impl fmt::Display for TagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == needle)
            .ok_or_else(|| UnknownVariant {
                kind: "tag status",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Arrears,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Arrears => "arrears",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paid" => Ok(PaymentStatus::Paid),
            "arrears" => Ok(PaymentStatus::Arrears),
            _ => Err(UnknownVariant {
                kind: "payment status",
                value: s.to_string(),
            }),
        }
    }
}

/// Owner contact and debit-order details. Owned by exactly one pet record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub name: String,
    pub mobile: String,
    pub email: String,
    pub address: String,
    pub bank_account_number: String,
    pub branch_code: String,
    pub account_holder_name: String,
}

/// Domain entity representing a registered pet and the state of its tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetRecord {
    pub identifier: String,
    pub name: String,
    pub breed: String,
    pub medical_info: String,
    pub instructions: String,
    pub photo_url: Option<String>,
    pub owner: Owner,
    pub scan_url: String,
    pub tag_status: TagStatus,
    pub payment_status: PaymentStatus,
    pub monthly_fee: BigDecimal,
    pub manufacturing_batch_ref: Option<String>,
    pub shipping_tracking_ref: Option<String>,
    pub replacement_count: i32,
    /// Identifier this record was issued to replace, if any.
    pub replaces: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub last_adjustment_at: Option<DateTime<Utc>>,
    pub last_reminder_sent_at: Option<DateTime<Utc>>,
}

impl PetRecord {
    pub fn is_replaced(&self) -> bool {
        self.tag_status == TagStatus::Replaced
    }

    /// Builds the record that supersedes this one. Pet and owner details, the fee
    /// and the billing stamps carry over; the tag lifecycle starts again.
    pub fn successor(&self, identifier: String, scan_url: String, now: DateTime<Utc>) -> PetRecord {
        PetRecord {
            identifier,
            name: self.name.clone(),
            breed: self.breed.clone(),
            medical_info: self.medical_info.clone(),
            instructions: self.instructions.clone(),
            photo_url: self.photo_url.clone(),
            owner: self.owner.clone(),
            scan_url,
            tag_status: TagStatus::Ordered,
            payment_status: self.payment_status,
            monthly_fee: self.monthly_fee.clone(),
            manufacturing_batch_ref: None,
            shipping_tracking_ref: None,
            replacement_count: self.replacement_count + 1,
            replaces: Some(self.identifier.clone()),
            created_at: now,
            last_payment_at: self.last_payment_at,
            delivered_at: None,
            last_adjustment_at: self.last_adjustment_at,
            last_reminder_sent_at: None,
        }
    }
}

/// Result of applying a [`PetUpdate`] to a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No record with that identifier.
    Missing,
    /// Record found but every field already held the requested value.
    Unchanged,
    Modified,
    /// Record is replaced and the update tried to move its tag status.
    Frozen,
}

/// Partial update of the mutable fields of a pet record. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PetUpdate {
    pub tag_status: Option<TagStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub monthly_fee: Option<BigDecimal>,
    pub photo_url: Option<String>,
    pub manufacturing_batch_ref: Option<String>,
    pub shipping_tracking_ref: Option<String>,
    pub last_payment_at: Option<DateTime<Utc>>,
    /// Only written when this same update moves the tag into `Delivered`.
    pub delivered_at: Option<DateTime<Utc>>,
    pub last_adjustment_at: Option<DateTime<Utc>>,
    pub last_reminder_sent_at: Option<DateTime<Utc>>,
}

impl PetUpdate {
    pub fn apply_to(&self, record: &mut PetRecord) -> UpdateOutcome {
        if record.is_replaced() && self.tag_status.is_some() {
            return UpdateOutcome::Frozen;
        }

        let entering = self
            .tag_status
            .filter(|status| *status != record.tag_status);

        let mut changed = false;
        changed |= assign(&mut record.tag_status, &self.tag_status);
        if entering == Some(TagStatus::Delivered) {
            changed |= assign_some(&mut record.delivered_at, &self.delivered_at);
        }
        changed |= assign(&mut record.payment_status, &self.payment_status);
        changed |= assign(&mut record.monthly_fee, &self.monthly_fee);
        changed |= assign_some(&mut record.photo_url, &self.photo_url);
        changed |= assign_some(&mut record.manufacturing_batch_ref, &self.manufacturing_batch_ref);
        changed |= assign_some(&mut record.shipping_tracking_ref, &self.shipping_tracking_ref);
        changed |= assign_some(&mut record.last_payment_at, &self.last_payment_at);
        changed |= assign_some(&mut record.last_adjustment_at, &self.last_adjustment_at);
        changed |= assign_some(&mut record.last_reminder_sent_at, &self.last_reminder_sent_at);

        if changed {
            UpdateOutcome::Modified
        } else {
            UpdateOutcome::Unchanged
        }
    }
}

fn assign<T: PartialEq + Clone>(slot: &mut T, value: &Option<T>) -> bool {
    match value {
        Some(value) if slot != value => {
            *slot = value.clone();
            true
        }
        _ => false,
    }
}

fn assign_some<T: PartialEq + Clone>(slot: &mut Option<T>, value: &Option<T>) -> bool {
    match value {
        Some(value) if slot.as_ref() != Some(value) => {
            *slot = Some(value.clone());
            true
        }
        _ => false,
    }
}

/// Selection criteria for listing pet records. Unset fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PetFilter {
    pub tag_status: Option<TagStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Only records never fee-adjusted, or last adjusted before this instant.
    #[serde(skip)]
    pub not_adjusted_since: Option<DateTime<Utc>>,
    /// Leaves out retired (replaced) tags.
    #[serde(skip)]
    pub exclude_replaced: bool,
}

impl PetFilter {
    pub fn matches(&self, record: &PetRecord) -> bool {
        if self.tag_status.is_some_and(|status| status != record.tag_status) {
            return false;
        }
        if self
            .payment_status
            .is_some_and(|status| status != record.payment_status)
        {
            return false;
        }
        if self.exclude_replaced && record.tag_status == TagStatus::Replaced {
            return false;
        }
        match (self.not_adjusted_since, record.last_adjustment_at) {
            (Some(cutoff), Some(adjusted)) => adjusted < cutoff,
            _ => true,
        }
    }
}
