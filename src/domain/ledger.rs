//! Audit records: tag replacements and bulk billing operations.
//!
//! Billing batches and fee adjustments are append-only. A replacement keeps its own
//! status so the replacement tag can be followed through production.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::pet::{TagStatus, UnknownVariant};

/// Placeholder new identifier on a replacement requested by a customer and not yet
/// approved by an admin.
pub const PENDING_IDENTIFIER: &str = "PENDING";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementReason {
    Lost,
    Damaged,
    Stolen,
}

impl ReplacementReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplacementReason::Lost => "lost",
            ReplacementReason::Damaged => "damaged",
            ReplacementReason::Stolen => "stolen",
        }
    }
}

impl fmt::Display for ReplacementReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplacementReason {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lost" => Ok(ReplacementReason::Lost),
            "damaged" => Ok(ReplacementReason::Damaged),
            "stolen" => Ok(ReplacementReason::Stolen),
            _ => Err(UnknownVariant {
                kind: "replacement reason",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementOrigin {
    Admin,
    Customer,
}

impl ReplacementOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplacementOrigin::Admin => "admin",
            ReplacementOrigin::Customer => "customer",
        }
    }
}

impl FromStr for ReplacementOrigin {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(ReplacementOrigin::Admin),
            "customer" => Ok(ReplacementOrigin::Customer),
            _ => Err(UnknownVariant {
                kind: "replacement origin",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagReplacement {
    pub replacement_id: String,
    pub original_identifier: String,
    pub new_identifier: String,
    pub reason: ReplacementReason,
    pub fee: BigDecimal,
    pub status: TagStatus,
    pub origin: ReplacementOrigin,
    pub created_at: DateTime<Utc>,
}

impl TagReplacement {
    pub fn is_pending(&self) -> bool {
        self.new_identifier == PENDING_IDENTIFIER
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingBatch {
    pub batch_id: String,
    pub filename: String,
    pub customer_count: i64,
    pub total_amount: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeAdjustment {
    pub adjustment_id: String,
    pub percentage: BigDecimal,
    pub affected_count: i64,
    pub applied_at: DateTime<Utc>,
}
