//! Manufacturing and shipping batches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::pet::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    InProduction,
    Completed,
    Shipped,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::InProduction => "in_production",
            BatchStatus::Completed => "completed",
            BatchStatus::Shipped => "shipped",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(BatchStatus::Pending),
            "in_production" => Ok(BatchStatus::InProduction),
            "completed" => Ok(BatchStatus::Completed),
            "shipped" => Ok(BatchStatus::Shipped),
            _ => Err(UnknownVariant {
                kind: "batch status",
                value: s.to_string(),
            }),
        }
    }
}

/// Batch ids are derived from the creation time; a short random suffix keeps two
/// batches created in the same millisecond apart.
pub fn batch_id(prefix: &str, created_at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}{}-{}",
        prefix,
        created_at.format("%Y%m%d%H%M%S%3f"),
        &suffix[..6]
    )
}

/// Set of tags sent to production together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturingBatch {
    pub batch_id: String,
    pub pet_ids: Vec<String>,
    pub notes: String,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ManufacturingBatch {
    pub fn new(pet_ids: Vec<String>, notes: String, created_at: DateTime<Utc>) -> Self {
        Self {
            batch_id: batch_id("MFG", created_at),
            pet_ids,
            notes,
            status: BatchStatus::Pending,
            created_at,
            completed_at: None,
        }
    }
}

/// Set of tags handed to a courier together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingBatch {
    pub shipping_id: String,
    pub pet_ids: Vec<String>,
    pub courier: String,
    pub tracking_number: String,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_ids_carry_prefix_and_timestamp() {
        let created_at = Utc::now();
        let id = batch_id("MFG", created_at);
        assert!(id.starts_with(&format!("MFG{}", created_at.format("%Y%m%d"))));
        assert_ne!(id, batch_id("MFG", created_at));
    }

    #[test]
    fn parses_batch_status() {
        assert_eq!("In_Production".parse::<BatchStatus>(), Ok(BatchStatus::InProduction));
        assert!("done".parse::<BatchStatus>().is_err());
    }
}
