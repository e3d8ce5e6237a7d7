use std::sync::Arc;

use crate::domain::format_identifier;
use crate::error::AppError;
use crate::ports::CounterRepository;

/// Name of the durable counter behind pet identifiers.
pub const PET_COUNTER: &str = "pet_counter";

/// Issues pet identifiers from a single durable counter.
#[derive(Clone)]
pub struct SequenceAllocator {
    counters: Arc<dyn CounterRepository>,
}

impl SequenceAllocator {
    pub fn new(counters: Arc<dyn CounterRepository>) -> Self {
        Self { counters }
    }

    /// Atomically increments the counter and formats the new value. A storage
    /// failure issues nothing.
    pub async fn next_identifier(&self) -> Result<String, AppError> {
        let value = self.counters.increment(PET_COUNTER).await.map_err(|e| {
            tracing::error!("Failed to allocate pet identifier: {}", e);
            AppError::from(e)
        })?;

        let identifier = format_identifier(value);
        tracing::debug!(%identifier, "identifier allocated");
        Ok(identifier)
    }
}
