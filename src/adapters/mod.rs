//! Implementations of the storage ports.

pub mod local_blob_store;
pub mod memory_store;
pub mod postgres_store;

pub use local_blob_store::LocalBlobStore;
pub use memory_store::InMemoryStore;
pub use postgres_store::PostgresStore;
