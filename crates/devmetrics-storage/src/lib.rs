//! Pluggable metric storage: a `Repository` trait implemented by an in-memory store (with an
//! optional JSON snapshot file) and a PostgreSQL store, so the server binary can swap backends
//! from configuration alone.

mod error;
mod memory;
mod postgres;
mod repository;

pub use error::StorageError;
pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;
pub use repository::{MetricsSnapshot, Repository};
