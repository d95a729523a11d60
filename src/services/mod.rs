//! Application services.

pub mod ingestion_service;
pub mod normalizer;

pub use ingestion_service::{IngestionError, IngestionService, PersistStats, SyncSummary, MAX_PAGE_SIZE};
