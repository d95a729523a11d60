//! issue-mirror - GitHub issue ingestion and persistence
//!
//! Pulls issues, their users, labels and milestones, plus repository metadata
//! from the GitHub REST API and stores them in a normalized local store.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): entity model, errors, and the storage and issue source ports
//! - **Adapters** (`adapters`): SQLite and in-memory storage, the GitHub client
//! - **Service Layer** (`services`): normalization and the ingestion workflow
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use issue_mirror::{GitHubClient, IngestionService, SqliteStorage, StateFilter};
//!
//! let storage = Arc::new(SqliteStorage::new(pool));
//! let client = Arc::new(GitHubClient::new("https://api.github.com", None));
//! let service = IngestionService::new(storage, client);
//! let summary = service
//!     .fetch_and_store_all_issues("octocat", "Hello-World", StateFilter::All, &cancel)
//!     .await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::github::GitHubClient;
pub use adapters::memory::InMemoryStorage;
pub use adapters::sqlite::SqliteStorage;
pub use domain::errors::{DomainError, DomainResult, EntityKind};
pub use domain::models::{
    Config, Issue, IssueDetails, ItemState, Label, Milestone, Repository, StateFilter, User,
};
pub use domain::ports::{
    IssueFilter, IssueSource, IssueStore, LabelStore, ListOptions, MilestoneStore,
    RepositoryFilter, RepositoryStore, Storage, UserStore,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{IngestionError, IngestionService, SyncSummary};
