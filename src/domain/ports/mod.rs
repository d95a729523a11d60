//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - Storage: persistence of issues, users, labels, milestones and repositories
//! - IssueSource: read access to the remote issue tracker
//!
//! These traits define the contracts that allow the domain to be independent
//! of specific infrastructure implementations.

pub mod issue_source;
pub mod storage;

pub use issue_source::IssueSource;
pub use storage::{
    IssueFilter, IssueStore, LabelStore, ListOptions, MilestoneStore, RepositoryFilter,
    RepositoryStore, Storage, UserStore,
};
