pub mod config;
pub mod issue;
pub mod label;
pub mod milestone;
pub mod remote;
pub mod repository;
pub mod user;

pub use config::{Config, DatabaseConfig, GitHubConfig, LoggingConfig};
pub use issue::{Issue, IssueDetails, ItemState, StateFilter};
pub use label::Label;
pub use milestone::Milestone;
pub use remote::{
    IssueListQuery, IssuePage, RemoteIssue, RemoteLabel, RemoteMilestone, RemoteOwner,
    RemoteRepository, RemoteUser,
};
pub use repository::{derive_full_name, Repository, DEFAULT_BRANCH};
pub use user::User;
