//! GitHub REST adapter implementing the issue source port.

pub mod client;

pub use client::{parse_next_page, GitHubClient, RateLimiter};
