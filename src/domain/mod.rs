//! Domain layer for the issue mirror
//!
//! This module contains the entity model, error types and port traits.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, EntityKind};
