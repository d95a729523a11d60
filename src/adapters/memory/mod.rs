//! Process-local storage adapter.

mod storage;

pub use storage::InMemoryStorage;
