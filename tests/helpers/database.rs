use issue_mirror::adapters::sqlite::{create_migrated_test_pool, initialize_database};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create an in-memory SQLite database for testing
///
/// Creates a fresh in-memory database with migrations applied.
/// Each call creates a completely isolated database instance.
pub async fn setup_test_db() -> SqlitePool {
    create_migrated_test_pool()
        .await
        .expect("failed to create test database")
}

/// Create a file-backed database inside a temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the pool is used.
pub async fn setup_file_db() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let url = format!("sqlite:{}", dir.path().join("nested").join("issues.db").display());
    let pool = initialize_database(&url, None)
        .await
        .expect("failed to create file database");
    (dir, pool)
}

/// Teardown test database
///
/// Closes the connection pool and cleans up resources.
pub async fn teardown_test_db(pool: SqlitePool) {
    pool.close().await;
}
