//! PostgreSQL fixtures. Tests that need a database return early unless
//! `TEST_DATABASE_URL` is set.

use qtm::database::{migrations, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;

pub async fn test_connection() -> Option<Arc<DatabaseConnection>> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping database test");
        return None;
    };

    let connection = DatabaseConnection::connect(&url, Duration::from_secs(5))
        .await
        .expect("connect to test database");
    migrations::run(&connection).await.expect("apply migrations");
    Some(Arc::new(connection))
}

/// Generate a unique name for test data
pub fn unique_name(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}
