//! # Database Migrations
//!
//! Schema migrations live in `migrations/` using the `YYYYMMDDHHMMSS_description.sql`
//! naming convention and are embedded at compile time.
//!
//! - `tasks` / `sub_tasks`: JSONB document tables, indexed on `data->>'task_id'`
//! - `queue`: relational message rows with a `BIGSERIAL` message id

use super::connection::DatabaseConnection;
use super::errors::{DatabaseError, DatabaseResult};
use sqlx::migrate::Migrator;
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply all pending migrations on the shared connection
pub async fn run(connection: &DatabaseConnection) -> DatabaseResult<()> {
    let mut conn = connection.acquire().await?;
    MIGRATOR
        .run(&mut *conn)
        .await
        .map_err(|e| DatabaseError::statement("migrate", e.to_string()))?;

    info!(
        migrations = MIGRATOR.iter().count(),
        "🗄️ DATABASE: Schema migrations applied"
    );
    Ok(())
}
