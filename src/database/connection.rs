use super::errors::{DatabaseError, DatabaseResult};
use sqlx::postgres::PgConnection;
use sqlx::Connection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, warn};

/// The single long-lived connection of a worker process.
///
/// Every statement goes through [`DatabaseConnection::acquire`], which verifies the
/// connection before handing it out: a closed handle fails with
/// [`DatabaseError::ConnectionBroken`]; a handle that fails its ping gets exactly one
/// reconnect attempt, failing with [`DatabaseError::ConnectionUnavailable`].
pub struct DatabaseConnection {
    url: String,
    connect_timeout: Duration,
    conn: Mutex<Option<PgConnection>>,
    pending_rollback: AtomicBool,
}

impl DatabaseConnection {
    pub async fn connect(url: &str, connect_timeout: Duration) -> DatabaseResult<Self> {
        let conn = open(url, connect_timeout).await?;
        debug!("🗄️ DATABASE: Connection established");

        Ok(Self {
            url: url.to_string(),
            connect_timeout,
            conn: Mutex::new(Some(conn)),
            pending_rollback: AtomicBool::new(false),
        })
    }

    /// Check (and if needed heal) the connection, then lock it for one statement or
    /// one transaction.
    pub async fn acquire(&self) -> DatabaseResult<MappedMutexGuard<'_, PgConnection>> {
        let mut guard = self.conn.lock().await;
        self.check_and_heal(&mut guard).await?;

        if self.pending_rollback.swap(false, Ordering::AcqRel) {
            if let Some(conn) = guard.as_mut() {
                warn!("🗄️ DATABASE: Rolling back abandoned transaction");
                sqlx::query("ROLLBACK")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| DatabaseError::from_sqlx("rollback", e))?;
            }
        }

        MutexGuard::try_map(guard, Option::as_mut).map_err(|_| DatabaseError::ConnectionBroken)
    }

    async fn check_and_heal(&self, slot: &mut Option<PgConnection>) -> DatabaseResult<()> {
        let Some(conn) = slot.as_mut() else {
            return Err(DatabaseError::ConnectionBroken);
        };

        if conn.ping().await.is_ok() {
            return Ok(());
        }

        warn!("🗄️ DATABASE: Connection lost, attempting reset");
        match open(&self.url, self.connect_timeout).await {
            Ok(fresh) => {
                // An abandoned transaction died with the old session
                self.pending_rollback.store(false, Ordering::Release);
                *slot = Some(fresh);
                debug!("🗄️ DATABASE: Connection reset succeeded");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn health_check(&self) -> DatabaseResult<bool> {
        let mut conn = self.acquire().await?;
        let health: i32 = sqlx::query_scalar("SELECT 1 as health")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| DatabaseError::from_sqlx("health_check", e))?;
        Ok(health == 1)
    }

    /// Close the session. Later statements fail with [`DatabaseError::ConnectionBroken`].
    pub async fn close(&self) {
        if let Some(conn) = self.conn.lock().await.take() {
            if let Err(e) = conn.close().await {
                warn!(error = %e, "🗄️ DATABASE: Error while closing connection");
            }
        }
    }

    /// Request a `ROLLBACK` before the next statement, for transactions dropped
    /// without commit or rollback
    pub(crate) fn mark_pending_rollback(&self) {
        self.pending_rollback.store(true, Ordering::Release);
    }
}

async fn open(url: &str, connect_timeout: Duration) -> DatabaseResult<PgConnection> {
    match tokio::time::timeout(connect_timeout, PgConnection::connect(url)).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(DatabaseError::connection_unavailable(e.to_string())),
        Err(_) => Err(DatabaseError::connection_unavailable(format!(
            "connect timed out after {}s",
            connect_timeout.as_secs()
        ))),
    }
}
