//! Table-scoped data access over the shared connection.

use super::connection::DatabaseConnection;
use super::errors::{DatabaseError, DatabaseResult};
use super::rows::{row_to_map, shape_row};
use crate::query_builder::{bind_params, BindValue, Query, WhereField};
use crate::constants::JSONB_FIELD_NAME;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use sqlx::postgres::PgConnection;
use std::sync::Arc;
use tokio::sync::MappedMutexGuard;

/// Executes rendered [`Query`]s against one table
pub struct Dao {
    connection: Arc<DatabaseConnection>,
    table: String,
    last_error: Mutex<Option<String>>,
}

impl Dao {
    pub fn new(connection: Arc<DatabaseConnection>, table: &str) -> Self {
        Self {
            connection,
            table: table.to_string(),
            last_error: Mutex::new(None),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Driver text of the most recent failed statement
    pub fn last_error_message(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    fn record(&self, err: DatabaseError) -> DatabaseError {
        *self.last_error.lock() = Some(err.to_string());
        err
    }

    pub async fn find(&self, query: &Query) -> DatabaseResult<Vec<Value>> {
        let sql = query.get_select_query(true);
        let params = query.get_bind_params();
        let rows = self.fetch_rows(&sql, &params).await?;

        Ok(rows
            .into_iter()
            .map(|row| shape_row(row, query.get_select_fields()))
            .collect())
    }

    pub async fn find_one(&self, query: &Query) -> DatabaseResult<Option<Value>> {
        Ok(self.find(query).await?.into_iter().next())
    }

    pub async fn insert(&self, query: &Query) -> DatabaseResult<u64> {
        self.execute(&query.get_insert_query(), &[]).await
    }

    /// Insert and return the rows produced by the query's `RETURNING` columns
    pub async fn insert_returning(&self, query: &Query) -> DatabaseResult<Vec<Map<String, Value>>> {
        self.fetch_rows(&query.get_insert_query(), &[]).await
    }

    pub async fn insert_bulk(&self, query: &Query) -> DatabaseResult<u64> {
        let sql = query.get_bulk_insert_query();
        if sql.is_empty() {
            return Ok(0);
        }
        self.execute(&sql, &[]).await
    }

    /// Read-modify-write update.
    ///
    /// Fetches every matching document, merges the query's update data into each
    /// (dotted keys address nested fields) and writes each one back, pinned to its
    /// original content. Returns `false` when nothing matched or a write failed,
    /// including a write that found its row already changed by someone else.
    /// Writes are independent: a failure does not undo earlier rows.
    pub async fn update(&self, query: &Query) -> DatabaseResult<bool> {
        let documents = self.find(&query.without_selection()).await?;
        if documents.is_empty() {
            return Ok(false);
        }

        for original in documents {
            if !self.write_back(query, original).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Merge the query's update data into `original` and store it, but only while the
    /// row still holds `original`. Returns `false` when no row was written.
    pub async fn write_back(&self, query: &Query, original: Value) -> DatabaseResult<bool> {
        let mut document = original.clone();
        for (path, value) in query.get_update_data() {
            merge_path(&mut document, path, value.clone());
        }

        let pinned = query
            .clone()
            .add_condition_object(WhereField::eq(JSONB_FIELD_NAME, BindValue::Json(original)));
        let sql = pinned.get_update_query(&document.to_string())?;
        let params = pinned.get_condition_bind_params();

        match self.execute(&sql, &params).await {
            Ok(affected) => Ok(affected > 0),
            Err(e) if e.is_connection_broken() => Err(e),
            Err(_) => Ok(false),
        }
    }

    /// Delete matching rows, returning how many were removed
    pub async fn remove(&self, query: &Query) -> DatabaseResult<u64> {
        let sql = query.get_delete_query()?;
        let params = query.get_condition_bind_params();
        self.execute(&sql, &params).await
    }

    pub async fn execute(&self, sql: &str, params: &[BindValue]) -> DatabaseResult<u64> {
        let mut conn = self.connection.acquire().await?;
        execute_on(&mut conn, sql, params).await.map_err(|e| self.record(e))
    }

    pub async fn fetch_rows(&self, sql: &str, params: &[BindValue]) -> DatabaseResult<Vec<Map<String, Value>>> {
        let mut conn = self.connection.acquire().await?;
        fetch_on(&mut conn, sql, params).await.map_err(|e| self.record(e))
    }

    /// Start a transaction holding the connection until commit or rollback
    pub async fn begin_transaction(&self) -> DatabaseResult<DaoTransaction<'_>> {
        let mut conn = self.connection.acquire().await?;
        execute_on(&mut conn, "BEGIN", &[]).await.map_err(|e| self.record(e))?;
        Ok(DaoTransaction {
            conn,
            dao: self,
            finished: false,
        })
    }
}

/// An open `BEGIN` block on the shared connection.
///
/// Dropping it without [`commit`](Self::commit) or [`rollback`](Self::rollback)
/// schedules a rollback before the connection's next statement.
pub struct DaoTransaction<'a> {
    conn: MappedMutexGuard<'a, PgConnection>,
    dao: &'a Dao,
    finished: bool,
}

impl DaoTransaction<'_> {
    pub async fn execute(&mut self, sql: &str, params: &[BindValue]) -> DatabaseResult<u64> {
        execute_on(&mut self.conn, sql, params)
            .await
            .map_err(|e| self.dao.record(e))
    }

    pub async fn fetch_rows(&mut self, sql: &str, params: &[BindValue]) -> DatabaseResult<Vec<Map<String, Value>>> {
        fetch_on(&mut self.conn, sql, params)
            .await
            .map_err(|e| self.dao.record(e))
    }

    pub async fn commit(mut self) -> DatabaseResult<()> {
        self.finished = true;
        execute_on(&mut self.conn, "COMMIT", &[])
            .await
            .map(|_| ())
            .map_err(|e| self.dao.record(e))
    }

    pub async fn rollback(mut self) -> DatabaseResult<()> {
        self.finished = true;
        execute_on(&mut self.conn, "ROLLBACK", &[])
            .await
            .map(|_| ())
            .map_err(|e| self.dao.record(e))
    }
}

impl Drop for DaoTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.dao.connection.mark_pending_rollback();
        }
    }
}

async fn execute_on(conn: &mut PgConnection, sql: &str, params: &[BindValue]) -> DatabaseResult<u64> {
    bind_params(sqlx::query(sql), params)
        .execute(conn)
        .await
        .map(|result| result.rows_affected())
        .map_err(|e| DatabaseError::from_sqlx(statement_kind(sql), e))
}

async fn fetch_on(
    conn: &mut PgConnection,
    sql: &str,
    params: &[BindValue],
) -> DatabaseResult<Vec<Map<String, Value>>> {
    let rows = bind_params(sqlx::query(sql), params)
        .fetch_all(conn)
        .await
        .map_err(|e| DatabaseError::from_sqlx(statement_kind(sql), e))?;
    Ok(rows.iter().map(row_to_map).collect())
}

fn statement_kind(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or("statement")
}

/// Set `path` (dot separated) inside `document`, creating intermediate objects
pub fn merge_path(document: &mut Value, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let mut cursor = document;
    for segment in segments {
        cursor = ensure_object(cursor)
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(cursor).insert(last.to_string(), value);
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was replaced with an object above"),
    }
}
