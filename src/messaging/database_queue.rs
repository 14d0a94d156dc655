//! # Database-backed Queue
//!
//! Queue semantics on ordinary rows of the relational `queue` table.
//!
//! A row moves through `queued` (`visibility_timeout` null or past) to `leased`
//! (`visibility_timeout` in the future) until it is deleted. Receivers select
//! candidates with `FOR UPDATE NOWAIT` inside a transaction, so a row contended by
//! another receiver is skipped for this cycle instead of blocking.

use super::errors::{MessagingError, MessagingResult};
use super::transport::{
    MessageReceipt, PublishOptions, QueueDefaults, QueueItem, QueueTransport, ReceiveOptions,
};
use crate::constants::{log_keys, queue_columns, tables};
use crate::database::{Dao, DatabaseConnection};
use crate::log_context;
use crate::logging::Logger;
use crate::query_builder::{BindValue, Criteria, Operator, Query, SortDirection, WhereField};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

const RECEIVE_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct DatabaseQueue {
    name: String,
    dao: Dao,
    defaults: QueueDefaults,
    logger: Arc<dyn Logger>,
}

impl DatabaseQueue {
    pub fn new(
        connection: Arc<DatabaseConnection>,
        name: &str,
        defaults: QueueDefaults,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            name: defaults.queue_name(name),
            dao: Dao::new(connection, tables::QUEUE),
            defaults,
            logger,
        }
    }

    async fn receive_once(&self, limit: u32, visibility_timeout: u64) -> MessagingResult<Vec<QueueItem>> {
        let now = Utc::now();
        let query = receive_query(&self.name, limit, now);
        let sql = format!("{} FOR UPDATE NOWAIT", query.get_select_query(true));
        let params = query.get_bind_params();

        let mut tx = self.dao.begin_transaction().await?;
        let rows = match tx.fetch_rows(&sql, &params).await {
            Ok(rows) => rows,
            Err(e) if e.is_lock_not_available() => {
                tx.rollback().await?;
                self.logger.debug(
                    "Queue rows locked by another receiver",
                    &log_context! { log_keys::QUEUE => self.name },
                );
                return Ok(Vec::new());
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    self.logger.warning(
                        "Rollback after failed receive did not succeed",
                        &log_context! {
                            log_keys::QUEUE => self.name,
                            "error" => rollback_error.to_string(),
                        },
                    );
                }
                return Err(e.into());
            }
        };

        if rows.is_empty() {
            tx.rollback().await?;
            return Ok(Vec::new());
        }

        let lease_until = now + ChronoDuration::seconds(visibility_timeout as i64);
        let lease_sql = format!(
            "UPDATE {} SET {} = $1 WHERE {} = $2",
            tables::QUEUE,
            queue_columns::VISIBILITY_TIMEOUT,
            queue_columns::MESSAGE_ID
        );

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(message_id) = row.get(queue_columns::MESSAGE_ID).and_then(Value::as_i64) else {
                continue;
            };

            let params = [BindValue::Timestamp(lease_until), BindValue::Int(message_id)];
            match tx.execute(&lease_sql, &params).await {
                Ok(1) => {}
                Ok(_) => {
                    tx.rollback().await?;
                    return Err(MessagingError::update(&self.name, message_id));
                }
                Err(e) => {
                    if let Err(rollback_error) = tx.rollback().await {
                        self.logger.warning(
                            "Rollback after failed lease did not succeed",
                            &log_context! {
                                log_keys::QUEUE => self.name,
                                "error" => rollback_error.to_string(),
                            },
                        );
                    }
                    return Err(e.into());
                }
            }

            let body = self.decode_body(row.get(queue_columns::MESSAGE_BODY));
            items.push(QueueItem::new(message_id, body));
        }

        tx.commit().await?;
        Ok(items)
    }

    fn decode_body(&self, raw: Option<&Value>) -> Value {
        match raw {
            Some(Value::String(text)) => match decode_message_body(text) {
                Some(body) => body,
                None => {
                    self.logger.warning(
                        "Queue message body is not valid JSON",
                        &log_context! { log_keys::QUEUE => self.name },
                    );
                    Value::String(text.clone())
                }
            },
            Some(other) => other.clone(),
            None => Value::Null,
        }
    }
}

#[async_trait]
impl QueueTransport for DatabaseQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, message: &Value, options: &PublishOptions) -> MessagingResult<i64> {
        let body = serde_json::to_string(message)?;
        let query = publish_query(&self.name, body, self.defaults.delay(options), Utc::now());

        let rows = self.dao.insert_returning(&query).await?;
        let message_id = rows
            .first()
            .and_then(|row| row.get(queue_columns::MESSAGE_ID))
            .and_then(Value::as_i64)
            .ok_or_else(|| MessagingError::publish(&self.name, "no message id returned"))?;

        self.logger.debug(
            "Message published",
            &log_context! { log_keys::QUEUE => self.name, log_keys::MESSAGE_ID => message_id },
        );
        Ok(message_id)
    }

    async fn receive(&self, options: &ReceiveOptions) -> MessagingResult<Vec<QueueItem>> {
        let limit = self.defaults.receive_limit(options);
        let visibility_timeout = self.defaults.visibility_timeout(options);
        let deadline = Instant::now() + Duration::from_secs(options.receive_wait_time.unwrap_or(0));

        loop {
            let items = self.receive_once(limit, visibility_timeout).await?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !items.is_empty() || remaining.is_zero() {
                return Ok(items);
            }
            tokio::time::sleep(remaining.min(RECEIVE_POLL_INTERVAL)).await;
        }
    }

    async fn delete(&self, receipt: &MessageReceipt) -> MessagingResult<()> {
        let message_id = match receipt {
            MessageReceipt::Id(id) => *id,
            MessageReceipt::Handle(_) => {
                return Err(MessagingError::unsupported_operation("delete by receipt handle"))
            }
        };

        let sql = format!(
            "DELETE FROM {} WHERE {} = $1 AND {} = $2",
            tables::QUEUE,
            queue_columns::NAME,
            queue_columns::MESSAGE_ID
        );
        let params = [BindValue::Text(self.name.clone()), BindValue::Int(message_id)];

        match self.dao.execute(&sql, &params).await? {
            1 => Ok(()),
            _ => Err(MessagingError::delete(&self.name, message_id)),
        }
    }

    async fn destroy(&self) -> MessagingResult<u64> {
        let sql = format!("DELETE FROM {} WHERE {} = $1", tables::QUEUE, queue_columns::NAME);
        let removed = self
            .dao
            .execute(&sql, &[BindValue::Text(self.name.clone())])
            .await?;

        self.logger.info(
            "Queue destroyed",
            &log_context! { log_keys::QUEUE => self.name, "removed" => removed },
        );
        Ok(removed)
    }
}

/// Insert of one queue row; a zero delay leaves the row visible immediately
fn publish_query(queue: &str, body: String, delay_seconds: u64, now: DateTime<Utc>) -> Query {
    let mut row = Map::new();
    row.insert(queue_columns::NAME.to_string(), Value::String(queue.to_string()));
    row.insert(queue_columns::MESSAGE_BODY.to_string(), Value::String(body));
    if delay_seconds > 0 {
        let visible_at = now + ChronoDuration::seconds(delay_seconds as i64);
        row.insert(
            queue_columns::VISIBILITY_TIMEOUT.to_string(),
            Value::String(visible_at.to_rfc3339()),
        );
    }

    Query::relational(tables::QUEUE)
        .set_insert_data(row)
        .returning(&[queue_columns::MESSAGE_ID])
}

/// Visible rows of one queue, oldest first
fn receive_query(queue: &str, limit: u32, now: DateTime<Utc>) -> Query {
    Query::relational(tables::QUEUE)
        .add_select_field(queue_columns::MESSAGE_ID)
        .add_select_field(queue_columns::MESSAGE_BODY)
        .add_condition(queue_columns::NAME, queue)
        .add_condition_or(vec![
            WhereField::new(queue_columns::VISIBILITY_TIMEOUT, Operator::Is, Criteria::Null),
            WhereField::new(
                queue_columns::VISIBILITY_TIMEOUT,
                Operator::LowerThanEquals,
                BindValue::Timestamp(now),
            ),
        ])
        .add_sort(queue_columns::MESSAGE_ID, SortDirection::Ascending)
        .set_limit(limit)
}

/// Parse a stored body, unwrapping one extra level when the document carries a
/// JSON-encoded `message_body` string
fn decode_message_body(text: &str) -> Option<Value> {
    let body: Value = serde_json::from_str(text).ok()?;
    let nested = body
        .get(queue_columns::MESSAGE_BODY)
        .and_then(Value::as_str)
        .and_then(|inner| serde_json::from_str::<Value>(inner).ok());
    Some(nested.unwrap_or(body))
}
