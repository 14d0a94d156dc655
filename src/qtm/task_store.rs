//! Task and subtask persistence.

use super::errors::{TaskError, TaskResult};
use super::task::{Subtask, Task, TaskStatus};
use crate::constants::{task_keys, tables, JSONB_FIELD_NAME};
use crate::database::{Dao, DatabaseConnection, DatabaseError};
use crate::log_context;
use crate::logging::Logger;
use crate::query_builder::{document_path, BindValue, FieldFunction, Query, SelectField};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Storage of tasks and their outstanding subtasks.
///
/// A task is complete when it is enabled and has no subtasks left.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn save_task(&self, task: &Task) -> TaskResult<()>;

    async fn add_subtask(&self, task_id: &str, message_id: i64) -> TaskResult<()>;

    async fn add_subtasks(&self, task_id: &str, message_ids: &[i64]) -> TaskResult<()>;

    /// Removing a subtask that does not exist is not an error
    async fn remove_subtask(&self, task_id: &str, message_id: i64) -> TaskResult<()>;

    async fn find_task(&self, task_id: &str) -> TaskResult<Option<Task>>;

    async fn count_subtasks(&self, task_id: &str) -> TaskResult<u64>;

    async fn update_status(&self, task_id: &str, status: TaskStatus) -> TaskResult<()>;

    /// Delete a task and all of its subtasks
    async fn delete_task(&self, task_id: &str) -> TaskResult<()>;

    /// Delete the task if it is complete and return it.
    ///
    /// Check and delete happen as one step, so of several concurrent callers at
    /// most one receives the task.
    async fn claim_completed_task(&self, task_id: &str) -> TaskResult<Option<Task>>;

    async fn is_task_complete(&self, task: &Task) -> TaskResult<bool> {
        Ok(task.is_enabled() && self.count_subtasks(&task.task_id).await? == 0)
    }
}

/// [`TaskStore`] over the JSONB `tasks` and `sub_tasks` tables
pub struct PgTaskStore {
    tasks: Dao,
    sub_tasks: Dao,
    logger: Arc<dyn Logger>,
}

impl PgTaskStore {
    pub fn new(connection: Arc<DatabaseConnection>, logger: Arc<dyn Logger>) -> Self {
        Self {
            tasks: Dao::new(connection.clone(), tables::TASKS),
            sub_tasks: Dao::new(connection, tables::SUB_TASKS),
            logger,
        }
    }

    fn task_query(task_id: &str) -> Query {
        Query::document(tables::TASKS).add_condition(task_keys::TASK_ID, task_id)
    }

    fn subtasks_query(task_id: &str) -> Query {
        Query::document(tables::SUB_TASKS).add_condition(task_keys::TASK_ID, task_id)
    }
}

/// Keep connection failures classifiable; wrap everything else with task context
fn wrap(err: DatabaseError, wrap_with: impl FnOnce(String) -> TaskError) -> TaskError {
    if err.is_connection_broken() {
        TaskError::Database(err)
    } else {
        wrap_with(err.to_string())
    }
}

fn to_document<T: Serialize>(value: &T) -> Result<Map<String, Value>, DatabaseError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::statement(
            "serialize",
            format!("expected a JSON object, got {other}"),
        )),
    }
}

/// Single-statement completion claim on the task row
fn claim_sql() -> String {
    let task_id = document_path(task_keys::TASK_ID, true);
    format!(
        "DELETE FROM {tasks} WHERE ({task_id}) = $1 AND ({status}) = '{enabled}' \
         AND NOT EXISTS (SELECT 1 FROM {sub_tasks} WHERE ({sub_tasks}.{task_id}) = $1) \
         RETURNING {data}",
        tasks = tables::TASKS,
        sub_tasks = tables::SUB_TASKS,
        task_id = task_id,
        status = document_path(task_keys::STATUS, true),
        enabled = TaskStatus::Enabled.as_str(),
        data = JSONB_FIELD_NAME,
    )
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn save_task(&self, task: &Task) -> TaskResult<()> {
        let document = to_document(task).map_err(|e| TaskError::task_save(&task.task_id, e.to_string()))?;
        let query = Query::document(tables::TASKS).set_insert_data(document);

        match self.tasks.insert(&query).await {
            Ok(0) => Err(TaskError::task_save(
                &task.task_id,
                DatabaseError::no_rows_affected("inserted").to_string(),
            )),
            Ok(_) => Ok(()),
            Err(e) => Err(wrap(e, |m| TaskError::task_save(&task.task_id, m))),
        }
    }

    async fn add_subtask(&self, task_id: &str, message_id: i64) -> TaskResult<()> {
        self.logger.debug(
            "Adding subtask",
            &log_context! { task_keys::TASK_ID => task_id, task_keys::MESSAGE_ID => message_id },
        );

        let subtask = Subtask {
            task_id: task_id.to_string(),
            message_id,
        };
        let document = to_document(&subtask).map_err(|e| TaskError::subtask_save(task_id, e.to_string()))?;
        let query = Query::document(tables::SUB_TASKS).set_insert_data(document);

        match self.sub_tasks.insert(&query).await {
            Ok(0) => Err(TaskError::subtask_save(
                task_id,
                DatabaseError::no_rows_affected("inserted").to_string(),
            )),
            Ok(_) => Ok(()),
            Err(e) => Err(wrap(e, |m| TaskError::subtask_save(task_id, m))),
        }
    }

    async fn add_subtasks(&self, task_id: &str, message_ids: &[i64]) -> TaskResult<()> {
        if message_ids.is_empty() {
            return Ok(());
        }

        let rows = message_ids
            .iter()
            .map(|&message_id| {
                to_document(&Subtask {
                    task_id: task_id.to_string(),
                    message_id,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TaskError::subtask_save(task_id, e.to_string()))?;
        let query = Query::document(tables::SUB_TASKS).set_bulk_insert_data(rows);

        match self.sub_tasks.insert_bulk(&query).await {
            Ok(inserted) if inserted == message_ids.len() as u64 => Ok(()),
            Ok(inserted) => Err(TaskError::subtask_save(
                task_id,
                format!("inserted {inserted} of {} subtasks", message_ids.len()),
            )),
            Err(e) => Err(wrap(e, |m| TaskError::subtask_save(task_id, m))),
        }
    }

    async fn remove_subtask(&self, task_id: &str, message_id: i64) -> TaskResult<()> {
        self.logger.debug(
            "Removing subtask",
            &log_context! { task_keys::TASK_ID => task_id, task_keys::MESSAGE_ID => message_id },
        );

        let query = Self::subtasks_query(task_id).add_condition(task_keys::MESSAGE_ID, message_id);
        self.sub_tasks
            .remove(&query)
            .await
            .map(|_| ())
            .map_err(|e| wrap(e, |m| TaskError::subtask_remove(task_id, message_id, m)))
    }

    async fn find_task(&self, task_id: &str) -> TaskResult<Option<Task>> {
        let Some(document) = self.tasks.find_one(&Self::task_query(task_id)).await? else {
            return Ok(None);
        };
        let task = serde_json::from_value(document).map_err(DatabaseError::from)?;
        Ok(Some(task))
    }

    async fn count_subtasks(&self, task_id: &str) -> TaskResult<u64> {
        let query = Self::subtasks_query(task_id).add_select_field_object(
            SelectField::new(task_keys::TASK_ID)
                .alias(task_keys::SUBTASK_COUNT)
                .function(FieldFunction::call("count")),
        );

        let count = self
            .sub_tasks
            .find_one(&query)
            .await?
            .and_then(|row| match row.get(task_keys::SUBTASK_COUNT) {
                Some(Value::Number(n)) => n.as_u64(),
                Some(Value::String(s)) => s.parse().ok(),
                _ => None,
            })
            .unwrap_or(0);
        Ok(count)
    }

    async fn update_status(&self, task_id: &str, status: TaskStatus) -> TaskResult<()> {
        self.logger.debug(
            "Updating task status",
            &log_context! { task_keys::TASK_ID => task_id, task_keys::STATUS => status.as_str() },
        );

        let query = Self::task_query(task_id).add_update_data(task_keys::STATUS, status.as_str());
        match self.tasks.update(&query).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(TaskError::status_update(
                task_id,
                self.tasks
                    .last_error_message()
                    .unwrap_or_else(|| "task not found".to_string()),
            )),
            Err(e) => Err(wrap(e, |m| TaskError::status_update(task_id, m))),
        }
    }

    async fn delete_task(&self, task_id: &str) -> TaskResult<()> {
        self.logger
            .debug("Deleting task", &log_context! { task_keys::TASK_ID => task_id });

        self.sub_tasks
            .remove(&Self::subtasks_query(task_id))
            .await
            .map_err(|e| wrap(e, |m| TaskError::task_delete(task_id, format!("subtasks: {m}"))))?;
        self.tasks
            .remove(&Self::task_query(task_id))
            .await
            .map_err(|e| wrap(e, |m| TaskError::task_delete(task_id, m)))?;
        Ok(())
    }

    async fn claim_completed_task(&self, task_id: &str) -> TaskResult<Option<Task>> {
        let rows = self
            .tasks
            .fetch_rows(&claim_sql(), &[BindValue::Text(task_id.to_string())])
            .await
            .map_err(|e| wrap(e, |m| TaskError::task_delete(task_id, m)))?;

        let Some(mut row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let document = row.remove(JSONB_FIELD_NAME).unwrap_or(Value::Null);
        let task = serde_json::from_value(document).map_err(DatabaseError::from)?;
        Ok(Some(task))
    }
}
