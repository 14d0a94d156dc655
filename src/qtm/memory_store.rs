//! [`TaskStore`] kept in process memory, used for local runs and tests.

use super::errors::{TaskError, TaskResult};
use super::task::{Subtask, Task, TaskStatus};
use super::task_store::TaskStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct StoreState {
    tasks: HashMap<String, Task>,
    subtasks: Vec<Subtask>,
}

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    state: Mutex<StoreState>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_count(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn subtasks(&self, task_id: &str) -> Vec<Subtask> {
        self.state
            .lock()
            .subtasks
            .iter()
            .filter(|s| s.task_id == task_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save_task(&self, task: &Task) -> TaskResult<()> {
        let mut state = self.state.lock();
        if state.tasks.contains_key(&task.task_id) {
            return Err(TaskError::task_save(&task.task_id, "task already exists"));
        }
        state.tasks.insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn add_subtask(&self, task_id: &str, message_id: i64) -> TaskResult<()> {
        self.add_subtasks(task_id, &[message_id]).await
    }

    async fn add_subtasks(&self, task_id: &str, message_ids: &[i64]) -> TaskResult<()> {
        let mut state = self.state.lock();
        state.subtasks.extend(message_ids.iter().map(|&message_id| Subtask {
            task_id: task_id.to_string(),
            message_id,
        }));
        Ok(())
    }

    async fn remove_subtask(&self, task_id: &str, message_id: i64) -> TaskResult<()> {
        self.state
            .lock()
            .subtasks
            .retain(|s| !(s.task_id == task_id && s.message_id == message_id));
        Ok(())
    }

    async fn find_task(&self, task_id: &str) -> TaskResult<Option<Task>> {
        Ok(self.state.lock().tasks.get(task_id).cloned())
    }

    async fn count_subtasks(&self, task_id: &str) -> TaskResult<u64> {
        Ok(self
            .state
            .lock()
            .subtasks
            .iter()
            .filter(|s| s.task_id == task_id)
            .count() as u64)
    }

    async fn update_status(&self, task_id: &str, status: TaskStatus) -> TaskResult<()> {
        match self.state.lock().tasks.get_mut(task_id) {
            Some(task) => {
                task.status = status;
                Ok(())
            }
            None => Err(TaskError::status_update(task_id, "task not found")),
        }
    }

    async fn delete_task(&self, task_id: &str) -> TaskResult<()> {
        let mut state = self.state.lock();
        state.subtasks.retain(|s| s.task_id != task_id);
        state.tasks.remove(task_id);
        Ok(())
    }

    async fn claim_completed_task(&self, task_id: &str) -> TaskResult<Option<Task>> {
        let mut state = self.state.lock();
        let complete = state.tasks.get(task_id).is_some_and(Task::is_enabled)
            && !state.subtasks.iter().any(|s| s.task_id == task_id);
        if !complete {
            return Ok(None);
        }
        Ok(state.tasks.remove(task_id))
    }
}
