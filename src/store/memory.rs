use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::{Task, TaskChanges, TaskDocument, TaskStatus, User};

use super::Store;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    tasks: Vec<TaskDocument>,
}

/// Process-local store for development and tests. Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[async_trait]
impl Store for MemoryStore {
    async fn migrate(&self) -> Result<usize, StoreError> {
        Ok(0)
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::DuplicateUsername);
        }
        tables.users.push(user.clone());
        Ok(())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn tasks_for_owner(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
        let tables = self.tables.read().await;
        let mut docs: Vec<TaskDocument> = tables
            .tasks
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        // Stable: equal deadlines keep insertion order.
        docs.sort_by(|a, b| (&a.due_date, &a.due_time).cmp(&(&b.due_date, &b.due_time)));
        Ok(docs.into_iter().map(Task::from).collect())
    }

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.tables.write().await.tasks.push(TaskDocument::from(task));
        Ok(())
    }

    async fn update_task(
        &self,
        task_id: &str,
        user_id: &str,
        changes: &TaskChanges,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables
            .tasks
            .iter_mut()
            .find(|t| t.task_id == task_id && t.user_id == user_id)
        {
            Some(doc) => {
                changes.apply_to(doc);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        user_id: &str,
        status: TaskStatus,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables
            .tasks
            .iter_mut()
            .find(|t| t.task_id == task_id && t.user_id == user_id)
        {
            Some(doc) => {
                doc.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_task(&self, task_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.tasks.len();
        tables
            .tasks
            .retain(|t| !(t.task_id == task_id && t.user_id == user_id));
        Ok(tables.tasks.len() < before)
    }
}
