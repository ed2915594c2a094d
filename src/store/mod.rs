// src/store/mod.rs

mod memory;
mod mongo;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, StoreBackend};
use crate::error::StoreError;
use crate::models::{Task, TaskChanges, TaskStatus, User};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Persistence for users and their tasks. Every task operation is scoped by
/// owner; a mismatched owner behaves exactly like a missing task.
#[async_trait]
pub trait Store: Send + Sync {
    /// Brings the schema up to date. Returns how many migrations ran.
    async fn migrate(&self) -> Result<usize, StoreError>;

    /// Fails with [`StoreError::DuplicateUsername`] without writing anything
    /// when the username is taken.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// All of the owner's tasks ordered by due date, then due time, then
    /// creation order.
    async fn tasks_for_owner(&self, user_id: &str) -> Result<Vec<Task>, StoreError>;

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Returns `false` when no task with this id belongs to the owner.
    async fn update_task(
        &self,
        task_id: &str,
        user_id: &str,
        changes: &TaskChanges,
    ) -> Result<bool, StoreError>;

    /// Touches only the status field.
    async fn update_task_status(
        &self,
        task_id: &str,
        user_id: &str,
        status: TaskStatus,
    ) -> Result<bool, StoreError>;

    async fn delete_task(&self, task_id: &str, user_id: &str) -> Result<bool, StoreError>;
}

pub async fn connect(config: &Config) -> Result<Arc<dyn Store>, StoreError> {
    match (config.store_backend, config.mongo_uri.as_deref()) {
        (StoreBackend::Mongo, Some(uri)) => {
            Ok(Arc::new(MongoStore::connect(uri, &config.database_name).await?))
        }
        _ => Ok(Arc::new(MemoryStore::default())),
    }
}
