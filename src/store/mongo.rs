use async_trait::async_trait;
use futures::stream::TryStreamExt;
use log::info;
use mongodb::{
    bson::doc,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::ClientOptions,
    Client, Collection, Database,
};

use crate::error::StoreError;
use crate::migrations;
use crate::models::{Task, TaskChanges, TaskDocument, TaskStatus, User};

use super::Store;

const DUPLICATE_KEY: i32 = 11000;

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        info!("Connected to MongoDB database {}", db_name);
        Ok(MongoStore {
            db: client.database(db_name),
        })
    }

    fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    fn tasks(&self) -> Collection<TaskDocument> {
        self.db.collection("tasks")
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl Store for MongoStore {
    async fn migrate(&self) -> Result<usize, StoreError> {
        migrations::run(&self.db).await
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        match self.users().insert_one(user).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::DuplicateUsername),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users().find_one(doc! { "username": username }).await?)
    }

    async fn tasks_for_owner(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
        let docs: Vec<TaskDocument> = self
            .tasks()
            .find(doc! { "user_id": user_id })
            .sort(doc! { "due_date": 1, "due_time": 1, "created_at": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(docs.into_iter().map(Task::from).collect())
    }

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.tasks().insert_one(TaskDocument::from(task)).await?;
        Ok(())
    }

    async fn update_task(
        &self,
        task_id: &str,
        user_id: &str,
        changes: &TaskChanges,
    ) -> Result<bool, StoreError> {
        let update = doc! {
            "$set": {
                "module_name": changes.module_name.as_str(),
                "title": changes.title.as_str(),
                "description": changes.description.as_str(),
                "due_date": changes.due_date.as_str(),
                "due_time": changes.due_time.as_str(),
                "priority": changes.priority.as_str(),
            }
        };
        let res = self
            .tasks()
            .update_one(doc! { "task_id": task_id, "user_id": user_id }, update)
            .await?;
        Ok(res.matched_count > 0)
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        user_id: &str,
        status: TaskStatus,
    ) -> Result<bool, StoreError> {
        let res = self
            .tasks()
            .update_one(
                doc! { "task_id": task_id, "user_id": user_id },
                doc! { "$set": { "status": status.as_str() } },
            )
            .await?;
        Ok(res.matched_count > 0)
    }

    async fn delete_task(&self, task_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let res = self
            .tasks()
            .delete_one(doc! { "task_id": task_id, "user_id": user_id })
            .await?;
        Ok(res.deleted_count > 0)
    }
}
