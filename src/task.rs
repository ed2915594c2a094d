// src/task.rs

use actix_web::{http::StatusCode, web, HttpResponse};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::CurrentUser;
use crate::deadline::{
    iso_timestamp, local_now, normalize_priority, normalize_time, parse_due_moment,
};
use crate::error::{AppError, Notice};
use crate::models::{Task, TaskChanges, TaskStatus};

const INVALID_DEADLINE: &str = "Invalid deadline. Please use the date/time pickers.";

/// Request payload for creating or editing a task. Every field is optional
/// on the wire so that missing values surface as notices, not 400s from the
/// JSON extractor.
#[derive(Debug, Default, Deserialize)]
pub struct TaskForm {
    #[serde(default)]
    pub module_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub due_time: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: String,
}

impl TaskForm {
    /// Trims and normalizes the submission. A bad time or priority is
    /// replaced by its default; missing required fields or an unparseable
    /// date reject the whole form.
    pub fn validate(self, missing_fields: &'static str) -> Result<TaskChanges, &'static str> {
        let module_name = self.module_name.trim().to_string();
        let title = self.title.trim().to_string();
        let due_date = self.due_date.trim().to_string();
        let due_time = normalize_time(self.due_time.trim());

        if module_name.is_empty() || title.is_empty() || due_date.is_empty() {
            return Err(missing_fields);
        }
        if parse_due_moment(&due_date, &due_time).is_none() {
            return Err(INVALID_DEADLINE);
        }

        Ok(TaskChanges {
            module_name,
            title,
            description: self.description.trim().to_string(),
            due_date,
            due_time,
            priority: normalize_priority(self.priority.trim()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    #[serde(default)]
    pub status: String,
}

#[derive(Serialize)]
struct CreatedTask {
    #[serde(flatten)]
    notice: Notice,
    task_id: String,
}

fn rejected(notice: &str) -> HttpResponse {
    Notice::new(notice, "/dashboard").respond(StatusCode::BAD_REQUEST)
}

fn not_permitted(action: &str) -> HttpResponse {
    Notice::new(
        format!("Task not found or you don't have permission to {} it.", action),
        "/dashboard",
    )
    .respond(StatusCode::NOT_FOUND)
}

/// POST /tasks
pub async fn create_task(
    user: CurrentUser,
    data: web::Data<AppState>,
    payload: web::Json<TaskForm>,
) -> Result<HttpResponse, AppError> {
    debug!("create_task for {} with payload {:?}", user.user_id, payload);
    let changes = match payload.into_inner().validate("Module, Title and Due Date are required.") {
        Ok(changes) => changes,
        Err(notice) => return Ok(rejected(notice)),
    };

    let new_task = Task {
        task_id: Uuid::new_v4().to_string(),
        user_id: user.user_id,
        module_name: changes.module_name,
        title: changes.title,
        description: Some(changes.description),
        due_date: changes.due_date,
        due_time: changes.due_time,
        status: TaskStatus::Todo,
        created_at: iso_timestamp(local_now()),
        priority: changes.priority,
    };
    data.store.insert_task(&new_task).await?;
    info!("Task created: {}", new_task.task_id);

    Ok(HttpResponse::Created().json(CreatedTask {
        notice: Notice::new("Task added!", "/dashboard"),
        task_id: new_task.task_id,
    }))
}

/// PUT /tasks/{task_id}
pub async fn edit_task(
    user: CurrentUser,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
    payload: web::Json<TaskForm>,
) -> Result<HttpResponse, AppError> {
    let changes = match payload
        .into_inner()
        .validate("Module, Title and Due Date are required to edit a task.")
    {
        Ok(changes) => changes,
        Err(notice) => return Ok(rejected(notice)),
    };

    if !data.store.update_task(&task_id, &user.user_id, &changes).await? {
        debug!("edit_task: {} not owned by {}", task_id, user.user_id);
        return Ok(not_permitted("edit"));
    }
    info!("Task updated: {}", task_id);
    Ok(Notice::new("Task updated successfully!", "/dashboard").respond(StatusCode::OK))
}

/// PUT /tasks/{task_id}/status
pub async fn update_status(
    user: CurrentUser,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
    payload: web::Json<StatusForm>,
) -> Result<HttpResponse, AppError> {
    let status = TaskStatus::parse_or_todo(&payload.status);
    if !data
        .store
        .update_task_status(&task_id, &user.user_id, status)
        .await?
    {
        return Ok(not_permitted("update"));
    }
    info!("Task {} status set to {}", task_id, status.as_str());
    Ok(Notice::new("Status updated.", "/dashboard").respond(StatusCode::OK))
}

/// DELETE /tasks/{task_id}
pub async fn delete_task(
    user: CurrentUser,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    if !data.store.delete_task(&task_id, &user.user_id).await? {
        return Ok(not_permitted("delete"));
    }
    info!("Task deleted: {}", task_id);
    Ok(Notice::new("Task deleted.", "/dashboard").respond(StatusCode::OK))
}
