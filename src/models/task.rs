use serde::{Deserialize, Deserializer, Serialize};

use crate::deadline::{normalize_priority, normalize_time, END_OF_DAY};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "To do")]
    #[default]
    Todo,
    #[serde(rename = "In progress")]
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "To do",
            TaskStatus::InProgress => "In progress",
            TaskStatus::Completed => "Completed",
        }
    }

    /// Unknown values fall back to "To do".
    pub fn parse_or_todo(raw: &str) -> Self {
        match raw {
            "In progress" => TaskStatus::InProgress,
            "Completed" => TaskStatus::Completed,
            _ => TaskStatus::Todo,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

/// Raw shape of a task as persisted. Legacy documents may lack `due_time`
/// and `priority`, hold nulls, or carry values that no longer validate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDocument {
    pub task_id: String,
    pub user_id: String,
    pub module_name: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub due_date: String,
    #[serde(default)]
    pub due_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: TaskStatus,
    pub created_at: String,
    #[serde(default)]
    pub priority: Option<String>,
}

/// Null or unrecognized statuses read as "To do".
fn lenient_status<'de, D>(deserializer: D) -> Result<TaskStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .map(TaskStatus::parse_or_todo)
        .unwrap_or_default())
}

/// A task after the storage boundary: due time and priority are normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub task_id: String,
    pub user_id: String,
    pub module_name: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: String,
    pub due_time: String,
    pub status: TaskStatus,
    pub created_at: String,
    pub priority: Priority,
}

impl From<TaskDocument> for Task {
    fn from(doc: TaskDocument) -> Self {
        Task {
            due_time: normalize_time(doc.due_time.as_deref().unwrap_or(END_OF_DAY)),
            priority: normalize_priority(doc.priority.as_deref().unwrap_or_default()),
            task_id: doc.task_id,
            user_id: doc.user_id,
            module_name: doc.module_name,
            title: doc.title,
            description: doc.description,
            due_date: doc.due_date,
            status: doc.status,
            created_at: doc.created_at,
        }
    }
}

impl From<&Task> for TaskDocument {
    fn from(task: &Task) -> Self {
        TaskDocument {
            task_id: task.task_id.clone(),
            user_id: task.user_id.clone(),
            module_name: task.module_name.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            due_date: task.due_date.clone(),
            due_time: Some(task.due_time.clone()),
            status: task.status,
            created_at: task.created_at.clone(),
            priority: Some(task.priority.as_str().to_string()),
        }
    }
}

/// Fields replaced by a full edit. Status is deliberately absent.
#[derive(Debug, Clone)]
pub struct TaskChanges {
    pub module_name: String,
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub due_time: String,
    pub priority: Priority,
}

impl TaskChanges {
    pub fn apply_to(&self, doc: &mut TaskDocument) {
        doc.module_name = self.module_name.clone();
        doc.title = self.title.clone();
        doc.description = Some(self.description.clone());
        doc.due_date = self.due_date.clone();
        doc.due_time = Some(self.due_time.clone());
        doc.priority = Some(self.priority.as_str().to_string());
    }
}
