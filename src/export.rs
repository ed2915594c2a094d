// src/export.rs

use actix_web::{http::header, web, HttpResponse};
use chrono::NaiveDateTime;
use log::info;

use crate::app_state::AppState;
use crate::auth::CurrentUser;
use crate::dashboard_data::{format_iso_datetime, view_task};
use crate::deadline::{local_now, EscalationMode};
use crate::error::AppError;
use crate::models::Task;

pub const CSV_HEADER: &str = "Module,Title,Description,Deadline,Status,Priority,Created At";

/// Quotes fields containing separators, quotes or line breaks; embedded
/// quotes are doubled.
fn escape_csv(field: &str) -> String {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// One row per task, in the order given. Priority is the effective one.
pub fn render_csv(tasks: &[Task], now: NaiveDateTime, mode: EscalationMode) -> String {
    let mut csv_content = String::new();
    csv_content.push_str(CSV_HEADER);
    csv_content.push_str("\r\n");

    for task in tasks {
        let view = view_task(task, now, now.date(), mode);
        let created_at = format_iso_datetime(&task.created_at);
        let row: [&str; 7] = [
            task.module_name.as_str(),
            task.title.as_str(),
            task.description.as_deref().unwrap_or(""),
            view.deadline_display.as_str(),
            task.status.as_str(),
            view.priority.as_str(),
            created_at.as_str(),
        ];
        let cells: Vec<String> = row.iter().map(|cell| escape_csv(cell)).collect();
        csv_content.push_str(&cells.join(","));
        csv_content.push_str("\r\n");
    }
    csv_content
}

pub fn export_filename(now: NaiveDateTime) -> String {
    format!("tasks_{}.csv", now.format("%Y%m%d_%H%M"))
}

/// GET /export/csv
pub async fn export_csv(
    user: CurrentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let tasks = state.store.tasks_for_owner(&user.user_id).await?;
    let now = local_now();
    let body = render_csv(&tasks, now, state.config.escalation);
    info!("Exported {} task(s) for {}", tasks.len(), user.user_id);

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment;filename={}", export_filename(now)),
        ))
        .body(body))
}
