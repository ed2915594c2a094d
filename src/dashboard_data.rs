// src/dashboard_data.rs

use std::collections::BTreeMap;

use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::app_state::AppState;
use crate::auth::CurrentUser;
use crate::deadline::{
    classify_deadline, effective_priority, local_now, normalize_time, parse_due_date,
    parse_due_moment, DeadlineState, EscalationMode,
};
use crate::error::AppError;
use crate::models::{Priority, Task, TaskStatus};

/// A task plus everything derived from it at read time. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub task_id: String,
    pub module_name: String,
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub due_time: String,
    pub status: TaskStatus,
    pub created_at: String,
    pub deadline_state: DeadlineState,
    /// Effective priority, possibly escalated.
    pub priority: Priority,
    pub priority_stored: Priority,
    pub priority_auto: bool,
    pub due_date_display: String,
    pub deadline_display: String,
    pub created_at_display: String,
    /// `due_date` + "T" + `due_time`, sortable as a string.
    pub due_iso: String,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub overdue: usize,
    /// Tasks due today or within the due-soon window.
    pub due_soon: usize,
    pub completion_percent: u32,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ModuleSummary {
    pub module: String,
    pub total: usize,
    pub completed: usize,
    pub percent: u32,
}

/// Non-completed tasks grouped by urgency for the warning banner.
#[derive(Debug, Default, Serialize)]
pub struct Attention {
    pub overdue: Vec<TaskView>,
    pub due_today: Vec<TaskView>,
    pub due_soon: Vec<TaskView>,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub tasks: Vec<TaskView>,
    pub unique_modules: Vec<String>,
    pub module_summary: Vec<ModuleSummary>,
    pub attention: Attention,
    pub stats: DashboardStats,
}

#[derive(Serialize)]
struct DashboardPage<'a> {
    username: &'a str,
    #[serde(flatten)]
    dashboard: Dashboard,
}

/// Rounded percentage, half-to-even, 0 when there is nothing to complete.
pub fn completion_percent(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (completed as f64 / total as f64 * 100.0).round_ties_even() as u32
}

/// `YYYY-MM-DD` as `dd/mm/yyyy`; anything unparseable is shown as-is.
pub fn format_ymd_date(raw: &str) -> String {
    match parse_due_date(raw) {
        Some(date) => date.format("%d/%m/%Y").to_string(),
        None => raw.to_string(),
    }
}

/// ISO timestamp as `dd/mm/yyyy HH:MM`; anything unparseable is shown as-is.
pub fn format_iso_datetime(raw: &str) -> String {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    if raw.is_empty() {
        return String::new();
    }
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| raw.to_string())
}

pub fn view_task(
    task: &Task,
    now: NaiveDateTime,
    today: NaiveDate,
    mode: EscalationMode,
) -> TaskView {
    let due_time = normalize_time(&task.due_time);
    let due = parse_due_moment(&task.due_date, &due_time);
    let deadline_state = classify_deadline(due, task.status, now, today);
    let (priority, priority_auto) = effective_priority(
        &task.due_date,
        &due_time,
        task.status,
        task.priority,
        now,
        today,
        mode,
    );
    let due_date_display = format_ymd_date(&task.due_date);

    TaskView {
        task_id: task.task_id.clone(),
        module_name: task.module_name.clone(),
        title: task.title.clone(),
        description: task.description.clone().unwrap_or_default(),
        due_date: task.due_date.clone(),
        status: task.status,
        created_at: task.created_at.clone(),
        deadline_state,
        priority,
        priority_stored: task.priority,
        priority_auto,
        deadline_display: format!("{} {}", due_date_display, due_time),
        due_date_display,
        created_at_display: format_iso_datetime(&task.created_at),
        due_iso: format!("{}T{}", task.due_date, due_time),
        due_time,
    }
}

/// Derives the full dashboard from the owner's tasks, already in deadline
/// order. The order of `tasks` is preserved in every list produced.
pub fn build_dashboard(tasks: &[Task], now: NaiveDateTime, mode: EscalationMode) -> Dashboard {
    let today = now.date();
    let mut stats = DashboardStats::default();
    let mut modules: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    let mut attention = Attention::default();
    let mut views = Vec::with_capacity(tasks.len());

    for task in tasks {
        stats.total += 1;

        let module_name = task.module_name.trim();
        if !module_name.is_empty() {
            let entry = modules.entry(module_name.to_string()).or_insert((0, 0));
            entry.0 += 1;
            if task.status == TaskStatus::Completed {
                entry.1 += 1;
            }
        }

        match task.status {
            TaskStatus::Todo => stats.todo += 1,
            TaskStatus::InProgress => stats.in_progress += 1,
            TaskStatus::Completed => stats.completed += 1,
        }

        let view = view_task(task, now, today, mode);
        match view.deadline_state {
            DeadlineState::Overdue => {
                stats.overdue += 1;
                attention.overdue.push(view.clone());
            }
            DeadlineState::DueToday => {
                stats.due_soon += 1;
                attention.due_today.push(view.clone());
            }
            DeadlineState::DueSoon => {
                stats.due_soon += 1;
                attention.due_soon.push(view.clone());
            }
            DeadlineState::Completed | DeadlineState::Normal => {}
        }
        views.push(view);
    }

    stats.completion_percent = completion_percent(stats.completed, stats.total);

    let module_summary = modules
        .iter()
        .map(|(module, &(total, completed))| ModuleSummary {
            module: module.clone(),
            total,
            completed,
            percent: completion_percent(completed, total),
        })
        .collect();

    Dashboard {
        tasks: views,
        unique_modules: modules.into_keys().collect(),
        module_summary,
        attention,
        stats,
    }
}

/// GET /dashboard
pub async fn get_dashboard(
    user: CurrentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let tasks = state.store.tasks_for_owner(&user.user_id).await?;
    let dashboard = build_dashboard(&tasks, local_now(), state.config.escalation);
    Ok(HttpResponse::Ok().json(DashboardPage {
        username: &user.username,
        dashboard,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        parse_due_moment("2025-03-10", "12:00").unwrap()
    }

    fn task(id: &str, module: &str, due_date: &str, due_time: &str, status: TaskStatus) -> Task {
        Task {
            task_id: id.to_string(),
            user_id: "u1".to_string(),
            module_name: module.to_string(),
            title: format!("Task {id}"),
            description: None,
            due_date: due_date.to_string(),
            due_time: due_time.to_string(),
            status,
            created_at: "2025-03-01T08:30:15.123456".to_string(),
            priority: Priority::Low,
        }
    }

    #[test]
    fn completion_percent_rounds_and_handles_zero() {
        assert_eq!(completion_percent(0, 0), 0);
        assert_eq!(completion_percent(1, 3), 33);
        assert_eq!(completion_percent(2, 3), 67);
        assert_eq!(completion_percent(3, 3), 100);
        // 12.5 rounds half-to-even
        assert_eq!(completion_percent(1, 8), 12);
        assert_eq!(completion_percent(3, 8), 38);
    }

    #[test]
    fn empty_dashboard() {
        let dashboard = build_dashboard(&[], now(), EscalationMode::Overwrite);
        assert!(dashboard.tasks.is_empty());
        assert!(dashboard.module_summary.is_empty());
        assert_eq!(dashboard.stats, DashboardStats::default());
    }

    #[test]
    fn essay_due_in_two_days_escalates_to_medium() {
        let essay = Task {
            title: "Essay".to_string(),
            ..task("t1", "CS101", "2025-03-12", "10:00", TaskStatus::Todo)
        };
        let dashboard = build_dashboard(&[essay], now(), EscalationMode::Overwrite);
        let view = &dashboard.tasks[0];
        assert_eq!(view.deadline_state, DeadlineState::DueSoon);
        assert_eq!(view.priority, Priority::Medium);
        assert_eq!(view.priority_stored, Priority::Low);
        assert!(view.priority_auto);
        assert_eq!(dashboard.stats.due_soon, 1);
        assert_eq!(dashboard.attention.due_soon.len(), 1);
    }

    #[test]
    fn counters_and_attention_buckets() {
        let tasks = vec![
            task("late", "CS101", "2025-03-09", "10:00", TaskStatus::Todo),
            task("missed-this-morning", "CS101", "2025-03-10", "09:00", TaskStatus::InProgress),
            task("tonight", "MA201", "2025-03-10", "20:00", TaskStatus::Todo),
            task("soon", "MA201", "2025-03-12", "10:00", TaskStatus::InProgress),
            task("done-late", "MA201", "2025-03-01", "10:00", TaskStatus::Completed),
            task("later", "PH110", "2025-04-01", "10:00", TaskStatus::Todo),
        ];
        let dashboard = build_dashboard(&tasks, now(), EscalationMode::Overwrite);

        assert_eq!(
            dashboard.stats,
            DashboardStats {
                total: 6,
                todo: 3,
                in_progress: 2,
                completed: 1,
                overdue: 2,
                due_soon: 2,
                completion_percent: 17,
            }
        );

        let ids = |views: &[TaskView]| views.iter().map(|v| v.task_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&dashboard.attention.overdue), ["late", "missed-this-morning"]);
        assert_eq!(ids(&dashboard.attention.due_today), ["tonight"]);
        assert_eq!(ids(&dashboard.attention.due_soon), ["soon"]);
        assert_eq!(
            ids(&dashboard.tasks),
            ["late", "missed-this-morning", "tonight", "soon", "done-late", "later"]
        );

        let done = &dashboard.tasks[4];
        assert_eq!(done.deadline_state, DeadlineState::Completed);
        assert_eq!((done.priority, done.priority_auto), (Priority::Low, false));
    }

    #[test]
    fn module_summary_is_sorted_and_skips_blank_names() {
        let tasks = vec![
            task("1", "MA201", "2025-04-01", "10:00", TaskStatus::Completed),
            task("2", " CS101 ", "2025-04-02", "10:00", TaskStatus::Todo),
            task("3", "CS101", "2025-04-03", "10:00", TaskStatus::Completed),
            task("4", "   ", "2025-04-04", "10:00", TaskStatus::Completed),
            task("5", "CS101", "2025-04-05", "10:00", TaskStatus::InProgress),
        ];
        let dashboard = build_dashboard(&tasks, now(), EscalationMode::Overwrite);

        assert_eq!(
            dashboard.module_summary,
            vec![
                ModuleSummary { module: "CS101".into(), total: 3, completed: 1, percent: 33 },
                ModuleSummary { module: "MA201".into(), total: 1, completed: 1, percent: 100 },
            ]
        );
        assert_eq!(dashboard.unique_modules, ["CS101", "MA201"]);

        let named = tasks.iter().filter(|t| !t.module_name.trim().is_empty()).count();
        let summed: usize = dashboard.module_summary.iter().map(|m| m.total).sum();
        assert_eq!(summed, named);
        assert_eq!(dashboard.stats.total, 5);
        assert_eq!(dashboard.stats.completed, 3);
    }

    #[test]
    fn display_fields() {
        let mut t = task("1", "CS101", "2025-03-14", "garbage", TaskStatus::Todo);
        t.description = Some("Read chapter 4".into());
        let view = view_task(&t, now(), now().date(), EscalationMode::Overwrite);
        assert_eq!(view.due_time, "23:59");
        assert_eq!(view.due_date_display, "14/03/2025");
        assert_eq!(view.deadline_display, "14/03/2025 23:59");
        assert_eq!(view.created_at_display, "01/03/2025 08:30");
        assert_eq!(view.due_iso, "2025-03-14T23:59");
        assert_eq!(view.description, "Read chapter 4");
    }

    #[test]
    fn unparseable_values_are_displayed_raw() {
        assert_eq!(format_ymd_date("next week"), "next week");
        assert_eq!(format_ymd_date("2025-3-1"), "2025-3-1");
        assert_eq!(format_ymd_date(""), "");
        assert_eq!(format_iso_datetime(""), "");
        assert_eq!(format_iso_datetime("yesterday"), "yesterday");
        assert_eq!(format_iso_datetime("2025-03-01 07:05:00"), "01/03/2025 07:05");
        assert_eq!(format_iso_datetime("2025-03-01"), "01/03/2025 00:00");

        let t = task("1", "CS101", "someday", "10:00", TaskStatus::Todo);
        let view = view_task(&t, now(), now().date(), EscalationMode::Overwrite);
        assert_eq!(view.deadline_state, DeadlineState::Normal);
        assert_eq!(view.deadline_display, "someday 10:00");
        assert!(!view.priority_auto);
    }

    #[test]
    fn max_mode_flows_through_views() {
        let mut t = task("1", "CS101", "2025-03-12", "10:00", TaskStatus::Todo);
        t.priority = Priority::High;
        let overwrite = build_dashboard(std::slice::from_ref(&t), now(), EscalationMode::Overwrite);
        assert_eq!(overwrite.tasks[0].priority, Priority::Medium);
        let max = build_dashboard(&[t], now(), EscalationMode::Max);
        assert_eq!(max.tasks[0].priority, Priority::High);
        assert!(!max.tasks[0].priority_auto);
    }
}
