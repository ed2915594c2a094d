// src/deadline.rs
//
// Deadline arithmetic and priority escalation. Everything here is pure:
// callers pass in "now" and "today" so results are reproducible.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::Serialize;

use crate::models::{Priority, TaskStatus};

/// Fallback time-of-day for tasks with no usable due time.
pub const END_OF_DAY: &str = "23:59";

/// Tasks due within this many whole days count as "due soon".
pub const DUE_SOON_DAYS: i64 = 3;

static HHMM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("valid HH:MM pattern")
});

static YMD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("valid date pattern"));

/// Naive local wall-clock time. Handlers read it once per request.
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub fn iso_timestamp(moment: NaiveDateTime) -> String {
    moment.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineState {
    Completed,
    Overdue,
    DueToday,
    DueSoon,
    Normal,
}

/// How the deadline-derived priority combines with the stored one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EscalationMode {
    /// The computed priority replaces the stored one, even when lower.
    #[default]
    Overwrite,
    /// The higher of the stored and computed priority wins.
    Max,
}

impl EscalationMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Some(EscalationMode::Overwrite),
            "max" => Some(EscalationMode::Max),
            _ => None,
        }
    }
}

/// Returns `raw` when it is a 24-hour `HH:MM` value, otherwise end of day.
pub fn normalize_time(raw: &str) -> String {
    if HHMM.is_match(raw) {
        raw.to_string()
    } else {
        END_OF_DAY.to_string()
    }
}

pub fn normalize_priority(raw: &str) -> Priority {
    match raw {
        "Low" => Priority::Low,
        "High" => Priority::High,
        _ => Priority::Medium,
    }
}

/// Zero-padded `YYYY-MM-DD` only, so stored dates sort as strings.
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    if !YMD.is_match(raw) {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Combines a `YYYY-MM-DD` date with a time-of-day. The time is normalized
/// first, so only a missing or malformed date yields `None`.
pub fn parse_due_moment(due_date: &str, due_time: &str) -> Option<NaiveDateTime> {
    let date = parse_due_date(due_date)?;
    let time = NaiveTime::parse_from_str(&normalize_time(due_time), "%H:%M").ok()?;
    Some(NaiveDateTime::new(date, time))
}

fn days_until(due: NaiveDateTime, today: NaiveDate) -> i64 {
    (due.date() - today).num_days()
}

pub fn classify_deadline(
    due: Option<NaiveDateTime>,
    status: TaskStatus,
    now: NaiveDateTime,
    today: NaiveDate,
) -> DeadlineState {
    if status == TaskStatus::Completed {
        return DeadlineState::Completed;
    }
    let Some(due) = due else {
        return DeadlineState::Normal;
    };

    // Overdue is decided on the full timestamp and must be checked before
    // the whole-day comparisons.
    if due < now {
        DeadlineState::Overdue
    } else if due.date() == today {
        DeadlineState::DueToday
    } else if (1..=DUE_SOON_DAYS).contains(&days_until(due, today)) {
        DeadlineState::DueSoon
    } else {
        DeadlineState::Normal
    }
}

/// Priority shown to the user and whether it was raised automatically.
pub fn effective_priority(
    due_date: &str,
    due_time: &str,
    status: TaskStatus,
    stored: Priority,
    now: NaiveDateTime,
    today: NaiveDate,
    mode: EscalationMode,
) -> (Priority, bool) {
    if status == TaskStatus::Completed {
        return (stored, false);
    }
    let Some(due) = parse_due_moment(due_date, due_time) else {
        return (stored, false);
    };

    let computed = if due < now || due.date() == today {
        Priority::High
    } else if (1..=DUE_SOON_DAYS).contains(&days_until(due, today)) {
        Priority::Medium
    } else {
        return (stored, false);
    };

    match mode {
        EscalationMode::Overwrite => (computed, true),
        EscalationMode::Max if computed > stored => (computed, true),
        EscalationMode::Max => (stored, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        parse_due_moment(date, time).unwrap()
    }

    fn ymd(offset_days: i64, now: NaiveDateTime) -> String {
        (now.date() + Duration::days(offset_days))
            .format("%Y-%m-%d")
            .to_string()
    }

    /// Effective priority at 2025-03-10 12:00.
    fn escalate(
        date: &str,
        time: &str,
        status: TaskStatus,
        stored: Priority,
        mode: EscalationMode,
    ) -> (Priority, bool) {
        let now = at("2025-03-10", "12:00");
        effective_priority(date, time, status, stored, now, now.date(), mode)
    }

    #[test]
    fn normalize_time_keeps_valid_values() {
        for raw in ["00:00", "09:05", "12:30", "23:59"] {
            assert_eq!(normalize_time(raw), raw);
        }
    }

    #[test]
    fn normalize_time_is_total() {
        let bad = [
            "", "9am", "25:99", "24:00", "9:05", "12:60", " 10:00", "10:00:00", "ab:cd",
        ];
        for raw in bad {
            assert_eq!(normalize_time(raw), "23:59", "input {raw:?}");
        }
    }

    #[test]
    fn normalize_priority_defaults_to_medium() {
        assert_eq!(normalize_priority("Low"), Priority::Low);
        assert_eq!(normalize_priority("Medium"), Priority::Medium);
        assert_eq!(normalize_priority("High"), Priority::High);
        assert_eq!(normalize_priority("high"), Priority::Medium);
        assert_eq!(normalize_priority(""), Priority::Medium);
    }

    #[test]
    fn parse_due_moment_handles_bad_input() {
        assert_eq!(parse_due_moment("", "10:00"), None);
        assert_eq!(parse_due_moment("2025-02-30", "10:00"), None);
        assert_eq!(parse_due_moment("01/03/2025", "10:00"), None);
        assert_eq!(
            parse_due_moment("2025-03-01", "garbage"),
            Some(at("2025-03-01", "23:59"))
        );
    }

    #[test]
    fn due_dates_must_be_zero_padded() {
        assert!(parse_due_date("2025-03-01").is_some());
        for raw in ["2025-3-1", "2025-03-1", "2025-3-01", " 2025-03-01", "12025-03-01"] {
            assert_eq!(parse_due_date(raw), None, "input {raw:?}");
            assert_eq!(parse_due_moment(raw, "10:00"), None, "input {raw:?}");
        }
    }

    #[test]
    fn past_due_is_overdue_unless_completed() {
        let now = at("2025-03-10", "12:00");
        let today = now.date();
        for due in [at("2025-03-09", "23:59"), at("2024-01-01", "00:00")] {
            assert_eq!(
                classify_deadline(Some(due), TaskStatus::Todo, now, today),
                DeadlineState::Overdue
            );
            assert_eq!(
                classify_deadline(Some(due), TaskStatus::InProgress, now, today),
                DeadlineState::Overdue
            );
            assert_eq!(
                classify_deadline(Some(due), TaskStatus::Completed, now, today),
                DeadlineState::Completed
            );
        }
    }

    #[test]
    fn earlier_today_is_overdue_later_today_is_due_today() {
        let now = at("2025-03-10", "12:00");
        let today = now.date();
        let state = |time: &str| {
            classify_deadline(Some(at("2025-03-10", time)), TaskStatus::Todo, now, today)
        };
        assert_eq!(state("11:59"), DeadlineState::Overdue);
        assert_eq!(state("12:00"), DeadlineState::DueToday);
        assert_eq!(state("18:00"), DeadlineState::DueToday);
    }

    #[test]
    fn due_soon_window_is_three_days() {
        let now = at("2025-03-10", "12:00");
        let today = now.date();
        let state = |date: &str| {
            classify_deadline(Some(at(date, "09:00")), TaskStatus::Todo, now, today)
        };
        assert_eq!(state("2025-03-11"), DeadlineState::DueSoon);
        assert_eq!(state("2025-03-13"), DeadlineState::DueSoon);
        assert_eq!(state("2025-03-14"), DeadlineState::Normal);
        assert_eq!(
            classify_deadline(None, TaskStatus::Todo, now, today),
            DeadlineState::Normal
        );
    }

    #[test]
    fn completed_never_escalates() {
        let now = at("2025-03-10", "12:00");
        for offset in [-5, 0, 2, 10] {
            let date = ymd(offset, now);
            assert_eq!(
                escalate(
                    &date,
                    "10:00",
                    TaskStatus::Completed,
                    Priority::Low,
                    EscalationMode::Overwrite
                ),
                (Priority::Low, false)
            );
        }
    }

    #[test]
    fn due_today_escalates_to_high() {
        let overwrite = EscalationMode::Overwrite;
        assert_eq!(
            escalate("2025-03-10", "18:00", TaskStatus::Todo, Priority::Low, overwrite),
            (Priority::High, true)
        );
        assert_eq!(
            escalate("2025-03-10", "08:00", TaskStatus::InProgress, Priority::Low, overwrite),
            (Priority::High, true)
        );
    }

    #[test]
    fn overwrite_mode_downgrades_stored_high() {
        assert_eq!(
            escalate(
                "2025-03-12",
                "10:00",
                TaskStatus::Todo,
                Priority::High,
                EscalationMode::Overwrite
            ),
            (Priority::Medium, true)
        );
    }

    #[test]
    fn max_mode_keeps_stored_high() {
        let max = EscalationMode::Max;
        assert_eq!(
            escalate("2025-03-12", "10:00", TaskStatus::Todo, Priority::High, max),
            (Priority::High, false)
        );
        assert_eq!(
            escalate("2025-03-12", "10:00", TaskStatus::Todo, Priority::Low, max),
            (Priority::Medium, true)
        );
    }

    #[test]
    fn far_or_unparseable_deadlines_keep_stored_priority() {
        let overwrite = EscalationMode::Overwrite;
        assert_eq!(
            escalate("2025-04-01", "10:00", TaskStatus::Todo, Priority::Low, overwrite),
            (Priority::Low, false)
        );
        assert_eq!(
            escalate("not-a-date", "10:00", TaskStatus::Todo, Priority::High, overwrite),
            (Priority::High, false)
        );
        assert_eq!(
            escalate("2025-3-11", "10:00", TaskStatus::Todo, Priority::Low, overwrite),
            (Priority::Low, false)
        );
    }

    #[test]
    fn escalation_mode_parses_config_values() {
        assert_eq!(EscalationMode::parse("overwrite"), Some(EscalationMode::Overwrite));
        assert_eq!(EscalationMode::parse(" MAX "), Some(EscalationMode::Max));
        assert_eq!(EscalationMode::parse("min"), None);
    }
}
