use chrono::{Datelike, NaiveDate};

use crate::task::{Recurrence, Task};

/// What completing a task did to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// One-time task; the caller must drop it from the store.
    Remove,
    /// Recurring task; the date was recorded and the task stays.
    Recorded,
    /// Recurring task already completed on that date.
    AlreadyRecorded,
}

/// Whether `task` should show up on `date`.
///
/// A completion recorded for `date` wins over every other rule. Otherwise a
/// task is due when its due date equals `date` or its recurrence rule matches.
pub fn is_due(task: &Task, date: NaiveDate) -> bool {
    if task.completions.contains(&date) {
        return false;
    }

    let exact_match = task.due_date == Some(date);
    exact_match || recurrence_matches(task.recurrence, task.due_date, date)
}

fn recurrence_matches(recurrence: Recurrence, anchor: Option<NaiveDate>, date: NaiveDate) -> bool {
    match recurrence {
        Recurrence::None => false,
        Recurrence::Daily => true,
        Recurrence::Weekly => {
            anchor.is_some_and(|start| date.weekday() == start.weekday() && date >= start)
        }
        Recurrence::On(weekday) => date.weekday() == weekday,
    }
}

/// Marks the instance on `date` as done.
///
/// Recurring tasks accumulate completion dates; one-time tasks are left
/// untouched and [`Completion::Remove`] tells the caller to delete them.
pub fn complete(task: &mut Task, date: NaiveDate) -> Completion {
    if !task.recurrence.is_recurring() {
        return Completion::Remove;
    }
    if task.completions.insert(date) {
        Completion::Recorded
    } else {
        Completion::AlreadyRecorded
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Weekday};

    use super::*;
    use crate::task::Priority;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn days_from(start: NaiveDate, count: i64) -> impl Iterator<Item = NaiveDate> {
        (0..count).map(move |offset| start + Duration::days(offset))
    }

    #[test]
    fn one_time_task_matches_only_its_date() {
        let task = Task::new("Dentist", Priority::Medium).with_due_date(ymd(2025, 3, 10));
        assert!(is_due(&task, ymd(2025, 3, 10)));
        assert!(!is_due(&task, ymd(2025, 3, 11)));
        assert!(!is_due(&task, ymd(2025, 3, 9)));
    }

    #[test]
    fn orphaned_task_is_never_due() {
        let task = Task::new("Someday", Priority::Low);
        assert!(days_from(ymd(2025, 1, 1), 60).all(|d| !is_due(&task, d)));
    }

    #[test]
    fn daily_task_is_due_every_uncompleted_day() {
        let mut task = Task::new("Stretch", Priority::Low).with_recurrence(Recurrence::Daily);
        task.completions.insert(ymd(2025, 3, 12));
        for date in days_from(ymd(2025, 3, 1), 31) {
            assert_eq!(is_due(&task, date), date != ymd(2025, 3, 12), "{date}");
        }
    }

    #[test]
    fn weekday_rule_has_no_lower_bound() {
        let task = Task::new("Report", Priority::High)
            .with_due_date(ymd(2025, 6, 6))
            .with_recurrence(Recurrence::On(Weekday::Fri));
        for date in days_from(ymd(2025, 1, 1), 120) {
            assert_eq!(is_due(&task, date), date.weekday() == Weekday::Fri, "{date}");
        }
    }

    #[test]
    fn weekly_rule_starts_at_anchor() {
        // 2025-03-07 is a Friday.
        let task = Task::new("Review", Priority::Medium)
            .with_due_date(ymd(2025, 3, 7))
            .with_recurrence(Recurrence::Weekly);
        assert!(is_due(&task, ymd(2025, 3, 7)));
        assert!(is_due(&task, ymd(2025, 3, 14)));
        assert!(is_due(&task, ymd(2025, 3, 21)));
        assert!(!is_due(&task, ymd(2025, 2, 28)));
        assert!(!is_due(&task, ymd(2025, 3, 6)));
        assert!(!is_due(&task, ymd(2025, 3, 13)));
    }

    #[test]
    fn weekly_rule_without_anchor_never_matches() {
        let task = Task::new("Drifting", Priority::Medium).with_recurrence(Recurrence::Weekly);
        assert!(days_from(ymd(2025, 3, 1), 14).all(|d| !is_due(&task, d)));
    }

    #[test]
    fn exact_date_and_rule_both_count() {
        // Due on a Tuesday, recurring on Fridays.
        let task = Task::new("Both", Priority::Medium)
            .with_due_date(ymd(2025, 3, 4))
            .with_recurrence(Recurrence::On(Weekday::Fri));
        assert!(is_due(&task, ymd(2025, 3, 4)));
        assert!(is_due(&task, ymd(2025, 3, 7)));
        assert!(!is_due(&task, ymd(2025, 3, 5)));
    }

    #[test]
    fn completing_recurring_task_suppresses_only_that_date() {
        let mut task = Task::new("Water plants", Priority::Low).with_recurrence(Recurrence::Daily);
        assert_eq!(complete(&mut task, ymd(2025, 3, 10)), Completion::Recorded);
        assert_eq!(complete(&mut task, ymd(2025, 3, 10)), Completion::AlreadyRecorded);
        assert_eq!(task.completions.len(), 1);
        assert!(!is_due(&task, ymd(2025, 3, 10)));
        assert!(is_due(&task, ymd(2025, 3, 11)));
    }

    #[test]
    fn completing_one_time_task_requests_removal() {
        let mut task = Task::new("Call bank", Priority::High).with_due_date(ymd(2025, 3, 10));
        assert_eq!(complete(&mut task, ymd(2025, 3, 10)), Completion::Remove);
        assert!(task.completions.is_empty());
    }

    #[test]
    fn completion_overrides_exact_date() {
        let mut task = Task::new("Standup", Priority::Medium)
            .with_due_date(ymd(2025, 3, 10))
            .with_recurrence(Recurrence::Daily);
        complete(&mut task, ymd(2025, 3, 10));
        assert!(!is_due(&task, ymd(2025, 3, 10)));
    }
}
