use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::schedule::{self, Completion};
use crate::task::{SuggestedTask, Task, TaskId, TaskPatch};

/// In-memory task records, kept in insertion order.
#[derive(Debug, Default, Clone)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

/// Result of [`TaskStore::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompleteOutcome {
    Removed,
    Recorded,
    AlreadyRecorded,
    NotFound,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Resolves a full id or a unique id prefix.
    pub fn resolve(&self, needle: &str) -> Option<TaskId> {
        let needle = needle.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return None;
        }
        let mut matches = self.tasks.iter().filter(|t| {
            let full = t.id.to_string();
            full == needle || full.starts_with(&needle) || t.id.short().starts_with(&needle)
        });
        let first = matches.next()?;
        if matches.next().is_some() {
            debug!(needle = %needle, "ambiguous task id prefix");
            None
        } else {
            Some(first.id)
        }
    }

    #[instrument(skip(self, task), fields(id = %task.id, name = %task.name))]
    pub fn insert(&mut self, task: Task) -> TaskId {
        let id = task.id;
        self.tasks.push(task);
        id
    }

    /// Converts suggested records into tasks, skipping records without a name.
    ///
    /// When `original_input` mentions "today" and a record carries no date,
    /// the record is pinned to `today`.
    #[instrument(skip(self, records, original_input), fields(count = records.len()))]
    pub fn add_suggested(
        &mut self,
        records: &[SuggestedTask],
        original_input: &str,
        today: NaiveDate,
    ) -> Vec<TaskId> {
        let said_today = original_input.to_lowercase().contains("today");
        let mut added = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            let Some(name) = record.trimmed_name() else {
                debug!(index, "skipping suggested task without a name");
                continue;
            };

            let mut due_date = record.due_date();
            if said_today && due_date.is_none() {
                debug!(index, "input mentioned today; pinning due date");
                due_date = Some(today);
            }

            let task = Task {
                id: TaskId::new(),
                name: name.to_string(),
                description: record.description.clone().unwrap_or_default(),
                priority: record.priority(),
                due_date,
                recurrence: record.recurrence(),
                completions: Default::default(),
            };
            added.push(self.insert(task));
        }

        info!(added = added.len(), "added suggested tasks");
        added
    }

    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        let idx = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(idx))
    }

    /// Completes the instance of `id` on `date`: recurring tasks record the
    /// date, one-time tasks are deleted.
    #[instrument(skip(self), fields(id = %id, date = %date))]
    pub fn complete(&mut self, id: TaskId, date: NaiveDate) -> CompleteOutcome {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return CompleteOutcome::NotFound;
        };

        match schedule::complete(task, date) {
            Completion::Recorded => CompleteOutcome::Recorded,
            Completion::AlreadyRecorded => CompleteOutcome::AlreadyRecorded,
            Completion::Remove => {
                self.remove(id);
                info!("removed one-time task on completion");
                CompleteOutcome::Removed
            }
        }
    }

    /// Applies `patch` in place. Returns `None` when the id is unknown.
    #[instrument(skip(self, patch), fields(id = %id))]
    pub fn edit(&mut self, id: TaskId, patch: TaskPatch) -> Option<&Task> {
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;

        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }

        debug!(priority = %task.priority, due = ?task.due_date, "edited task");
        Some(&*task)
    }

    pub fn due_on(&self, date: NaiveDate) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| schedule::is_due(t, date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Priority, Recurrence};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn record(name: &str, due: &str, recurrence: Option<&str>) -> SuggestedTask {
        SuggestedTask {
            name: Some(name.to_string()),
            description: Some("desc".to_string()),
            priority: Some("High".to_string()),
            due_date: Some(due.to_string()),
            recurrence: recurrence.map(str::to_string),
        }
    }

    #[test]
    fn skips_blank_names_and_defaults_recurrence() {
        let mut store = TaskStore::new();
        let today = ymd(2025, 3, 10);
        let records = vec![
            record("  Write outline  ", "2025-03-12", None),
            record("   ", "", None),
            SuggestedTask::default(),
        ];

        let added = store.add_suggested(&records, "plan my essay", today);

        assert_eq!(added.len(), 1);
        let task = store.get(added[0]).expect("stored task");
        assert_eq!(task.name, "Write outline");
        assert_eq!(task.recurrence, Recurrence::None);
        assert_eq!(task.due_date, Some(ymd(2025, 3, 12)));
        assert!(task.completions.is_empty());
    }

    #[test]
    fn today_in_input_pins_missing_dates() {
        let mut store = TaskStore::new();
        let today = ymd(2025, 3, 10);
        let records = vec![
            record("Groceries", "", None),
            record("Laundry", "2025-03-11", None),
        ];

        let added = store.add_suggested(&records, "Things to do TODAY", today);

        assert_eq!(store.get(added[0]).and_then(|t| t.due_date), Some(today));
        assert_eq!(store.get(added[1]).and_then(|t| t.due_date), Some(ymd(2025, 3, 11)));
    }

    #[test]
    fn complete_removes_one_time_and_keeps_recurring() {
        let mut store = TaskStore::new();
        let today = ymd(2025, 3, 10);
        let once = store.insert(Task::new("Once", Priority::Medium).with_due_date(today));
        let daily = store.insert(Task::new("Daily", Priority::Low).with_recurrence(Recurrence::Daily));

        assert_eq!(store.complete(once, today), CompleteOutcome::Removed);
        assert!(store.get(once).is_none());

        assert_eq!(store.complete(daily, today), CompleteOutcome::Recorded);
        let kept = store.get(daily).expect("recurring task stays");
        assert!(kept.completions.contains(&today));
        assert_eq!(store.due_on(today).count(), 0);
        assert_eq!(store.due_on(ymd(2025, 3, 11)).count(), 1);

        assert_eq!(store.complete(once, today), CompleteOutcome::NotFound);
    }

    #[test]
    fn edit_patches_fields_in_place() {
        let mut store = TaskStore::new();
        let id = store.insert(Task::new("Edit me", Priority::Low).with_due_date(ymd(2025, 1, 1)));

        let patch = TaskPatch {
            priority: Some(Priority::High),
            due_date: Some(None),
            description: Some("now with words".to_string()),
        };
        let task = store.edit(id, patch).expect("task exists");

        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date, None);
        assert_eq!(task.description, "now with words");
        assert!(store.edit(TaskId::new(), TaskPatch::default()).is_none());
    }

    #[test]
    fn resolves_unique_prefixes() {
        let mut store = TaskStore::new();
        let id = store.insert(Task::new("Prefix", Priority::Medium));
        assert_eq!(store.resolve(&id.short()), Some(id));
        assert_eq!(store.resolve(&id.to_string()), Some(id));
        assert_eq!(store.resolve(""), None);
    }
}
