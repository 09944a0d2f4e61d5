use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::datetime::parse_date_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, enough to address a task from the command line.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(Self::Low),
            "medium" | "m" => Ok(Self::Medium),
            "high" | "h" => Ok(Self::High),
            other => Err(anyhow!("invalid priority: {other}")),
        }
    }
}

/// When a task re-occurs after (or instead of) its due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    /// Every week on the weekday of the due date, starting at the due date.
    Weekly,
    /// Every week on a fixed weekday, with no start bound.
    On(Weekday),
}

impl Recurrence {
    pub fn is_recurring(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::On(Weekday::Mon) => "mondays",
            Self::On(Weekday::Tue) => "tuesdays",
            Self::On(Weekday::Wed) => "wednesdays",
            Self::On(Weekday::Thu) => "thursdays",
            Self::On(Weekday::Fri) => "fridays",
            Self::On(Weekday::Sat) => "saturdays",
            Self::On(Weekday::Sun) => "sundays",
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recurrence {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let recurrence = match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Self::None,
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "mondays" => Self::On(Weekday::Mon),
            "tuesdays" => Self::On(Weekday::Tue),
            "wednesdays" => Self::On(Weekday::Wed),
            "thursdays" => Self::On(Weekday::Thu),
            "fridays" => Self::On(Weekday::Fri),
            "saturdays" => Self::On(Weekday::Sat),
            "sundays" => Self::On(Weekday::Sun),
            other => return Err(anyhow!("invalid recurrence: {other}")),
        };
        Ok(recurrence)
    }
}

impl TryFrom<String> for Recurrence {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Recurrence> for String {
    fn from(value: Recurrence) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub recurrence: Recurrence,

    /// Dates on which a recurring instance was marked done.
    #[serde(default)]
    pub completions: BTreeSet<NaiveDate>,
}

impl Task {
    pub fn new(name: impl Into<String>, priority: Priority) -> Self {
        Self {
            id: TaskId::new(),
            name: name.into(),
            description: String::new(),
            priority,
            due_date: None,
            recurrence: Recurrence::None,
            completions: BTreeSet::new(),
        }
    }

    pub fn with_due_date(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// In-place edit of the mutable task fields. `due_date: Some(None)` clears the date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub description: Option<String>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.priority.is_none() && self.due_date.is_none() && self.description.is_none()
    }
}

/// A task-like record as produced by the suggestion service.
///
/// Every field is optional and loosely typed; conversion into a [`Task`]
/// happens in the store, which skips records without a usable name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestedTask {
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub recurrence: Option<String>,
}

impl SuggestedTask {
    pub fn new(
        name: &str,
        description: &str,
        priority: Priority,
        due_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            name: Some(name.to_string()),
            description: Some(description.to_string()),
            priority: Some(priority.to_string()),
            due_date: Some(due_date.map(|d| d.to_string()).unwrap_or_default()),
            recurrence: None,
        }
    }

    pub fn trimmed_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn priority(&self) -> Priority {
        let Some(raw) = self.priority.as_deref() else {
            return Priority::default();
        };
        raw.parse().unwrap_or_else(|err| {
            warn!(error = %err, "suggested task has unknown priority; using Medium");
            Priority::default()
        })
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        let raw = self.due_date.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        match parse_date_key(raw) {
            Ok(date) => Some(date),
            Err(err) => {
                warn!(due = raw, error = %err, "suggested task has unparsable due date; ignoring");
                None
            }
        }
    }

    pub fn recurrence(&self) -> Recurrence {
        let Some(raw) = self.recurrence.as_deref() else {
            return Recurrence::None;
        };
        raw.parse().unwrap_or_else(|err| {
            warn!(error = %err, "suggested task has unknown recurrence; using none");
            Recurrence::None
        })
    }
}
