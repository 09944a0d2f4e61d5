//! Boundary to the external text-generation service.
//!
//! Nothing here fails: service errors and malformed output are replaced by
//! fixed fallback content so the board always has something to show.

use std::future::Future;
use std::sync::OnceLock;

use anyhow::Context;
use chrono::{Duration, NaiveDate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use regex::Regex;
use tracing::{debug, error, info, instrument, warn};

use crate::datetime::date_key;
use crate::task::{Priority, SuggestedTask};

pub const TROUBLE_REPLY: &str = "I'm having a little trouble right now. Let's try again in a moment.";

const FALLBACK_REPLIES: [&str; 4] = [
    "Got it. What's the first thing on your mind?",
    "Okay, let's break that down. What's step one?",
    "Sounds like a plan. Where should we start?",
    "I'm with you. What's the main goal here?",
];

/// A text-in, text-out generation service.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> impl Future<Output = anyhow::Result<String>> + Send;
}

/// Monotonic conversation counter used to drop late results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Reply text and suggested records produced for one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub generation: Generation,
    pub input: String,
    pub reply: String,
    pub suggestions: Vec<SuggestedTask>,
}

pub fn task_prompt(user_input: &str, today: NaiveDate) -> String {
    format!(
        r#"You help the user plan their day.
From the request below, produce a JSON array of 3 to 5 short, actionable tasks.

Each task is an object with:
- "name": a short, clear task name of at most five words.
- "description": one simple sentence.
- "priority": one of "Low", "Medium", "High".
- "dueDate": a "YYYY-MM-DD" date only when the user gives one, otherwise "".
  Today is {today}; use it for anything the user wants done "today".
- "recurrence": one of "none", "daily", "weekly", "mondays", "tuesdays",
  "wednesdays", "thursdays", "fridays", "saturdays", "sundays".
  Use "none" when no repetition is mentioned, "daily" for every day, the
  weekday value for a fixed weekday, and "weekly" together with "dueDate"
  for a weekly repeat starting on a given date.

User request: "{user_input}"

Example for "daily check-in and my report every friday":
[
  {{"name": "Daily team check-in", "description": "Short sync on daily progress.", "priority": "Medium", "dueDate": "", "recurrence": "daily"}},
  {{"name": "Submit weekly report", "description": "Send the weekly progress report.", "priority": "High", "dueDate": "", "recurrence": "fridays"}}
]

Answer with the JSON array only: no introduction, no code fences, no commentary."#,
        today = date_key(today),
    )
}

pub fn reply_prompt(user_input: &str) -> String {
    format!(
        r#"You are Pluto, a calm and warm guide who helps people sort out their thoughts.
Speak gently and naturally, use contractions, avoid cliches, and ask an open question
when it helps the user think. Keep it to one to three short sentences.

The user said: "{user_input}"

Reply as Pluto."#
    )
}

/// Records used when the service cannot be reached.
pub fn unavailable_fallback(today: NaiveDate) -> Vec<SuggestedTask> {
    let tomorrow = today + Duration::days(1);
    vec![
        SuggestedTask::new(
            "Break down goals",
            "Split the main objective into smaller, manageable steps",
            Priority::High,
            Some(today),
        ),
        SuggestedTask::new(
            "Set priorities",
            "Pick out which tasks matter most and which are urgent",
            Priority::High,
            Some(today),
        ),
        SuggestedTask::new(
            "Create timeline",
            "Sketch out when each task should be finished",
            Priority::Medium,
            Some(tomorrow),
        ),
    ]
}

/// Record used when the service answered with something undecodable.
pub fn undecodable_fallback(today: NaiveDate) -> Vec<SuggestedTask> {
    vec![SuggestedTask::new(
        "Review input",
        "Take a moment to reflect on what you want to accomplish",
        Priority::Medium,
        Some(today),
    )]
}

fn array_pattern() -> &'static Regex {
    static ARRAY: OnceLock<Regex> = OnceLock::new();
    ARRAY.get_or_init(|| Regex::new(r"\[[\s\S]*\]").expect("static array pattern is valid"))
}

/// Decodes the first array-shaped span of `raw` into suggested records.
pub fn parse_suggestions(raw: &str) -> anyhow::Result<Vec<SuggestedTask>> {
    let candidate = array_pattern()
        .find(raw)
        .map(|m| m.as_str())
        .unwrap_or(raw);
    let elements: Vec<serde_json::Value> =
        serde_json::from_str(candidate).context("suggestion output is not a task array")?;

    // A malformed element only costs that element.
    let records = elements
        .into_iter()
        .enumerate()
        .filter_map(|(index, element)| match serde_json::from_value::<SuggestedTask>(element) {
            Ok(record) => Some(record),
            Err(err) => {
                debug!(index, error = %err, "skipping malformed suggested task");
                None
            }
        })
        .collect();
    Ok(records)
}

/// Asks the service for task suggestions, falling back on any failure.
#[instrument(skip(generator, user_input))]
pub async fn suggest_tasks<G>(generator: &G, user_input: &str, today: NaiveDate) -> Vec<SuggestedTask>
where
    G: TextGenerator,
{
    let raw = match generator.generate(&task_prompt(user_input, today)).await {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %err, "suggestion service failed; using fallback tasks");
            return unavailable_fallback(today);
        }
    };

    match parse_suggestions(&raw) {
        Ok(records) => {
            info!(count = records.len(), "decoded suggested tasks");
            records
        }
        Err(err) => {
            let detail = format!("{err:#}");
            error!(error = %detail, response = %raw, "failed decoding suggestions");
            undecodable_fallback(today)
        }
    }
}

/// Asks the service for a short conversational reply.
#[instrument(skip(generator, user_input))]
pub async fn reply<G>(generator: &G, user_input: &str) -> String
where
    G: TextGenerator,
{
    match generator.generate(&reply_prompt(user_input)).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            debug!("empty reply from service");
            TROUBLE_REPLY.to_string()
        }
        Err(err) => {
            warn!(error = %err, "reply service failed; using canned acknowledgement");
            fallback_reply(&mut StdRng::from_entropy()).to_string()
        }
    }
}

pub fn fallback_reply<R: rand::Rng>(rng: &mut R) -> &'static str {
    FALLBACK_REPLIES
        .choose(rng)
        .copied()
        .unwrap_or(FALLBACK_REPLIES[0])
}
