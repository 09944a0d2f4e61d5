use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  Duration,
  Local,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "bubbleboard-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "BUBBLEBOARD_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "BUBBLEBOARD_TIME_CONFIG";
const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// The configured board timezone, or `None` to follow the system zone.
pub fn board_timezone()
-> Option<&'static Tz> {
  static BOARD_TZ: OnceLock<Option<Tz>> =
    OnceLock::new();
  BOARD_TZ
    .get_or_init(resolve_board_timezone)
    .as_ref()
}

/// Today's calendar date in the board timezone.
#[must_use]
pub fn today() -> NaiveDate {
  let now = Utc::now();
  match board_timezone() {
    | Some(tz) => {
      now.with_timezone(tz).date_naive()
    }
    | None => {
      now.with_timezone(&Local)
        .date_naive()
    }
  }
}

/// Zero-padded `YYYY-MM-DD`, the key used for due dates and completions.
#[must_use]
pub fn date_key(date: NaiveDate) -> String {
  date.format(DATE_KEY_FORMAT).to_string()
}

pub fn parse_date_key(
  raw: &str
) -> anyhow::Result<NaiveDate> {
  NaiveDate::parse_from_str(
    raw.trim(),
    DATE_KEY_FORMAT
  )
  .with_context(|| {
    format!(
      "expected YYYY-MM-DD, got: {raw}"
    )
  })
}

/// Parses a date typed at the prompt: `today`, `tomorrow`, `yesterday`,
/// a weekday name (next occurrence, today included), or `YYYY-MM-DD`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_arg(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token =
    input.trim().to_ascii_lowercase();
  match token.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return Ok(today + Duration::days(1));
    }
    | "yesterday" => {
      return Ok(today - Duration::days(1));
    }
    | _ => {}
  }

  if let Some(weekday) =
    parse_weekday_name(&token)
  {
    return Ok(next_weekday_date(
      today, weekday
    ));
  }

  parse_date_key(&token).map_err(|_| {
    anyhow!(
      "unrecognized date: {input}"
    )
  })
}

/// Short label used by the task detail view.
#[must_use]
pub fn format_due_label(
  due: Option<NaiveDate>,
  today: NaiveDate
) -> String {
  let Some(due) = due else {
    return "No date".to_string();
  };
  if due == today {
    return "Today".to_string();
  }
  if Some(due) == today.succ_opt() {
    return "Tomorrow".to_string();
  }
  due.format("%b %-d").to_string()
}

#[must_use]
pub fn month_name(month: u32) -> &'static str {
  match month {
    | 1 => "January",
    | 2 => "February",
    | 3 => "March",
    | 4 => "April",
    | 5 => "May",
    | 6 => "June",
    | 7 => "July",
    | 8 => "August",
    | 9 => "September",
    | 10 => "October",
    | 11 => "November",
    | 12 => "December",
    | _ => "?"
  }
}

/// Where a timezone id came from, for log context.
#[derive(Debug, Clone)]
enum TimezoneSource {
  Env,
  File(PathBuf)
}

fn resolve_board_timezone() -> Option<Tz>
{
  let candidates = [
    std::env::var(TIMEZONE_ENV_VAR)
      .ok()
      .map(|raw| {
        (TimezoneSource::Env, Ok(Some(raw)))
      }),
    timezone_config_path().map(|path| {
      let read = read_timezone_file(&path);
      (TimezoneSource::File(path), read)
    })
  ];

  for (source, read) in
    candidates.into_iter().flatten()
  {
    let raw = match read {
      | Ok(Some(raw)) => raw,
      | Ok(None) => continue,
      | Err(err) => {
        let detail = format!("{err:#}");
        tracing::error!(
          ?source,
          error = %detail,
          "ignoring timezone source"
        );
        continue;
      }
    };

    match raw.trim().parse::<Tz>() {
      | Ok(tz) => {
        tracing::info!(
          ?source,
          timezone = %tz,
          "configured board timezone"
        );
        return Some(tz);
      }
      | Err(err) => {
        tracing::error!(
          ?source,
          timezone = %raw.trim(),
          error = %err,
          "not an IANA timezone id"
        );
      }
    }
  }

  tracing::debug!(
    "no board timezone configured; \
     using system local zone"
  );
  None
}

fn timezone_config_path()
-> Option<PathBuf> {
  std::env::var(TIMEZONE_CONFIG_ENV_VAR)
    .ok()
    .map(|raw| raw.trim().to_string())
    .filter(|raw| !raw.is_empty())
    .map(PathBuf::from)
    .or_else(|| {
      std::env::current_dir()
        .ok()
        .map(|dir| {
          dir.join(TIMEZONE_CONFIG_FILE)
        })
    })
}

/// Reads `timezone = ".."` (top level or under `[time]`). A missing file is
/// not an error.
fn read_timezone_file(
  path: &Path
) -> anyhow::Result<Option<String>> {
  if !path.exists() {
    return Ok(None);
  }

  let raw = fs::read_to_string(path)
    .with_context(|| {
      format!(
        "failed reading {}",
        path.display()
      )
    })?;
  let parsed: TimezoneConfig =
    toml::from_str(&raw).with_context(
      || {
        format!(
          "failed parsing {}",
          path.display()
        )
      }
    )?;

  let timezone = parsed
    .timezone
    .or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    })
    .filter(|tz| !tz.trim().is_empty())
    .ok_or_else(|| {
      anyhow!(
        "{} has no timezone field",
        path.display()
      )
    })?;
  Ok(Some(timezone))
}

/// Full or three-letter weekday name, any case.
fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  token.parse::<Weekday>().ok()
}

/// Next date on `target`, counting `today` itself.
fn next_weekday_date(
  today: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let ahead = (7
    + target.num_days_from_sunday()
    - today.weekday().num_days_from_sunday())
    % 7;
  today + Duration::days(i64::from(ahead))
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    date_key,
    format_due_label,
    parse_date_arg
  };

  fn ymd(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn date_keys_are_zero_padded() {
    assert_eq!(
      date_key(ymd(2025, 3, 7)),
      "2025-03-07"
    );
  }

  #[test]
  fn parses_relative_and_weekday_args() {
    // 2025-03-05 is a Wednesday.
    let today = ymd(2025, 3, 5);
    assert_eq!(
      parse_date_arg("tomorrow", today)
        .expect("tomorrow"),
      ymd(2025, 3, 6)
    );
    assert_eq!(
      parse_date_arg("Friday", today)
        .expect("weekday"),
      ymd(2025, 3, 7)
    );
    assert_eq!(
      parse_date_arg("wed", today)
        .expect("same weekday"),
      today
    );
    assert_eq!(
      parse_date_arg(
        "2025-12-31",
        today
      )
      .expect("iso"),
      ymd(2025, 12, 31)
    );
    assert!(
      parse_date_arg("someday", today)
        .is_err()
    );
  }

  #[test]
  fn due_labels_follow_proximity() {
    let today = ymd(2025, 3, 5);
    assert_eq!(
      format_due_label(None, today),
      "No date"
    );
    assert_eq!(
      format_due_label(
        Some(today),
        today
      ),
      "Today"
    );
    assert_eq!(
      format_due_label(
        Some(ymd(2025, 3, 6)),
        today
      ),
      "Tomorrow"
    );
    assert_eq!(
      format_due_label(
        Some(ymd(2025, 3, 17)),
        today
      ),
      "Mar 17"
    );
  }
}
