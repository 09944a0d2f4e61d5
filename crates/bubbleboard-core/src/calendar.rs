use chrono::{
  Datelike,
  Duration,
  NaiveDate
};

use crate::datetime::month_name;
use crate::store::TaskStore;
use crate::task::{
  Priority,
  TaskId
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum CalendarMode {
  Month,
  Week
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEntry {
  pub id:       TaskId,
  pub name:     String,
  pub priority: Priority
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDay {
  pub date:     NaiveDate,
  pub is_today: bool,
  pub entries:  Vec<CalendarEntry>
}

/// A rendered calendar page: leading blank cells, then one cell per day.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarPage {
  pub mode:           CalendarMode,
  pub title:          String,
  pub leading_blanks: usize,
  pub days:           Vec<CalendarDay>
}

/// First and last visible date. Weeks run Sunday to Saturday.
pub fn calendar_window(
  mode: CalendarMode,
  focus: NaiveDate
) -> (NaiveDate, NaiveDate) {
  match mode {
    | CalendarMode::Month => {
      (
        first_day_of_month(
          focus.year(),
          focus.month()
        ),
        last_day_of_month(
          focus.year(),
          focus.month()
        )
      )
    }
    | CalendarMode::Week => {
      let start = start_of_week(focus);
      (start, add_days(start, 6))
    }
  }
}

pub fn calendar_title(
  mode: CalendarMode,
  focus: NaiveDate
) -> String {
  match mode {
    | CalendarMode::Month => {
      format!(
        "{} {}",
        month_name(focus.month()),
        focus.year()
      )
    }
    | CalendarMode::Week => {
      let (start, end) =
        calendar_window(mode, focus);
      if start.month() == end.month() {
        format!(
          "{} {} - {}",
          month_name(start.month()),
          start.day(),
          end.day()
        )
      } else {
        format!(
          "{} {} - {} {}",
          month_name(start.month()),
          start.day(),
          month_name(end.month()),
          end.day()
        )
      }
    }
  }
}

/// Moves the focus one page back (`step < 0`) or forward.
pub fn shift_focus(
  mode: CalendarMode,
  focus: NaiveDate,
  step: i64
) -> NaiveDate {
  match mode {
    | CalendarMode::Month => {
      shift_months(focus, step as i32)
    }
    | CalendarMode::Week => {
      add_days(focus, step * 7)
    }
  }
}

#[tracing::instrument(skip(store))]
pub fn build_page(
  store: &TaskStore,
  mode: CalendarMode,
  focus: NaiveDate,
  today: NaiveDate
) -> CalendarPage {
  let (start, end) =
    calendar_window(mode, focus);
  let leading_blanks = match mode {
    | CalendarMode::Month => {
      start
        .weekday()
        .num_days_from_sunday()
        as usize
    }
    | CalendarMode::Week => 0
  };

  let days = start
    .iter_days()
    .take_while(|day| *day <= end)
    .map(|date| {
      CalendarDay {
        date,
        is_today: date == today,
        entries: entries_on(store, date)
      }
    })
    .collect();

  CalendarPage {
    mode,
    title: calendar_title(mode, focus),
    leading_blanks,
    days
  }
}

/// Tasks due on a single date, as shown by the day detail popup.
pub fn entries_on(
  store: &TaskStore,
  date: NaiveDate
) -> Vec<CalendarEntry> {
  store
    .due_on(date)
    .map(|task| {
      CalendarEntry {
        id:       task.id,
        name:     task.name.clone(),
        priority: task.priority
      }
    })
    .collect()
}

fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let mut year = date.year();
  let mut month =
    date.month() as i32 + months;

  while month < 1 {
    month += 12;
    year = year.saturating_sub(1);
  }
  while month > 12 {
    month -= 12;
    year = year.saturating_add(1);
  }

  let month = month as u32;
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
}

fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

fn start_of_week(
  day: NaiveDate
) -> NaiveDate {
  let diff = day
    .weekday()
    .num_days_from_sunday()
    as i64;
  add_days(day, -diff)
}
