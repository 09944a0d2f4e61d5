use std::io::{self, IsTerminal, Write};

use chrono::{Datelike, NaiveDate};
use unicode_width::UnicodeWidthStr;

use crate::calendar::{CalendarEntry, CalendarMode, CalendarPage};
use crate::datetime::format_due_label;
use crate::session::TaskDetail;
use crate::sim::{BubbleKind, Simulation};
use crate::task::{Priority, SuggestedTask, Task};

const WEEKDAY_HEADERS: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    /// Colors only when enabled and stdout is a terminal.
    pub fn new(color: bool) -> Self {
        Self {
            color: color && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, out, tasks))]
    pub fn print_task_table<'a, W, I>(&self, out: &mut W, tasks: I, today: NaiveDate) -> anyhow::Result<()>
    where
        W: Write,
        I: IntoIterator<Item = &'a Task>,
    {
        let headers = vec![
            "ID".to_string(),
            "Name".to_string(),
            "Priority".to_string(),
            "Due".to_string(),
            "Repeats".to_string(),
        ];

        let rows = tasks
            .into_iter()
            .map(|task| {
                let due = format_due_label(task.due_date, today);
                let due = match task.due_date {
                    Some(date) if date < today && !task.recurrence.is_recurring() => self.paint(&due, "31"),
                    _ => due,
                };
                vec![
                    self.paint(&task.id.short(), "33"),
                    task.name.clone(),
                    self.paint_priority(task.priority),
                    due,
                    task.recurrence.to_string(),
                ]
            })
            .collect::<Vec<_>>();

        if rows.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }
        write_table(out, headers, rows)
    }

    pub fn print_task_detail<W: Write>(&self, out: &mut W, detail: &TaskDetail) -> anyhow::Result<()> {
        writeln!(out, "id        {}", detail.id)?;
        writeln!(out, "name      {}", detail.name)?;
        writeln!(out, "priority  {}", self.paint_priority(detail.priority))?;
        writeln!(out, "due       {}", detail.due_label)?;
        writeln!(out, "repeats   {}", detail.recurrence)?;
        if detail.description.is_empty() {
            writeln!(out, "desc      -")?;
        } else {
            writeln!(out, "desc      {}", detail.description)?;
        }
        if detail.editing {
            writeln!(
                out,
                "edit with: edit {} priority=<low|medium|high> due=<date|none> desc=\"...\"",
                detail.id.short()
            )?;
        }
        Ok(())
    }

    pub fn print_bubbles<W: Write>(&self, out: &mut W, sim: &Simulation) -> anyhow::Result<()> {
        let headers = vec![
            "#".to_string(),
            "Label".to_string(),
            "X".to_string(),
            "Y".to_string(),
            "Radius".to_string(),
            "Speed".to_string(),
            "State".to_string(),
        ];

        let rows = sim
            .bubbles()
            .iter()
            .map(|bubble| {
                let state = if bubble.is_popping() {
                    self.paint("popping", "2")
                } else if bubble.is_dragging() {
                    self.paint("dragging", "36")
                } else {
                    String::new()
                };
                let label = match bubble.kind() {
                    BubbleKind::Greeting => self.paint(bubble.label(), "35"),
                    BubbleKind::Task(_) => bubble.label().to_string(),
                };
                let drawn = bubble.drawn();
                vec![
                    bubble.key().get().to_string(),
                    label,
                    format!("{:.1}", drawn.x),
                    format!("{:.1}", drawn.y),
                    format!("{:.1}", bubble.radius()),
                    format!("{:.2}", bubble.speed()),
                    state,
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn print_calendar<W: Write>(&self, out: &mut W, page: &CalendarPage) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&page.title, "1"))?;
        match page.mode {
            CalendarMode::Month => self.print_month_grid(out, page)?,
            CalendarMode::Week => {
                for day in &page.days {
                    let label = format!("{} {:>2}", day.date.format("%a"), day.date.day());
                    let label = if day.is_today { self.paint(&label, "7") } else { label };
                    writeln!(out, "{label}  {}", self.entry_list(&day.entries))?;
                }
            }
        }
        Ok(())
    }

    fn print_month_grid<W: Write>(&self, out: &mut W, page: &CalendarPage) -> anyhow::Result<()> {
        writeln!(out, "{}", WEEKDAY_HEADERS.map(|h| format!("{h:>3} ")).concat())?;

        let mut column = 0;
        for _ in 0..page.leading_blanks {
            write!(out, "    ")?;
            column += 1;
        }
        for day in &page.days {
            let marker = if day.entries.is_empty() { ' ' } else { '*' };
            let cell = format!("{:>3}{marker}", day.date.day());
            let cell = if day.is_today { self.paint(&cell, "7") } else { cell };
            write!(out, "{cell}")?;
            column += 1;
            if column % 7 == 0 {
                writeln!(out)?;
            }
        }
        if column % 7 != 0 {
            writeln!(out)?;
        }

        for day in page.days.iter().filter(|day| !day.entries.is_empty()) {
            writeln!(out, "{:>3}: {}", day.date.day(), self.entry_list(&day.entries))?;
        }
        Ok(())
    }

    pub fn print_day<W: Write>(&self, out: &mut W, date: NaiveDate, entries: &[CalendarEntry]) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&date.format("%A, %B %-d, %Y").to_string(), "1"))?;
        if entries.is_empty() {
            writeln!(out, "No tasks for this day")?;
            return Ok(());
        }
        for entry in entries {
            writeln!(
                out,
                "  {}  {}  {}",
                self.paint(&entry.id.short(), "33"),
                self.paint_priority(entry.priority),
                entry.name
            )?;
        }
        Ok(())
    }

    pub fn print_chips<W: Write>(&self, out: &mut W, chips: &[SuggestedTask]) -> anyhow::Result<()> {
        if chips.is_empty() {
            writeln!(out, "No suggestions.")?;
            return Ok(());
        }
        for (idx, chip) in chips.iter().enumerate() {
            let name = chip.trimmed_name().unwrap_or_default();
            writeln!(out, "  [{}] {} ({})", idx + 1, name, self.paint_priority(chip.priority()))?;
        }
        Ok(())
    }

    pub fn print_reply<W: Write>(&self, out: &mut W, reply: &str) -> anyhow::Result<()> {
        writeln!(out, "{} {reply}", self.paint("pluto>", "36"))?;
        Ok(())
    }

    fn entry_list(&self, entries: &[CalendarEntry]) -> String {
        entries
            .iter()
            .map(|entry| match entry.priority {
                Priority::High => self.paint(&entry.name, "31"),
                Priority::Medium | Priority::Low => entry.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn paint_priority(&self, priority: Priority) -> String {
        let code = match priority {
            Priority::High => "31",
            Priority::Medium => "33",
            Priority::Low => "32",
        };
        self.paint(priority.as_str(), code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(writer: &mut W, headers: Vec<String>, rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalendarMode, build_page};
    use crate::store::TaskStore;
    use crate::task::Recurrence;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn rendered(f: impl FnOnce(&mut Vec<u8>) -> anyhow::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).expect("render succeeds");
        String::from_utf8(buf).expect("utf8 output")
    }

    #[test]
    fn strip_ansi_removes_color_codes() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m text"), "red text");
    }

    #[test]
    fn table_pads_by_visible_width() {
        let text = rendered(|out| {
            write_table(
                out,
                vec!["A".to_string(), "B".to_string()],
                vec![vec!["\x1b[33mxyz\x1b[0m".to_string(), "1".to_string()]],
            )
        });
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A   B ");
        assert_eq!(lines[1], "--- - ");
    }

    #[test]
    fn task_table_lists_names_and_due_labels() {
        let today = ymd(2025, 3, 10);
        let tasks = [
            Task::new("Water plants", Priority::Low).with_due_date(today),
            Task::new("Gym", Priority::High).with_recurrence(Recurrence::On(chrono::Weekday::Mon)),
        ];
        let text = rendered(|out| Renderer::plain().print_task_table(out, tasks.iter(), today));
        assert!(text.contains("Water plants"));
        assert!(text.contains("Today"));
        assert!(text.contains("mondays"));
        assert!(text.contains("No date"));
    }

    #[test]
    fn month_grid_marks_days_with_tasks() {
        let mut store = TaskStore::new();
        store.insert(Task::new("Dentist", Priority::Medium).with_due_date(ymd(2025, 3, 4)));
        let page = build_page(&store, CalendarMode::Month, ymd(2025, 3, 1), ymd(2025, 3, 1));

        let text = rendered(|out| Renderer::plain().print_calendar(out, &page));

        assert!(text.starts_with("March 2025\n"));
        assert!(text.contains("  4*"));
        assert!(text.contains("  4: Dentist"));
    }

    #[test]
    fn empty_day_says_so() {
        let text = rendered(|out| Renderer::plain().print_day(out, ymd(2025, 3, 1), &[]));
        assert!(text.contains("Saturday, March 1, 2025"));
        assert!(text.contains("No tasks for this day"));
    }
}
