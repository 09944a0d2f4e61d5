use std::io::Write;

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::calendar::CalendarMode;
use crate::datetime::{date_key, parse_date_arg};
use crate::drag::PointerButton;
use crate::render::Renderer;
use crate::session::{ClickAction, Session};
use crate::sim::{BubbleKey, Point};
use crate::suggest::Generation;
use crate::task::{Priority, Recurrence, Task, TaskId, TaskPatch};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "say", "chips", "accept", "tasks", "add", "show", "edit", "pop", "click", "drag", "move", "release",
        "bubbles", "tick", "due", "calendar", "day", "prev", "next", "help", "quit", "exit",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() { None } else { Some(first) }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Say(String),
    Chips,
    Accept(usize),
    Tasks,
    Add(Task),
    Show(String),
    Edit { id: String, patch: TaskPatch },
    Pop(String),
    Click(u64),
    Drag { bubble: u64, x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Release,
    Bubbles,
    Tick(u32),
    Due(Option<NaiveDate>),
    Calendar(Option<CalendarMode>),
    Day(NaiveDate),
    Prev,
    Next,
    Help,
    Quit,
}

/// What the host loop should do after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Continue,
    /// Ask the suggestion service about `input`; the result is tagged with `generation`.
    Converse {
        generation: Generation,
        input: String,
        today: NaiveDate,
    },
    Quit,
}

/// Splits on whitespace; double quotes group words and are dropped.
pub fn tokenize(line: &str) -> anyhow::Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if in_quotes {
        return Err(anyhow!("unterminated quote"));
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Parses one prompt line. Blank lines yield `None`.
#[instrument(skip(today))]
pub fn parse_line(line: &str, today: NaiveDate) -> anyhow::Result<Option<Command>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // `say` keeps the raw text so quotes and spacing reach the service untouched.
    if let Some((head, rest)) = trimmed.split_once(char::is_whitespace)
        && expand_command_abbrev(head, &known_command_names()) == Some("say")
    {
        return Ok(Some(Command::Say(rest.trim().to_string())));
    }

    let tokens = tokenize(trimmed)?;
    let Some((head, args)) = tokens.split_first() else {
        return Ok(None);
    };
    let command = expand_command_abbrev(head.as_str(), &known_command_names())
        .ok_or_else(|| anyhow!("unknown command: {head} (try 'help')"))?;
    debug!(command, ?args, "parsed command");

    let parsed = match command {
        "say" => Command::Say(args.join(" ")),
        "chips" => Command::Chips,
        "accept" => Command::Accept(parse_index(first_arg(args, "accept <n>")?)?),
        "tasks" => Command::Tasks,
        "add" => Command::Add(parse_add(args, today)?),
        "show" => Command::Show(first_arg(args, "show <id>")?.to_string()),
        "edit" => {
            let (id, rest) = args
                .split_first()
                .ok_or_else(|| anyhow!("usage: edit <id> [priority=..] [due=..] [desc=..]"))?;
            Command::Edit {
                id: id.clone(),
                patch: parse_patch(rest, today)?,
            }
        }
        "pop" => Command::Pop(first_arg(args, "pop <id>")?.to_string()),
        "click" => Command::Click(parse_bubble(first_arg(args, "click <bubble>")?)?),
        "drag" => match args {
            [bubble, x, y] => Command::Drag {
                bubble: parse_bubble(bubble)?,
                x: parse_coord(x)?,
                y: parse_coord(y)?,
            },
            _ => return Err(anyhow!("usage: drag <bubble> <x> <y>")),
        },
        "move" => match args {
            [x, y] => Command::Move {
                x: parse_coord(x)?,
                y: parse_coord(y)?,
            },
            _ => return Err(anyhow!("usage: move <x> <y>")),
        },
        "release" => Command::Release,
        "bubbles" => Command::Bubbles,
        "tick" => {
            let frames = match args.first() {
                Some(raw) => raw.parse::<u32>().with_context(|| format!("invalid frame count: {raw}"))?,
                None => 1,
            };
            Command::Tick(frames)
        }
        "due" => Command::Due(args.first().map(|raw| parse_date_arg(raw, today)).transpose()?),
        "calendar" => Command::Calendar(args.first().map(|raw| parse_mode(raw)).transpose()?),
        "day" => Command::Day(parse_date_arg(first_arg(args, "day <date>")?, today)?),
        "prev" => Command::Prev,
        "next" => Command::Next,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(anyhow!("unknown command: {other}")),
    };
    Ok(Some(parsed))
}

fn first_arg<'a>(args: &'a [String], usage: &str) -> anyhow::Result<&'a str> {
    args.first()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("usage: {usage}"))
}

fn parse_index(raw: &str) -> anyhow::Result<usize> {
    let n = raw
        .parse::<usize>()
        .with_context(|| format!("expected a chip number, got: {raw}"))?;
    n.checked_sub(1).ok_or_else(|| anyhow!("chip numbers start at 1"))
}

fn parse_bubble(raw: &str) -> anyhow::Result<u64> {
    raw.trim_start_matches('#')
        .parse::<u64>()
        .with_context(|| format!("expected a bubble number, got: {raw}"))
}

fn parse_coord(raw: &str) -> anyhow::Result<f64> {
    let value = raw
        .parse::<f64>()
        .with_context(|| format!("expected a coordinate, got: {raw}"))?;
    if !value.is_finite() {
        return Err(anyhow!("coordinate must be finite: {raw}"));
    }
    Ok(value)
}

fn parse_mode(raw: &str) -> anyhow::Result<CalendarMode> {
    match raw.to_ascii_lowercase().as_str() {
        "month" | "m" => Ok(CalendarMode::Month),
        "week" | "w" => Ok(CalendarMode::Week),
        other => Err(anyhow!("calendar mode must be month or week, got: {other}")),
    }
}

fn parse_due(raw: &str, today: NaiveDate) -> anyhow::Result<Option<NaiveDate>> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "none" => Ok(None),
        _ => parse_date_arg(raw, today).map(Some),
    }
}

fn parse_add(args: &[String], today: NaiveDate) -> anyhow::Result<Task> {
    let mut words = Vec::new();
    let mut priority = Priority::default();
    let mut due_date = None;
    let mut recurrence = Recurrence::default();
    let mut description = String::new();

    for arg in args {
        match arg.split_once('=') {
            Some(("priority", value)) => priority = value.parse()?,
            Some(("due", value)) => due_date = parse_due(value, today)?,
            Some(("recur", value)) => recurrence = value.parse()?,
            Some(("desc", value)) => description = value.to_string(),
            _ => words.push(arg.as_str()),
        }
    }

    let name = words.join(" ");
    if name.trim().is_empty() {
        return Err(anyhow!("usage: add <name> [priority=..] [due=..] [recur=..] [desc=..]"));
    }

    let mut task = Task::new(name.trim(), priority)
        .with_recurrence(recurrence)
        .with_description(description);
    task.due_date = due_date;
    Ok(task)
}

fn parse_patch(args: &[String], today: NaiveDate) -> anyhow::Result<TaskPatch> {
    let mut patch = TaskPatch::default();
    for arg in args {
        match arg.split_once('=') {
            Some(("priority", value)) => patch.priority = Some(value.parse()?),
            Some(("due", value)) => patch.due_date = Some(parse_due(value, today)?),
            Some(("desc", value)) => patch.description = Some(value.to_string()),
            _ => return Err(anyhow!("unexpected edit argument: {arg}")),
        }
    }
    if patch.is_empty() {
        return Err(anyhow!("nothing to change; use priority=, due= or desc="));
    }
    Ok(patch)
}

fn resolve_task(session: &Session, needle: &str) -> anyhow::Result<TaskId> {
    session
        .store()
        .resolve(needle)
        .ok_or_else(|| anyhow!("no task matches '{needle}'"))
}

fn resolve_bubble(session: &Session, number: u64) -> anyhow::Result<BubbleKey> {
    session
        .sim()
        .bubbles()
        .iter()
        .map(|b| b.key())
        .find(|key| key.get() == number)
        .ok_or_else(|| anyhow!("no bubble #{number}"))
}

#[instrument(skip(session, renderer, out, command))]
pub fn dispatch<W: Write>(
    session: &mut Session,
    renderer: &Renderer,
    out: &mut W,
    command: Command,
) -> anyhow::Result<Flow> {
    match command {
        Command::Say(text) => {
            let Some(generation) = session.begin_conversation(&text) else {
                writeln!(out, "Say something first.")?;
                return Ok(Flow::Continue);
            };
            info!(generation = generation.get(), "conversation started");
            return Ok(Flow::Converse {
                generation,
                input: text,
                today: session.today(),
            });
        }
        Command::Chips => {
            if let Some(reply) = session.last_reply() {
                renderer.print_reply(out, reply)?;
            }
            renderer.print_chips(out, session.chips())?;
        }
        Command::Accept(index) => {
            let added = session
                .accept_chip(index)
                .ok_or_else(|| anyhow!("no suggestion #{}", index + 1))?;
            for id in added {
                if let Some(task) = session.store().get(id) {
                    writeln!(out, "Added task {} '{}'.", id.short(), task.name)?;
                }
            }
        }
        Command::Tasks => {
            renderer.print_task_table(out, session.store().iter(), session.today())?;
        }
        Command::Add(task) => {
            let name = task.name.clone();
            let id = session.add_task(task);
            writeln!(out, "Added task {} '{name}'.", id.short())?;
        }
        Command::Show(needle) => {
            let id = resolve_task(session, &needle)?;
            if let Some(detail) = session.task_detail(id, false) {
                renderer.print_task_detail(out, &detail)?;
            }
        }
        Command::Edit { id, patch } => {
            let id = resolve_task(session, &id)?;
            if session.edit_task(id, patch) {
                writeln!(out, "Updated task {}.", id.short())?;
            }
        }
        Command::Pop(needle) => {
            let id = resolve_task(session, &needle)?;
            if session.pop_task(id) {
                writeln!(out, "Popped task {}.", id.short())?;
            }
        }
        Command::Click(number) => {
            let key = resolve_bubble(session, number)?;
            match session.click_bubble(key) {
                ClickAction::OpenDetail(detail) => renderer.print_task_detail(out, &detail)?,
                ClickAction::Pending => writeln!(out, "Bubble #{number} will pop unless clicked again.")?,
                ClickAction::Swallowed => debug!(number, "click after drag ignored"),
                ClickAction::Ignored => warn!(number, "click on a bubble that cannot be clicked"),
            }
        }
        Command::Drag { bubble, x, y } => {
            let key = resolve_bubble(session, bubble)?;
            if !session.start_drag(key, Point::new(x, y), PointerButton::Primary) {
                return Err(anyhow!("bubble #{bubble} cannot be dragged"));
            }
        }
        Command::Move { x, y } => {
            if !session.drag_to(Point::new(x, y)) {
                writeln!(out, "Nothing is being dragged.")?;
            }
        }
        Command::Release => {
            if session.end_drag().is_none() {
                writeln!(out, "Nothing is being dragged.")?;
            }
        }
        Command::Bubbles => {
            writeln!(out, "Bubbles for {}", date_key(session.displayed_date()))?;
            renderer.print_bubbles(out, session.sim())?;
        }
        Command::Tick(frames) => {
            let frame_ms = session.frame_ms();
            let mut popped = 0;
            for _ in 0..frames {
                popped += session.tick(frame_ms).popped.len();
            }
            if popped > 0 {
                writeln!(out, "{popped} bubble(s) popped.")?;
            }
        }
        Command::Due(date) => {
            let date = date.unwrap_or_else(|| session.today());
            session.render_bubbles_for_date(date);
            let today = session.today();
            let due: Vec<&Task> = session.store().due_on(date).collect();
            renderer.print_task_table(out, due, today)?;
        }
        Command::Calendar(mode) => {
            if let Some(mode) = mode {
                session.set_calendar_mode(mode);
            }
            renderer.print_calendar(out, &session.calendar_page())?;
        }
        Command::Day(date) => {
            renderer.print_day(out, date, &session.day_entries(date))?;
        }
        Command::Prev => {
            session.shift_calendar(-1);
            renderer.print_calendar(out, &session.calendar_page())?;
        }
        Command::Next => {
            session.shift_calendar(1);
            renderer.print_calendar(out, &session.calendar_page())?;
        }
        Command::Help => print_help(out)?,
        Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

fn print_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "\
say <text>                     talk to Pluto and get task suggestions
chips                          show the latest reply and suggestions
accept <n>                     add suggestion n as a task
tasks                          list all tasks
add <name> [priority=] [due=] [recur=] [desc=]
show <id>                      task details
edit <id> [priority=] [due=] [desc=]
pop <id>                       complete a task
bubbles                        list bubbles
click <bubble>                 click a bubble (twice quickly to open it)
drag <bubble> <x> <y>, move <x> <y>, release
tick [n]                       advance n animation frames
due [date]                     show bubbles for a date
calendar [month|week], prev, next, day <date>
quit"
    )?;
    Ok(())
}
