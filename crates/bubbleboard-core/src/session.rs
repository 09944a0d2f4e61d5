use chrono::NaiveDate;
use tracing::{debug, error, info, instrument, warn};

use crate::calendar::{self, CalendarEntry, CalendarMode, CalendarPage};
use crate::click::ClickOutcome;
use crate::config::Settings;
use crate::datetime::{self, format_due_label};
use crate::drag::PointerButton;
use crate::schedule;
use crate::sim::{BubbleKey, BubbleKind, Point, Simulation};
use crate::store::{CompleteOutcome, TaskStore};
use crate::suggest::{Conversation, Generation};
use crate::task::{Priority, SuggestedTask, Task, TaskId, TaskPatch};

/// Data behind the task description popup.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDetail {
    pub id: TaskId,
    pub name: String,
    pub priority: Priority,
    pub description: String,
    pub due_label: String,
    pub recurrence: String,
    /// Whether the popup should open straight into edit mode.
    pub editing: bool,
}

/// What a click on a bubble led to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickAction {
    Ignored,
    Swallowed,
    Pending,
    OpenDetail(TaskDetail),
}

/// Side effects of one animation frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutcome {
    pub popped: Vec<BubbleKey>,
    pub collected: usize,
}

/// Owns the task store and the bubble simulation for one board.
///
/// Every operation goes through here so the store, the live bubbles and the
/// displayed date stay consistent with each other.
#[derive(Debug)]
pub struct Session {
    store: TaskStore,
    sim: Simulation,
    greeting: String,
    /// Resolved once; a board spanning midnight keeps its starting date.
    today: NaiveDate,
    displayed: NaiveDate,
    frame_ms: f64,
    calendar_mode: CalendarMode,
    calendar_focus: NaiveDate,
    generation: Generation,
    chips: Vec<SuggestedTask>,
    chip_input: String,
    last_reply: Option<String>,
}

impl Session {
    pub fn new(settings: &Settings, today_override: Option<NaiveDate>, seed: Option<u64>) -> Self {
        let mut sim = Simulation::new(settings.physics, settings.viewport)
            .with_pop_ms(settings.pop_ms)
            .with_double_click_ms(settings.double_click_ms);
        if let Some(seed) = seed {
            sim = sim.with_seed(seed);
        }
        let mut session = Self::with_simulation(sim, &settings.greeting, today_override);
        session.frame_ms = settings.frame_ms as f64;
        session
    }

    pub fn with_simulation(sim: Simulation, greeting: &str, today_override: Option<NaiveDate>) -> Self {
        let today = today_override.unwrap_or_else(datetime::today);
        Self {
            store: TaskStore::new(),
            sim,
            greeting: greeting.to_string(),
            today,
            displayed: today,
            frame_ms: 16.0,
            calendar_mode: CalendarMode::Month,
            calendar_focus: today,
            generation: Generation::default(),
            chips: Vec::new(),
            chip_input: String::new(),
            last_reply: None,
        }
    }

    /// Spawns the greeting and the bubbles due today.
    #[instrument(skip(self))]
    pub fn start(&mut self) {
        self.sim.spawn_greeting(&self.greeting);
        self.render_bubbles_for_date(self.today());
        info!(bubbles = self.sim.bubbles().len(), "board started");
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn displayed_date(&self) -> NaiveDate {
        self.displayed
    }

    pub fn frame_ms(&self) -> f64 {
        self.frame_ms
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    pub fn last_reply(&self) -> Option<&str> {
        self.last_reply.as_deref()
    }

    pub fn chips(&self) -> &[SuggestedTask] {
        &self.chips
    }

    /// Replaces every task bubble with one per task due on `date`.
    #[instrument(skip(self))]
    pub fn render_bubbles_for_date(&mut self, date: NaiveDate) {
        self.displayed = date;
        self.sim.clear_task_bubbles();
        let today = self.today();
        for task in self.store.due_on(date) {
            self.sim.spawn_task(task, today);
        }
        debug!(bubbles = self.sim.bubbles().len(), "rendered bubbles");
    }

    /// Brings the live bubbles in line with the store without disturbing
    /// bubbles that are still due.
    fn reconcile_bubbles(&mut self) {
        let date = self.displayed;
        let stale: Vec<BubbleKey> = self
            .sim
            .bubbles()
            .iter()
            .filter(|b| !b.is_popping())
            .filter_map(|b| match b.kind() {
                BubbleKind::Task(id) => {
                    let due = self.store.get(id).is_some_and(|t| schedule::is_due(t, date));
                    (!due).then_some(b.key())
                }
                BubbleKind::Greeting => None,
            })
            .collect();
        for key in stale {
            self.sim.pop(key);
        }

        let today = self.today();
        for task in self.store.due_on(date) {
            self.sim.spawn_task(task, today);
        }
    }

    /// Adds suggested records and shows any that are due.
    #[instrument(skip(self, records, original_input))]
    pub fn add_tasks(&mut self, records: &[SuggestedTask], original_input: &str) -> Vec<TaskId> {
        let added = self.store.add_suggested(records, original_input, self.today());
        self.reconcile_bubbles();
        added
    }

    pub fn add_task(&mut self, task: Task) -> TaskId {
        let id = self.store.insert(task);
        self.reconcile_bubbles();
        id
    }

    /// Completes a task: recurring tasks record today, one-time tasks go away.
    #[instrument(skip(self))]
    pub fn pop_task(&mut self, id: TaskId) -> bool {
        if let Some(key) = self.sim.live_bubble_for_task(id).map(|b| b.key()) {
            return self.pop_bubble(key);
        }
        match self.store.complete(id, self.today()) {
            CompleteOutcome::NotFound => {
                warn!(%id, "pop requested for unknown task");
                false
            }
            _ => true,
        }
    }

    pub fn pop_bubble(&mut self, key: BubbleKey) -> bool {
        let Some(kind) = self.sim.pop(key) else {
            return false;
        };
        if let BubbleKind::Task(id) = kind {
            let outcome = self.store.complete(id, self.today());
            debug!(%id, ?outcome, "popped task bubble");
        }
        true
    }

    /// Edits a task and refreshes its bubble and the current view.
    #[instrument(skip(self, patch))]
    pub fn edit_task(&mut self, id: TaskId, patch: TaskPatch) -> bool {
        let today = self.today();
        let Some(task) = self.store.edit(id, patch) else {
            error!(%id, "task not found for edit");
            return false;
        };
        self.sim.resize_for_task(task, today);
        self.reconcile_bubbles();
        true
    }

    pub fn task_detail(&self, id: TaskId, editing: bool) -> Option<TaskDetail> {
        let Some(task) = self.store.get(id) else {
            error!(%id, "task not found for detail view");
            return None;
        };
        Some(TaskDetail {
            id,
            name: task.name.clone(),
            priority: task.priority,
            description: task.description.clone(),
            due_label: format_due_label(task.due_date, self.today()),
            recurrence: task.recurrence.to_string(),
            editing,
        })
    }

    pub fn click_bubble(&mut self, key: BubbleKey) -> ClickAction {
        match self.sim.click(key) {
            None => ClickAction::Ignored,
            Some(ClickOutcome::Swallowed) => ClickAction::Swallowed,
            Some(ClickOutcome::Pending) => ClickAction::Pending,
            Some(ClickOutcome::Double) => {
                let task_id = self.sim.bubble(key).and_then(|b| b.task_id());
                match task_id.and_then(|id| self.task_detail(id, true)) {
                    Some(detail) => ClickAction::OpenDetail(detail),
                    None => ClickAction::Ignored,
                }
            }
        }
    }

    pub fn start_drag(&mut self, key: BubbleKey, pointer: Point, button: PointerButton) -> bool {
        self.sim.start_drag(key, pointer, button)
    }

    pub fn drag_to(&mut self, pointer: Point) -> bool {
        self.sim.drag_to(pointer)
    }

    pub fn end_drag(&mut self) -> Option<BubbleKey> {
        self.sim.end_drag()
    }

    /// Advances one animation frame and fires expired single clicks.
    pub fn tick(&mut self, elapsed_ms: f64) -> FrameOutcome {
        let report = self.sim.tick(elapsed_ms);
        let mut outcome = FrameOutcome {
            popped: Vec::new(),
            collected: report.collected,
        };
        for key in report.single_clicks {
            if self.pop_bubble(key) {
                outcome.popped.push(key);
            }
        }
        outcome
    }

    /// Starts a new conversation turn; results of earlier turns become stale.
    pub fn begin_conversation(&mut self, input: &str) -> Option<Generation> {
        if input.trim().is_empty() {
            return None;
        }
        self.generation = self.generation.next();
        self.chips.clear();
        self.last_reply = None;
        Some(self.generation)
    }

    /// Applies a finished conversation unless a newer one has started.
    #[instrument(skip(self, conversation), fields(generation = conversation.generation.get()))]
    pub fn apply_conversation(&mut self, conversation: Conversation) -> bool {
        if conversation.generation != self.generation {
            debug!(current = self.generation.get(), "discarding stale conversation result");
            return false;
        }
        self.chips = conversation
            .suggestions
            .into_iter()
            .filter(|record| record.trimmed_name().is_some())
            .collect();
        self.chip_input = conversation.input;
        self.last_reply = Some(conversation.reply);
        true
    }

    /// Adds the chip at `index` and removes it from the list.
    pub fn accept_chip(&mut self, index: usize) -> Option<Vec<TaskId>> {
        if index >= self.chips.len() {
            return None;
        }
        let chip = self.chips.remove(index);
        let input = self.chip_input.clone();
        Some(self.add_tasks(std::slice::from_ref(&chip), &input))
    }

    pub fn calendar_mode(&self) -> CalendarMode {
        self.calendar_mode
    }

    pub fn set_calendar_mode(&mut self, mode: CalendarMode) {
        self.calendar_mode = mode;
    }

    pub fn shift_calendar(&mut self, step: i64) {
        self.calendar_focus = calendar::shift_focus(self.calendar_mode, self.calendar_focus, step);
    }

    pub fn calendar_page(&self) -> CalendarPage {
        calendar::build_page(&self.store, self.calendar_mode, self.calendar_focus, self.today())
    }

    pub fn day_entries(&self, date: NaiveDate) -> Vec<CalendarEntry> {
        calendar::entries_on(&self.store, date)
    }
}
