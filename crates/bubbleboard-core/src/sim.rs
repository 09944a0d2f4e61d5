//! Bubble physics.
//!
//! Velocities are in viewport units per frame, not per second: gravity,
//! damping and the speed clamp are tuned for a display-refresh cadence and
//! the integrator ignores the elapsed time. Elapsed time only drives the
//! pop animation and click timers.

use anyhow::anyhow;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument, trace};

use crate::click::{ClickOutcome, ClickTracker};
use crate::drag::{DragController, DragFlags, PointerButton};
use crate::task::{Priority, Task, TaskId};

const SPAWN_MARGIN_X: f64 = 60.0;
const SPAWN_MARGIN_Y: f64 = 30.0;
const HIGH_PRIORITY_BONUS: f64 = 0.2;
const LOW_PRIORITY_PENALTY: f64 = 0.2;
const DUE_TODAY_BONUS: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsConfig {
    /// Pull toward the viewport center per unit of offset, per frame.
    pub gravity: f64,
    pub damping: f64,
    pub max_speed: f64,
    pub restitution: f64,
    pub base_radius: f64,
    /// Collision passes per frame.
    pub substeps: usize,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 0.0002,
            damping: 0.98,
            max_speed: 1.5,
            restitution: 0.8,
            base_radius: 60.0,
            substeps: 5,
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(anyhow!("physics.damping must be in (0, 1], got {}", self.damping));
        }
        if !(self.max_speed > 0.0) {
            return Err(anyhow!("physics.max_speed must be positive, got {}", self.max_speed));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(anyhow!("physics.restitution must be in [0, 1], got {}", self.restitution));
        }
        if !(self.base_radius > 0.0) {
            return Err(anyhow!("physics.radius must be positive, got {}", self.base_radius));
        }
        if self.substeps == 0 {
            return Err(anyhow!("physics.substeps must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BubbleKey(u64);

impl BubbleKey {
    pub fn get(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleKind {
    Greeting,
    Task(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PopState {
    Live,
    Popping { remaining_ms: f64 },
}

/// Scale factor for a bubble: priority plus a bump when due today.
pub fn bubble_scale(priority: Priority, due_today: bool) -> f64 {
    let mut scale = 1.0;
    match priority {
        Priority::High => scale += HIGH_PRIORITY_BONUS,
        Priority::Low => scale -= LOW_PRIORITY_PENALTY,
        Priority::Medium => {}
    }
    if due_today {
        scale += DUE_TODAY_BONUS;
    }
    scale
}

pub fn task_scale(task: &Task, today: NaiveDate) -> f64 {
    bubble_scale(task.priority, task.due_date == Some(today))
}

#[derive(Debug, Clone)]
pub struct Bubble {
    key: BubbleKey,
    kind: BubbleKind,
    label: String,
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) vx: f64,
    pub(crate) vy: f64,
    radius: f64,
    scale: f64,
    drawn: Point,
    pub(crate) drag: DragFlags,
    click: ClickTracker,
    pop: PopState,
}

impl Bubble {
    pub fn key(&self) -> BubbleKey {
        self.key
    }

    pub fn kind(&self) -> BubbleKind {
        self.kind
    }

    pub fn task_id(&self) -> Option<TaskId> {
        match self.kind {
            BubbleKind::Task(id) => Some(id),
            BubbleKind::Greeting => None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn velocity(&self) -> Point {
        Point::new(self.vx, self.vy)
    }

    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Position as of the last committed frame.
    pub fn drawn(&self) -> Point {
        self.drawn
    }

    pub fn drag_flags(&self) -> DragFlags {
        self.drag
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.dragging
    }

    pub fn is_popping(&self) -> bool {
        matches!(self.pop, PopState::Popping { .. })
    }

    fn is_live(&self) -> bool {
        !self.is_popping()
    }
}

/// Per-frame outcome returned by [`Simulation::tick`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Bubbles whose pending single click expired this frame.
    pub single_clicks: Vec<BubbleKey>,
    /// Popped bubbles removed after their animation.
    pub collected: usize,
}

#[derive(Debug)]
pub struct Simulation {
    config: PhysicsConfig,
    viewport: Viewport,
    bubbles: Vec<Bubble>,
    drag: DragController,
    rng: StdRng,
    next_key: u64,
    clock_ms: f64,
    pop_ms: f64,
    double_click_ms: f64,
}

impl Simulation {
    pub fn new(config: PhysicsConfig, viewport: Viewport) -> Self {
        Self {
            config,
            viewport,
            bubbles: Vec::new(),
            drag: DragController::default(),
            rng: StdRng::from_entropy(),
            next_key: 0,
            clock_ms: 0.0,
            pop_ms: 300.0,
            double_click_ms: 250.0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_pop_ms(mut self, pop_ms: f64) -> Self {
        self.pop_ms = pop_ms;
        self
    }

    pub fn with_double_click_ms(mut self, double_click_ms: f64) -> Self {
        self.double_click_ms = double_click_ms;
        self
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn bubble(&self, key: BubbleKey) -> Option<&Bubble> {
        self.bubbles.iter().find(|b| b.key == key)
    }

    pub fn live_bubble_for_task(&self, id: TaskId) -> Option<&Bubble> {
        self.bubbles
            .iter()
            .find(|b| b.is_live() && b.kind == BubbleKind::Task(id))
    }

    pub fn has_greeting(&self) -> bool {
        self.bubbles.iter().any(|b| b.kind == BubbleKind::Greeting)
    }

    pub fn dragged(&self) -> Option<BubbleKey> {
        self.drag.active()
    }

    /// Adds a bubble at `position` with a random initial velocity.
    pub fn spawn_at(&mut self, kind: BubbleKind, label: &str, scale: f64, position: Point) -> BubbleKey {
        let key = BubbleKey(self.next_key);
        self.next_key += 1;

        let vx = (self.rng.r#gen::<f64>() - 0.5) * 2.0;
        let vy = (self.rng.r#gen::<f64>() - 0.5) * 2.0;
        self.bubbles.push(Bubble {
            key,
            kind,
            label: label.to_string(),
            x: position.x,
            y: position.y,
            vx,
            vy,
            radius: self.config.base_radius * scale,
            scale,
            drawn: position,
            drag: DragFlags::default(),
            click: ClickTracker::Idle,
            pop: PopState::Live,
        });
        trace!(?key, ?kind, x = position.x, y = position.y, "spawned bubble");
        key
    }

    /// Adds the greeting at the viewport center. No-op if one exists.
    pub fn spawn_greeting(&mut self, label: &str) -> Option<BubbleKey> {
        if self.has_greeting() {
            return None;
        }
        let center = self.viewport.center();
        Some(self.spawn_at(BubbleKind::Greeting, label, bubble_scale(Priority::Medium, false), center))
    }

    /// Adds a bubble for `task` at a random spot. A task never has two
    /// bubbles, so an existing one (even mid-pop) is returned instead.
    pub fn spawn_task(&mut self, task: &Task, today: NaiveDate) -> BubbleKey {
        let existing = self
            .bubbles
            .iter()
            .find(|b| b.kind == BubbleKind::Task(task.id));
        if let Some(existing) = existing {
            return existing.key;
        }
        let span_x = (self.viewport.width - 2.0 * SPAWN_MARGIN_X).max(0.0);
        let span_y = (self.viewport.height - 2.0 * SPAWN_MARGIN_Y).max(0.0);
        let position = Point::new(
            self.rng.r#gen::<f64>() * span_x + SPAWN_MARGIN_X,
            self.rng.r#gen::<f64>() * span_y + SPAWN_MARGIN_Y,
        );
        self.spawn_at(BubbleKind::Task(task.id), &task.name, task_scale(task, today), position)
    }

    /// Drops every task bubble, keeping the greeting.
    pub fn clear_task_bubbles(&mut self) {
        let drag = &mut self.drag;
        self.bubbles.retain(|b| {
            let keep = b.kind == BubbleKind::Greeting;
            if !keep {
                drag.forget(b.key);
            }
            keep
        });
    }

    /// Re-derives the size of the live bubble for `task`.
    pub fn resize_for_task(&mut self, task: &Task, today: NaiveDate) -> bool {
        let base_radius = self.config.base_radius;
        let Some(bubble) = self
            .bubbles
            .iter_mut()
            .find(|b| b.is_live() && b.kind == BubbleKind::Task(task.id))
        else {
            return false;
        };
        bubble.scale = task_scale(task, today);
        bubble.radius = base_radius * bubble.scale;
        bubble.label = task.name.clone();
        true
    }

    /// Starts the pop animation. The bubble leaves the physics immediately
    /// and is collected once the animation time has elapsed.
    #[instrument(skip(self))]
    pub fn pop(&mut self, key: BubbleKey) -> Option<BubbleKind> {
        let pop_ms = self.pop_ms;
        let bubble = self.bubbles.iter_mut().find(|b| b.key == key)?;
        if bubble.is_popping() {
            debug!("bubble already popping");
            return None;
        }
        bubble.pop = PopState::Popping { remaining_ms: pop_ms };
        bubble.drag = DragFlags::default();
        bubble.click = ClickTracker::Idle;
        self.drag.forget(key);
        Some(bubble.kind)
    }

    pub fn start_drag(&mut self, key: BubbleKey, pointer: Point, button: PointerButton) -> bool {
        if let Some(previous) = self.drag.active() {
            if previous == key {
                return false;
            }
            self.drag.end(&mut self.bubbles);
        }
        let Some(bubble) = self.bubbles.iter_mut().find(|b| b.key == key && b.is_live()) else {
            return false;
        };
        self.drag.start(bubble, pointer, button)
    }

    pub fn drag_to(&mut self, pointer: Point) -> bool {
        self.drag.move_to(&mut self.bubbles, pointer)
    }

    pub fn end_drag(&mut self) -> Option<BubbleKey> {
        self.drag.end(&mut self.bubbles)
    }

    /// Feeds a click on `key` into its click tracker.
    pub fn click(&mut self, key: BubbleKey) -> Option<ClickOutcome> {
        let now = self.clock_ms;
        let window = self.double_click_ms;
        let bubble = self.bubbles.iter_mut().find(|b| b.key == key && b.is_live())?;
        if bubble.drag.was_just_dragged {
            bubble.drag.was_just_dragged = false;
            return Some(ClickOutcome::Swallowed);
        }
        Some(bubble.click.click(now, window))
    }

    /// Advances one display frame.
    pub fn tick(&mut self, elapsed_ms: f64) -> TickReport {
        self.clock_ms += elapsed_ms.max(0.0);

        self.integrate();
        for _ in 0..self.config.substeps {
            self.resolve_collisions();
        }
        self.handle_boundaries();
        self.commit_positions();

        let mut report = TickReport::default();
        let now = self.clock_ms;
        for bubble in self.bubbles.iter_mut().filter(|b| b.is_live()) {
            if bubble.click.poll(now) {
                report.single_clicks.push(bubble.key);
            }
        }
        report.collected = self.collect_popped(elapsed_ms);
        report
    }

    fn integrate(&mut self) {
        let center = self.viewport.center();
        let cfg = self.config;
        for bubble in self.bubbles.iter_mut().filter(|b| b.is_live() && !b.drag.dragging) {
            bubble.vx += (center.x - bubble.x) * cfg.gravity;
            bubble.vy += (center.y - bubble.y) * cfg.gravity;

            bubble.vx *= cfg.damping;
            bubble.vy *= cfg.damping;

            let speed = bubble.speed();
            if speed > cfg.max_speed {
                bubble.vx = bubble.vx / speed * cfg.max_speed;
                bubble.vy = bubble.vy / speed * cfg.max_speed;
            }

            bubble.x += bubble.vx;
            bubble.y += bubble.vy;
        }
    }

    /// One pairwise pass. A drag-controlled bubble behaves as infinite mass:
    /// it is never pushed and all impulse goes to the other body.
    fn resolve_collisions(&mut self) {
        let restitution = self.config.restitution;
        let count = self.bubbles.len();
        for i in 0..count {
            for j in (i + 1)..count {
                let (head, tail) = self.bubbles.split_at_mut(j);
                let a = &mut head[i];
                let b = &mut tail[0];
                if !a.is_live() || !b.is_live() {
                    continue;
                }
                resolve_pair(a, b, restitution);
            }
        }
    }

    fn handle_boundaries(&mut self) {
        let Viewport { width, height } = self.viewport;
        let restitution = self.config.restitution;
        for bubble in self.bubbles.iter_mut().filter(|b| b.is_live() && !b.drag.dragging) {
            let r = bubble.radius;
            if bubble.x < r {
                bubble.x = r;
                bubble.vx *= -restitution;
            } else if bubble.x > width - r {
                bubble.x = width - r;
                bubble.vx *= -restitution;
            }

            if bubble.y < r {
                bubble.y = r;
                bubble.vy *= -restitution;
            } else if bubble.y > height - r {
                bubble.y = height - r;
                bubble.vy *= -restitution;
            }
        }
    }

    fn commit_positions(&mut self) {
        for bubble in self.bubbles.iter_mut().filter(|b| b.is_live()) {
            bubble.drawn = Point::new(bubble.x, bubble.y);
        }
    }

    fn collect_popped(&mut self, elapsed_ms: f64) -> usize {
        for bubble in &mut self.bubbles {
            if let PopState::Popping { remaining_ms } = &mut bubble.pop {
                *remaining_ms -= elapsed_ms.max(0.0);
            }
        }
        let before = self.bubbles.len();
        self.bubbles
            .retain(|b| !matches!(b.pop, PopState::Popping { remaining_ms } if remaining_ms <= 0.0));
        let collected = before - self.bubbles.len();
        if collected > 0 {
            trace!(collected, "collected popped bubbles");
        }
        collected
    }
}

fn resolve_pair(a: &mut Bubble, b: &mut Bubble, restitution: f64) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let distance = dx.hypot(dy);
    let min_distance = a.radius + b.radius;
    if distance >= min_distance {
        return;
    }

    // Coincident centers have no direction; push apart along x.
    let (nx, ny) = if distance > f64::EPSILON {
        (dx / distance, dy / distance)
    } else {
        (1.0, 0.0)
    };
    let overlap = min_distance - distance;

    match (a.drag.dragging, b.drag.dragging) {
        (true, false) => {
            b.x += overlap * nx;
            b.y += overlap * ny;
        }
        (false, true) => {
            a.x -= overlap * nx;
            a.y -= overlap * ny;
        }
        (true, true) => {}
        (false, false) => {
            let half = overlap / 2.0;
            a.x -= half * nx;
            a.y -= half * ny;
            b.x += half * nx;
            b.y += half * ny;
        }
    }

    // Velocity of b relative to a along the a->b normal; positive means apart.
    let vel_along_normal = (b.vx - a.vx) * nx + (b.vy - a.vy) * ny;
    if vel_along_normal > 0.0 {
        return;
    }

    let impulse = -(1.0 + restitution) * vel_along_normal;
    match (a.drag.dragging, b.drag.dragging) {
        (true, false) => {
            b.vx += impulse * nx;
            b.vy += impulse * ny;
        }
        (false, true) => {
            a.vx -= impulse * nx;
            a.vy -= impulse * ny;
        }
        (true, true) => {}
        (false, false) => {
            let half = impulse / 2.0;
            a.vx -= half * nx;
            a.vy -= half * ny;
            b.vx += half * nx;
            b.vy += half * ny;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim() -> Simulation {
        Simulation::new(PhysicsConfig::default(), Viewport::new(1000.0, 800.0)).with_seed(7)
    }

    fn set_motion(sim: &mut Simulation, key: BubbleKey, pos: Point, vel: Point) {
        let bubble = sim
            .bubbles
            .iter_mut()
            .find(|b| b.key == key)
            .expect("bubble exists");
        bubble.x = pos.x;
        bubble.y = pos.y;
        bubble.vx = vel.x;
        bubble.vy = vel.y;
    }

    fn distance(a: &Bubble, b: &Bubble) -> f64 {
        (b.x - a.x).hypot(b.y - a.y)
    }

    #[test]
    fn scale_tracks_priority_and_due_today() {
        assert!((bubble_scale(Priority::Medium, false) - 1.0).abs() < 1e-12);
        assert!((bubble_scale(Priority::High, false) - 1.2).abs() < 1e-12);
        assert!((bubble_scale(Priority::Low, false) - 0.8).abs() < 1e-12);
        assert!((bubble_scale(Priority::High, true) - 1.35).abs() < 1e-12);
    }

    #[test]
    fn one_pass_separates_an_overlapping_pair() {
        let mut sim = sim();
        let a = sim.spawn_at(BubbleKind::Greeting, "a", 1.0, Point::default());
        let b = sim.spawn_at(BubbleKind::Task(TaskId::new()), "b", 0.8, Point::default());
        set_motion(&mut sim, a, Point::new(400.0, 400.0), Point::new(1.0, 0.0));
        set_motion(&mut sim, b, Point::new(450.0, 410.0), Point::new(-1.0, 0.0));

        sim.resolve_collisions();

        let (ba, bb) = (&sim.bubbles[0], &sim.bubbles[1]);
        assert!(distance(ba, bb) >= ba.radius + bb.radius - 1e-9);
        // Approaching pair must now be moving apart along the normal.
        let nx = (bb.x - ba.x) / distance(ba, bb);
        let ny = (bb.y - ba.y) / distance(ba, bb);
        assert!((bb.vx - ba.vx) * nx + (bb.vy - ba.vy) * ny > 0.0);
    }

    #[test]
    fn separating_pair_gets_no_impulse() {
        let mut sim = sim();
        let a = sim.spawn_at(BubbleKind::Greeting, "a", 1.0, Point::default());
        let b = sim.spawn_at(BubbleKind::Task(TaskId::new()), "b", 1.0, Point::default());
        set_motion(&mut sim, a, Point::new(400.0, 400.0), Point::new(-1.0, 0.0));
        set_motion(&mut sim, b, Point::new(500.0, 400.0), Point::new(1.0, 0.0));

        sim.resolve_collisions();

        assert_eq!(sim.bubbles[0].velocity(), Point::new(-1.0, 0.0));
        assert_eq!(sim.bubbles[1].velocity(), Point::new(1.0, 0.0));
    }

    #[test]
    fn coincident_centers_are_pushed_apart() {
        let mut sim = sim();
        let a = sim.spawn_at(BubbleKind::Greeting, "a", 1.0, Point::default());
        let b = sim.spawn_at(BubbleKind::Task(TaskId::new()), "b", 1.0, Point::default());
        set_motion(&mut sim, a, Point::new(300.0, 300.0), Point::default());
        set_motion(&mut sim, b, Point::new(300.0, 300.0), Point::default());

        sim.resolve_collisions();

        let (ba, bb) = (&sim.bubbles[0], &sim.bubbles[1]);
        assert!(ba.x.is_finite() && bb.x.is_finite());
        assert!(distance(ba, bb) >= ba.radius + bb.radius - 1e-9);
    }

    #[test]
    fn integration_never_exceeds_max_speed() {
        let mut sim = sim();
        let key = sim.spawn_at(BubbleKind::Greeting, "fast", 1.0, Point::default());
        set_motion(&mut sim, key, Point::new(10.0, 10.0), Point::new(40.0, -25.0));

        for _ in 0..50 {
            sim.integrate();
            assert!(sim.bubbles[0].speed() <= sim.config.max_speed + 1e-12);
            sim.handle_boundaries();
        }
    }

    #[test]
    fn boundaries_clamp_and_reflect() {
        let mut sim = sim();
        let key = sim.spawn_at(BubbleKind::Greeting, "wall", 1.0, Point::default());
        set_motion(&mut sim, key, Point::new(20.0, 790.0), Point::new(-1.0, 1.0));

        sim.handle_boundaries();

        let bubble = &sim.bubbles[0];
        assert_eq!(bubble.position(), Point::new(60.0, 740.0));
        assert!((bubble.vx - 0.8).abs() < 1e-12);
        assert!((bubble.vy + 0.8).abs() < 1e-12);
    }

    #[test]
    fn gravity_pulls_toward_center() {
        let mut sim = sim();
        let key = sim.spawn_at(BubbleKind::Greeting, "drift", 1.0, Point::default());
        set_motion(&mut sim, key, Point::new(100.0, 400.0), Point::default());

        sim.integrate();

        assert!(sim.bubbles[0].vx > 0.0);
        assert!(sim.bubbles[0].vy.abs() < 1e-12);
    }

    #[test]
    fn dragged_bubble_stays_under_pointer() {
        let mut sim = sim();
        let held = sim.spawn_at(BubbleKind::Greeting, "held", 1.0, Point::new(500.0, 400.0));
        let other = sim.spawn_at(BubbleKind::Task(TaskId::new()), "other", 1.0, Point::default());
        set_motion(&mut sim, held, Point::new(500.0, 400.0), Point::new(0.5, 0.5));
        set_motion(&mut sim, other, Point::new(560.0, 400.0), Point::new(-1.5, 0.0));

        assert!(sim.start_drag(held, Point::new(510.0, 395.0), PointerButton::Primary));
        for step in 0..30 {
            let pointer = Point::new(510.0 + step as f64 * 3.0, 395.0);
            assert!(sim.drag_to(pointer));
            sim.tick(16.0);
            let bubble = sim.bubble(held).expect("held bubble");
            assert_eq!(bubble.position(), Point::new(pointer.x - 10.0, pointer.y + 5.0));
        }

        let bubble = sim.bubble(held).expect("held bubble");
        let other = sim.bubble(other).expect("other bubble");
        assert!(distance(bubble, other) >= bubble.radius + other.radius - 1e-6);
    }

    #[test]
    fn secondary_button_does_not_drag() {
        let mut sim = sim();
        let key = sim.spawn_at(BubbleKind::Greeting, "g", 1.0, Point::new(100.0, 100.0));
        assert!(!sim.start_drag(key, Point::new(100.0, 100.0), PointerButton::Secondary));
        assert_eq!(sim.dragged(), None);
    }

    #[test]
    fn click_after_drag_is_swallowed_once() {
        let mut sim = sim();
        let key = sim.spawn_at(BubbleKind::Greeting, "g", 1.0, Point::new(300.0, 300.0));

        sim.start_drag(key, Point::new(300.0, 300.0), PointerButton::Primary);
        sim.drag_to(Point::new(320.0, 310.0));
        assert_eq!(sim.end_drag(), Some(key));

        assert_eq!(sim.click(key), Some(ClickOutcome::Swallowed));
        assert_eq!(sim.click(key), Some(ClickOutcome::Pending));
    }

    #[test]
    fn press_without_move_is_a_tap() {
        let mut sim = sim();
        let key = sim.spawn_at(BubbleKind::Greeting, "g", 1.0, Point::new(300.0, 300.0));

        sim.start_drag(key, Point::new(300.0, 300.0), PointerButton::Primary);
        sim.end_drag();

        assert!(!sim.bubble(key).expect("bubble").drag_flags().was_just_dragged);
        assert_eq!(sim.click(key), Some(ClickOutcome::Pending));
    }

    #[test]
    fn pending_click_fires_on_tick() {
        let mut sim = sim().with_double_click_ms(250.0);
        let key = sim.spawn_at(BubbleKind::Greeting, "g", 1.0, Point::new(300.0, 300.0));
        sim.click(key);

        let mut fired = Vec::new();
        for _ in 0..20 {
            fired.extend(sim.tick(16.0).single_clicks);
        }
        assert_eq!(fired, vec![key]);
    }

    #[test]
    fn popped_bubbles_leave_physics_and_are_collected() {
        let mut sim = sim().with_pop_ms(100.0);
        let key = sim.spawn_at(BubbleKind::Greeting, "g", 1.0, Point::new(300.0, 300.0));

        assert_eq!(sim.pop(key), Some(BubbleKind::Greeting));
        assert_eq!(sim.pop(key), None);
        let frozen = sim.bubble(key).expect("still animating").position();

        sim.tick(60.0);
        assert_eq!(sim.bubble(key).expect("still animating").position(), frozen);
        let report = sim.tick(60.0);
        assert_eq!(report.collected, 1);
        assert!(sim.bubble(key).is_none());
    }

    #[test]
    fn clearing_keeps_greeting_and_releases_drag() {
        let mut sim = sim();
        sim.spawn_greeting("hello");
        let task = Task::new("Task", Priority::High);
        let key = sim.spawn_task(&task, NaiveDate::MIN);
        assert_eq!(sim.spawn_task(&task, NaiveDate::MIN), key);

        sim.start_drag(key, Point::new(0.0, 0.0), PointerButton::Primary);
        sim.clear_task_bubbles();

        assert_eq!(sim.bubbles().len(), 1);
        assert!(sim.has_greeting());
        assert_eq!(sim.dragged(), None);
        assert_eq!(sim.spawn_greeting("again"), None);
    }

    #[test]
    fn popping_bubble_blocks_a_second_spawn_for_its_task() {
        let mut sim = sim().with_pop_ms(100.0);
        let task = Task::new("Stretch", Priority::Low);
        let key = sim.spawn_task(&task, NaiveDate::MIN);
        sim.pop(key);

        assert_eq!(sim.spawn_task(&task, NaiveDate::MIN), key);
        assert_eq!(sim.bubbles().len(), 1);

        sim.tick(120.0);
        assert!(sim.bubbles().is_empty());
        assert_ne!(sim.spawn_task(&task, NaiveDate::MIN), key);
    }

    #[test]
    fn stacked_bubbles_never_overlap_more_after_a_tick() {
        let mut sim = sim();
        let held = sim.spawn_at(BubbleKind::Greeting, "held", 1.0, Point::default());
        let stack = [
            (Point::new(540.0, 410.0), 1.0),
            (Point::new(580.0, 390.0), 1.0),
            (Point::new(520.0, 450.0), 0.8),
        ];
        set_motion(&mut sim, held, Point::new(500.0, 400.0), Point::default());
        for (pos, scale) in stack {
            let key = sim.spawn_at(BubbleKind::Task(TaskId::new()), "stacked", scale, Point::default());
            set_motion(&mut sim, key, pos, Point::default());
        }
        assert!(sim.start_drag(held, Point::new(500.0, 400.0), PointerButton::Primary));

        let worst_overlap = |sim: &Simulation| {
            let mut worst = 0.0_f64;
            for (i, a) in sim.bubbles.iter().enumerate() {
                for b in &sim.bubbles[i + 1..] {
                    worst = worst.max(a.radius + b.radius - distance(a, b));
                }
            }
            worst
        };

        let mut previous = worst_overlap(&sim);
        assert!(previous > 50.0);
        for _ in 0..40 {
            sim.tick(16.0);
            let current = worst_overlap(&sim);
            assert!(current <= previous + 1e-3, "overlap grew from {previous} to {current}");
            previous = current;
            assert_eq!(sim.bubble(held).expect("held bubble").position(), Point::new(500.0, 400.0));
        }
        assert!(previous < 1e-3);
    }

    #[test]
    fn spawned_task_bubbles_land_inside_margins() {
        let mut sim = sim();
        for n in 0..50 {
            let task = Task::new(format!("t{n}"), Priority::Medium);
            sim.spawn_task(&task, NaiveDate::MIN);
        }
        for bubble in sim.bubbles() {
            assert!((60.0..940.0).contains(&bubble.x));
            assert!((30.0..770.0).contains(&bubble.y));
            assert!(bubble.vx.abs() <= 1.0 && bubble.vy.abs() <= 1.0);
        }
    }
}
