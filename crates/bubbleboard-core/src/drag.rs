use tracing::{debug, trace};

use crate::sim::{Bubble, BubbleKey, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Auxiliary,
}

/// Drag bookkeeping carried by every bubble.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DragFlags {
    pub dragging: bool,
    pub has_moved: bool,
    /// Set on release when the pointer actually moved; the next click
    /// consults and clears it.
    pub was_just_dragged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveDrag {
    key: BubbleKey,
    offset: Point,
}

/// Single-slot pointer drag. At most one bubble is drag-controlled.
#[derive(Debug, Clone, Default)]
pub struct DragController {
    active: Option<ActiveDrag>,
}

impl DragController {
    pub fn active(&self) -> Option<BubbleKey> {
        self.active.map(|drag| drag.key)
    }

    /// Takes control of `bubble`. Only the primary button starts a drag.
    pub fn start(&mut self, bubble: &mut Bubble, pointer: Point, button: PointerButton) -> bool {
        if button != PointerButton::Primary {
            trace!(?button, "ignoring non-primary drag start");
            return false;
        }

        let offset = Point::new(pointer.x - bubble.x, pointer.y - bubble.y);
        bubble.drag = DragFlags {
            dragging: true,
            has_moved: false,
            was_just_dragged: false,
        };
        self.active = Some(ActiveDrag {
            key: bubble.key(),
            offset,
        });
        debug!(key = ?bubble.key(), ?offset, "drag started");
        true
    }

    /// Moves the dragged bubble to `pointer` minus the grab offset.
    pub fn move_to(&mut self, bubbles: &mut [Bubble], pointer: Point) -> bool {
        let Some(drag) = self.active else {
            return false;
        };
        let Some(bubble) = bubbles.iter_mut().find(|b| b.key() == drag.key) else {
            self.active = None;
            return false;
        };

        bubble.drag.has_moved = true;
        bubble.x = pointer.x - drag.offset.x;
        bubble.y = pointer.y - drag.offset.y;
        true
    }

    /// Releases the dragged bubble, if any.
    pub fn end(&mut self, bubbles: &mut [Bubble]) -> Option<BubbleKey> {
        let drag = self.active.take()?;
        if let Some(bubble) = bubbles.iter_mut().find(|b| b.key() == drag.key) {
            bubble.drag.was_just_dragged = bubble.drag.has_moved;
            bubble.drag.dragging = false;
            debug!(key = ?drag.key, moved = bubble.drag.has_moved, "drag ended");
        }
        Some(drag.key)
    }

    /// Forgets the drag when its bubble leaves the simulation.
    pub(crate) fn forget(&mut self, key: BubbleKey) {
        if self.active.is_some_and(|drag| drag.key == key) {
            self.active = None;
        }
    }
}
