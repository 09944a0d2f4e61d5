/// Per-bubble single/double click disambiguation.
///
/// A first click arms a pending single click; a second click inside the
/// window turns it into a double click. The pending single fires from
/// [`ClickTracker::poll`] once the window elapses without a second click.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ClickTracker {
    #[default]
    Idle,
    PendingSingle { deadline_ms: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Waiting to see whether a second click follows.
    Pending,
    /// Second click inside the window.
    Double,
    /// Release of a drag that landed on the bubble; not a tap.
    Swallowed,
}

impl ClickTracker {
    pub fn click(&mut self, now_ms: f64, window_ms: f64) -> ClickOutcome {
        match *self {
            Self::PendingSingle { deadline_ms } if now_ms <= deadline_ms => {
                *self = Self::Idle;
                ClickOutcome::Double
            }
            _ => {
                *self = Self::PendingSingle {
                    deadline_ms: now_ms + window_ms,
                };
                ClickOutcome::Pending
            }
        }
    }

    /// Returns true exactly once when a pending single click expires.
    pub fn poll(&mut self, now_ms: f64) -> bool {
        match *self {
            Self::PendingSingle { deadline_ms } if now_ms > deadline_ms => {
                *self = Self::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingSingle { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_click_fires_after_window() {
        let mut tracker = ClickTracker::default();
        assert_eq!(tracker.click(0.0, 250.0), ClickOutcome::Pending);
        assert!(!tracker.poll(100.0));
        assert!(!tracker.poll(250.0));
        assert!(tracker.poll(251.0));
        assert!(!tracker.poll(400.0));
        assert_eq!(tracker, ClickTracker::Idle);
    }

    #[test]
    fn second_click_inside_window_is_double() {
        let mut tracker = ClickTracker::default();
        tracker.click(0.0, 250.0);
        assert_eq!(tracker.click(120.0, 250.0), ClickOutcome::Double);
        assert!(!tracker.poll(1000.0));
    }

    #[test]
    fn late_second_click_starts_a_new_single() {
        let mut tracker = ClickTracker::default();
        tracker.click(0.0, 250.0);
        assert_eq!(tracker.click(300.0, 250.0), ClickOutcome::Pending);
        assert!(tracker.is_pending());
    }
}
