use rtd_core::Event;
use std::collections::VecDeque;

/// Hard cap on buffered events. The bus is unbounded; a long-lived
/// session must not be.
pub const MAX_EVENTS: usize = 200;

/// Bounded, newest-first event buffer. Live events are prepended and
/// eviction always removes the oldest entries (by receipt order, not by
/// embedded timestamp).
#[derive(Debug, Clone)]
pub struct EventRing {
    events: VecDeque<Event>,
    cap: usize,
}

impl Default for EventRing {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRing {
    pub fn new() -> Self {
        Self::with_capacity(MAX_EVENTS)
    }

    /// Smaller buffers are allowed; anything above `MAX_EVENTS` is
    /// clamped to it.
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.min(MAX_EVENTS);
        EventRing {
            events: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Inserts a freshly observed event at the front, evicting from the
    /// back once over capacity.
    pub fn push_live(&mut self, event: Event) {
        self.events.push_front(event);
        self.events.truncate(self.cap);
    }

    /// Merges a one-time historical batch (oldest-affected order) behind
    /// any already-buffered live events, still capped.
    pub fn seed_history(&mut self, history: impl IntoIterator<Item = Event>) {
        for event in history {
            if self.events.len() >= self.cap {
                break;
            }
            self.events.push_back(event);
        }
    }

    /// Read-only copy for consumers; they never mutate the buffer.
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
