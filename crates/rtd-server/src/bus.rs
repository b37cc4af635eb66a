use chrono::Utc;
use rtd_core::{Event, EventKind, WireEvent};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Recent events retained for the task-history endpoint.
const REPLAY_CAP: usize = 200;
/// Fan-out channel depth; slow subscribers observe a lag error rather
/// than blocking publishers.
const FANOUT_CAP: usize = 256;

/// In-process pub/sub handle: publish stamps and broadcasts an event,
/// subscribers receive live copies, and a bounded replay ring serves
/// history reads.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    replay: Mutex<VecDeque<Event>>,
    published: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FANOUT_CAP);
        EventBus {
            tx,
            replay: Mutex::new(VecDeque::with_capacity(REPLAY_CAP)),
            published: AtomicU64::new(0),
        }
    }

    /// Publishes one message. The receive-side timestamp is assigned
    /// here; delivery to subscribers is best effort.
    pub fn publish(&self, kind: EventKind, subject: String, data: Value) -> Event {
        let event = Event::from_wire(WireEvent {
            kind,
            subject,
            data,
            timestamp: Utc::now(),
        });
        {
            let mut replay = self.replay.lock().unwrap();
            replay.push_front(event.clone());
            replay.truncate(REPLAY_CAP);
        }
        self.published.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.send(event.clone());
        event
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Newest-first result events from the replay ring.
    pub fn recent_results(&self, limit: usize) -> Vec<Event> {
        self.replay
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == EventKind::Result)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn message_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
