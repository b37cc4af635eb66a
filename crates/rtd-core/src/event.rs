use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Task,
    Result,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Task => "task",
            EventKind::Result => "result",
        }
    }

    /// The subject segment for this kind, e.g. `tasks` in
    /// `fleet-a.tasks.security.123`.
    pub fn subject_segment(&self) -> &'static str {
        match self {
            EventKind::Task => "tasks",
            EventKind::Result => "results",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "task" => Ok(EventKind::Task),
            "result" => Ok(EventKind::Result),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubjectError {
    #[error("subject has {got} segments, expected at least 4")]
    TooFewSegments { got: usize },
    #[error("subject contains an empty segment")]
    EmptySegment,
}

/// A parsed dot-delimited bus subject: `<fleet>.<kind-plural>.<domain>.<id>`.
///
/// Domain and id are positional (segments 2 and 3); trailing segments
/// beyond the id are tolerated and folded into the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub fleet: String,
    pub kind: String,
    pub domain: String,
    pub id: String,
}

impl Subject {
    pub fn parse(raw: &str) -> Result<Self, SubjectError> {
        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() < 4 {
            return Err(SubjectError::TooFewSegments {
                got: segments.len(),
            });
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(SubjectError::EmptySegment);
        }
        Ok(Subject {
            fleet: segments[0].to_string(),
            kind: segments[1].to_string(),
            domain: segments[2].to_string(),
            id: segments[3..].join("."),
        })
    }

    /// Builds a task subject for an outbound dispatch.
    pub fn task(fleet: &str, domain: &str, task_id: &str) -> String {
        format!("{fleet}.tasks.{domain}.{task_id}")
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.fleet, self.kind, self.domain, self.id)
    }
}

/// One pub/sub message as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub subject: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskPayload {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub knight: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultPayload {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, alias = "duration_seconds", alias = "durationSeconds")]
    pub duration: Option<f64>,
}

/// The event payload decoded once at ingestion; unknown fields are
/// dropped, missing ones stay `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Task(TaskPayload),
    Result(ResultPayload),
}

impl EventPayload {
    fn decode(kind: EventKind, data: &Value) -> Self {
        match kind {
            EventKind::Task => EventPayload::Task(
                serde_json::from_value(data.clone()).unwrap_or_default(),
            ),
            EventKind::Result => EventPayload::Result(
                serde_json::from_value(data.clone()).unwrap_or_default(),
            ),
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            EventPayload::Task(p) => p.task_id.as_deref(),
            EventPayload::Result(p) => p.task_id.as_deref(),
        }
    }
}

/// One observed bus message, payload decoded, timestamp assigned by the
/// receiving side.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub subject: String,
    pub data: Value,
    pub payload: EventPayload,
    pub observed_at: DateTime<Utc>,
}

impl Event {
    pub fn from_wire(wire: WireEvent) -> Self {
        let payload = EventPayload::decode(wire.kind, &wire.data);
        Event {
            kind: wire.kind,
            subject: wire.subject,
            data: wire.data,
            payload,
            observed_at: wire.timestamp,
        }
    }

    pub fn to_wire(&self) -> WireEvent {
        WireEvent {
            kind: self.kind,
            subject: self.subject.clone(),
            data: self.data.clone(),
            timestamp: self.observed_at,
        }
    }

    /// Positional subject parse; `None` when the subject is not the
    /// expected four-segment shape.
    pub fn parsed_subject(&self) -> Option<Subject> {
        Subject::parse(&self.subject).ok()
    }

    /// Attributes the event to a knight: results carry `from`, tasks
    /// carry an explicit `knight` or encode it as the task-id prefix
    /// (task ids are minted as `<knight>-ui-<millis>`).
    pub fn knight(&self) -> Option<String> {
        match &self.payload {
            EventPayload::Task(p) => p
                .knight
                .clone()
                .or_else(|| p.task_id.as_deref().and_then(knight_from_task_id)),
            EventPayload::Result(p) => p
                .from
                .clone()
                .or_else(|| p.task_id.as_deref().and_then(knight_from_task_id)),
        }
    }
}

fn knight_from_task_id(task_id: &str) -> Option<String> {
    task_id
        .split('-')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
