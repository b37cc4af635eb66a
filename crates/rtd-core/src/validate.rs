use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Upper bound on dispatched task text.
pub const MAX_TASK_LEN: usize = 10_000;

/// Matches knight / domain / chain identifiers. Anything outside this
/// alphabet could smuggle subject separators or path segments, so it is
/// rejected before reaching the bus or the filesystem.
fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9-]{0,62}$").unwrap())
}

fn briefing_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} identifier")]
    InvalidIdentifier { field: &'static str },
    #[error("task must be 1-{MAX_TASK_LEN} characters, got {len}")]
    TaskLength { len: usize },
    #[error("invalid date format, expected YYYY-MM-DD")]
    InvalidDate,
}

pub fn validate_identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if identifier_re().is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdentifier { field })
    }
}

pub fn validate_task_text(task: &str) -> Result<(), ValidationError> {
    if task.is_empty() || task.len() > MAX_TASK_LEN {
        return Err(ValidationError::TaskLength { len: task.len() });
    }
    Ok(())
}

/// Full dispatch-boundary check: knight and domain identifiers plus task
/// text bounds. Requests failing this never reach the bus.
pub fn validate_dispatch(knight: &str, domain: &str, task: &str) -> Result<(), ValidationError> {
    validate_identifier("knight", knight)?;
    validate_identifier("domain", domain)?;
    validate_task_text(task)
}

/// Briefing keys are strict `YYYY-MM-DD`; everything else is rejected
/// before any filesystem access.
pub fn validate_briefing_date(date: &str) -> Result<(), ValidationError> {
    if briefing_date_re().is_match(date) {
        Ok(())
    } else {
        Err(ValidationError::InvalidDate)
    }
}
