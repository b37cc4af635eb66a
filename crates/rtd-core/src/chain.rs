use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Step results longer than this are truncated for list views.
pub const MAX_RESULT_PREVIEW: usize = 500;

/// Lifecycle phase shared by chain runs and their steps. `Skipped`
/// applies only to steps but shares the enum so color mapping stays
/// uniform downstream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Phase {
    Pending,
    Running,
    StepRunning,
    Completed,
    Failed,
    Skipped,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Pending
    }
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pending => "Pending",
            Phase::Running => "Running",
            Phase::StepRunning => "StepRunning",
            Phase::Completed => "Completed",
            Phase::Failed => "Failed",
            Phase::Skipped => "Skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed | Phase::Skipped)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Phase::Running | Phase::StepRunning)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "pending" | "" => Ok(Phase::Pending),
            "running" => Ok(Phase::Running),
            "steprunning" | "step-running" => Ok(Phase::StepRunning),
            "completed" => Ok(Phase::Completed),
            "failed" => Ok(Phase::Failed),
            "skipped" => Ok(Phase::Skipped),
            other => Err(format!("unknown phase: {other}")),
        }
    }
}

/// One node of a chain's dependency DAG, as served by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub name: String,
    #[serde(default)]
    pub knight: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub retry_count: u32,
}

impl Step {
    pub fn named(name: &str) -> Self {
        Step {
            name: name.to_string(),
            knight: String::new(),
            domain: String::new(),
            phase: Phase::Pending,
            start_time: None,
            completion_time: None,
            result: None,
            depends_on: Vec::new(),
            retry_count: 0,
        }
    }

    pub fn with_deps(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|d| d.to_string()).collect();
        self
    }
}

/// One execution of a multi-step pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChainRun {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub current_step: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

// Provider-side resource shape: declarative spec plus polled status.

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChainMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChainSchedule {
    #[serde(default)]
    pub cron: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpecStep {
    pub name: String,
    #[serde(default)]
    pub knight: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChainSpec {
    #[serde(default)]
    pub schedule: Option<ChainSchedule>,
    #[serde(default)]
    pub steps: Vec<SpecStep>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusStep {
    pub name: String,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub current_step: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<StatusStep>,
}

/// Raw chain resource as reported by the chain provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChainResource {
    #[serde(default)]
    pub metadata: ChainMetadata,
    #[serde(default)]
    pub spec: ChainSpec,
    #[serde(default)]
    pub status: ChainStatus,
}

impl ChainRun {
    /// Merges a provider resource into the API summary: status steps are
    /// enriched with spec structure (knight, domain, dependencies); when
    /// no status steps exist yet, initial Pending steps are derived from
    /// the spec. Step results are truncated for list views.
    pub fn from_resource(resource: ChainResource) -> Self {
        let ChainResource {
            metadata,
            spec,
            status,
        } = resource;

        let mut steps = Vec::with_capacity(status.steps.len().max(spec.steps.len()));
        if status.steps.is_empty() {
            for spec_step in &spec.steps {
                steps.push(Step {
                    name: spec_step.name.clone(),
                    knight: spec_step.knight.clone(),
                    domain: spec_step.domain.clone(),
                    phase: Phase::Pending,
                    start_time: None,
                    completion_time: None,
                    result: None,
                    depends_on: spec_step.depends_on.clone(),
                    retry_count: 0,
                });
            }
        } else {
            for status_step in status.steps {
                let spec_step = spec.steps.iter().find(|s| s.name == status_step.name);
                steps.push(Step {
                    name: status_step.name,
                    knight: spec_step.map(|s| s.knight.clone()).unwrap_or_default(),
                    domain: spec_step.map(|s| s.domain.clone()).unwrap_or_default(),
                    phase: status_step.phase,
                    start_time: status_step.start_time,
                    completion_time: status_step.completion_time,
                    result: status_step.result.map(|r| truncate_result(&r)),
                    depends_on: spec_step.map(|s| s.depends_on.clone()).unwrap_or_default(),
                    retry_count: status_step.retry_count,
                });
            }
        }

        ChainRun {
            name: metadata.name,
            namespace: metadata.namespace,
            phase: status.phase,
            current_step: status.current_step,
            start_time: status.start_time,
            completion_time: status.completion_time,
            steps,
            schedule: spec
                .schedule
                .map(|s| s.cron)
                .filter(|cron| !cron.is_empty()),
        }
    }
}

fn truncate_result(result: &str) -> String {
    if result.len() <= MAX_RESULT_PREVIEW {
        return result.to_string();
    }
    let mut end = MAX_RESULT_PREVIEW;
    while !result.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &result[..end])
}
