//! Pipeline steps
//!
//! A step is exactly one of docker, script, service or task. The YAML form is
//! a single-key map:
//!
//! ```yaml
//! pipeline:
//!   - docker:
//!       dockerfile: Dockerfile
//!   - task:
//!       command: ./manage.py migrate
//!       definition: web
//!       container: app
//!   - service: web
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// One pipeline step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "RawStep")]
pub enum Step {
    Docker(DockerStep),
    Script(ScriptStep),
    Service(ServiceStep),
    Task(TaskStep),
}

impl Step {
    pub fn kind(&self) -> StepKind {
        match self {
            Step::Docker(_) => StepKind::Docker,
            Step::Script(_) => StepKind::Script,
            Step::Service(_) => StepKind::Service,
            Step::Task(_) => StepKind::Task,
        }
    }

    /// Human readable label for logs
    pub fn label(&self) -> Option<&str> {
        match self {
            Step::Docker(d) => d.repository.as_deref(),
            Step::Script(s) => s.name.as_deref(),
            Step::Service(s) => Some(&s.name),
            Step::Task(t) => t.name.as_deref().or(t.command.as_deref()),
        }
    }
}

/// Step discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Docker,
    Script,
    Service,
    Task,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Docker => write!(f, "docker"),
            StepKind::Script => write!(f, "script"),
            StepKind::Service => write!(f, "service"),
            StepKind::Task => write!(f, "task"),
        }
    }
}

/// Builds and pushes an image to the project's registry repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerStep {
    pub dockerfile: Option<String>,
    /// Repository name, defaults to the project name
    pub repository: Option<String>,
    /// Build context directory, defaults to `.`
    pub path: Option<String>,
}

/// Runs a local script, either a file or an inline command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptStep {
    pub name: Option<String>,
    pub description: Option<String>,
    pub path: Option<String>,
    pub inline: Option<String>,
}

/// Deploys a service from the `services` catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceStep {
    pub name: String,
}

/// Runs a one-off task to completion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskStep {
    pub name: Option<String>,
    pub description: Option<String>,
    pub command: Option<String>,
    /// Key into `definitions`
    pub definition: Option<String>,
    /// Target container, required when the definition has several
    pub container: Option<String>,
    pub launch_type: Option<String>,
}

impl TaskStep {
    pub fn launch_type(&self) -> &str {
        self.launch_type
            .as_deref()
            .unwrap_or(super::service::DEFAULT_LAUNCH_TYPE)
    }
}

/// On-disk step shape before the one-of check
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawStep {
    pub docker: Option<DockerStep>,
    pub script: Option<ScriptStep>,
    pub service: Option<ServiceStep>,
    pub task: Option<TaskStep>,
}

impl TryFrom<RawStep> for Step {
    type Error = String;

    fn try_from(raw: RawStep) -> std::result::Result<Self, Self::Error> {
        match (raw.docker, raw.script, raw.service, raw.task) {
            (Some(docker), None, None, None) => Ok(Step::Docker(docker)),
            (None, Some(script), None, None) => Ok(Step::Script(script)),
            (None, None, Some(service), None) => Ok(Step::Service(service)),
            (None, None, None, Some(task)) => Ok(Step::Task(task)),
            (None, None, None, None) => {
                Err("step must define one of docker, script, service, task".to_string())
            }
            (docker, script, service, task) => {
                let populated = [
                    docker.is_some(),
                    script.is_some(),
                    service.is_some(),
                    task.is_some(),
                ]
                .into_iter()
                .filter(|set| *set)
                .count();
                Err(format!(
                    "step defines {} kinds, expected exactly one",
                    populated
                ))
            }
        }
    }
}
