//! Deploy error types

use flecs_build::BuildError;
use flecs_cloud::CloudError;
use flecs_core::StepKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{kind} '{name}' is not defined")]
    ConfigReference { kind: &'static str, name: String },

    #[error("Timed out waiting for {resource} after {attempts} attempts")]
    ResourceTimeout { resource: String, attempts: u32 },

    #[error("Control plane error: {0}")]
    ControlPlane(#[from] CloudError),

    #[error("Task failed: {message}")]
    TaskFailure {
        container: Option<String>,
        message: String,
    },

    #[error("Image build error: {0}")]
    Build(#[from] BuildError),

    #[error("Script failed: {0}")]
    Script(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Step {index} ({kind}) failed: {source}")]
    StepFailed {
        index: usize,
        kind: StepKind,
        source: Box<DeployError>,
    },
}

impl DeployError {
    pub(crate) fn reference(kind: &'static str, name: impl Into<String>) -> Self {
        DeployError::ConfigReference {
            kind,
            name: name.into(),
        }
    }

    /// The error that aborted the pipeline, without the step wrapper
    pub fn root_cause(&self) -> &DeployError {
        match self {
            DeployError::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Index of the pipeline step that failed, if any
    pub fn failed_step(&self) -> Option<usize> {
        match self {
            DeployError::StepFailed { index, .. } => Some(*index),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
