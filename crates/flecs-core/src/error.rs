use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Config file not found in {0}\nHint: create flecs.yaml or pass --file <path>"
    )]
    ConfigFileNotFound(PathBuf),

    #[error("Failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("No environment configuration found for '{0}'")]
    EnvironmentNotFound(String),

    #[error("Pipeline configuration not found")]
    EmptyPipeline,

    #[error("Invalid step config on step {index}: {reason}")]
    InvalidStep { index: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
