//! Task definition templates
//!
//! YAML form:
//! ```yaml
//! definitions:
//!   web:
//!     cpu: 512
//!     memory: 1024
//!     containers:
//!       - name: app
//!         image: nginx:alpine
//!         command: nginx -g "daemon off;"
//! ```

use serde::{Deserialize, Serialize};

/// Default CPU units when a definition leaves `cpu` unset
pub const DEFAULT_CPU: u32 = 256;

/// Default memory (MiB) when a definition leaves `memory` unset
pub const DEFAULT_MEMORY: u32 = 512;

/// A registrable unit of execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Definition {
    pub containers: Vec<Container>,
    /// CPU units, 0 means [`DEFAULT_CPU`]
    pub cpu: u32,
    /// Memory in MiB, 0 means [`DEFAULT_MEMORY`]
    pub memory: u32,
    pub execution_role_name: Option<String>,
    pub task_role_name: Option<String>,
    pub volume_name: Option<String>,
    pub placement_constraints: Vec<PlacementConstraint>,
}

impl Definition {
    pub fn effective_cpu(&self) -> u32 {
        if self.cpu == 0 { DEFAULT_CPU } else { self.cpu }
    }

    pub fn effective_memory(&self) -> u32 {
        if self.memory == 0 {
            DEFAULT_MEMORY
        } else {
            self.memory
        }
    }

    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.name == name)
    }
}

/// A container inside a definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Container {
    pub name: String,
    pub image: String,
    /// Command line, tokenised shell-style when registered
    pub command: Option<String>,
    /// Ignored (forced true) when this is the only container
    pub essential: bool,
    pub healthcheck: Option<HealthCheck>,
    pub mount_points: Vec<MountPoint>,
    pub volumes_from: Vec<VolumeFrom>,
}

/// Container health check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheck {
    pub command: String,
    pub interval: Option<i32>,
    pub retries: Option<i32>,
    pub start_period: Option<i32>,
    pub timeout: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountPoint {
    pub container_path: String,
    pub read_only: bool,
    pub source_volume: String,
}

/// Shares the volumes of another container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeFrom {
    pub read_only: bool,
    pub source_container: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementConstraint {
    /// Constraint type, e.g. `memberOf`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub expression: Option<String>,
}
