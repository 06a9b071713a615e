//! Long-running service specs

use serde::{Deserialize, Serialize};

/// Launch type used when a service or task does not name one
pub const DEFAULT_LAUNCH_TYPE: &str = "FARGATE";

/// A service catalog entry
///
/// ```yaml
/// services:
///   web:
///     definition: web
///     load_balancer: public
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    /// Key into `definitions`
    pub definition: String,
    pub description: Option<String>,
    pub launch_type: Option<String>,
    pub desired_count: Option<i32>,
    /// Key into `load_balancers`
    pub load_balancer: Option<String>,
}

impl Service {
    pub fn launch_type(&self) -> &str {
        self.launch_type.as_deref().unwrap_or(DEFAULT_LAUNCH_TYPE)
    }

    pub fn desired_count(&self) -> i32 {
        self.desired_count.unwrap_or(1)
    }
}
