//! Load balancer configuration

use serde::{Deserialize, Serialize};

pub const PROTOCOL_HTTP: &str = "HTTP";
pub const PROTOCOL_HTTPS: &str = "HTTPS";

/// Load balancer in front of a service
///
/// Created on demand and looked up by name on every deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancer {
    pub certificate_arn: Option<String>,
    pub port: Option<i32>,
    pub protocol: Option<String>,
    pub ssl_policy: Option<String>,
    pub target_group: TargetGroup,
}

impl LoadBalancer {
    /// Listener protocol, `HTTP` unless configured
    pub fn protocol(&self) -> String {
        self.protocol
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(str::to_uppercase)
            .unwrap_or_else(|| PROTOCOL_HTTP.to_string())
    }

    /// Listener port, 443 for HTTPS and 80 otherwise unless configured
    pub fn port(&self) -> i32 {
        match self.port {
            Some(port) if port > 0 => port,
            _ if self.protocol() == PROTOCOL_HTTPS => 443,
            _ => 80,
        }
    }

    pub fn is_secure(&self) -> bool {
        self.protocol() == PROTOCOL_HTTPS
    }
}

/// Target group binding for the service's container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetGroup {
    pub container_name: String,
    pub container_port: i32,
    /// Use an existing target group instead of provisioning one
    pub target_group_arn: Option<String>,
}
