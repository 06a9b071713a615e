//! Transport-neutral control plane types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const STATUS_ACTIVE: &str = "ACTIVE";
pub const STATUS_INACTIVE: &str = "INACTIVE";
pub const STATUS_DRAINING: &str = "DRAINING";
pub const TASK_STATUS_STOPPED: &str = "STOPPED";
pub const LOAD_BALANCER_STATE_ACTIVE: &str = "active";

/// A cluster as described by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub name: String,
    pub arn: Option<String>,
    pub status: String,
}

impl ClusterInfo {
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}

/// A service as described by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub arn: Option<String>,
    pub status: String,
    pub desired_count: i32,
    pub running_count: i32,
    /// Number of deployments in flight (1 once a rollout has settled)
    pub deployment_count: usize,
    pub task_definition: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ServiceInfo {
    /// Active, fully rolled out and running the desired number of tasks
    pub fn is_stable(&self) -> bool {
        self.status == STATUS_ACTIVE
            && self.deployment_count == 1
            && self.running_count == self.desired_count
    }

    pub fn is_inactive(&self) -> bool {
        self.status == STATUS_INACTIVE
    }

    /// Still a live candidate for "the" instance of a service
    pub fn is_live(&self) -> bool {
        self.status != STATUS_INACTIVE && self.status != STATUS_DRAINING
    }
}

/// Task network placement (awsvpc)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfiguration {
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub assign_public_ip: bool,
}

/// Target group binding of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLoadBalancer {
    pub target_group_arn: String,
    pub container_name: String,
    pub container_port: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    pub cluster: String,
    pub service_name: String,
    pub task_definition: String,
    pub desired_count: i32,
    pub launch_type: String,
    pub network: NetworkConfiguration,
    pub load_balancers: Vec<ServiceLoadBalancer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateServiceRequest {
    pub cluster: String,
    pub service_name: String,
    pub task_definition: String,
}

/// A task definition revision ready to be registered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinitionSpec {
    pub family: String,
    pub cpu: String,
    pub memory: String,
    pub network_mode: String,
    pub requires_compatibilities: Vec<String>,
    pub execution_role_arn: Option<String>,
    pub task_role_arn: Option<String>,
    pub containers: Vec<ContainerDefinition>,
    pub placement_constraints: Vec<PlacementConstraintSpec>,
    /// Named volumes
    pub volumes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub essential: bool,
    pub environment: BTreeMap<String, String>,
    /// Name -> value-from reference
    pub secrets: BTreeMap<String, String>,
    pub log_configuration: Option<LogConfiguration>,
    pub health_check: Option<HealthCheckSpec>,
    pub mount_points: Vec<MountPointSpec>,
    pub volumes_from: Vec<VolumeFromSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfiguration {
    pub driver: String,
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    pub command: Vec<String>,
    pub interval: Option<i32>,
    pub retries: Option<i32>,
    pub start_period: Option<i32>,
    pub timeout: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPointSpec {
    pub container_path: String,
    pub source_volume: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeFromSpec {
    pub source_container: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementConstraintSpec {
    pub kind: String,
    pub expression: Option<String>,
}

/// Command override applied to a single container of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerOverride {
    pub name: String,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTaskRequest {
    pub cluster: String,
    pub task_definition: String,
    pub launch_type: String,
    pub network: NetworkConfiguration,
    pub container_override: Option<ContainerOverride>,
}

/// Tasks plus per-task failures, as returned by run and describe calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResults {
    pub tasks: Vec<TaskInfo>,
    pub failures: Vec<TaskFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub arn: String,
    pub last_status: String,
    pub stopped_reason: Option<String>,
    pub containers: Vec<ContainerState>,
}

impl TaskInfo {
    pub fn is_stopped(&self) -> bool {
        self.last_status == TASK_STATUS_STOPPED
    }

    /// Last path segment of the task ARN
    pub fn task_id(&self) -> &str {
        self.arn.rsplit('/').next().unwrap_or(&self.arn)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    pub name: String,
    pub exit_code: Option<i32>,
    pub reason: Option<String>,
}

/// A failure reported for a run or describe request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub arn: Option<String>,
    pub reason: Option<String>,
    pub detail: Option<String>,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason.as_deref().unwrap_or("unknown failure"))?;
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        if let Some(arn) = &self.arn {
            write!(f, " [{}]", arn)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetInfo {
    pub id: String,
    /// Value of the `Name` tag
    pub name: Option<String>,
    pub vpc_id: Option<String>,
    pub availability_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupInfo {
    pub id: String,
    pub name: String,
    pub vpc_id: Option<String>,
}

/// A single CIDR rule for a security group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    /// `tcp`, `udp` or `-1` for all
    pub protocol: String,
    pub from_port: i32,
    pub to_port: i32,
    pub cidr: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: Option<i64>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEventsPage {
    pub events: Vec<LogEvent>,
    pub next_forward_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInfo {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerInfo {
    pub arn: String,
    pub name: String,
    pub dns_name: Option<String>,
    pub state: Option<String>,
}

impl LoadBalancerInfo {
    pub fn is_active(&self) -> bool {
        self.state.as_deref() == Some(LOAD_BALANCER_STATE_ACTIVE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLoadBalancerRequest {
    pub name: String,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroupInfo {
    pub arn: String,
    pub name: String,
    pub port: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTargetGroupRequest {
    pub name: String,
    pub port: i32,
    pub protocol: String,
    pub vpc_id: Option<String>,
    /// `ip` for awsvpc tasks
    pub target_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerInfo {
    pub arn: String,
    pub port: Option<i32>,
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateListenerRequest {
    pub load_balancer_arn: String,
    pub port: i32,
    pub protocol: String,
    /// Default forward action
    pub target_group_arn: String,
    pub certificate_arn: Option<String>,
    pub ssl_policy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub name: String,
    pub arn: String,
    pub uri: Option<String>,
}

/// Short-lived registry credentials, handed to the image pusher per call
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
    pub endpoint: Option<String>,
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
