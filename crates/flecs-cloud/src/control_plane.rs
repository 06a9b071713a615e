//! Control plane trait definition

use crate::error::Result;
use crate::types::*;
use async_trait::async_trait;

/// Cluster control plane abstraction
///
/// Every call is a single request/response. Nothing here retries or waits;
/// waiting for a target state is done by the caller re-describing the
/// resource. Lookups that can legitimately miss return `Ok(None)`.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Returns the control plane name (e.g., "aws")
    fn name(&self) -> &str;

    /// Region the control plane operates in
    fn region(&self) -> &str;

    // --- Clusters ---------------------------------------------------------

    async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterInfo>>;

    async fn create_cluster(&self, name: &str) -> Result<ClusterInfo>;

    async fn delete_cluster(&self, name: &str) -> Result<()>;

    // --- Services ---------------------------------------------------------

    /// All service ARNs in the cluster, in listing order
    async fn list_services(&self, cluster: &str) -> Result<Vec<String>>;

    /// Describe services by name or ARN; unknown names are omitted
    async fn describe_services(&self, cluster: &str, names: &[String])
    -> Result<Vec<ServiceInfo>>;

    async fn create_service(&self, request: &CreateServiceRequest) -> Result<ServiceInfo>;

    async fn update_service(&self, request: &UpdateServiceRequest) -> Result<ServiceInfo>;

    async fn delete_service(&self, cluster: &str, name: &str, force: bool) -> Result<()>;

    // --- Task definitions and tasks ---------------------------------------

    /// Register a new revision and return its ARN
    async fn register_task_definition(&self, spec: &TaskDefinitionSpec) -> Result<String>;

    async fn run_task(&self, request: &RunTaskRequest) -> Result<TaskResults>;

    async fn describe_tasks(&self, cluster: &str, task_arns: &[String]) -> Result<TaskResults>;

    // --- Networking -------------------------------------------------------

    async fn describe_security_groups(&self, names: &[String]) -> Result<Vec<SecurityGroupInfo>>;

    /// Subnets whose `Name` tag is one of `names`
    async fn describe_subnets(&self, names: &[String]) -> Result<Vec<SubnetInfo>>;

    /// The account's default-for-AZ subnets
    async fn describe_default_subnets(&self) -> Result<Vec<SubnetInfo>>;

    /// Create a security group and return its id
    async fn create_security_group(
        &self,
        name: &str,
        description: &str,
        vpc_id: Option<&str>,
    ) -> Result<String>;

    /// Add an ingress rule; an identical existing rule is not an error
    async fn authorize_ingress(&self, group_id: &str, rule: &SecurityGroupRule) -> Result<()>;

    /// Add an egress rule; an identical existing rule is not an error
    async fn authorize_egress(&self, group_id: &str, rule: &SecurityGroupRule) -> Result<()>;

    // --- Logs -------------------------------------------------------------

    /// Names of log groups starting with `prefix`
    async fn describe_log_groups(&self, prefix: &str) -> Result<Vec<String>>;

    async fn create_log_group(&self, name: &str) -> Result<()>;

    /// Names of log streams in `group` starting with `prefix`
    async fn describe_log_streams(&self, group: &str, prefix: &str) -> Result<Vec<String>>;

    /// One page of events, oldest first
    async fn get_log_events(
        &self,
        group: &str,
        stream: &str,
        next_token: Option<&str>,
    ) -> Result<LogEventsPage>;

    // --- Identity ---------------------------------------------------------

    async fn get_role(&self, name: &str) -> Result<Option<RoleInfo>>;

    async fn create_role(&self, name: &str, assume_role_policy: &str) -> Result<RoleInfo>;

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;

    async fn caller_identity(&self) -> Result<CallerIdentity>;

    // --- Load balancing ---------------------------------------------------

    async fn describe_load_balancer(&self, name: &str) -> Result<Option<LoadBalancerInfo>>;

    async fn create_load_balancer(
        &self,
        request: &CreateLoadBalancerRequest,
    ) -> Result<LoadBalancerInfo>;

    async fn describe_target_group(&self, name: &str) -> Result<Option<TargetGroupInfo>>;

    async fn create_target_group(
        &self,
        request: &CreateTargetGroupRequest,
    ) -> Result<TargetGroupInfo>;

    async fn describe_listeners(&self, load_balancer_arn: &str) -> Result<Vec<ListenerInfo>>;

    async fn create_listener(&self, request: &CreateListenerRequest) -> Result<ListenerInfo>;

    // --- Image registry ---------------------------------------------------

    async fn describe_repository(&self, name: &str) -> Result<Option<RepositoryInfo>>;

    async fn create_repository(&self, name: &str) -> Result<RepositoryInfo>;

    /// Short-lived push credentials for the account's registry
    async fn registry_credentials(&self) -> Result<RegistryCredentials>;
}
