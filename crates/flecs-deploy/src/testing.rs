//! In-memory control plane and image builder for engine tests
//!
//! Every call is recorded as `"<operation> <subject>"` in order. Resources
//! move through their states a little on every describe, the way the real
//! control plane converges after a mutating call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flecs_build::{BuildRequest, BuildResult, ImageBuilder, PushCredentials};
use flecs_cloud::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

pub(crate) const ACCOUNT: &str = "123456789012";
const REGION: &str = "eu-west-1";

#[derive(Debug, Clone)]
pub(crate) struct FakeService {
    pub cluster: String,
    pub info: ServiceInfo,
    /// Describes left before the current rollout settles
    pub pending_polls: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeTask {
    pub info: TaskInfo,
    pub polls_until_stopped: u32,
}

pub(crate) struct FakeState {
    pub calls: Vec<String>,
    pub clusters: BTreeMap<String, ClusterInfo>,
    pub cluster_pending: BTreeMap<String, u32>,
    pub services: Vec<FakeService>,
    pub created_services: Vec<CreateServiceRequest>,
    pub task_definitions: Vec<(String, TaskDefinitionSpec)>,
    pub tasks: Vec<FakeTask>,
    pub run_requests: Vec<RunTaskRequest>,
    pub roles: BTreeMap<String, RoleInfo>,
    pub attached_policies: Vec<(String, String)>,
    pub log_groups: Vec<String>,
    pub log_streams: BTreeMap<(String, String), Vec<LogEvent>>,
    pub security_groups: Vec<SecurityGroupInfo>,
    pub named_subnets: Vec<(String, SubnetInfo)>,
    pub default_subnets: Vec<SubnetInfo>,
    pub load_balancers: Vec<LoadBalancerInfo>,
    pub target_groups: Vec<TargetGroupInfo>,
    pub listeners: Vec<(String, ListenerInfo)>,
    pub listener_requests: Vec<CreateListenerRequest>,
    pub repositories: Vec<RepositoryInfo>,
    clock: i64,
    seq: u32,

    // behaviour knobs
    /// Describes after a create/update before the service is stable
    pub stable_after: u32,
    pub never_stable: bool,
    pub never_drain: bool,
    pub fail_create_service: bool,
    /// Describes after a create before the cluster is ACTIVE
    pub cluster_active_after: u32,
    pub task_stop_after: u32,
    /// Exit code and reason per container; missing containers exit 0
    pub container_exits: BTreeMap<String, (Option<i32>, Option<String>)>,
    pub run_failures: Vec<TaskFailure>,
    /// Log lines each container writes
    pub task_logs: BTreeMap<String, Vec<String>>,
    pub log_page_size: usize,
    /// Names another run creates first; our create then reports a conflict
    pub created_concurrently: BTreeSet<String>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            clusters: BTreeMap::new(),
            cluster_pending: BTreeMap::new(),
            services: Vec::new(),
            created_services: Vec::new(),
            task_definitions: Vec::new(),
            tasks: Vec::new(),
            run_requests: Vec::new(),
            roles: BTreeMap::new(),
            attached_policies: Vec::new(),
            log_groups: Vec::new(),
            log_streams: BTreeMap::new(),
            security_groups: Vec::new(),
            named_subnets: Vec::new(),
            default_subnets: vec![
                subnet("subnet-default-a", "vpc-default"),
                subnet("subnet-default-b", "vpc-default"),
            ],
            load_balancers: Vec::new(),
            target_groups: Vec::new(),
            listeners: Vec::new(),
            listener_requests: Vec::new(),
            repositories: Vec::new(),
            clock: 1_700_000_000,
            seq: 0,
            stable_after: 2,
            never_stable: false,
            never_drain: false,
            fail_create_service: false,
            cluster_active_after: 0,
            task_stop_after: 2,
            container_exits: BTreeMap::new(),
            run_failures: Vec::new(),
            task_logs: BTreeMap::new(),
            log_page_size: 2,
            created_concurrently: BTreeSet::new(),
        }
    }
}

pub(crate) fn subnet(id: &str, vpc: &str) -> SubnetInfo {
    SubnetInfo {
        id: id.to_string(),
        name: None,
        vpc_id: Some(vpc.to_string()),
        availability_zone: None,
    }
}

impl FakeState {
    fn record(&mut self, call: impl Into<String>) {
        self.calls.push(call.into());
    }

    fn next_id(&mut self) -> u32 {
        self.seq += 1;
        self.seq
    }

    fn tick(&mut self) -> Option<DateTime<Utc>> {
        self.clock += 60;
        DateTime::from_timestamp(self.clock, 0)
    }

    /// Add a stable, active service as if an earlier run had created it
    pub fn seed_service(&mut self, cluster: &str, name: &str, status: &str) {
        self.clusters
            .entry(cluster.to_string())
            .or_insert_with(|| ClusterInfo {
                name: cluster.to_string(),
                arn: Some(format!("arn:aws:ecs:{}:{}:cluster/{}", REGION, ACCOUNT, cluster)),
                status: STATUS_ACTIVE.to_string(),
            });
        let created_at = self.tick();
        self.services.push(FakeService {
            cluster: cluster.to_string(),
            info: ServiceInfo {
                name: name.to_string(),
                arn: Some(service_arn(cluster, name)),
                status: status.to_string(),
                desired_count: 1,
                running_count: 1,
                deployment_count: 1,
                task_definition: None,
                created_at,
            },
            pending_polls: 0,
        });
    }

    /// Whether a create of `name` loses the race to another run
    fn conflicts(&mut self, name: &str) -> bool {
        self.created_concurrently.remove(name)
    }

    fn live_service_mut(&mut self, cluster: &str, name: &str) -> Option<&mut FakeService> {
        self.services
            .iter_mut()
            .rev()
            .find(|s| s.cluster == cluster && s.info.name == name && s.info.status != STATUS_INACTIVE)
    }
}

fn service_arn(cluster: &str, name: &str) -> String {
    format!("arn:aws:ecs:{}:{}:service/{}/{}", REGION, ACCOUNT, cluster, name)
}

fn not_found(what: impl Into<String>) -> CloudError {
    CloudError::ResourceNotFound(what.into())
}

fn already_exists(what: impl Into<String>) -> CloudError {
    CloudError::AlreadyExists(what.into())
}

#[derive(Default)]
pub(crate) struct FakeControlPlane {
    state: Mutex<FakeState>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, configure: impl FnOnce(&mut FakeState)) -> Self {
        configure(&mut self.state());
        self
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Calls of `operation` (optionally with a subject prefix)
    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| *c == operation || c.starts_with(&format!("{} ", operation)))
            .count()
    }

    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    pub fn created_service_names(&self) -> Vec<String> {
        self.state()
            .created_services
            .iter()
            .map(|r| r.service_name.clone())
            .collect()
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    fn name(&self) -> &str {
        "fake"
    }

    fn region(&self) -> &str {
        REGION
    }

    async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterInfo>> {
        let mut state = self.state();
        state.record(format!("describe_cluster {}", name));

        let ready = match state.cluster_pending.get_mut(name) {
            Some(0) | None => true,
            Some(left) => {
                *left -= 1;
                *left == 0
            }
        };
        if ready {
            if let Some(cluster) = state.clusters.get_mut(name) {
                if cluster.status == "PROVISIONING" {
                    cluster.status = STATUS_ACTIVE.to_string();
                }
            }
        }
        Ok(state.clusters.get(name).cloned())
    }

    async fn create_cluster(&self, name: &str) -> Result<ClusterInfo> {
        let mut state = self.state();
        state.record(format!("create_cluster {}", name));

        let pending = state.cluster_active_after;
        let cluster = ClusterInfo {
            name: name.to_string(),
            arn: Some(format!("arn:aws:ecs:{}:{}:cluster/{}", REGION, ACCOUNT, name)),
            status: if pending == 0 { STATUS_ACTIVE } else { "PROVISIONING" }.to_string(),
        };
        state.cluster_pending.insert(name.to_string(), pending);
        state.clusters.insert(name.to_string(), cluster.clone());
        Ok(cluster)
    }

    async fn delete_cluster(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.record(format!("delete_cluster {}", name));
        let cluster = state
            .clusters
            .get_mut(name)
            .ok_or_else(|| not_found(format!("cluster {}", name)))?;
        cluster.status = STATUS_INACTIVE.to_string();
        Ok(())
    }

    async fn list_services(&self, cluster: &str) -> Result<Vec<String>> {
        let mut state = self.state();
        state.record(format!("list_services {}", cluster));
        if !state.clusters.get(cluster).is_some_and(ClusterInfo::is_active) {
            return Err(not_found(format!("cluster {}", cluster)));
        }
        Ok(state
            .services
            .iter()
            .filter(|s| s.cluster == cluster && s.info.status != STATUS_INACTIVE)
            .filter_map(|s| s.info.arn.clone())
            .collect())
    }

    async fn describe_services(&self, cluster: &str, names: &[String]) -> Result<Vec<ServiceInfo>> {
        let mut state = self.state();
        state.record(format!("describe_services {}", names.join(",")));

        let never_stable = state.never_stable;
        let never_drain = state.never_drain;
        let mut described = Vec::new();
        let mut events = Vec::new();

        for requested in names {
            let name = requested.rsplit('/').next().unwrap_or(requested.as_str());
            let Some(service) = state.live_service_mut(cluster, name) else {
                continue;
            };

            if service.info.status == STATUS_DRAINING {
                if !never_drain {
                    service.info.status = STATUS_INACTIVE.to_string();
                    service.info.running_count = 0;
                    events.push(format!("inactive {}", name));
                }
            } else if service.pending_polls > 0 && !never_stable {
                service.pending_polls -= 1;
                if service.pending_polls == 0 {
                    service.info.running_count = service.info.desired_count;
                    service.info.deployment_count = 1;
                    events.push(format!("stable {}", name));
                }
            }
            described.push(service.info.clone());
        }

        state.calls.extend(events);
        Ok(described)
    }

    async fn create_service(&self, request: &CreateServiceRequest) -> Result<ServiceInfo> {
        let mut state = self.state();
        state.record(format!("create_service {}", request.service_name));

        if state.fail_create_service {
            return Err(CloudError::ApiError(
                "CreateService: capacity provider unavailable".to_string(),
            ));
        }
        if state
            .live_service_mut(&request.cluster, &request.service_name)
            .is_some()
        {
            return Err(CloudError::InvalidRequest(format!(
                "service {} already exists",
                request.service_name
            )));
        }

        let created_at = state.tick();
        let pending_polls = state.stable_after;
        let info = ServiceInfo {
            name: request.service_name.clone(),
            arn: Some(service_arn(&request.cluster, &request.service_name)),
            status: STATUS_ACTIVE.to_string(),
            desired_count: request.desired_count,
            running_count: 0,
            deployment_count: 1,
            task_definition: Some(request.task_definition.clone()),
            created_at,
        };
        state.services.push(FakeService {
            cluster: request.cluster.clone(),
            info: info.clone(),
            pending_polls,
        });
        state.created_services.push(request.clone());
        Ok(info)
    }

    async fn update_service(&self, request: &UpdateServiceRequest) -> Result<ServiceInfo> {
        let mut state = self.state();
        state.record(format!("update_service {}", request.service_name));

        let pending_polls = state.stable_after;
        let service = state
            .live_service_mut(&request.cluster, &request.service_name)
            .ok_or_else(|| not_found(format!("service {}", request.service_name)))?;
        service.info.task_definition = Some(request.task_definition.clone());
        service.info.deployment_count = 2;
        service.pending_polls = pending_polls;
        Ok(service.info.clone())
    }

    async fn delete_service(&self, cluster: &str, name: &str, force: bool) -> Result<()> {
        let mut state = self.state();
        state.record(format!("delete_service {}", name));
        assert!(force, "services are always force-deleted");

        let service = state
            .live_service_mut(cluster, name)
            .ok_or_else(|| not_found(format!("service {}", name)))?;
        service.info.status = STATUS_DRAINING.to_string();
        service.info.desired_count = 0;
        Ok(())
    }

    async fn register_task_definition(&self, spec: &TaskDefinitionSpec) -> Result<String> {
        let mut state = self.state();
        state.record(format!("register_task_definition {}", spec.family));

        let revision = state
            .task_definitions
            .iter()
            .filter(|(_, s)| s.family == spec.family)
            .count()
            + 1;
        let arn = format!(
            "arn:aws:ecs:{}:{}:task-definition/{}:{}",
            REGION, ACCOUNT, spec.family, revision
        );
        state.task_definitions.push((arn.clone(), spec.clone()));
        Ok(arn)
    }

    async fn run_task(&self, request: &RunTaskRequest) -> Result<TaskResults> {
        let mut state = self.state();
        state.record(format!("run_task {}", request.task_definition));
        state.run_requests.push(request.clone());

        if !state.run_failures.is_empty() {
            return Ok(TaskResults {
                tasks: Vec::new(),
                failures: state.run_failures.clone(),
            });
        }

        let spec = state
            .task_definitions
            .iter()
            .find(|(arn, _)| *arn == request.task_definition)
            .map(|(_, spec)| spec.clone())
            .ok_or_else(|| not_found(format!("task definition {}", request.task_definition)))?;

        let task_id = format!("{:08x}", state.next_id());
        let info = TaskInfo {
            arn: format!("arn:aws:ecs:{}:{}:task/{}/{}", REGION, ACCOUNT, request.cluster, task_id),
            last_status: "PENDING".to_string(),
            stopped_reason: None,
            containers: spec
                .containers
                .iter()
                .map(|c| ContainerState {
                    name: c.name.clone(),
                    exit_code: None,
                    reason: None,
                })
                .collect(),
        };

        // what the awslogs driver would write
        for container in &spec.containers {
            let Some(log) = &container.log_configuration else {
                continue;
            };
            let group = log.options["awslogs-group"].clone();
            let stream = format!(
                "{}/{}/{}",
                log.options["awslogs-stream-prefix"], container.name, task_id
            );
            let events: Vec<LogEvent> = state
                .task_logs
                .get(&container.name)
                .map(|lines| {
                    lines
                        .iter()
                        .enumerate()
                        .map(|(i, line)| LogEvent {
                            timestamp: Some(i as i64),
                            message: line.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default();
            state.log_streams.insert((group, stream), events);
        }

        let polls_until_stopped = state.task_stop_after;
        state.tasks.push(FakeTask {
            info: info.clone(),
            polls_until_stopped,
        });

        Ok(TaskResults {
            tasks: vec![info],
            failures: Vec::new(),
        })
    }

    async fn describe_tasks(&self, _cluster: &str, task_arns: &[String]) -> Result<TaskResults> {
        let mut state = self.state();
        state.record(format!("describe_tasks {}", task_arns.join(",")));

        let exits = state.container_exits.clone();
        let mut results = TaskResults::default();
        for arn in task_arns {
            let Some(task) = state.tasks.iter_mut().find(|t| t.info.arn == *arn) else {
                results.failures.push(TaskFailure {
                    arn: Some(arn.clone()),
                    reason: Some("MISSING".to_string()),
                    detail: None,
                });
                continue;
            };

            if !task.info.is_stopped() {
                task.polls_until_stopped = task.polls_until_stopped.saturating_sub(1);
                if task.polls_until_stopped == 0 {
                    task.info.last_status = TASK_STATUS_STOPPED.to_string();
                    task.info.stopped_reason = Some("Essential container in task exited".to_string());
                    for container in &mut task.info.containers {
                        let (code, reason) = exits
                            .get(&container.name)
                            .cloned()
                            .unwrap_or((Some(0), None));
                        container.exit_code = code;
                        container.reason = reason;
                    }
                }
            }
            results.tasks.push(task.info.clone());
        }
        Ok(results)
    }

    async fn describe_security_groups(&self, names: &[String]) -> Result<Vec<SecurityGroupInfo>> {
        let mut state = self.state();
        state.record(format!("describe_security_groups {}", names.join(",")));
        Ok(state
            .security_groups
            .iter()
            .filter(|g| names.contains(&g.name))
            .cloned()
            .collect())
    }

    async fn describe_subnets(&self, names: &[String]) -> Result<Vec<SubnetInfo>> {
        let mut state = self.state();
        state.record(format!("describe_subnets {}", names.join(",")));
        Ok(state
            .named_subnets
            .iter()
            .filter(|(name, _)| names.contains(name))
            .map(|(name, s)| SubnetInfo {
                name: Some(name.clone()),
                ..s.clone()
            })
            .collect())
    }

    async fn describe_default_subnets(&self) -> Result<Vec<SubnetInfo>> {
        let mut state = self.state();
        state.record("describe_default_subnets");
        Ok(state.default_subnets.clone())
    }

    async fn create_security_group(
        &self,
        name: &str,
        _description: &str,
        vpc_id: Option<&str>,
    ) -> Result<String> {
        let mut state = self.state();
        state.record(format!("create_security_group {}", name));
        let id = format!("sg-{:04}", state.next_id());
        state.security_groups.push(SecurityGroupInfo {
            id: id.clone(),
            name: name.to_string(),
            vpc_id: vpc_id.map(str::to_string),
        });
        if state.conflicts(name) {
            return Err(already_exists(format!("security group {}", name)));
        }
        Ok(id)
    }

    async fn authorize_ingress(&self, group_id: &str, rule: &SecurityGroupRule) -> Result<()> {
        self.state()
            .record(format!("authorize_ingress {} {}", group_id, rule.from_port));
        Ok(())
    }

    async fn authorize_egress(&self, group_id: &str, _rule: &SecurityGroupRule) -> Result<()> {
        self.state().record(format!("authorize_egress {}", group_id));
        Ok(())
    }

    async fn describe_log_groups(&self, prefix: &str) -> Result<Vec<String>> {
        let mut state = self.state();
        state.record(format!("describe_log_groups {}", prefix));
        Ok(state
            .log_groups
            .iter()
            .filter(|g| g.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn create_log_group(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.record(format!("create_log_group {}", name));
        state.log_groups.push(name.to_string());
        Ok(())
    }

    async fn describe_log_streams(&self, group: &str, prefix: &str) -> Result<Vec<String>> {
        let mut state = self.state();
        state.record(format!("describe_log_streams {}", prefix));
        Ok(state
            .log_streams
            .keys()
            .filter(|(g, s)| g == group && s.starts_with(prefix))
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn get_log_events(
        &self,
        group: &str,
        stream: &str,
        next_token: Option<&str>,
    ) -> Result<LogEventsPage> {
        let mut state = self.state();
        state.record(format!("get_log_events {}", stream));

        let events = state
            .log_streams
            .get(&(group.to_string(), stream.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("log stream {}", stream)))?;

        let start = next_token
            .and_then(|t| t.strip_prefix("f/"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0)
            .min(events.len());
        let end = (start + state.log_page_size).min(events.len());

        Ok(LogEventsPage {
            events: events[start..end].to_vec(),
            next_forward_token: Some(format!("f/{}", end)),
        })
    }

    async fn get_role(&self, name: &str) -> Result<Option<RoleInfo>> {
        let mut state = self.state();
        state.record(format!("get_role {}", name));
        Ok(state.roles.get(name).cloned())
    }

    async fn create_role(&self, name: &str, assume_role_policy: &str) -> Result<RoleInfo> {
        let mut state = self.state();
        state.record(format!("create_role {}", name));
        assert!(assume_role_policy.contains("ecs-tasks.amazonaws.com"));

        let role = RoleInfo {
            name: name.to_string(),
            arn: format!("arn:aws:iam::{}:role/{}", ACCOUNT, name),
        };
        state.roles.insert(name.to_string(), role.clone());
        if state.conflicts(name) {
            return Err(already_exists(format!("role {}", name)));
        }
        Ok(role)
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        let mut state = self.state();
        state.record(format!("attach_role_policy {}", role_name));
        state
            .attached_policies
            .push((role_name.to_string(), policy_arn.to_string()));
        Ok(())
    }

    async fn caller_identity(&self) -> Result<CallerIdentity> {
        self.state().record("caller_identity");
        Ok(CallerIdentity {
            account: ACCOUNT.to_string(),
            arn: None,
        })
    }

    async fn describe_load_balancer(&self, name: &str) -> Result<Option<LoadBalancerInfo>> {
        let mut state = self.state();
        state.record(format!("describe_load_balancer {}", name));
        let Some(lb) = state.load_balancers.iter_mut().find(|lb| lb.name == name) else {
            return Ok(None);
        };
        let current = lb.clone();
        lb.state = Some(LOAD_BALANCER_STATE_ACTIVE.to_string());
        Ok(Some(current))
    }

    async fn create_load_balancer(
        &self,
        request: &CreateLoadBalancerRequest,
    ) -> Result<LoadBalancerInfo> {
        let mut state = self.state();
        state.record(format!("create_load_balancer {}", request.name));
        let lb = LoadBalancerInfo {
            arn: format!("arn:aws:elasticloadbalancing:{}:{}:loadbalancer/app/{}", REGION, ACCOUNT, request.name),
            name: request.name.clone(),
            dns_name: Some(format!("{}.{}.elb.amazonaws.com", request.name, REGION)),
            state: Some("provisioning".to_string()),
        };
        state.load_balancers.push(lb.clone());
        Ok(lb)
    }

    async fn describe_target_group(&self, name: &str) -> Result<Option<TargetGroupInfo>> {
        let mut state = self.state();
        state.record(format!("describe_target_group {}", name));
        Ok(state.target_groups.iter().find(|tg| tg.name == name).cloned())
    }

    async fn create_target_group(
        &self,
        request: &CreateTargetGroupRequest,
    ) -> Result<TargetGroupInfo> {
        let mut state = self.state();
        state.record(format!("create_target_group {}", request.name));
        assert_eq!(request.target_type, "ip");
        let tg = TargetGroupInfo {
            arn: format!("arn:aws:elasticloadbalancing:{}:{}:targetgroup/{}", REGION, ACCOUNT, request.name),
            name: request.name.clone(),
            port: Some(request.port),
        };
        state.target_groups.push(tg.clone());
        Ok(tg)
    }

    async fn describe_listeners(&self, load_balancer_arn: &str) -> Result<Vec<ListenerInfo>> {
        let mut state = self.state();
        state.record("describe_listeners");
        Ok(state
            .listeners
            .iter()
            .filter(|(lb, _)| lb == load_balancer_arn)
            .map(|(_, l)| l.clone())
            .collect())
    }

    async fn create_listener(&self, request: &CreateListenerRequest) -> Result<ListenerInfo> {
        let mut state = self.state();
        state.record(format!("create_listener {}", request.port));
        let id = state.next_id();
        let listener = ListenerInfo {
            arn: format!("arn:aws:elasticloadbalancing:listener/{}", id),
            port: Some(request.port),
            protocol: Some(request.protocol.clone()),
        };
        state
            .listeners
            .push((request.load_balancer_arn.clone(), listener.clone()));
        state.listener_requests.push(request.clone());
        Ok(listener)
    }

    async fn describe_repository(&self, name: &str) -> Result<Option<RepositoryInfo>> {
        let mut state = self.state();
        state.record(format!("describe_repository {}", name));
        Ok(state.repositories.iter().find(|r| r.name == name).cloned())
    }

    async fn create_repository(&self, name: &str) -> Result<RepositoryInfo> {
        let mut state = self.state();
        state.record(format!("create_repository {}", name));
        let repo = RepositoryInfo {
            name: name.to_string(),
            arn: format!("arn:aws:ecr:{}:{}:repository/{}", REGION, ACCOUNT, name),
            uri: None,
        };
        state.repositories.push(repo.clone());
        if state.conflicts(name) {
            return Err(already_exists(format!("repository {}", name)));
        }
        Ok(repo)
    }

    async fn registry_credentials(&self) -> Result<RegistryCredentials> {
        self.state().record("registry_credentials");
        Ok(RegistryCredentials {
            username: "AWS".to_string(),
            password: "registry-token".to_string(),
            endpoint: Some(format!("https://{}.dkr.ecr.{}.amazonaws.com", ACCOUNT, REGION)),
        })
    }
}

/// Records builds and pushes instead of talking to Docker
#[derive(Default)]
pub(crate) struct FakeImageBuilder {
    pub calls: Mutex<Vec<String>>,
    pub credentials: Mutex<Vec<PushCredentials>>,
}

#[async_trait]
impl ImageBuilder for FakeImageBuilder {
    async fn build(&self, request: &BuildRequest) -> BuildResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("build {}", request.image));
        Ok(())
    }

    async fn push(
        &self,
        image: &str,
        tag: &str,
        credentials: Option<&PushCredentials>,
    ) -> BuildResult<String> {
        let reference = format!("{}:{}", image, tag);
        self.calls.lock().unwrap().push(format!("push {}", reference));
        if let Some(credentials) = credentials {
            self.credentials.lock().unwrap().push(credentials.clone());
        }
        Ok(reference)
    }
}
