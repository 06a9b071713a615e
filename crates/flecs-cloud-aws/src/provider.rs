//! AWS control plane implementation

use crate::convert;
use crate::error::{api_error, build_error, missing};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ec2::error::ProvideErrorMetadata;
use aws_sdk_ec2::types as ec2;
use aws_sdk_ecs::types as ecs;
use aws_sdk_elasticloadbalancingv2::types as elb;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flecs_cloud::*;
use tracing::{debug, info};

const DUPLICATE_PERMISSION: &str = "InvalidPermission.Duplicate";
/// DescribeServices accepts at most this many services per call
const DESCRIBE_SERVICES_BATCH: usize = 10;

/// [`ControlPlane`] backed by the AWS SDK
pub struct AwsControlPlane {
    region: String,
    ecs: aws_sdk_ecs::Client,
    ec2: aws_sdk_ec2::Client,
    logs: aws_sdk_cloudwatchlogs::Client,
    iam: aws_sdk_iam::Client,
    sts: aws_sdk_sts::Client,
    elb: aws_sdk_elasticloadbalancingv2::Client,
    ecr: aws_sdk_ecr::Client,
}

impl AwsControlPlane {
    /// Load credentials from the default provider chain
    ///
    /// The registry client talks to `ecr_region`; every other client uses
    /// `region`.
    pub async fn new(region: impl Into<String>, ecr_region: impl Into<String>) -> Self {
        let region = region.into();
        let ecr_region = ecr_region.into();
        info!(region = %region, ecr_region = %ecr_region, "Initializing AWS control plane");

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .load()
            .await;

        let ecr_config = aws_sdk_ecr::config::Builder::from(&shared)
            .region(Region::new(ecr_region))
            .build();

        Self {
            region,
            ecs: aws_sdk_ecs::Client::new(&shared),
            ec2: aws_sdk_ec2::Client::new(&shared),
            logs: aws_sdk_cloudwatchlogs::Client::new(&shared),
            iam: aws_sdk_iam::Client::new(&shared),
            sts: aws_sdk_sts::Client::new(&shared),
            elb: aws_sdk_elasticloadbalancingv2::Client::new(&shared),
            ecr: aws_sdk_ecr::Client::from_conf(ecr_config),
        }
    }
}

#[async_trait]
impl ControlPlane for AwsControlPlane {
    fn name(&self) -> &str {
        "aws"
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterInfo>> {
        let output = self
            .ecs
            .describe_clusters()
            .clusters(name)
            .send()
            .await
            .map_err(|e| api_error("DescribeClusters", e))?;

        Ok(output
            .clusters()
            .iter()
            .find(|c| c.cluster_name() == Some(name))
            .map(convert::cluster_info))
    }

    async fn create_cluster(&self, name: &str) -> Result<ClusterInfo> {
        let output = self
            .ecs
            .create_cluster()
            .cluster_name(name)
            .send()
            .await
            .map_err(|e| api_error("CreateCluster", e))?;

        output
            .cluster()
            .map(convert::cluster_info)
            .ok_or_else(|| missing("CreateCluster", "cluster"))
    }

    async fn delete_cluster(&self, name: &str) -> Result<()> {
        self.ecs
            .delete_cluster()
            .cluster(name)
            .send()
            .await
            .map_err(|e| api_error("DeleteCluster", e))?;
        Ok(())
    }

    async fn list_services(&self, cluster: &str) -> Result<Vec<String>> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .ecs
                .list_services()
                .cluster(cluster)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| api_error("ListServices", e))?;

            arns.extend(output.service_arns().iter().cloned());

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(arns)
    }

    async fn describe_services(&self, cluster: &str, names: &[String]) -> Result<Vec<ServiceInfo>> {
        let mut services = Vec::with_capacity(names.len());

        for batch in names.chunks(DESCRIBE_SERVICES_BATCH) {
            let output = self
                .ecs
                .describe_services()
                .cluster(cluster)
                .set_services(Some(batch.to_vec()))
                .send()
                .await
                .map_err(|e| api_error("DescribeServices", e))?;

            services.extend(output.services().iter().map(convert::service_info));
        }

        Ok(services)
    }

    async fn create_service(&self, request: &CreateServiceRequest) -> Result<ServiceInfo> {
        let output = self
            .ecs
            .create_service()
            .cluster(&request.cluster)
            .service_name(&request.service_name)
            .task_definition(&request.task_definition)
            .desired_count(request.desired_count)
            .launch_type(ecs::LaunchType::from(request.launch_type.as_str()))
            .network_configuration(convert::network_configuration(&request.network)?)
            .set_load_balancers(Some(
                request
                    .load_balancers
                    .iter()
                    .map(convert::load_balancer)
                    .collect(),
            ))
            .send()
            .await
            .map_err(|e| api_error("CreateService", e))?;

        output
            .service()
            .map(convert::service_info)
            .ok_or_else(|| missing("CreateService", "service"))
    }

    async fn update_service(&self, request: &UpdateServiceRequest) -> Result<ServiceInfo> {
        let output = self
            .ecs
            .update_service()
            .cluster(&request.cluster)
            .service(&request.service_name)
            .task_definition(&request.task_definition)
            .send()
            .await
            .map_err(|e| api_error("UpdateService", e))?;

        output
            .service()
            .map(convert::service_info)
            .ok_or_else(|| missing("UpdateService", "service"))
    }

    async fn delete_service(&self, cluster: &str, name: &str, force: bool) -> Result<()> {
        self.ecs
            .delete_service()
            .cluster(cluster)
            .service(name)
            .force(force)
            .send()
            .await
            .map_err(|e| api_error("DeleteService", e))?;
        Ok(())
    }

    async fn register_task_definition(&self, spec: &TaskDefinitionSpec) -> Result<String> {
        let containers = spec
            .containers
            .iter()
            .map(convert::container_definition)
            .collect::<Result<Vec<_>>>()?;

        let mut builder = self
            .ecs
            .register_task_definition()
            .family(&spec.family)
            .cpu(&spec.cpu)
            .memory(&spec.memory)
            .network_mode(ecs::NetworkMode::from(spec.network_mode.as_str()))
            .set_execution_role_arn(spec.execution_role_arn.clone())
            .set_task_role_arn(spec.task_role_arn.clone())
            .set_container_definitions(Some(containers))
            .set_placement_constraints(Some(
                spec.placement_constraints
                    .iter()
                    .map(convert::placement_constraint)
                    .collect(),
            ))
            .set_volumes(Some(
                spec.volumes
                    .iter()
                    .map(|name| ecs::Volume::builder().name(name).build())
                    .collect(),
            ));

        for compatibility in &spec.requires_compatibilities {
            builder = builder.requires_compatibilities(ecs::Compatibility::from(compatibility.as_str()));
        }

        let output = builder
            .send()
            .await
            .map_err(|e| api_error("RegisterTaskDefinition", e))?;

        output
            .task_definition()
            .and_then(|d| d.task_definition_arn())
            .map(str::to_string)
            .ok_or_else(|| missing("RegisterTaskDefinition", "task definition ARN"))
    }

    async fn run_task(&self, request: &RunTaskRequest) -> Result<TaskResults> {
        let overrides = request.container_override.as_ref().map(|o| {
            ecs::TaskOverride::builder()
                .container_overrides(
                    ecs::ContainerOverride::builder()
                        .name(&o.name)
                        .set_command(Some(o.command.clone()))
                        .build(),
                )
                .build()
        });

        let output = self
            .ecs
            .run_task()
            .cluster(&request.cluster)
            .task_definition(&request.task_definition)
            .launch_type(ecs::LaunchType::from(request.launch_type.as_str()))
            .network_configuration(convert::network_configuration(&request.network)?)
            .set_overrides(overrides)
            .send()
            .await
            .map_err(|e| api_error("RunTask", e))?;

        Ok(convert::task_results(output.tasks(), output.failures()))
    }

    async fn describe_tasks(&self, cluster: &str, task_arns: &[String]) -> Result<TaskResults> {
        let output = self
            .ecs
            .describe_tasks()
            .cluster(cluster)
            .set_tasks(Some(task_arns.to_vec()))
            .send()
            .await
            .map_err(|e| api_error("DescribeTasks", e))?;

        Ok(convert::task_results(output.tasks(), output.failures()))
    }

    async fn describe_security_groups(&self, names: &[String]) -> Result<Vec<SecurityGroupInfo>> {
        let output = self
            .ec2
            .describe_security_groups()
            .filters(
                ec2::Filter::builder()
                    .name("group-name")
                    .set_values(Some(names.to_vec()))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| api_error("DescribeSecurityGroups", e))?;

        Ok(output
            .security_groups()
            .iter()
            .filter_map(|g| {
                Some(SecurityGroupInfo {
                    id: g.group_id()?.to_string(),
                    name: g.group_name().unwrap_or_default().to_string(),
                    vpc_id: g.vpc_id().map(str::to_string),
                })
            })
            .collect())
    }

    async fn describe_subnets(&self, names: &[String]) -> Result<Vec<SubnetInfo>> {
        describe_subnets(
            &self.ec2,
            ec2::Filter::builder()
                .name("tag:Name")
                .set_values(Some(names.to_vec()))
                .build(),
        )
        .await
    }

    async fn describe_default_subnets(&self) -> Result<Vec<SubnetInfo>> {
        describe_subnets(
            &self.ec2,
            ec2::Filter::builder()
                .name("default-for-az")
                .values("true")
                .build(),
        )
        .await
    }

    async fn create_security_group(
        &self,
        name: &str,
        description: &str,
        vpc_id: Option<&str>,
    ) -> Result<String> {
        let output = self
            .ec2
            .create_security_group()
            .group_name(name)
            .description(description)
            .set_vpc_id(vpc_id.map(str::to_string))
            .send()
            .await
            .map_err(|e| api_error("CreateSecurityGroup", e))?;

        output
            .group_id()
            .map(str::to_string)
            .ok_or_else(|| missing("CreateSecurityGroup", "group id"))
    }

    async fn authorize_ingress(&self, group_id: &str, rule: &SecurityGroupRule) -> Result<()> {
        let result = self
            .ec2
            .authorize_security_group_ingress()
            .group_id(group_id)
            .ip_permissions(ip_permission(rule))
            .send()
            .await;
        tolerate_duplicate("AuthorizeSecurityGroupIngress", group_id, result)
    }

    async fn authorize_egress(&self, group_id: &str, rule: &SecurityGroupRule) -> Result<()> {
        let result = self
            .ec2
            .authorize_security_group_egress()
            .group_id(group_id)
            .ip_permissions(ip_permission(rule))
            .send()
            .await;
        tolerate_duplicate("AuthorizeSecurityGroupEgress", group_id, result)
    }

    async fn describe_log_groups(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .logs
                .describe_log_groups()
                .log_group_name_prefix(prefix)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| api_error("DescribeLogGroups", e))?;

            names.extend(
                output
                    .log_groups()
                    .iter()
                    .filter_map(|g| g.log_group_name().map(str::to_string)),
            );

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(names)
    }

    async fn create_log_group(&self, name: &str) -> Result<()> {
        match self.logs.create_log_group().log_group_name(name).send().await {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|s| s.is_resource_already_exists_exception()) =>
            {
                debug!(log_group = %name, "Log group already exists");
                Ok(())
            }
            Err(e) => Err(api_error("CreateLogGroup", e)),
        }
    }

    async fn describe_log_streams(&self, group: &str, prefix: &str) -> Result<Vec<String>> {
        match self
            .logs
            .describe_log_streams()
            .log_group_name(group)
            .log_stream_name_prefix(prefix)
            .send()
            .await
        {
            Ok(output) => Ok(output
                .log_streams()
                .iter()
                .filter_map(|s| s.log_stream_name().map(str::to_string))
                .collect()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|s| s.is_resource_not_found_exception()) =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(api_error("DescribeLogStreams", e)),
        }
    }

    async fn get_log_events(
        &self,
        group: &str,
        stream: &str,
        next_token: Option<&str>,
    ) -> Result<LogEventsPage> {
        let output = self
            .logs
            .get_log_events()
            .log_group_name(group)
            .log_stream_name(stream)
            .start_from_head(true)
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| api_error("GetLogEvents", e))?;

        Ok(LogEventsPage {
            events: output
                .events()
                .iter()
                .map(|e| LogEvent {
                    timestamp: e.timestamp(),
                    message: e.message().unwrap_or_default().to_string(),
                })
                .collect(),
            next_forward_token: output.next_forward_token().map(str::to_string),
        })
    }

    async fn get_role(&self, name: &str) -> Result<Option<RoleInfo>> {
        match self.iam.get_role().role_name(name).send().await {
            Ok(output) => Ok(output.role().map(|r| RoleInfo {
                name: r.role_name().to_string(),
                arn: r.arn().to_string(),
            })),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_no_such_entity_exception()) => {
                Ok(None)
            }
            Err(e) => Err(api_error("GetRole", e)),
        }
    }

    async fn create_role(&self, name: &str, assume_role_policy: &str) -> Result<RoleInfo> {
        let output = self
            .iam
            .create_role()
            .role_name(name)
            .assume_role_policy_document(assume_role_policy)
            .send()
            .await
            .map_err(|e| api_error("CreateRole", e))?;

        output
            .role()
            .map(|r| RoleInfo {
                name: r.role_name().to_string(),
                arn: r.arn().to_string(),
            })
            .ok_or_else(|| missing("CreateRole", "role"))
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        self.iam
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| api_error("AttachRolePolicy", e))?;
        Ok(())
    }

    async fn caller_identity(&self) -> Result<CallerIdentity> {
        let output = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| api_error("GetCallerIdentity", e))?;

        Ok(CallerIdentity {
            account: output
                .account()
                .map(str::to_string)
                .ok_or_else(|| missing("GetCallerIdentity", "account"))?,
            arn: output.arn().map(str::to_string),
        })
    }

    async fn describe_load_balancer(&self, name: &str) -> Result<Option<LoadBalancerInfo>> {
        match self.elb.describe_load_balancers().names(name).send().await {
            Ok(output) => Ok(output.load_balancers().first().and_then(load_balancer_info)),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|s| s.is_load_balancer_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(e) => Err(api_error("DescribeLoadBalancers", e)),
        }
    }

    async fn create_load_balancer(
        &self,
        request: &CreateLoadBalancerRequest,
    ) -> Result<LoadBalancerInfo> {
        let output = self
            .elb
            .create_load_balancer()
            .name(&request.name)
            .set_subnets(Some(request.subnets.clone()))
            .set_security_groups(Some(request.security_groups.clone()))
            .send()
            .await
            .map_err(|e| api_error("CreateLoadBalancer", e))?;

        output
            .load_balancers()
            .first()
            .and_then(load_balancer_info)
            .ok_or_else(|| missing("CreateLoadBalancer", "load balancer"))
    }

    async fn describe_target_group(&self, name: &str) -> Result<Option<TargetGroupInfo>> {
        match self.elb.describe_target_groups().names(name).send().await {
            Ok(output) => Ok(output.target_groups().first().and_then(target_group_info)),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|s| s.is_target_group_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(e) => Err(api_error("DescribeTargetGroups", e)),
        }
    }

    async fn create_target_group(
        &self,
        request: &CreateTargetGroupRequest,
    ) -> Result<TargetGroupInfo> {
        let output = self
            .elb
            .create_target_group()
            .name(&request.name)
            .port(request.port)
            .protocol(elb::ProtocolEnum::from(request.protocol.as_str()))
            .set_vpc_id(request.vpc_id.clone())
            .target_type(elb::TargetTypeEnum::from(request.target_type.as_str()))
            .send()
            .await
            .map_err(|e| api_error("CreateTargetGroup", e))?;

        output
            .target_groups()
            .first()
            .and_then(target_group_info)
            .ok_or_else(|| missing("CreateTargetGroup", "target group"))
    }

    async fn describe_listeners(&self, load_balancer_arn: &str) -> Result<Vec<ListenerInfo>> {
        let output = self
            .elb
            .describe_listeners()
            .load_balancer_arn(load_balancer_arn)
            .send()
            .await
            .map_err(|e| api_error("DescribeListeners", e))?;

        Ok(output.listeners().iter().filter_map(listener_info).collect())
    }

    async fn create_listener(&self, request: &CreateListenerRequest) -> Result<ListenerInfo> {
        let action = elb::Action::builder()
            .r#type(elb::ActionTypeEnum::Forward)
            .target_group_arn(&request.target_group_arn)
            .build()
            .map_err(|e| build_error("listener action", e))?;

        let certificates = request.certificate_arn.as_ref().map(|arn| {
            vec![elb::Certificate::builder().certificate_arn(arn).build()]
        });

        let output = self
            .elb
            .create_listener()
            .load_balancer_arn(&request.load_balancer_arn)
            .port(request.port)
            .protocol(elb::ProtocolEnum::from(request.protocol.as_str()))
            .default_actions(action)
            .set_certificates(certificates)
            .set_ssl_policy(request.ssl_policy.clone())
            .send()
            .await
            .map_err(|e| api_error("CreateListener", e))?;

        output
            .listeners()
            .first()
            .and_then(listener_info)
            .ok_or_else(|| missing("CreateListener", "listener"))
    }

    async fn describe_repository(&self, name: &str) -> Result<Option<RepositoryInfo>> {
        match self.ecr.describe_repositories().repository_names(name).send().await {
            Ok(output) => Ok(output.repositories().first().and_then(repository_info)),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|s| s.is_repository_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(e) => Err(api_error("DescribeRepositories", e)),
        }
    }

    async fn create_repository(&self, name: &str) -> Result<RepositoryInfo> {
        let output = self
            .ecr
            .create_repository()
            .repository_name(name)
            .send()
            .await
            .map_err(|e| api_error("CreateRepository", e))?;

        output
            .repository()
            .and_then(repository_info)
            .ok_or_else(|| missing("CreateRepository", "repository"))
    }

    async fn registry_credentials(&self) -> Result<RegistryCredentials> {
        let output = self
            .ecr
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| api_error("GetAuthorizationToken", e))?;

        let data = output
            .authorization_data()
            .first()
            .ok_or_else(|| missing("GetAuthorizationToken", "authorization data"))?;
        let token = data
            .authorization_token()
            .ok_or_else(|| missing("GetAuthorizationToken", "authorization token"))?;

        let (username, password) = decode_authorization_token(token)?;
        Ok(RegistryCredentials {
            username,
            password,
            endpoint: data.proxy_endpoint().map(str::to_string),
        })
    }
}

async fn describe_subnets(client: &aws_sdk_ec2::Client, filter: ec2::Filter) -> Result<Vec<SubnetInfo>> {
    let output = client
        .describe_subnets()
        .filters(filter)
        .send()
        .await
        .map_err(|e| api_error("DescribeSubnets", e))?;

    Ok(output
        .subnets()
        .iter()
        .filter_map(|s| {
            Some(SubnetInfo {
                id: s.subnet_id()?.to_string(),
                name: s
                    .tags()
                    .iter()
                    .find(|t| t.key() == Some("Name"))
                    .and_then(|t| t.value())
                    .map(str::to_string),
                vpc_id: s.vpc_id().map(str::to_string),
                availability_zone: s.availability_zone().map(str::to_string),
            })
        })
        .collect())
}

fn ip_permission(rule: &SecurityGroupRule) -> ec2::IpPermission {
    ec2::IpPermission::builder()
        .ip_protocol(&rule.protocol)
        .from_port(rule.from_port)
        .to_port(rule.to_port)
        .ip_ranges(
            ec2::IpRange::builder()
                .cidr_ip(&rule.cidr)
                .description(&rule.description)
                .build(),
        )
        .build()
}

fn tolerate_duplicate<T, E>(
    operation: &str,
    group_id: &str,
    result: std::result::Result<T, E>,
) -> Result<()>
where
    E: std::error::Error + ProvideErrorMetadata,
{
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.code() == Some(DUPLICATE_PERMISSION) => {
            debug!(group_id = %group_id, operation, "Rule already present");
            Ok(())
        }
        Err(e) => Err(api_error(operation, e)),
    }
}

fn load_balancer_info(lb: &elb::LoadBalancer) -> Option<LoadBalancerInfo> {
    Some(LoadBalancerInfo {
        arn: lb.load_balancer_arn()?.to_string(),
        name: lb.load_balancer_name().unwrap_or_default().to_string(),
        dns_name: lb.dns_name().map(str::to_string),
        state: lb
            .state()
            .and_then(|s| s.code())
            .map(|c| c.as_str().to_string()),
    })
}

fn target_group_info(tg: &elb::TargetGroup) -> Option<TargetGroupInfo> {
    Some(TargetGroupInfo {
        arn: tg.target_group_arn()?.to_string(),
        name: tg.target_group_name().unwrap_or_default().to_string(),
        port: tg.port(),
    })
}

fn listener_info(listener: &elb::Listener) -> Option<ListenerInfo> {
    Some(ListenerInfo {
        arn: listener.listener_arn()?.to_string(),
        port: listener.port(),
        protocol: listener.protocol().map(|p| p.as_str().to_string()),
    })
}

fn repository_info(repo: &aws_sdk_ecr::types::Repository) -> Option<RepositoryInfo> {
    Some(RepositoryInfo {
        name: repo.repository_name()?.to_string(),
        arn: repo.repository_arn().unwrap_or_default().to_string(),
        uri: repo.repository_uri().map(str::to_string),
    })
}

/// Registry tokens are base64 of `user:password`
fn decode_authorization_token(token: &str) -> Result<(String, String)> {
    let decoded = STANDARD
        .decode(token)
        .map_err(|e| CloudError::UnexpectedResponse(format!("authorization token: {}", e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| CloudError::UnexpectedResponse(format!("authorization token: {}", e)))?;

    decoded
        .split_once(':')
        .map(|(user, password)| (user.to_string(), password.to_string()))
        .ok_or_else(|| {
            CloudError::UnexpectedResponse("authorization token has no user separator".to_string())
        })
}
