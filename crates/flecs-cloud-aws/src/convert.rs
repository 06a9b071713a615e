//! Conversions between control plane types and AWS SDK shapes

use crate::error::build_error;
use aws_sdk_ecs::types as ecs;
use chrono::{DateTime, Utc};
use flecs_cloud::{
    ClusterInfo, ContainerDefinition, ContainerState, HealthCheckSpec, NetworkConfiguration,
    PlacementConstraintSpec, Result, ServiceInfo, ServiceLoadBalancer, TaskFailure, TaskInfo,
    TaskResults,
};
use std::collections::HashMap;

pub(crate) fn to_chrono(value: &aws_sdk_ecs::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

pub(crate) fn cluster_info(cluster: &ecs::Cluster) -> ClusterInfo {
    ClusterInfo {
        name: cluster.cluster_name().unwrap_or_default().to_string(),
        arn: cluster.cluster_arn().map(str::to_string),
        status: cluster.status().unwrap_or_default().to_string(),
    }
}

pub(crate) fn service_info(service: &ecs::Service) -> ServiceInfo {
    ServiceInfo {
        name: service.service_name().unwrap_or_default().to_string(),
        arn: service.service_arn().map(str::to_string),
        status: service.status().unwrap_or_default().to_string(),
        desired_count: service.desired_count(),
        running_count: service.running_count(),
        deployment_count: service.deployments().len(),
        task_definition: service.task_definition().map(str::to_string),
        created_at: service.created_at().and_then(to_chrono),
    }
}

pub(crate) fn network_configuration(
    network: &NetworkConfiguration,
) -> Result<ecs::NetworkConfiguration> {
    let assign_public_ip = if network.assign_public_ip {
        ecs::AssignPublicIp::Enabled
    } else {
        ecs::AssignPublicIp::Disabled
    };

    let vpc = ecs::AwsVpcConfiguration::builder()
        .set_subnets(Some(network.subnets.clone()))
        .set_security_groups(if network.security_groups.is_empty() {
            None
        } else {
            Some(network.security_groups.clone())
        })
        .assign_public_ip(assign_public_ip)
        .build()
        .map_err(|e| build_error("awsvpc configuration", e))?;

    Ok(ecs::NetworkConfiguration::builder()
        .awsvpc_configuration(vpc)
        .build())
}

pub(crate) fn load_balancer(binding: &ServiceLoadBalancer) -> ecs::LoadBalancer {
    ecs::LoadBalancer::builder()
        .target_group_arn(&binding.target_group_arn)
        .container_name(&binding.container_name)
        .container_port(binding.container_port)
        .build()
}

pub(crate) fn container_definition(
    container: &ContainerDefinition,
) -> Result<ecs::ContainerDefinition> {
    let mut builder = ecs::ContainerDefinition::builder()
        .name(&container.name)
        .image(&container.image)
        .essential(container.essential);

    if !container.command.is_empty() {
        builder = builder.set_command(Some(container.command.clone()));
    }

    for (name, value) in &container.environment {
        builder = builder.environment(ecs::KeyValuePair::builder().name(name).value(value).build());
    }

    for (name, value_from) in &container.secrets {
        let secret = ecs::Secret::builder()
            .name(name)
            .value_from(value_from)
            .build()
            .map_err(|e| build_error("secret", e))?;
        builder = builder.secrets(secret);
    }

    if let Some(log) = &container.log_configuration {
        let options: HashMap<String, String> = log
            .options
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let log_configuration = ecs::LogConfiguration::builder()
            .log_driver(ecs::LogDriver::from(log.driver.as_str()))
            .set_options(Some(options))
            .build()
            .map_err(|e| build_error("log configuration", e))?;
        builder = builder.log_configuration(log_configuration);
    }

    if let Some(check) = &container.health_check {
        builder = builder.health_check(health_check(check)?);
    }

    for mount in &container.mount_points {
        builder = builder.mount_points(
            ecs::MountPoint::builder()
                .container_path(&mount.container_path)
                .source_volume(&mount.source_volume)
                .read_only(mount.read_only)
                .build(),
        );
    }

    for volume in &container.volumes_from {
        builder = builder.volumes_from(
            ecs::VolumeFrom::builder()
                .source_container(&volume.source_container)
                .read_only(volume.read_only)
                .build(),
        );
    }

    Ok(builder.build())
}

fn health_check(check: &HealthCheckSpec) -> Result<ecs::HealthCheck> {
    ecs::HealthCheck::builder()
        .set_command(Some(check.command.clone()))
        .set_interval(check.interval)
        .set_retries(check.retries)
        .set_start_period(check.start_period)
        .set_timeout(check.timeout)
        .build()
        .map_err(|e| build_error("health check", e))
}

pub(crate) fn placement_constraint(
    constraint: &PlacementConstraintSpec,
) -> ecs::TaskDefinitionPlacementConstraint {
    ecs::TaskDefinitionPlacementConstraint::builder()
        .r#type(ecs::TaskDefinitionPlacementConstraintType::from(
            constraint.kind.as_str(),
        ))
        .set_expression(constraint.expression.clone())
        .build()
}

pub(crate) fn task_results(tasks: &[ecs::Task], failures: &[ecs::Failure]) -> TaskResults {
    TaskResults {
        tasks: tasks.iter().map(task_info).collect(),
        failures: failures
            .iter()
            .map(|f| TaskFailure {
                arn: f.arn().map(str::to_string),
                reason: f.reason().map(str::to_string),
                detail: f.detail().map(str::to_string),
            })
            .collect(),
    }
}

fn task_info(task: &ecs::Task) -> TaskInfo {
    TaskInfo {
        arn: task.task_arn().unwrap_or_default().to_string(),
        last_status: task.last_status().unwrap_or_default().to_string(),
        stopped_reason: task.stopped_reason().map(str::to_string),
        containers: task
            .containers()
            .iter()
            .map(|c| ContainerState {
                name: c.name().unwrap_or_default().to_string(),
                exit_code: c.exit_code(),
                reason: c.reason().map(str::to_string),
            })
            .collect(),
    }
}
