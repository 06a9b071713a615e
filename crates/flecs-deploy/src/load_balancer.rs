//! Load balancer provisioning
//!
//! Idempotent by name: the load balancer, its security group, the target
//! group and the listener are looked up on every run and only the missing
//! pieces are created.

use crate::error::{DeployError, Result};
use crate::naming;
use crate::network::ResolvedNetwork;
use crate::reconcile::{WaitPolicy, ensure};
use flecs_cloud::{
    ControlPlane, CreateListenerRequest, CreateLoadBalancerRequest, CreateTargetGroupRequest,
    LoadBalancerInfo, SecurityGroupRule, ServiceLoadBalancer,
};
use flecs_core::{Config, LoadBalancer, PROTOCOL_HTTP};
use tracing::{debug, info};

const TARGET_TYPE_IP: &str = "ip";
const ANYWHERE: &str = "0.0.0.0/0";

/// Look up a load balancer config and check it can be provisioned
pub(crate) fn validate<'a>(config: &'a Config, key: &str) -> Result<&'a LoadBalancer> {
    let lb = config
        .load_balancer(key)
        .ok_or_else(|| DeployError::reference("load balancer", key))?;

    if lb.target_group.target_group_arn.is_none() {
        if lb.is_secure() && lb.certificate_arn.as_deref().is_none_or(str::is_empty) {
            return Err(DeployError::Validation(format!(
                "load balancer '{}' uses {} but has no certificate_arn",
                key,
                lb.protocol()
            )));
        }
        if lb.target_group.container_name.is_empty() || lb.target_group.container_port <= 0 {
            return Err(DeployError::Validation(format!(
                "load balancer '{}' needs a target_group container_name and container_port",
                key
            )));
        }
    }

    Ok(lb)
}

/// Make sure the load balancer `key` exists and return the target group binding
pub(crate) async fn ensure_load_balancer(
    control_plane: &dyn ControlPlane,
    policy: &WaitPolicy,
    config: &Config,
    key: &str,
    network: &ResolvedNetwork,
) -> Result<ServiceLoadBalancer> {
    let lb = validate(config, key)?;

    if let Some(arn) = &lb.target_group.target_group_arn {
        debug!(load_balancer = %key, target_group = %arn, "Using existing target group");
        return Ok(binding(lb, arn.clone()));
    }

    let name = naming::load_balancer_name(&config.project_name, key);
    let port = lb.port();
    let vpc_id = network.vpc_id.as_deref();
    let subnets = network.configuration.subnets.clone();
    let lb_name = name.as_str();

    let ensured = ensure(
        policy,
        &format!("load balancer {}", name),
        move || describe_load_balancer(control_plane, lb_name),
        move || async move {
            let security_group =
                ensure_security_group(control_plane, lb_name, port, vpc_id).await?;
            control_plane
                .create_load_balancer(&CreateLoadBalancerRequest {
                    name: lb_name.to_string(),
                    subnets,
                    security_groups: vec![security_group],
                })
                .await?;
            Ok::<_, DeployError>(())
        },
        LoadBalancerInfo::is_active,
    )
    .await?;
    let load_balancer = ensured.value;
    if ensured.created {
        info!(load_balancer = %name, dns = ?load_balancer.dns_name, "Created load balancer");
    }

    let target_group = match control_plane.describe_target_group(&name).await? {
        Some(tg) => tg,
        None => {
            info!(target_group = %name, "Creating target group");
            control_plane
                .create_target_group(&CreateTargetGroupRequest {
                    name: name.clone(),
                    port: lb.target_group.container_port,
                    protocol: PROTOCOL_HTTP.to_string(),
                    vpc_id: vpc_id.map(str::to_string),
                    target_type: TARGET_TYPE_IP.to_string(),
                })
                .await?
        }
    };

    let listeners = control_plane.describe_listeners(&load_balancer.arn).await?;
    if !listeners.iter().any(|l| l.port == Some(port)) {
        info!(load_balancer = %name, port, protocol = %lb.protocol(), "Creating listener");
        let secure = lb.is_secure();
        control_plane
            .create_listener(&CreateListenerRequest {
                load_balancer_arn: load_balancer.arn.clone(),
                port,
                protocol: lb.protocol(),
                target_group_arn: target_group.arn.clone(),
                certificate_arn: lb.certificate_arn.clone().filter(|_| secure),
                ssl_policy: lb.ssl_policy.clone().filter(|_| secure),
            })
            .await?;
    }

    Ok(binding(lb, target_group.arn))
}

async fn describe_load_balancer(
    control_plane: &dyn ControlPlane,
    name: &str,
) -> Result<Option<LoadBalancerInfo>> {
    Ok(control_plane.describe_load_balancer(name).await?)
}

/// Find the load balancer's security group by name, creating it with
/// listener ingress and open egress when missing
async fn ensure_security_group(
    control_plane: &dyn ControlPlane,
    name: &str,
    port: i32,
    vpc_id: Option<&str>,
) -> Result<String> {
    let existing = control_plane
        .describe_security_groups(&[name.to_string()])
        .await?;
    if let Some(group) = existing.into_iter().find(|g| g.name == name) {
        return Ok(group.id);
    }

    info!(security_group = %name, "Creating load balancer security group");
    let group_id = match control_plane
        .create_security_group(name, &format!("Flecs load balancer {}", name), vpc_id)
        .await
    {
        Ok(id) => id,
        Err(e) if e.is_already_exists() => {
            debug!(security_group = %name, "Security group created concurrently");
            control_plane
                .describe_security_groups(&[name.to_string()])
                .await?
                .into_iter()
                .find(|g| g.name == name)
                .map(|g| g.id)
                .ok_or(e)?
        }
        Err(e) => return Err(e.into()),
    };

    control_plane
        .authorize_ingress(
            &group_id,
            &SecurityGroupRule {
                protocol: "tcp".to_string(),
                from_port: port,
                to_port: port,
                cidr: ANYWHERE.to_string(),
                description: format!("Listener port {}", port),
            },
        )
        .await?;
    control_plane
        .authorize_egress(
            &group_id,
            &SecurityGroupRule {
                protocol: "-1".to_string(),
                from_port: -1,
                to_port: -1,
                cidr: ANYWHERE.to_string(),
                description: "All outbound traffic".to_string(),
            },
        )
        .await?;

    Ok(group_id)
}

fn binding(lb: &LoadBalancer, target_group_arn: String) -> ServiceLoadBalancer {
    ServiceLoadBalancer {
        target_group_arn,
        container_name: lb.target_group.container_name.clone(),
        container_port: lb.target_group.container_port,
    }
}
