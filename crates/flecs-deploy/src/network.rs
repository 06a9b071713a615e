//! Network resolution
//!
//! Turns configured security group and subnet names into ids. Without subnet
//! names the account's default subnets are used, and those need a public IP
//! to reach the registry.

use crate::error::Result;
use flecs_cloud::{CloudError, ControlPlane, NetworkConfiguration, SubnetInfo};
use flecs_core::Options;
use tracing::{debug, warn};

/// Network placement for services and tasks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedNetwork {
    pub configuration: NetworkConfiguration,
    /// VPC of the first subnet
    pub vpc_id: Option<String>,
}

pub(crate) async fn resolve_network(
    control_plane: &dyn ControlPlane,
    options: &Options,
) -> Result<ResolvedNetwork> {
    let security_groups = if options.security_group_names.is_empty() {
        Vec::new()
    } else {
        let groups = control_plane
            .describe_security_groups(&options.security_group_names)
            .await?;
        for name in &options.security_group_names {
            if !groups.iter().any(|g| &g.name == name) {
                return Err(CloudError::ResourceNotFound(format!("security group {}", name)).into());
            }
        }
        groups.into_iter().map(|g| g.id).collect()
    };

    let mut assign_public_ip = options.assign_public_ip;
    let subnets = if options.subnet_names.is_empty() {
        let subnets = control_plane.describe_default_subnets().await?;
        if subnets.is_empty() {
            return Err(CloudError::ResourceNotFound("default subnets".to_string()).into());
        }
        if !assign_public_ip {
            warn!("No subnets configured, using default subnets with a public IP");
        }
        assign_public_ip = true;
        subnets
    } else {
        let found = control_plane.describe_subnets(&options.subnet_names).await?;
        let mut subnets: Vec<SubnetInfo> = Vec::new();
        for name in &options.subnet_names {
            let mut matched = found
                .iter()
                .filter(|s| s.name.as_ref() == Some(name))
                .peekable();
            if matched.peek().is_none() {
                return Err(CloudError::ResourceNotFound(format!("subnet {}", name)).into());
            }
            for subnet in matched {
                if !subnets.iter().any(|s| s.id == subnet.id) {
                    subnets.push(subnet.clone());
                }
            }
        }
        subnets
    };

    let vpc_id = subnets.first().and_then(|s| s.vpc_id.clone());
    let configuration = NetworkConfiguration {
        subnets: subnets.into_iter().map(|s| s.id).collect(),
        security_groups,
        assign_public_ip,
    };
    debug!(?configuration, vpc_id = ?vpc_id, "Resolved network");

    Ok(ResolvedNetwork {
        configuration,
        vpc_id,
    })
}
