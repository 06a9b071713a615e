//! Service lifecycle
//!
//! ```text
//! Absent ──create──▶ Stable ──update────▶ Stable
//!                      │ ────recreate──▶ Stable (new instance, old deleted)
//!                      └────remove─────▶ Absent
//! ```
//!
//! A service instance is named `<prefix>-<random suffix>`. The prefix is
//! derived from project, service and environment, and is how an existing
//! instance is found again on the next run.

use crate::cluster;
use crate::deployer::Deployer;
use crate::error::{DeployError, Result};
use crate::load_balancer;
use crate::naming;
use crate::network;
use crate::reconcile::poll_until;
use colored::Colorize;
use flecs_cloud::{ControlPlane, CreateServiceRequest, ServiceInfo, UpdateServiceRequest};
use flecs_core::{Config, Definition, Service};
use tracing::{debug, info, instrument, warn};

/// What a service step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceAction {
    Created,
    Updated,
    /// A new instance replaced `replaced`
    Recreated { replaced: String },
}

/// Result of a service step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDeployment {
    /// Name of the instance now serving
    pub name: String,
    pub task_definition: String,
    pub action: ServiceAction,
}

impl Deployer {
    /// Bring the service `name` to its configured revision
    #[instrument(skip(self, config), fields(cluster = %config.cluster_name()))]
    pub async fn deploy_service(&self, config: &Config, name: &str) -> Result<ServiceDeployment> {
        let service = config
            .service(name)
            .ok_or_else(|| DeployError::reference("service", name))?;
        let definition = config
            .definition(&service.definition)
            .ok_or_else(|| DeployError::reference("definition", &service.definition))?;
        if let Some(key) = &service.load_balancer {
            load_balancer::validate(config, key)?;
        }

        let cluster = config.cluster_name();
        cluster::ensure_cluster(self.control_plane(), self.wait_policy(), cluster).await?;

        let prefix = naming::service_prefix(config, name);
        let existing = self.find_service_instance(cluster, &prefix).await?;

        let deployment = match (existing, config.options.recreate_services) {
            (None, _) => {
                let (instance, task_definition) =
                    self.create_instance(config, name, service, definition).await?;
                ServiceDeployment {
                    name: instance,
                    task_definition,
                    action: ServiceAction::Created,
                }
            }
            (Some(current), false) => {
                let task_definition = self
                    .update_instance(config, name, definition, &current.name)
                    .await?;
                ServiceDeployment {
                    name: current.name,
                    task_definition,
                    action: ServiceAction::Updated,
                }
            }
            (Some(current), true) => {
                info!(service = %name, current = %current.name, "Recreating service");
                let (instance, task_definition) =
                    self.create_instance(config, name, service, definition).await?;
                self.delete_instance(cluster, &current.name).await?;
                ServiceDeployment {
                    name: instance,
                    task_definition,
                    action: ServiceAction::Recreated {
                        replaced: current.name,
                    },
                }
            }
        };

        println!(
            "  {} {} {}",
            "✓".green(),
            deployment.name.cyan(),
            match &deployment.action {
                ServiceAction::Created => "created".to_string(),
                ServiceAction::Updated => "updated".to_string(),
                ServiceAction::Recreated { replaced } => format!("replaced {}", replaced),
            }
        );
        Ok(deployment)
    }

    /// Find the live instance whose name matches `<prefix>-\w+`
    ///
    /// When several match, the most recently created one wins; listing order
    /// breaks ties.
    pub async fn find_service_instance(
        &self,
        cluster: &str,
        prefix: &str,
    ) -> Result<Option<ServiceInfo>> {
        let pattern = naming::instance_pattern(prefix)?;
        let arns = match self.control_plane().list_services(cluster).await {
            Ok(arns) => arns,
            Err(e) if e.is_not_found() => {
                debug!(cluster = %cluster, "Cluster not found, no instances");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let names: Vec<String> = arns
            .iter()
            .map(|arn| naming::trailing_segment(arn))
            .filter(|name| pattern.is_match(name))
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            debug!(prefix = %prefix, "No existing instance");
            return Ok(None);
        }

        let current = self
            .control_plane()
            .describe_services(cluster, &names)
            .await?
            .into_iter()
            .filter(ServiceInfo::is_live)
            .reduce(|best, candidate| {
                if candidate.created_at > best.created_at {
                    candidate
                } else {
                    best
                }
            });

        if let Some(service) = &current {
            debug!(prefix = %prefix, instance = %service.name, candidates = names.len(), "Found existing instance");
        }
        Ok(current)
    }

    /// Register a revision, create a fresh instance and wait until it is stable
    async fn create_instance(
        &self,
        config: &Config,
        name: &str,
        service: &Service,
        definition: &Definition,
    ) -> Result<(String, String)> {
        let cluster = config.cluster_name();
        let registered = self
            .create_definition(
                config,
                definition,
                &naming::service_definition_name(config, name),
            )
            .await?;

        let network = network::resolve_network(self.control_plane(), &config.options).await?;
        let load_balancers = match &service.load_balancer {
            Some(key) => vec![
                load_balancer::ensure_load_balancer(
                    self.control_plane(),
                    self.wait_policy(),
                    config,
                    key,
                    &network,
                )
                .await?,
            ],
            None => Vec::new(),
        };

        let instance = naming::instance_name(&registered.family);
        info!(service = %name, instance = %instance, "Creating service");
        self.control_plane()
            .create_service(&CreateServiceRequest {
                cluster: cluster.to_string(),
                service_name: instance.clone(),
                task_definition: registered.arn.clone(),
                desired_count: service.desired_count(),
                launch_type: service.launch_type().to_string(),
                network: network.configuration,
                load_balancers,
            })
            .await?;

        wait_until_stable(self, cluster, &instance).await?;
        Ok((instance, registered.arn))
    }

    /// Point an existing instance at a new revision and wait until it is stable
    async fn update_instance(
        &self,
        config: &Config,
        name: &str,
        definition: &Definition,
        instance: &str,
    ) -> Result<String> {
        let cluster = config.cluster_name();
        let registered = self
            .create_definition(
                config,
                definition,
                &naming::service_definition_name(config, name),
            )
            .await?;

        info!(service = %name, instance = %instance, "Updating service");
        self.control_plane()
            .update_service(&UpdateServiceRequest {
                cluster: cluster.to_string(),
                service_name: instance.to_string(),
                task_definition: registered.arn.clone(),
            })
            .await?;

        wait_until_stable(self, cluster, instance).await?;
        Ok(registered.arn)
    }

    /// Force-delete an instance and wait until it is gone
    ///
    /// An instance that is already gone counts as deleted.
    pub(crate) async fn delete_instance(&self, cluster: &str, instance: &str) -> Result<()> {
        info!(cluster = %cluster, instance = %instance, "Deleting service");
        match self
            .control_plane()
            .delete_service(cluster, instance, true)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(instance = %instance, "Service already gone");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let control_plane = self.control_plane();
        poll_until(
            self.wait_policy(),
            &format!("service {} deletion", instance),
            move || async move {
                Ok(describe_service(control_plane, cluster, instance)
                    .await?
                    .is_none_or(|s| s.is_inactive())
                    .then_some(()))
            },
        )
        .await
    }

    /// Tear down the live instance of the configured service `name`
    pub(crate) async fn remove_service(&self, config: &Config, name: &str) -> Result<()> {
        if config.service(name).is_none() {
            return Err(DeployError::reference("service", name));
        }

        let cluster = config.cluster_name();
        let prefix = naming::service_prefix(config, name);
        match self.find_service_instance(cluster, &prefix).await? {
            Some(instance) => self.delete_instance(cluster, &instance.name).await,
            None => {
                warn!(service = %name, prefix = %prefix, "No running instance, nothing to remove");
                Ok(())
            }
        }
    }
}

async fn describe_service(
    control_plane: &dyn ControlPlane,
    cluster: &str,
    name: &str,
) -> Result<Option<ServiceInfo>> {
    match control_plane
        .describe_services(cluster, &[name.to_string()])
        .await
    {
        Ok(services) => Ok(services.into_iter().find(|s| s.name == name)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn wait_until_stable(deployer: &Deployer, cluster: &str, instance: &str) -> Result<ServiceInfo> {
    let control_plane = deployer.control_plane();
    let service = poll_until(
        deployer.wait_policy(),
        &format!("service {} to become stable", instance),
        move || async move {
            Ok(describe_service(control_plane, cluster, instance)
                .await?
                .filter(ServiceInfo::is_stable))
        },
    )
    .await?;

    info!(instance = %instance, running = service.running_count, "Service stable");
    Ok(service)
}
