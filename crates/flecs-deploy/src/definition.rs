//! Task definition builder
//!
//! Normalizes a [`Definition`] from the config into a registrable revision:
//! roles, family, log configuration, container translation and sizing.

use crate::deployer::Deployer;
use crate::error::{DeployError, Result};
use crate::naming;
use flecs_cloud::{
    ContainerDefinition, ControlPlane, HealthCheckSpec, LogConfiguration, MountPointSpec,
    PlacementConstraintSpec, TaskDefinitionSpec, VolumeFromSpec,
};
use flecs_core::{Config, Container, Definition};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

pub const DEFAULT_EXECUTION_ROLE_NAME: &str = "FlecsDefaultExecutionRole";
pub const EXECUTION_ROLE_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";
pub const TASK_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";
pub const NETWORK_MODE: &str = "awsvpc";
pub const COMPATIBILITIES: [&str; 2] = ["EC2", "FARGATE"];
pub const LOG_DRIVER: &str = "awslogs";

/// A registered task definition revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredDefinition {
    pub arn: String,
    pub family: String,
}

impl Deployer {
    /// Register a new revision of `definition` under the family derived from `name`
    #[instrument(skip(self, config, definition), fields(project = %config.project_name))]
    pub async fn create_definition(
        &self,
        config: &Config,
        definition: &Definition,
        name: &str,
    ) -> Result<RegisteredDefinition> {
        let family = naming::family_name(name, config.environment_name.as_deref());
        let containers = container_definitions(config, definition, &family)?;

        let named_execution_role = definition
            .execution_role_name
            .as_deref()
            .filter(|r| !r.is_empty());
        let (execution_role_arn, task_role_arn) = match named_execution_role {
            Some(execution_role) => {
                let account = self.control_plane().caller_identity().await?.account;
                let task_role = definition
                    .task_role_name
                    .as_deref()
                    .filter(|r| !r.is_empty())
                    .map(|r| role_arn(&account, r));
                (role_arn(&account, execution_role), task_role)
            }
            None => (self.default_execution_role_arn().await?, None),
        };

        ensure_log_group(self.control_plane(), &config.options.log_group_name).await?;

        let spec = TaskDefinitionSpec {
            family: family.clone(),
            cpu: definition.effective_cpu().to_string(),
            memory: definition.effective_memory().to_string(),
            network_mode: NETWORK_MODE.to_string(),
            requires_compatibilities: COMPATIBILITIES.iter().map(|c| c.to_string()).collect(),
            execution_role_arn: Some(execution_role_arn),
            task_role_arn,
            containers,
            placement_constraints: definition
                .placement_constraints
                .iter()
                .map(|c| PlacementConstraintSpec {
                    kind: c.kind.clone(),
                    expression: c.expression.clone(),
                })
                .collect(),
            volumes: definition
                .volume_name
                .iter()
                .filter(|v| !v.is_empty())
                .cloned()
                .collect(),
        };

        let arn = self.control_plane().register_task_definition(&spec).await?;
        info!(family = %family, arn = %arn, "Registered task definition");

        Ok(RegisteredDefinition { arn, family })
    }

    /// ARN of the shared default execution role, provisioned on first use
    pub async fn default_execution_role_arn(&self) -> Result<String> {
        let control_plane = self.control_plane();
        self.default_execution_role
            .get_or_try_init(|| provision_default_execution_role(control_plane))
            .await
            .cloned()
    }
}

/// Look up the default execution role, creating it when missing
async fn provision_default_execution_role(control_plane: &dyn ControlPlane) -> Result<String> {
    if let Some(role) = control_plane.get_role(DEFAULT_EXECUTION_ROLE_NAME).await? {
        debug!(role = %role.arn, "Using default execution role");
        return Ok(role.arn);
    }

    info!(role = DEFAULT_EXECUTION_ROLE_NAME, "Creating default execution role");
    let role = match control_plane
        .create_role(DEFAULT_EXECUTION_ROLE_NAME, &assume_role_policy())
        .await
    {
        Ok(role) => role,
        Err(e) if e.is_already_exists() => {
            debug!(role = DEFAULT_EXECUTION_ROLE_NAME, "Role created concurrently");
            control_plane
                .get_role(DEFAULT_EXECUTION_ROLE_NAME)
                .await?
                .ok_or(e)?
        }
        Err(e) => return Err(e.into()),
    };
    control_plane
        .attach_role_policy(&role.name, EXECUTION_ROLE_POLICY_ARN)
        .await?;

    Ok(role.arn)
}

fn assume_role_policy() -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "",
            "Effect": "Allow",
            "Principal": { "Service": TASK_PRINCIPAL },
            "Action": "sts:AssumeRole"
        }]
    })
    .to_string()
}

fn role_arn(account: &str, role: &str) -> String {
    format!("arn:aws:iam::{}:role/{}", account, role)
}

/// Create the log group unless one with exactly this name exists
async fn ensure_log_group(control_plane: &dyn ControlPlane, name: &str) -> Result<()> {
    let groups = control_plane.describe_log_groups(name).await?;
    if groups.iter().any(|g| g == name) {
        return Ok(());
    }

    info!(log_group = %name, "Creating log group");
    control_plane.create_log_group(name).await?;
    Ok(())
}

/// Translate every configured container
///
/// The log stream prefix is the family, so a task container logs to
/// `<family>/<container>/<task id>`.
pub(crate) fn container_definitions(
    config: &Config,
    definition: &Definition,
    family: &str,
) -> Result<Vec<ContainerDefinition>> {
    if definition.containers.is_empty() {
        return Err(DeployError::Validation(format!(
            "definition for {} has no containers",
            family
        )));
    }

    let log_configuration = LogConfiguration {
        driver: LOG_DRIVER.to_string(),
        options: BTreeMap::from([
            ("awslogs-region".to_string(), config.options.region.clone()),
            ("awslogs-stream-prefix".to_string(), family.to_string()),
            ("awslogs-group".to_string(), config.options.log_group_name.clone()),
        ]),
    };

    let single = definition.containers.len() == 1;
    definition
        .containers
        .iter()
        .map(|container| {
            container_definition(config, container, single, log_configuration.clone())
        })
        .collect()
}

fn container_definition(
    config: &Config,
    container: &Container,
    single: bool,
    log_configuration: LogConfiguration,
) -> Result<ContainerDefinition> {
    let command = match &container.command {
        Some(command) => split_command(command)?,
        None => Vec::new(),
    };

    let health_check = match &container.healthcheck {
        Some(check) if !check.command.trim().is_empty() => Some(HealthCheckSpec {
            command: split_command(&check.command)?,
            interval: check.interval,
            retries: check.retries,
            start_period: check.start_period,
            timeout: check.timeout,
        }),
        _ => None,
    };

    Ok(ContainerDefinition {
        name: container.name.clone(),
        image: container.image.clone(),
        command,
        essential: single || container.essential,
        environment: config.options.environment_variables.clone(),
        secrets: config.options.secrets.clone(),
        log_configuration: Some(log_configuration),
        health_check,
        mount_points: container
            .mount_points
            .iter()
            .map(|m| MountPointSpec {
                container_path: m.container_path.clone(),
                source_volume: m.source_volume.clone(),
                read_only: m.read_only,
            })
            .collect(),
        volumes_from: container
            .volumes_from
            .iter()
            .map(|v| VolumeFromSpec {
                source_container: v.source_container.clone(),
                read_only: v.read_only,
            })
            .collect(),
    })
}

/// Split a command line into arguments, honouring shell quoting
pub(crate) fn split_command(command: &str) -> Result<Vec<String>> {
    shell_words::split(command)
        .map_err(|e| DeployError::Validation(format!("cannot parse command `{}`: {}", command, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flecs_core::{HealthCheck, Options};

    fn config() -> Config {
        Config {
            project_name: "demo".to_string(),
            options: Options {
                region: "eu-west-1".to_string(),
                log_group_name: "/flecs/demo".to_string(),
                environment_variables: BTreeMap::from([("LOG_LEVEL".to_string(), "info".to_string())]),
                secrets: BTreeMap::from([("DB_PASSWORD".to_string(), "arn:aws:ssm:db".to_string())]),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn container(name: &str) -> Container {
        Container {
            name: name.to_string(),
            image: "nginx:alpine".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_container_forced_essential() {
        let definition = Definition {
            containers: vec![container("app")],
            ..Default::default()
        };
        let defs = container_definitions(&config(), &definition, "flecs-demo-web").unwrap();

        assert_eq!(defs.len(), 1);
        assert!(defs[0].essential);
        assert_eq!(defs[0].environment["LOG_LEVEL"], "info");
        assert_eq!(defs[0].secrets["DB_PASSWORD"], "arn:aws:ssm:db");

        let log = defs[0].log_configuration.as_ref().unwrap();
        assert_eq!(log.driver, "awslogs");
        assert_eq!(log.options["awslogs-stream-prefix"], "flecs-demo-web");
        assert_eq!(log.options["awslogs-group"], "/flecs/demo");
        assert_eq!(log.options["awslogs-region"], "eu-west-1");
        assert!(defs[0].health_check.is_none());
    }

    #[test]
    fn test_multi_container_keeps_essential_flag() {
        let mut sidecar = container("sidecar");
        sidecar.essential = false;
        let mut app = container("app");
        app.essential = true;

        let definition = Definition {
            containers: vec![app, sidecar],
            ..Default::default()
        };
        let defs = container_definitions(&config(), &definition, "flecs-demo-web").unwrap();
        assert!(defs[0].essential);
        assert!(!defs[1].essential);
    }

    #[test]
    fn test_commands_keep_quoted_arguments() {
        let mut app = container("app");
        app.command = Some(r#"sh -c "echo hello world""#.to_string());
        app.healthcheck = Some(HealthCheck {
            command: "CMD-SHELL 'curl -f http://localhost/ || exit 1'".to_string(),
            retries: Some(3),
            ..Default::default()
        });

        let definition = Definition {
            containers: vec![app],
            ..Default::default()
        };
        let defs = container_definitions(&config(), &definition, "flecs-demo-web").unwrap();

        assert_eq!(defs[0].command, vec!["sh", "-c", "echo hello world"]);
        let check = defs[0].health_check.as_ref().unwrap();
        assert_eq!(
            check.command,
            vec!["CMD-SHELL", "curl -f http://localhost/ || exit 1"]
        );
        assert_eq!(check.retries, Some(3));
    }

    #[test]
    fn test_unbalanced_quote_is_validation_error() {
        let mut app = container("app");
        app.command = Some("echo 'oops".to_string());
        let definition = Definition {
            containers: vec![app],
            ..Default::default()
        };
        let err = container_definitions(&config(), &definition, "flecs-demo-web").unwrap_err();
        assert!(matches!(err, DeployError::Validation(_)));
    }

    #[test]
    fn test_empty_definition_rejected() {
        let err =
            container_definitions(&config(), &Definition::default(), "flecs-demo-web").unwrap_err();
        assert!(matches!(err, DeployError::Validation(_)));
    }

    #[test]
    fn test_assume_role_policy_trusts_tasks() {
        let policy: serde_json::Value = serde_json::from_str(&assume_role_policy()).unwrap();
        assert_eq!(
            policy["Statement"][0]["Principal"]["Service"],
            "ecs-tasks.amazonaws.com"
        );
        assert_eq!(policy["Statement"][0]["Action"], "sts:AssumeRole");
    }
}
