//! Task runner
//!
//! Runs a one-off task to completion: register a revision, run it, wait for
//! it to stop, classify the exit codes, then collect each container's logs.

use crate::cluster;
use crate::definition::split_command;
use crate::deployer::Deployer;
use crate::error::{DeployError, Result};
use crate::naming;
use crate::network;
use crate::reconcile::poll_until;
use colored::Colorize;
use flecs_cloud::{
    ContainerOverride, ControlPlane, LogEvent, RunTaskRequest, TaskFailure, TaskInfo, TaskResults,
};
use flecs_core::{Config, Container, Definition, TaskStep};
use tracing::{debug, info, instrument};

/// Log events of one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLogs {
    pub container: String,
    pub events: Vec<LogEvent>,
}

/// A completed task run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRun {
    pub task_id: String,
    pub task_arn: String,
    pub logs: Vec<ContainerLogs>,
}

/// A task step checked against the config
struct ValidatedTask<'a> {
    definition: &'a Definition,
    target: &'a Container,
    command: Vec<String>,
}

fn validate<'a>(config: &'a Config, step: &TaskStep) -> Result<ValidatedTask<'a>> {
    let command = match step.command.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(command) => split_command(command)?,
        None => Vec::new(),
    };
    let has_name = step.name.as_deref().is_some_and(|n| !n.is_empty());
    if command.is_empty() && !has_name {
        return Err(DeployError::Validation(
            "task step needs a command or a name".to_string(),
        ));
    }

    let definition_name = step
        .definition
        .as_deref()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| {
            DeployError::Validation("task step does not reference a definition".to_string())
        })?;
    let definition = config
        .definition(definition_name)
        .ok_or_else(|| DeployError::reference("definition", definition_name))?;

    let target = match step.container.as_deref().filter(|c| !c.is_empty()) {
        Some(name) => definition
            .container(name)
            .ok_or_else(|| DeployError::reference("container", name))?,
        None => match definition.containers.as_slice() {
            [only] => only,
            [] => {
                return Err(DeployError::Validation(format!(
                    "definition '{}' has no containers",
                    definition_name
                )));
            }
            many => {
                return Err(DeployError::Validation(format!(
                    "definition '{}' has {} containers; set `container` on the task step to pick one",
                    definition_name,
                    many.len()
                )));
            }
        },
    };

    Ok(ValidatedTask {
        definition,
        target,
        command,
    })
}

impl Deployer {
    /// Run a task step to completion and collect its logs
    ///
    /// All validation happens before the first control plane call.
    #[instrument(skip(self, config, step), fields(cluster = %config.cluster_name(), task = step.name.as_deref().or(step.command.as_deref()).unwrap_or("")))]
    pub async fn run_task(&self, config: &Config, step: &TaskStep) -> Result<TaskRun> {
        let task = validate(config, step)?;
        let cluster = config.cluster_name();

        cluster::ensure_cluster(self.control_plane(), self.wait_policy(), cluster).await?;

        let registered = self
            .create_definition(
                config,
                task.definition,
                &naming::task_definition_name(config, step, &task.command),
            )
            .await?;
        let network = network::resolve_network(self.control_plane(), &config.options).await?;

        let container_override = (!task.command.is_empty()).then(|| ContainerOverride {
            name: task.target.name.clone(),
            command: task.command.clone(),
        });

        info!(family = %registered.family, container = %task.target.name, "Running task");
        let started = self
            .control_plane()
            .run_task(&RunTaskRequest {
                cluster: cluster.to_string(),
                task_definition: registered.arn.clone(),
                launch_type: step.launch_type().to_string(),
                network: network.configuration,
                container_override,
            })
            .await?;
        check_failures(&started)?;

        let task_arn = started
            .tasks
            .first()
            .map(|t| t.arn.clone())
            .ok_or_else(|| DeployError::TaskFailure {
                container: None,
                message: "no task was started".to_string(),
            })?;

        self.wait_until_stopped(cluster, &task_arn).await?;

        let described = self
            .control_plane()
            .describe_tasks(cluster, &[task_arn.clone()])
            .await?;
        check_failures(&described)?;
        let stopped = described
            .tasks
            .into_iter()
            .find(|t| t.arn == task_arn)
            .ok_or_else(|| DeployError::TaskFailure {
                container: None,
                message: format!("task {} disappeared", task_arn),
            })?;
        check_exit_codes(&stopped)?;

        let task_id = stopped.task_id().to_string();
        let mut logs = Vec::with_capacity(stopped.containers.len());
        for container in &stopped.containers {
            let stream = naming::log_stream_name(&registered.family, &container.name, &task_id);
            let events = self
                .collect_logs(&config.options.log_group_name, &stream)
                .await?;
            logs.push(ContainerLogs {
                container: container.name.clone(),
                events,
            });
        }

        print_logs(&logs);
        info!(task_id = %task_id, "Task finished");

        Ok(TaskRun {
            task_id,
            task_arn,
            logs,
        })
    }

    async fn wait_until_stopped(&self, cluster: &str, task_arn: &str) -> Result<()> {
        let control_plane = self.control_plane();
        poll_until(
            self.wait_policy(),
            &format!("task {} to stop", naming::trailing_segment(task_arn)),
            move || async move {
                let results = control_plane
                    .describe_tasks(cluster, &[task_arn.to_string()])
                    .await?;
                Ok(results
                    .tasks
                    .iter()
                    .any(|t| t.arn == task_arn && t.is_stopped())
                    .then_some(()))
            },
        )
        .await
    }

    /// Wait for the log stream to appear, then read it to the end
    async fn collect_logs(&self, group: &str, stream: &str) -> Result<Vec<LogEvent>> {
        let control_plane = self.control_plane();
        poll_until(
            self.wait_policy(),
            &format!("log stream {}", stream),
            move || async move {
                let streams = control_plane.describe_log_streams(group, stream).await?;
                Ok(streams.iter().any(|s| s == stream).then_some(()))
            },
        )
        .await?;

        read_log_stream(control_plane, group, stream).await
    }
}

/// Page through a log stream until the forward token stops changing
async fn read_log_stream(
    control_plane: &dyn ControlPlane,
    group: &str,
    stream: &str,
) -> Result<Vec<LogEvent>> {
    let mut events = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = control_plane
            .get_log_events(group, stream, token.as_deref())
            .await?;
        events.extend(page.events);

        match page.next_forward_token {
            Some(next) if token.as_deref() != Some(next.as_str()) => token = Some(next),
            _ => break,
        }
    }

    debug!(stream = %stream, events = events.len(), "Read log stream");
    Ok(events)
}

fn check_failures(results: &TaskResults) -> Result<()> {
    if results.failures.is_empty() {
        return Ok(());
    }
    Err(DeployError::TaskFailure {
        container: None,
        message: results
            .failures
            .iter()
            .map(TaskFailure::to_string)
            .collect::<Vec<_>>()
            .join("; "),
    })
}

/// Any non-zero or missing exit code fails the run
fn check_exit_codes(task: &TaskInfo) -> Result<()> {
    for container in &task.containers {
        let reason = container
            .reason
            .as_deref()
            .or(task.stopped_reason.as_deref())
            .unwrap_or("no reason given");

        match container.exit_code {
            Some(0) => {}
            Some(code) => {
                return Err(DeployError::TaskFailure {
                    container: Some(container.name.clone()),
                    message: format!(
                        "container '{}' exited with code {}: {}",
                        container.name, code, reason
                    ),
                });
            }
            None => {
                return Err(DeployError::TaskFailure {
                    container: Some(container.name.clone()),
                    message: format!(
                        "container '{}' stopped without an exit code: {}",
                        container.name, reason
                    ),
                });
            }
        }
    }
    Ok(())
}

fn print_logs(logs: &[ContainerLogs]) {
    for container in logs {
        println!("{}", format!("── {} ──", container.container).cyan().bold());
        if container.events.is_empty() {
            println!("{}", "(no output)".dimmed());
        }
        for event in &container.events {
            println!("{}", event.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flecs_cloud::ContainerState;
    use flecs_core::Options;
    use std::collections::BTreeMap;

    fn config_with(containers: &[&str]) -> Config {
        let definition = Definition {
            containers: containers
                .iter()
                .map(|name| Container {
                    name: name.to_string(),
                    image: "alpine".to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        Config {
            project_name: "demo".to_string(),
            options: Options::default(),
            definitions: BTreeMap::from([("job".to_string(), definition)]),
            ..Default::default()
        }
    }

    fn step(command: Option<&str>, container: Option<&str>) -> TaskStep {
        TaskStep {
            command: command.map(str::to_string),
            definition: Some("job".to_string()),
            container: container.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_requires_command_or_name() {
        let config = config_with(&["app"]);
        let err = validate(&config, &step(None, None)).err().unwrap();
        assert!(matches!(err, DeployError::Validation(_)));

        let named = TaskStep {
            name: Some("migrate".to_string()),
            ..step(None, None)
        };
        assert!(validate(&config, &named).is_ok());
    }

    #[test]
    fn test_validate_requires_definition() {
        let config = config_with(&["app"]);
        let mut no_definition = step(Some("uptime"), None);
        no_definition.definition = None;
        assert!(matches!(
            validate(&config, &no_definition).err().unwrap(),
            DeployError::Validation(_)
        ));

        let mut unknown = step(Some("uptime"), None);
        unknown.definition = Some("missing".to_string());
        assert!(matches!(
            validate(&config, &unknown).err().unwrap(),
            DeployError::ConfigReference { kind: "definition", .. }
        ));
    }

    #[test]
    fn test_validate_container_disambiguation() {
        let config = config_with(&["app", "sidecar"]);

        let err = validate(&config, &step(Some("uptime"), None)).err().unwrap();
        assert!(matches!(err, DeployError::Validation(ref m) if m.contains("container")));

        let task = validate(&config, &step(Some("uptime"), Some("sidecar"))).unwrap();
        assert_eq!(task.target.name, "sidecar");
        assert_eq!(task.command, vec!["uptime"]);

        let err = validate(&config, &step(Some("uptime"), Some("db"))).err().unwrap();
        assert!(matches!(err, DeployError::ConfigReference { kind: "container", .. }));
    }

    fn stopped(containers: Vec<ContainerState>) -> TaskInfo {
        TaskInfo {
            arn: "arn:aws:ecs:eu-west-1:1:task/demo/abc".to_string(),
            last_status: "STOPPED".to_string(),
            stopped_reason: Some("Essential container in task exited".to_string()),
            containers,
        }
    }

    #[test]
    fn test_exit_code_classification() {
        let ok = stopped(vec![ContainerState {
            name: "app".to_string(),
            exit_code: Some(0),
            reason: None,
        }]);
        assert!(check_exit_codes(&ok).is_ok());

        let oom = stopped(vec![ContainerState {
            name: "app".to_string(),
            exit_code: Some(137),
            reason: Some("OutOfMemoryError".to_string()),
        }]);
        let err = check_exit_codes(&oom).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("app"));
        assert!(message.contains("OutOfMemoryError"));
        assert!(matches!(err, DeployError::TaskFailure { container: Some(ref c), .. } if c == "app"));

        let missing = stopped(vec![ContainerState {
            name: "app".to_string(),
            exit_code: None,
            reason: None,
        }]);
        let err = check_exit_codes(&missing).unwrap_err();
        assert!(err.to_string().contains("Essential container in task exited"));
    }

    #[test]
    fn test_run_failures_are_aggregated() {
        let results = TaskResults {
            tasks: vec![],
            failures: vec![
                TaskFailure {
                    arn: None,
                    reason: Some("RESOURCE:MEMORY".to_string()),
                    detail: None,
                },
                TaskFailure {
                    arn: None,
                    reason: Some("AGENT".to_string()),
                    detail: Some("disconnected".to_string()),
                },
            ],
        };
        let err = check_failures(&results).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("RESOURCE:MEMORY"));
        assert!(message.contains("AGENT (disconnected)"));
    }
}
