//! Resource naming rules
//!
//! Names are derived from the project, the catalog key and the environment,
//! so a later run can find what an earlier run created.

use crate::error::{DeployError, Result};
use flecs_core::{Config, TaskStep};
use rand::Rng;
use rand::distributions::Alphanumeric;
use regex::Regex;

pub const NAME_PREFIX: &str = "flecs";
pub const INSTANCE_SUFFIX_LEN: usize = 8;
/// Load balancer and target group names are limited to 32 characters
pub const LOAD_BALANCER_NAME_MAX: usize = 32;

/// `flecs-<name>[-<environment>]`
pub fn family_name(name: &str, environment: Option<&str>) -> String {
    match environment.filter(|e| !e.is_empty()) {
        Some(env) => format!("{}-{}-{}", NAME_PREFIX, name, env),
        None => format!("{}-{}", NAME_PREFIX, name),
    }
}

/// Logical definition name of a service: `<project>-<service>`
pub fn service_definition_name(config: &Config, service: &str) -> String {
    format!("{}-{}", config.project_name, service)
}

/// Deterministic part of a service instance name
///
/// Equal to the family of the service's task definition.
pub fn service_prefix(config: &Config, service: &str) -> String {
    family_name(
        &service_definition_name(config, service),
        config.environment_name.as_deref(),
    )
}

/// `<prefix>-<8 random alphanumerics>`
pub fn instance_name(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INSTANCE_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}-{}", prefix, suffix)
}

/// Matches the trailing name segment of an instance of `prefix`
pub fn instance_pattern(prefix: &str) -> Result<Regex> {
    Regex::new(&format!(r"^{}-\w+$", regex::escape(prefix)))
        .map_err(|e| DeployError::Validation(format!("invalid service prefix {}: {}", prefix, e)))
}

/// Last `/`-separated segment of an ARN (or the name itself)
pub fn trailing_segment(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

/// Logical name of a one-off task: `<project>[-<task name | first command token>]`
pub fn task_definition_name(config: &Config, step: &TaskStep, command: &[String]) -> String {
    let suffix = step
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .or_else(|| command.first().map(String::as_str))
        .map(sanitize);

    match suffix {
        Some(s) if !s.is_empty() => format!("{}-{}", config.project_name, s),
        _ => config.project_name.clone(),
    }
}

/// Log stream written by the awslogs driver for a task container
pub fn log_stream_name(family: &str, container: &str, task_id: &str) -> String {
    format!("{}/{}/{}", family, container, task_id)
}

/// `flecs-<project>-<key>`, cut to the load balancer name limit
pub fn load_balancer_name(project: &str, key: &str) -> String {
    let mut name = format!("{}-{}-{}", NAME_PREFIX, sanitize(project), sanitize(key));
    name.truncate(LOAD_BALANCER_NAME_MAX);
    name.trim_end_matches('-').to_string()
}

/// `<account>.dkr.ecr.<region>.amazonaws.com`
pub fn registry_uri(account: &str, region: &str) -> String {
    format!("{}.dkr.ecr.{}.amazonaws.com", account, region)
}

/// Keep characters that are valid in every resource name we generate
fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(env: Option<&str>) -> Config {
        Config {
            project_name: "demo".to_string(),
            environment_name: env.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_family_name() {
        assert_eq!(family_name("demo-web", None), "flecs-demo-web");
        assert_eq!(family_name("demo-web", Some("")), "flecs-demo-web");
        assert_eq!(family_name("demo-web", Some("prod")), "flecs-demo-web-prod");
    }

    #[test]
    fn test_service_prefix_and_instance() {
        assert_eq!(service_prefix(&config(None), "demo"), "flecs-demo-demo");
        assert_eq!(service_prefix(&config(Some("prod")), "web"), "flecs-demo-web-prod");

        let name = instance_name("flecs-demo-demo");
        let re = Regex::new(r"^flecs-demo-demo-[A-Za-z0-9]{8}$").unwrap();
        assert!(re.is_match(&name), "{}", name);
        assert_ne!(name, instance_name("flecs-demo-demo"));
    }

    #[test]
    fn test_instance_pattern() {
        let re = instance_pattern("flecs-demo-web").unwrap();
        assert!(re.is_match("flecs-demo-web-ab12cd34"));
        assert!(!re.is_match("flecs-demo-web-worker-ab12cd34"));
        assert!(!re.is_match("flecs-demo-webapp"));
        assert!(!re.is_match("xflecs-demo-web-ab12cd34"));
    }

    #[test]
    fn test_trailing_segment() {
        assert_eq!(
            trailing_segment("arn:aws:ecs:eu-west-1:1:service/demo/flecs-demo-web-ab12cd34"),
            "flecs-demo-web-ab12cd34"
        );
        assert_eq!(trailing_segment("plain"), "plain");
    }

    #[test]
    fn test_task_definition_name() {
        let cfg = config(None);
        let named = TaskStep {
            name: Some("migrate".to_string()),
            ..Default::default()
        };
        assert_eq!(task_definition_name(&cfg, &named, &[]), "demo-migrate");

        let command = vec!["uptime".to_string(), "-p".to_string()];
        assert_eq!(
            task_definition_name(&cfg, &TaskStep::default(), &command),
            "demo-uptime"
        );

        let path = vec!["./bin/seed.sh".to_string()];
        assert_eq!(
            task_definition_name(&cfg, &TaskStep::default(), &path),
            "demo---bin-seed-sh"
        );
    }

    #[test]
    fn test_load_balancer_name_truncated() {
        assert_eq!(load_balancer_name("demo", "public"), "flecs-demo-public");
        let long = load_balancer_name("a-very-long-project-name", "frontend");
        assert!(long.len() <= LOAD_BALANCER_NAME_MAX);
        assert!(!long.ends_with('-'));
    }

    #[test]
    fn test_log_stream_and_registry() {
        assert_eq!(
            log_stream_name("flecs-demo-uptime", "app", "0f9a"),
            "flecs-demo-uptime/app/0f9a"
        );
        assert_eq!(
            registry_uri("123456789012", "eu-west-1"),
            "123456789012.dkr.ecr.eu-west-1.amazonaws.com"
        );
    }
}
