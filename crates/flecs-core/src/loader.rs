//! Config loader
//!
//! Reads `flecs.yaml`, applies the selected environment on top of the
//! top-level options, fills in defaults and validates the pipeline.

use crate::error::{ConfigError, Result};
use crate::model::{Config, Definition, LoadBalancer, Options, RawStep, Service, Step};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

const CONFIG_FILE_CANDIDATES: [&str; 2] = ["flecs.yaml", "flecs.yml"];
const DEFAULT_CLUSTER_NAME: &str = "flecs";
const DEFAULT_REGION: &str = "eu-west-1";

/// Inputs that do not come from the config file itself
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Environment (stage) to apply
    pub environment: Option<String>,
    /// Image tag for docker steps
    pub tag: Option<String>,
    /// Overrides the project name default (the config file's directory name)
    pub project_name: Option<String>,
}

/// Option keys as they appear in the file, at the top level or per environment
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct OptionsFile {
    public_ip: Option<bool>,
    cluster_name: Option<String>,
    ecr_region: Option<String>,
    environment_variables: BTreeMap<String, String>,
    log_group_name: Option<String>,
    pipeline: Vec<RawStep>,
    region: Option<String>,
    recreate_services: Option<bool>,
    secrets: BTreeMap<String, String>,
    security_group_names: Vec<String>,
    subnet_names: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    project_name: Option<String>,
    #[serde(flatten)]
    options: OptionsFile,
    environments: BTreeMap<String, OptionsFile>,
    definitions: BTreeMap<String, Definition>,
    services: BTreeMap<String, Service>,
    load_balancers: BTreeMap<String, LoadBalancer>,
}

/// Find the config file in `dir`
pub fn find_config_file(dir: &Path) -> Result<PathBuf> {
    CONFIG_FILE_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| ConfigError::ConfigFileNotFound(dir.to_path_buf()))
}

/// Load and resolve a config file
#[instrument(skip(options), fields(path = %path.display()))]
pub fn load_config(path: &Path, options: &LoadOptions) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let default_project = path
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::parent)
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("default")
        .to_string();

    let config = parse_config(&content, options, &default_project)?;
    info!(
        project = %config.project_name,
        cluster = %config.options.cluster_name,
        steps = config.pipeline.len(),
        "Config loaded"
    );
    Ok(config)
}

/// Resolve config from a YAML string
///
/// `default_project` is used when the document has no `project_name`.
pub fn parse_config(content: &str, options: &LoadOptions, default_project: &str) -> Result<Config> {
    let file: ConfigFile = if content.trim().is_empty() {
        ConfigFile::default()
    } else {
        serde_yaml::from_str(content)?
    };

    let env = match &options.environment {
        Some(name) => {
            debug!(environment = %name, "Applying environment overrides");
            Some(
                file.environments
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::EnvironmentNotFound(name.clone()))?,
            )
        }
        None => None,
    };

    let project_name = options
        .project_name
        .clone()
        .or(file.project_name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| default_project.to_string());

    let (resolved, raw_pipeline) = merge_options(file.options, env.unwrap_or_default(), &project_name);

    if raw_pipeline.is_empty() {
        return Err(ConfigError::EmptyPipeline);
    }

    let pipeline = raw_pipeline
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            Step::try_from(raw).map_err(|reason| ConfigError::InvalidStep { index, reason })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Config {
        project_name,
        environment_name: options.environment.clone(),
        tag: options.tag.clone().filter(|t| !t.is_empty()),
        options: resolved,
        definitions: file.definitions,
        services: file.services,
        load_balancers: file.load_balancers,
        pipeline,
    })
}

/// Apply environment options on top of the top-level ones
fn merge_options(
    base: OptionsFile,
    env: OptionsFile,
    project_name: &str,
) -> (Options, Vec<RawStep>) {
    let cluster_name = non_empty(env.cluster_name)
        .or(non_empty(base.cluster_name))
        .unwrap_or_else(|| DEFAULT_CLUSTER_NAME.to_string());

    let region = non_empty(env.region)
        .or(non_empty(base.region))
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let ecr_region = non_empty(env.ecr_region)
        .or(non_empty(base.ecr_region))
        .unwrap_or_else(|| region.clone());

    let log_group_name = non_empty(base.log_group_name)
        .or(non_empty(env.log_group_name))
        .unwrap_or_else(|| format!("/flecs/{}", project_name));

    let security_group_names = if env.security_group_names.is_empty() {
        base.security_group_names
    } else {
        env.security_group_names
    };

    let subnet_names = if env.subnet_names.is_empty() {
        base.subnet_names
    } else {
        env.subnet_names
    };

    let mut environment_variables = base.environment_variables;
    environment_variables.extend(env.environment_variables);

    let mut secrets = base.secrets;
    secrets.extend(env.secrets);

    let pipeline = if env.pipeline.is_empty() {
        base.pipeline
    } else {
        env.pipeline
    };

    let options = Options {
        assign_public_ip: base.public_ip.unwrap_or(false) || env.public_ip.unwrap_or(false),
        cluster_name,
        ecr_region,
        environment_variables,
        log_group_name,
        region,
        recreate_services: base.recreate_services.unwrap_or(false)
            || env.recreate_services.unwrap_or(false),
        secrets,
        security_group_names,
        subnet_names,
    };

    (options, pipeline)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
