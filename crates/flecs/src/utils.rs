use colored::Colorize;
use flecs_build::DockerImageBuilder;
use flecs_cloud_aws::AwsControlPlane;
use flecs_core::{Config, LoadOptions};
use flecs_deploy::Deployer;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

/// Resolve the config file and load it with the CLI's environment and tag
pub fn load_config(
    file: Option<&Path>,
    environment: Option<String>,
    tag: Option<String>,
) -> anyhow::Result<Config> {
    let path = match file {
        Some(path) => path.to_path_buf(),
        None => flecs_core::find_config_file(&std::env::current_dir()?)?,
    };
    print_loaded_config_file(&path);

    let options = LoadOptions {
        environment: environment.filter(|e| !e.is_empty()),
        tag,
        project_name: None,
    };
    Ok(flecs_core::load_config(&path, &options)?)
}

fn print_loaded_config_file(path: &Path) {
    let shown = path
        .canonicalize()
        .unwrap_or_else(|_| PathBuf::from(path));
    println!("📄 {}", shown.display().to_string().cyan());
}

/// Current commit, used as the image tag when none is given
pub fn git_head_tag() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        debug!("Not in a git repository, no default tag");
        return None;
    }

    let tag = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!tag.is_empty()).then_some(tag)
}

/// Deployer wired to AWS and the local Docker engine
pub async fn deployer(config: &Config) -> anyhow::Result<Deployer> {
    let control_plane =
        AwsControlPlane::new(&config.options.region, &config.options.ecr_region).await;
    let image_builder = DockerImageBuilder::connect()?;

    Ok(Deployer::new(
        Arc::new(control_plane),
        Arc::new(image_builder),
    ))
}
