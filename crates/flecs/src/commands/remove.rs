use colored::Colorize;
use flecs_core::Config;
use flecs_deploy::{Deployer, ResourceKind};

/// Services must be named; a cluster defaults to the configured one
pub fn target_name(kind: ResourceKind, name: Option<String>) -> anyhow::Result<String> {
    match (kind, name) {
        (_, Some(name)) => Ok(name),
        (ResourceKind::Cluster, None) => Ok(String::new()),
        (ResourceKind::Service, None) => Err(anyhow::anyhow!(
            "a service name is required: flecs rm service <name>"
        )),
    }
}

pub async fn handle(
    deployer: &Deployer,
    config: &Config,
    kind: ResourceKind,
    name: &str,
) -> anyhow::Result<()> {
    let label = match kind {
        ResourceKind::Cluster if name.is_empty() => config.cluster_name(),
        _ => name,
    };
    println!("{} {} {}", "Removing".yellow().bold(), kind, label.cyan());

    deployer.remove(config, kind, name).await?;

    println!("{} {} {} removed", "✓".green(), kind, label.cyan());
    Ok(())
}
