use colored::Colorize;
use flecs_core::Config;
use flecs_deploy::Deployer;

pub async fn handle(deployer: &Deployer, config: &Config) -> anyhow::Result<()> {
    println!(
        "{} {} → {}",
        "Deploying".blue().bold(),
        config.project_name.cyan(),
        config.cluster_name().cyan()
    );
    println!("Target: {}", deployer.target().cyan());
    if let Some(environment) = &config.environment_name {
        println!("Environment: {}", environment.cyan());
    }
    if let Some(tag) = &config.tag {
        println!("Tag: {}", tag.cyan());
    }
    println!();

    deployer.deploy(config).await?;

    println!();
    println!(
        "{}",
        format!("✓ {} steps completed", config.pipeline.len())
            .green()
            .bold()
    );
    Ok(())
}
