//! Pipeline executor

use crate::deployer::Deployer;
use crate::error::{DeployError, Result};
use crate::script;
use colored::Colorize;
use flecs_core::{Config, Step};
use tracing::{info, instrument};

impl Deployer {
    /// Run every pipeline step in order, stopping at the first failure
    #[instrument(skip_all, fields(project = %config.project_name, cluster = %config.cluster_name(), target = %self.target()))]
    pub async fn deploy(&self, config: &Config) -> Result<()> {
        let total = config.pipeline.len();

        for (index, step) in config.pipeline.iter().enumerate() {
            let kind = step.kind();
            info!(index, kind = %kind, label = step.label().unwrap_or_default(), "Running step");
            println!(
                "{} {} {}",
                format!("[{}/{}]", index + 1, total).bold(),
                kind.to_string().blue().bold(),
                step.label().unwrap_or_default().cyan()
            );

            self.run_step(config, step)
                .await
                .map_err(|source| DeployError::StepFailed {
                    index,
                    kind,
                    source: Box::new(source),
                })?;
        }

        info!(steps = total, "Pipeline complete");
        Ok(())
    }

    async fn run_step(&self, config: &Config, step: &Step) -> Result<()> {
        match step {
            Step::Docker(docker) => self.build_and_push(config, docker).await.map(|_| ()),
            Step::Script(script) => script::run_script(script).await,
            Step::Service(service) => self.deploy_service(config, &service.name).await.map(|_| ()),
            Step::Task(task) => self.run_task(config, task).await.map(|_| ()),
        }
    }
}
