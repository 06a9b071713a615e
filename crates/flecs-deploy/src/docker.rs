//! Docker steps: build an image and push it to the account registry

use crate::deployer::Deployer;
use crate::error::{DeployError, Result};
use crate::naming;
use flecs_build::{BuildRequest, PushCredentials, validate_tag};
use flecs_cloud::ControlPlane;
use flecs_core::{Config, DockerStep};
use std::path::PathBuf;
use tracing::{debug, info};

impl Deployer {
    /// Build and push the step's image; returns the pushed reference
    pub(crate) async fn build_and_push(&self, config: &Config, step: &DockerStep) -> Result<String> {
        let tag = config.tag.as_deref().ok_or_else(|| {
            DeployError::Validation(
                "docker step needs an image tag: pass --tag or run inside a git repository"
                    .to_string(),
            )
        })?;
        validate_tag(tag)?;

        let repository = step
            .repository
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(config.project_name.as_str());

        let account = self.control_plane().caller_identity().await?.account;
        let registry = naming::registry_uri(&account, &config.options.ecr_region);
        ensure_repository(self.control_plane(), repository).await?;
        let credentials = self.control_plane().registry_credentials().await?;

        let image = format!("{}/{}", registry, repository);
        let request = BuildRequest {
            context: PathBuf::from(step.path.as_deref().unwrap_or(".")),
            dockerfile: step.dockerfile.as_deref().map(PathBuf::from),
            image: format!("{}:{}", image, tag),
        };
        self.image_builder().build(&request).await?;

        let push_credentials = PushCredentials {
            username: credentials.username,
            password: credentials.password,
            server_address: credentials
                .endpoint
                .unwrap_or_else(|| format!("https://{}", registry)),
        };
        let pushed = self
            .image_builder()
            .push(&image, tag, Some(&push_credentials))
            .await?;

        info!(image = %pushed, "Image pushed");
        Ok(pushed)
    }
}

async fn ensure_repository(control_plane: &dyn ControlPlane, name: &str) -> Result<()> {
    if control_plane.describe_repository(name).await?.is_some() {
        return Ok(());
    }

    info!(repository = %name, "Creating repository");
    match control_plane.create_repository(name).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_already_exists() => {
            debug!(repository = %name, "Repository created concurrently");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
