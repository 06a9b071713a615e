use crate::context::ContextBuilder;
use crate::error::{BuildError, BuildResult};
use crate::pusher::{ImagePusher, PushCredentials};
use async_trait::async_trait;
use bollard::Docker;
use colored::Colorize;
use futures_util::stream::StreamExt;
use std::path::PathBuf;

/// What to build and how to tag it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Build context directory
    pub context: PathBuf,
    /// Dockerfile, defaults to `<context>/Dockerfile`
    pub dockerfile: Option<PathBuf>,
    /// Full image reference including the tag
    pub image: String,
}

/// Image build/push collaborator used by the docker pipeline step
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Build and tag an image
    async fn build(&self, request: &BuildRequest) -> BuildResult<()>;

    /// Push `image:tag`, authenticating with `credentials` for this call only
    ///
    /// Returns the full pushed reference.
    async fn push(
        &self,
        image: &str,
        tag: &str,
        credentials: Option<&PushCredentials>,
    ) -> BuildResult<String>;
}

/// [`ImageBuilder`] backed by the local Docker daemon
pub struct DockerImageBuilder {
    docker: Docker,
}

impl DockerImageBuilder {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connect to the local daemon with default settings
    pub fn connect() -> BuildResult<Self> {
        Ok(Self::new(Docker::connect_with_local_defaults()?))
    }

    fn handle_build_output(&self, output: bollard::models::BuildInfo) -> BuildResult<()> {
        if let Some(stream) = output.stream {
            print!("{}", stream);
        }

        if let Some(error) = output.error {
            return Err(BuildError::BuildFailed(error));
        }

        if let Some(error_detail) = output.error_detail {
            let message = error_detail
                .message
                .unwrap_or_else(|| "Unknown build error".to_string());
            return Err(BuildError::BuildFailed(message));
        }

        if let Some(status) = output.status {
            println!("{}", status.cyan());
        }

        Ok(())
    }
}

#[async_trait]
impl ImageBuilder for DockerImageBuilder {
    #[allow(deprecated)]
    async fn build(&self, request: &BuildRequest) -> BuildResult<()> {
        tracing::info!(image = %request.image, "Building image");

        let context_data =
            ContextBuilder::create_context(&request.context, request.dockerfile.as_deref())?;

        let options = bollard::image::BuildImageOptions {
            dockerfile: "Dockerfile",
            t: request.image.as_str(),
            rm: true,
            forcerm: true,
            pull: true,
            ..Default::default()
        };

        use bytes::Bytes;
        use http_body_util::{Either, Full};
        let body = Full::new(Bytes::from(context_data));
        let mut stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)));

        while let Some(msg) = stream.next().await {
            match msg {
                Ok(output) => self.handle_build_output(output)?,
                Err(e) => return Err(BuildError::DockerConnection(e)),
            }
        }

        tracing::info!(image = %request.image, "Successfully built");
        Ok(())
    }

    async fn push(
        &self,
        image: &str,
        tag: &str,
        credentials: Option<&PushCredentials>,
    ) -> BuildResult<String> {
        ImagePusher::new(self.docker.clone())
            .push(image, tag, credentials)
            .await
    }
}
