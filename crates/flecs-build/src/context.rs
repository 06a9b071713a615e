use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::path::Path;
use tar::Builder;

/// Largest context we build without a warning
const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024;

pub struct ContextBuilder;

impl ContextBuilder {
    /// Pack `context_path` into a gzipped tarball with the Dockerfile at its root
    ///
    /// `dockerfile` defaults to `<context>/Dockerfile`; it is always stored as
    /// `Dockerfile` so the build can use the default name.
    pub fn create_context(context_path: &Path, dockerfile: Option<&Path>) -> BuildResult<Vec<u8>> {
        if !context_path.is_dir() {
            return Err(BuildError::ContextNotFound(context_path.to_path_buf()));
        }

        let dockerfile_path = dockerfile
            .map(Path::to_path_buf)
            .unwrap_or_else(|| context_path.join("Dockerfile"));
        if !dockerfile_path.is_file() {
            return Err(BuildError::DockerfileNotFound(dockerfile_path));
        }

        tracing::debug!(
            context = %context_path.display(),
            dockerfile = %dockerfile_path.display(),
            "Creating build context"
        );

        let dockerfile_content = std::fs::read(&dockerfile_path)?;

        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);

            tar.append_dir_all(".", context_path)?;

            let mut header = tar::Header::new_gnu();
            header.set_path("Dockerfile").map_err(|e| {
                BuildError::InvalidConfig(format!("Failed to set Dockerfile path: {}", e))
            })?;
            header.set_size(dockerfile_content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append(&header, &dockerfile_content[..])?;

            tar.into_inner()?.finish()?;
        }

        if archive_data.len() > MAX_CONTEXT_SIZE {
            tracing::warn!(
                size_mb = archive_data.len() / 1024 / 1024,
                "Build context is large; consider a .dockerignore"
            );
        }

        tracing::debug!(bytes = archive_data.len(), "Build context created");
        Ok(archive_data)
    }
}
