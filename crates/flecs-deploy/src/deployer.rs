//! Deployer: the engine's entry points

use crate::cluster;
use crate::error::{DeployError, Result};
use crate::reconcile::WaitPolicy;
use flecs_build::ImageBuilder;
use flecs_cloud::ControlPlane;
use flecs_core::Config;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::instrument;

/// Kinds of resource that can be torn down explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Service,
    Cluster,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Service => write!(f, "service"),
            ResourceKind::Cluster => write!(f, "cluster"),
        }
    }
}

impl FromStr for ResourceKind {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "service" => Ok(ResourceKind::Service),
            "cluster" => Ok(ResourceKind::Cluster),
            other => Err(DeployError::Validation(format!(
                "unknown resource kind '{}', expected service or cluster",
                other
            ))),
        }
    }
}

/// Runs pipelines and teardowns against a control plane
///
/// Holds no deployment state besides the default execution role ARN, which is
/// resolved at most once per deployer.
pub struct Deployer {
    control_plane: Arc<dyn ControlPlane>,
    image_builder: Arc<dyn ImageBuilder>,
    policy: WaitPolicy,
    pub(crate) default_execution_role: OnceCell<String>,
}

impl Deployer {
    pub fn new(control_plane: Arc<dyn ControlPlane>, image_builder: Arc<dyn ImageBuilder>) -> Self {
        Self {
            control_plane,
            image_builder,
            policy: WaitPolicy::default(),
            default_execution_role: OnceCell::new(),
        }
    }

    /// Override the bounds of every wait
    pub fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn wait_policy(&self) -> &WaitPolicy {
        &self.policy
    }

    /// Control plane and region deployments go to, e.g. `aws eu-west-1`
    pub fn target(&self) -> String {
        format!("{} {}", self.control_plane.name(), self.control_plane.region())
    }

    pub(crate) fn control_plane(&self) -> &dyn ControlPlane {
        self.control_plane.as_ref()
    }

    pub(crate) fn image_builder(&self) -> &dyn ImageBuilder {
        self.image_builder.as_ref()
    }

    /// Tear down a service instance or the cluster
    ///
    /// For a cluster an empty `name` means the configured cluster.
    #[instrument(skip(self, config), fields(project = %config.project_name))]
    pub async fn remove(&self, config: &Config, kind: ResourceKind, name: &str) -> Result<()> {
        match kind {
            ResourceKind::Service => self.remove_service(config, name).await,
            ResourceKind::Cluster => {
                let cluster = if name.is_empty() {
                    config.cluster_name()
                } else {
                    name
                };
                cluster::delete_cluster(self.control_plane(), &self.policy, cluster).await
            }
        }
    }

    /// Whether the configured cluster exists and is active
    pub async fn cluster_exists(&self, config: &Config) -> Result<bool> {
        cluster::cluster_exists(self.control_plane(), config.cluster_name()).await
    }

    /// Create the configured cluster if needed; returns whether it was created
    pub async fn ensure_cluster(&self, config: &Config) -> Result<bool> {
        let ensured =
            cluster::ensure_cluster(self.control_plane(), &self.policy, config.cluster_name())
                .await?;
        Ok(ensured.created)
    }
}
