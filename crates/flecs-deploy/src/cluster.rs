//! Cluster ensure and teardown

use crate::error::{DeployError, Result};
use crate::reconcile::{Ensured, WaitPolicy, ensure, poll_until};
use flecs_cloud::{ClusterInfo, ControlPlane, STATUS_INACTIVE};
use tracing::{info, warn};

/// Describe a cluster, treating an `INACTIVE` one as absent
pub(crate) async fn describe_live_cluster(
    control_plane: &dyn ControlPlane,
    name: &str,
) -> Result<Option<ClusterInfo>> {
    Ok(control_plane
        .describe_cluster(name)
        .await?
        .filter(|c| c.status != STATUS_INACTIVE))
}

/// Whether the cluster exists and is `ACTIVE`
pub(crate) async fn cluster_exists(control_plane: &dyn ControlPlane, name: &str) -> Result<bool> {
    Ok(describe_live_cluster(control_plane, name)
        .await?
        .is_some_and(|c| c.is_active()))
}

/// Create the cluster if missing and wait until it is `ACTIVE`
pub(crate) async fn ensure_cluster(
    control_plane: &dyn ControlPlane,
    policy: &WaitPolicy,
    name: &str,
) -> Result<Ensured<ClusterInfo>> {
    let ensured = ensure(
        policy,
        &format!("cluster {}", name),
        move || describe_live_cluster(control_plane, name),
        move || async move {
            control_plane
                .create_cluster(name)
                .await
                .map(|_| ())
                .map_err(DeployError::from)
        },
        ClusterInfo::is_active,
    )
    .await?;

    if ensured.created {
        info!(cluster = %name, "Created cluster");
    }
    Ok(ensured)
}

/// Delete the cluster and wait until it is gone
pub(crate) async fn delete_cluster(
    control_plane: &dyn ControlPlane,
    policy: &WaitPolicy,
    name: &str,
) -> Result<()> {
    if describe_live_cluster(control_plane, name).await?.is_none() {
        warn!(cluster = %name, "Cluster does not exist, nothing to remove");
        return Ok(());
    }

    info!(cluster = %name, "Deleting cluster");
    control_plane.delete_cluster(name).await?;

    poll_until(policy, &format!("cluster {} deletion", name), move || async move {
        Ok(describe_live_cluster(control_plane, name)
            .await?
            .is_none()
            .then_some(()))
    })
    .await
}
