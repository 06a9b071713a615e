//! Flecs deploy engine
//!
//! Executes a [`flecs_core::Config`] pipeline against a
//! [`flecs_cloud::ControlPlane`]:
//!
//! - **Pipeline executor**: steps in declared order, fail-fast
//! - **Reconciliation helpers**: describe, create-if-absent, bounded polling
//! - **Service lifecycle**: create, update, blue/green recreate and delete
//! - **Task runner**: run to completion, classify exit codes, collect logs
//! - **Definition builder**: registrable task definition revisions
//! - **Network and load balancer provisioning**
//!
//! # Example
//!
//! ```ignore
//! use flecs_deploy::Deployer;
//!
//! let deployer = Deployer::new(control_plane, image_builder);
//! deployer.deploy(&config).await?;
//! ```

mod cluster;
mod definition;
mod deployer;
mod docker;
pub mod error;
mod load_balancer;
pub mod naming;
mod network;
mod pipeline;
pub mod reconcile;
mod script;
mod service;
mod task;

#[cfg(test)]
mod testing;

pub use definition::{DEFAULT_EXECUTION_ROLE_NAME, RegisteredDefinition};
pub use deployer::{Deployer, ResourceKind};
pub use error::{DeployError, Result};
pub use network::ResolvedNetwork;
pub use reconcile::{Ensured, WaitPolicy, ensure, poll_until};
pub use service::{ServiceAction, ServiceDeployment};
pub use task::{ContainerLogs, TaskRun};
