//! AWS control plane for Flecs
//!
//! Implements [`flecs_cloud::ControlPlane`] on top of the AWS SDK: ECS for
//! clusters, services and tasks, EC2 for networking, CloudWatch Logs, IAM,
//! STS, Elastic Load Balancing v2 and ECR.
//!
//! # Requirements
//!
//! - Credentials resolvable by the default AWS provider chain
//!   (environment, profile, SSO, instance metadata)
//!
//! # Example
//!
//! ```ignore
//! use flecs_cloud::ControlPlane;
//! use flecs_cloud_aws::AwsControlPlane;
//!
//! let control_plane = AwsControlPlane::new("eu-west-1", "eu-west-1").await;
//! let cluster = control_plane.describe_cluster("flecs").await?;
//! ```

mod convert;
mod error;
pub mod provider;

pub use provider::AwsControlPlane;
