//! Flecs cluster control plane
//!
//! This crate defines the control plane Flecs reconciles against: clusters,
//! services, tasks, task definitions, networking, logs, roles, load balancers
//! and image repositories. The deploy engine only talks to the
//! [`ControlPlane`] trait; transports live in their own crates.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   flecs CLI                      │
//! │               (flecs deploy / rm)                │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 flecs-deploy                     │
//! │   pipeline · services · tasks · definitions      │
//! └─────────────────┬───────────────────────────────┘
//!                   │  trait ControlPlane
//! ┌─────────────────▼───────────────────────────────┐
//! │                 flecs-cloud                      │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │ flecs-cloud-  │
//!           │     aws       │
//!           └───────────────┘
//! ```

pub mod control_plane;
pub mod error;
pub mod types;

// Re-exports
pub use control_plane::ControlPlane;
pub use error::{CloudError, Result};
pub use types::*;
