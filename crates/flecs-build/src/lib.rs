//! Flecs image build
//!
//! Builds the project image from a Dockerfile and pushes it to the
//! deployment registry through the Docker Engine API. Registry credentials
//! are handed to each push call and never written to a docker config file.

pub mod builder;
pub mod context;
pub mod error;
pub mod pusher;

pub use builder::{BuildRequest, DockerImageBuilder, ImageBuilder};
pub use context::ContextBuilder;
pub use error::{BuildError, BuildResult};
pub use pusher::{PushCredentials, split_image_tag, validate_tag};
