//! Configuration model
//!
//! Everything a deployment needs, resolved once by the loader and then only
//! read. Catalog entries (definitions, services, load balancers) are looked up
//! by key from pipeline steps.

mod config;
mod definition;
mod load_balancer;
mod service;
mod step;

pub use config::*;
pub use definition::*;
pub use load_balancer::*;
pub use service::*;
pub use step::*;
