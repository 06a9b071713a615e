//! Resolved deployment configuration

use super::definition::Definition;
use super::load_balancer::LoadBalancer;
use super::service::Service;
use super::step::Step;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options that may be set at the top level or per environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Assign a public IP to task network interfaces
    #[serde(rename = "public_ip")]
    pub assign_public_ip: bool,
    pub cluster_name: String,
    /// Region of the image registry (defaults to `region`)
    pub ecr_region: String,
    pub environment_variables: BTreeMap<String, String>,
    pub log_group_name: String,
    pub region: String,
    /// Replace services blue/green instead of updating them in place
    pub recreate_services: bool,
    /// Secret name -> parameter/secret ARN
    pub secrets: BTreeMap<String, String>,
    pub security_group_names: Vec<String>,
    pub subnet_names: Vec<String>,
}

/// Fully resolved configuration for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub project_name: String,
    /// Selected environment, if any
    pub environment_name: Option<String>,
    /// Image tag used by docker steps
    pub tag: Option<String>,
    pub options: Options,
    pub definitions: BTreeMap<String, Definition>,
    pub services: BTreeMap<String, Service>,
    pub load_balancers: BTreeMap<String, LoadBalancer>,
    pub pipeline: Vec<Step>,
}

impl Config {
    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn load_balancer(&self, name: &str) -> Option<&LoadBalancer> {
        self.load_balancers.get(name)
    }

    pub fn cluster_name(&self) -> &str {
        &self.options.cluster_name
    }
}
