/// Cluster resource
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ResourceData, TaskResource};

/// Declared cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterResource {
    /// Local resource name
    pub name: String,

    pub cluster_name: String,

    /// Cloud provider (e.g., "AWS_VPC")
    #[serde(default = "default_provider")]
    pub provider: String,

    pub version: String,

    /// Node size (e.g., "t3.small")
    pub size: String,

    pub data_center: String,

    #[serde(default)]
    pub client_encryption: bool,

    #[serde(default)]
    pub authn_authz: bool,

    #[serde(default = "default_true")]
    pub use_private_broadcast_rpc_address: bool,

    #[serde(default = "default_true")]
    pub default_network: bool,

    /// Rack name to node count
    pub rack_allocation: BTreeMap<String, u32>,

    /// Backing task
    pub task: ResourceData,
}

fn default_provider() -> String {
    "AWS_VPC".to_string()
}

fn default_true() -> bool {
    true
}

impl TaskResource for ClusterResource {
    const KIND: &'static str = "cluster";

    fn name(&self) -> &str {
        &self.name
    }

    fn data(&self) -> &ResourceData {
        &self.task
    }

    fn data_mut(&mut self) -> &mut ResourceData {
        &mut self.task
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("name", &self.name),
            ("cluster_name", &self.cluster_name),
            ("provider", &self.provider),
            ("version", &self.version),
            ("size", &self.size),
            ("data_center", &self.data_center),
        ] {
            if value.is_empty() {
                anyhow::bail!("cluster {}: {} cannot be empty", self.name, field);
            }
        }

        if self.rack_allocation.is_empty() {
            anyhow::bail!("cluster {}: rack_allocation cannot be empty", self.name);
        }
        if let Some((rack, _)) = self.rack_allocation.iter().find(|(_, count)| **count == 0) {
            anyhow::bail!(
                "cluster {}: rack {} must have at least one node",
                self.name,
                rack
            );
        }

        self.task.validate()
    }

    fn summary(&self) -> String {
        format!(
            "{} {} on {} {} ({} racks, encryption: {}, authn/authz: {}, private broadcast: {}, default network: {})",
            self.cluster_name,
            self.version,
            self.provider,
            self.data_center,
            self.rack_allocation.len(),
            self.client_encryption,
            self.authn_authz,
            self.use_private_broadcast_rpc_address,
            self.default_network
        )
    }
}
