/// Firewall rule resource
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use super::{ResourceData, TaskResource};

/// Declared firewall rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallRuleResource {
    /// Local resource name
    pub name: String,

    /// Cluster the rule applies to
    pub cluster_id: String,

    /// Allowed network in CIDR notation (e.g., "10.0.0.0/16")
    pub network: String,

    /// Rule names (e.g., "CASSANDRA")
    pub rules: Vec<String>,

    /// Backing task
    pub task: ResourceData,
}

impl TaskResource for FirewallRuleResource {
    const KIND: &'static str = "firewall_rule";

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
        if self.name.is_empty() {
            anyhow::bail!("firewall rule name cannot be empty");
        }
        if self.cluster_id.is_empty() {
            anyhow::bail!("firewall rule {}: cluster_id cannot be empty", self.name);
        }
        validate_cidr(&self.network)?;
        if self.rules.is_empty() || self.rules.iter().any(|r| r.is_empty()) {
            anyhow::bail!("firewall rule {}: rules cannot be empty", self.name);
        }

        self.task.validate()
    }

    fn summary(&self) -> String {
        format!(
            "{} on cluster {} ({})",
            self.network,
            self.cluster_id,
            self.rules.join(", ")
        )
    }
}

/// Validate CIDR notation
fn validate_cidr(cidr: &str) -> Result<()> {
    let Some((address, prefix)) = cidr.split_once('/') else {
        anyhow::bail!("Invalid CIDR notation: {}", cidr);
    };

    let address: IpAddr = address
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid CIDR notation: {}", cidr))?;
    let max_prefix = if address.is_ipv4() { 32 } else { 128 };

    match prefix.parse::<u8>() {
        Ok(prefix) if prefix <= max_prefix => Ok(()),
        _ => anyhow::bail!("Invalid CIDR notation: {}", cidr),
    }
}
