/// Configuration management for kapacitor-provider
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

use crate::kapacitor::models::{TaskStatus, TaskType};
use crate::resources::{ClusterResource, FirewallRuleResource, ResourceData, TaskResource};

const DEFAULT_URL: &str = "http://localhost:9092";

/// Definitions file: provider settings plus the declared resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionsFile {
    /// Connection settings for the Kapacitor server
    pub provider: ProviderConfig,

    /// Declared clusters
    #[serde(default)]
    pub clusters: Vec<ClusterResource>,

    /// Declared firewall rules
    #[serde(default)]
    pub firewall_rules: Vec<FirewallRuleResource>,
}

/// Kapacitor connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the Kapacitor server
    #[serde(default = "default_url")]
    pub url: String,

    /// HTTP request timeout
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_username: Option<String>,

    /// Password (can also be set via KAPACITOR_PASSWORD env var)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_password: Option<String>,

    /// Bearer token (can also be set via KAPACITOR_TOKEN env var)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// `UserAuthentication` or `BearerAuthentication`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<String>,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_timeout_seconds() -> u64 {
    15
}

/// How requests authenticate against Kapacitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    UserAuthentication,
    BearerAuthentication,
}

impl From<&str> for AuthMethod {
    fn from(method: &str) -> Self {
        match method {
            "BearerAuthentication" => AuthMethod::BearerAuthentication,
            _ => AuthMethod::UserAuthentication,
        }
    }
}

/// Credentials attached to every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub method: AuthMethod,
    pub username: String,
    pub password: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    #[error("missing username")]
    MissingUsername,
    #[error("missing password")]
    MissingPassword,
    #[error("missing token")]
    MissingToken,
}

impl Credentials {
    /// Check that the fields required by the method are present
    pub fn validate(&self) -> Result<(), CredentialsError> {
        match self.method {
            AuthMethod::UserAuthentication => {
                if self.username.is_empty() {
                    return Err(CredentialsError::MissingUsername);
                }
                if self.password.is_empty() {
                    return Err(CredentialsError::MissingPassword);
                }
            }
            AuthMethod::BearerAuthentication => {
                if self.token.is_empty() {
                    return Err(CredentialsError::MissingToken);
                }
            }
        }
        Ok(())
    }
}

impl ProviderConfig {
    /// Authentication method, defaulting to user authentication
    pub fn auth_method(&self) -> AuthMethod {
        self.auth_method
            .as_deref()
            .map(AuthMethod::from)
            .unwrap_or(AuthMethod::UserAuthentication)
    }

    /// Resolve credentials from config or environment
    pub fn credentials(&self) -> anyhow::Result<Option<Credentials>> {
        self.credentials_with(|key| std::env::var(key).ok())
    }

    fn credentials_with<F>(&self, env: F) -> anyhow::Result<Option<Credentials>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let password = self
            .auth_password
            .clone()
            .or_else(|| env("KAPACITOR_PASSWORD"));
        let token = self.auth_token.clone().or_else(|| env("KAPACITOR_TOKEN"));

        if self.auth_username.is_none() && password.is_none() && token.is_none() {
            return Ok(None);
        }

        let credentials = Credentials {
            method: self.auth_method(),
            username: self.auth_username.clone().unwrap_or_default(),
            password: password.unwrap_or_default(),
            token: token.unwrap_or_default(),
        };

        credentials
            .validate()
            .map_err(|e| anyhow::anyhow!("error validating credentials: {}", e))?;

        Ok(Some(credentials))
    }

    /// Validate the provider settings
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = url::Url::parse(&self.url)
            .map_err(|e| anyhow::anyhow!("Invalid provider url {}: {}", self.url, e))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("Provider url must use http or https: {}", self.url);
        }

        if self.timeout_seconds == 0 {
            anyhow::bail!("timeout_seconds must be greater than zero");
        }

        Ok(())
    }
}

impl DefinitionsFile {
    /// Load definitions from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let definitions: DefinitionsFile = serde_yaml::from_str(&content)?;
        definitions.validate()?;
        Ok(definitions)
    }

    /// Validate the provider and every declared resource
    pub fn validate(&self) -> anyhow::Result<()> {
        self.provider.validate()?;

        let mut names = HashSet::new();
        for cluster in &self.clusters {
            cluster.validate()?;
            if !names.insert(cluster.name.as_str()) {
                anyhow::bail!("duplicate cluster name: {}", cluster.name);
            }
        }

        names.clear();
        for rule in &self.firewall_rules {
            rule.validate()?;
            if !names.insert(rule.name.as_str()) {
                anyhow::bail!("duplicate firewall rule name: {}", rule.name);
            }
        }

        Ok(())
    }

    /// Generate an example definitions file
    pub fn example() -> Self {
        Self {
            provider: ProviderConfig {
                url: DEFAULT_URL.to_string(),
                timeout_seconds: default_timeout_seconds(),
                auth_username: None,
                auth_password: None,
                auth_token: None,
                auth_method: None,
                insecure_skip_verify: false,
            },
            clusters: vec![ClusterResource {
                name: "metrics".to_string(),
                cluster_name: "metrics-cluster".to_string(),
                provider: "AWS_VPC".to_string(),
                version: "apache-cassandra-3.11.4".to_string(),
                size: "t3.small".to_string(),
                data_center: "US_EAST_1".to_string(),
                client_encryption: false,
                authn_authz: false,
                use_private_broadcast_rpc_address: true,
                default_network: true,
                rack_allocation: BTreeMap::from([("us-east-1a".to_string(), 1)]),
                task: ResourceData::new(
                    TaskType::Stream,
                    "stream\n    |from()\n        .measurement('cpu')\n    |alert()\n        .crit(lambda: \"usage_idle\" < 10)\n",
                    vec!["telegraf.autogen".to_string()],
                    TaskStatus::Enabled,
                ),
            }],
            firewall_rules: vec![FirewallRuleResource {
                name: "office".to_string(),
                cluster_id: "metrics-cluster".to_string(),
                network: "10.0.0.0/16".to_string(),
                rules: vec!["CASSANDRA".to_string()],
                task: ResourceData::new(
                    TaskType::Batch,
                    "batch\n    |query('SELECT count(value) FROM \"telegraf\".\"autogen\".\"net\"')\n        .every(1m)\n",
                    vec!["\"telegraf\".\"autogen\"".to_string()],
                    TaskStatus::Disabled,
                ),
            }],
        }
    }
}
