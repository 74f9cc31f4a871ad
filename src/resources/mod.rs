/// Declarative resources backed by Kapacitor tasks
pub mod cluster;
pub mod firewall_rule;
pub mod lifecycle;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::identifier::{self, QualifiedIdentifier};
use crate::kapacitor::models::{CreateTaskRequest, Dbrp, Task, TaskStatus, TaskType};

pub use cluster::ClusterResource;
pub use firewall_rule::FirewallRuleResource;

/// Task fields shared by every resource kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    /// Remote task id, `None` until created or once the task is gone
    #[serde(skip)]
    pub id: Option<String>,

    /// Task type (stream or batch)
    #[serde(rename = "type")]
    pub task_type: TaskType,

    /// TICKscript body
    pub tick_script: String,

    /// Wire-form database/retention policy pairs, e.g. `"telegraf"."autogen"`
    #[serde(default)]
    pub database_retention_policies: Vec<String>,

    /// Whether the task runs
    #[serde(default = "default_status")]
    pub status: TaskStatus,
}

fn default_status() -> TaskStatus {
    TaskStatus::Enabled
}

impl ResourceData {
    pub fn new(
        task_type: TaskType,
        tick_script: impl Into<String>,
        database_retention_policies: Vec<String>,
        status: TaskStatus,
    ) -> Self {
        Self {
            id: None,
            task_type,
            tick_script: tick_script.into(),
            database_retention_policies,
            status,
        }
    }

    /// Validate the task fields
    pub fn validate(&self) -> Result<()> {
        if self.tick_script.trim().is_empty() {
            anyhow::bail!("tick_script cannot be empty");
        }
        identifier::parse(&self.database_retention_policies)?;
        Ok(())
    }

    /// Build the create request from local fields
    pub fn to_create_request(&self) -> Result<CreateTaskRequest> {
        let dbrps = identifier::parse(&self.database_retention_policies)?
            .into_iter()
            .map(Dbrp::from)
            .collect();

        Ok(CreateTaskRequest {
            id: None,
            task_type: self.task_type,
            dbrps,
            script: self.tick_script.clone(),
            status: self.status,
        })
    }

    /// Overwrite local fields with the remote task
    pub fn set_from_task(&mut self, task: &Task) {
        let dbrps: Vec<QualifiedIdentifier> = task.dbrps.iter().map(Into::into).collect();

        self.task_type = task.task_type;
        self.database_retention_policies = identifier::serialize(&dbrps);
        self.tick_script = task.script.trim_matches('\n').to_string();
        self.status = task.status;
        self.id = Some(task.id.clone());
    }

    /// Whether the remote fields differ from these desired fields
    pub fn differs_from(&self, remote: &ResourceData) -> Result<bool> {
        let desired_dbrps =
            identifier::serialize(&identifier::parse(&self.database_retention_policies)?);

        Ok(self.task_type != remote.task_type
            || self.status != remote.status
            || self.tick_script.trim_matches('\n') != remote.tick_script
            || desired_dbrps != remote.database_retention_policies)
    }
}

/// A resource kind whose state lives in one Kapacitor task
pub trait TaskResource {
    /// Kind name used in state keys and logs
    const KIND: &'static str;

    /// Local resource name
    fn name(&self) -> &str;

    fn data(&self) -> &ResourceData;

    fn data_mut(&mut self) -> &mut ResourceData;

    /// Schema validation for the kind
    fn validate(&self) -> Result<()>;

    /// One-line description for logs
    fn summary(&self) -> String;

    /// Key identifying the resource in the state file
    fn key(&self) -> String {
        format!("{}/{}", Self::KIND, self.name())
    }
}
