/// Local record of the remote tasks owned by each declared resource
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Maps `<kind>/<name>` to the id of the task backing it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    resources: BTreeMap<String, String>,
}

impl State {
    /// Load state, starting empty when the file does not exist yet
    pub async fn load(path: &Path) -> Result<Self> {
        let exists = tokio::fs::try_exists(path)
            .await
            .with_context(|| format!("Failed to check state file {}", path.display()))?;
        if !exists {
            debug!("No state file at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read state file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file {}", path.display()))
    }

    /// Write state as pretty JSON
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create state directory")?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write state file {}", path.display()))
    }

    /// Task id tracked for a resource
    pub fn task_id(&self, key: &str) -> Option<String> {
        self.resources.get(key).cloned()
    }

    /// Track a task id, or stop tracking the resource when `None`
    pub fn set_task_id(&mut self, key: &str, id: Option<String>) {
        match id {
            Some(id) => {
                self.resources.insert(key.to_string(), id);
            }
            None => {
                self.resources.remove(key);
            }
        }
    }

    /// All tracked resources in key order
    pub fn entries(&self) -> Vec<(String, String)> {
        self.resources
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
