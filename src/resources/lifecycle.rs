/// Create/read/update/delete entry points for task-backed resources
use anyhow::{Context, Result};
use tracing::{debug, info};

use super::{ResourceData, TaskResource};
use crate::kapacitor::models::UpdateTaskRequest;
use crate::kapacitor::TaskApi;

/// What `apply` did to a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    /// Tracked task had disappeared remotely and was created again
    Recreated,
    Updated,
    Unchanged,
}

impl std::fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyOutcome::Created => write!(f, "created"),
            ApplyOutcome::Recreated => write!(f, "recreated"),
            ApplyOutcome::Updated => write!(f, "updated"),
            ApplyOutcome::Unchanged => write!(f, "unchanged"),
        }
    }
}

fn require_id<R: TaskResource>(resource: &R) -> Result<String> {
    resource
        .data()
        .id
        .clone()
        .with_context(|| format!("{} has no task id", resource.key()))
}

/// Create the backing task, then read it back
pub async fn create<R: TaskResource, C: TaskApi>(resource: &mut R, client: &C) -> Result<()> {
    resource.validate()?;
    let request = resource.data().to_create_request()?;

    info!("Creating task for {}", resource.key());
    let task = client.create_task(&request).await?;
    info!("Task created: {}", task.id);

    resource.data_mut().id = Some(task.id);

    read(resource, client).await
}

/// Refresh local fields from the backing task
///
/// A task that no longer exists clears the id instead of failing.
pub async fn read<R: TaskResource, C: TaskApi>(resource: &mut R, client: &C) -> Result<()> {
    let id = require_id(resource)?;
    read_into(resource.data_mut(), &id, client).await
}

async fn read_into<C: TaskApi>(data: &mut ResourceData, id: &str, client: &C) -> Result<()> {
    debug!("Reading task {}", id);
    match client.read_task(id).await? {
        Some(task) => data.set_from_task(&task),
        None => {
            // if we got here, the task no longer exists
            info!("Task {} no longer exists", id);
            data.id = None;
        }
    }
    Ok(())
}

/// Push local fields to the backing task, then read it back
pub async fn update<R: TaskResource, C: TaskApi>(resource: &mut R, client: &C) -> Result<()> {
    resource.validate()?;
    let id = require_id(resource)?;
    let request = UpdateTaskRequest::from_create(&id, resource.data().to_create_request()?);

    info!("Updating task {} for {}", id, resource.key());
    client.update_task(&id, &request).await?;

    read(resource, client).await
}

/// Delete the backing task and forget its id
pub async fn delete<R: TaskResource, C: TaskApi>(resource: &mut R, client: &C) -> Result<()> {
    let id = require_id(resource)?;

    info!("Deleting task {} for {}", id, resource.key());
    client.delete_task(&id).await?;

    resource.data_mut().id = None;
    Ok(())
}

/// Converge one resource: create it, recreate it, update it or leave it alone
pub async fn apply<R: TaskResource, C: TaskApi>(
    resource: &mut R,
    client: &C,
) -> Result<ApplyOutcome> {
    let Some(id) = resource.data().id.clone() else {
        create(resource, client).await?;
        return Ok(ApplyOutcome::Created);
    };

    let mut remote = resource.data().clone();
    read_into(&mut remote, &id, client).await?;

    if remote.id.is_none() {
        resource.data_mut().id = None;
        create(resource, client).await?;
        return Ok(ApplyOutcome::Recreated);
    }

    if resource.data().differs_from(&remote)? {
        update(resource, client).await?;
        return Ok(ApplyOutcome::Updated);
    }

    *resource.data_mut() = remote;
    Ok(ApplyOutcome::Unchanged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DefinitionsFile;
    use crate::kapacitor::models::{CreateTaskRequest, Link, Task, TaskStatus};
    use crate::resources::FirewallRuleResource;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    /// In-memory task API recording the calls it receives
    #[derive(Default)]
    struct FakeApi {
        tasks: Mutex<HashMap<String, Task>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn remove(&self, id: &str) {
            self.tasks.lock().unwrap().remove(id);
        }
    }

    impl TaskApi for FakeApi {
        async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task> {
            let mut tasks = self.tasks.lock().unwrap();
            let id = format!("task-{}", tasks.len() + 1);
            self.record(format!("create {}", id));

            let task = Task {
                link: Link {
                    rel: "self".to_string(),
                    href: format!("/kapacitor/v1/tasks/{}", id),
                },
                id: id.clone(),
                template_id: String::new(),
                task_type: request.task_type,
                dbrps: request.dbrps.clone(),
                script: format!("{}\n", request.script),
                status: request.status,
                executing: request.status == TaskStatus::Enabled,
                error: String::new(),
                created: None,
                modified: None,
                last_enabled: None,
            };
            tasks.insert(id, task.clone());
            Ok(task)
        }

        async fn read_task(&self, id: &str) -> Result<Option<Task>> {
            self.record(format!("read {}", id));
            Ok(self.tasks.lock().unwrap().get(id).cloned())
        }

        async fn update_task(&self, id: &str, request: &UpdateTaskRequest) -> Result<()> {
            self.record(format!("update {}", id));
            let mut tasks = self.tasks.lock().unwrap();
            let task = tasks
                .get_mut(id)
                .ok_or_else(|| anyhow::anyhow!("API error (404 Not Found): no task exists"))?;
            task.task_type = request.task_type;
            task.dbrps = request.dbrps.clone();
            task.script = request.script.clone();
            task.status = request.status;
            Ok(())
        }

        async fn delete_task(&self, id: &str) -> Result<()> {
            self.record(format!("delete {}", id));
            self.tasks
                .lock()
                .unwrap()
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| anyhow::anyhow!("API error (404 Not Found): no task exists"))
        }
    }

    fn rule() -> FirewallRuleResource {
        DefinitionsFile::example().firewall_rules.remove(0)
    }

    #[tokio::test]
    async fn test_create_records_id_and_reads_back() {
        let api = FakeApi::default();
        let mut rule = rule();

        assert_ok!(create(&mut rule, &api).await);

        assert_eq!(rule.task.id.as_deref(), Some("task-1"));
        // Quotes are normalized away by the read
        assert_eq!(rule.task.database_retention_policies, vec!["telegraf.autogen"]);
        assert!(!rule.task.tick_script.ends_with('\n'));
        assert_eq!(api.calls(), vec!["create task-1", "read task-1"]);
    }

    #[tokio::test]
    async fn test_malformed_dbrp_makes_no_remote_call() {
        let api = FakeApi::default();
        let mut rule = rule();
        rule.task.database_retention_policies = vec!["\"my.db\".\"my.rp\"".to_string()];

        let err = assert_err!(create(&mut rule, &api).await);
        assert!(err.to_string().contains("my.db"));
        assert!(api.calls().is_empty());
        assert!(rule.task.id.is_none());
    }

    #[tokio::test]
    async fn test_read_missing_task_clears_id() {
        let api = FakeApi::default();
        let mut rule = rule();
        create(&mut rule, &api).await.unwrap();

        api.remove("task-1");
        assert_ok!(read(&mut rule, &api).await);
        assert!(rule.task.id.is_none());
    }

    #[tokio::test]
    async fn test_update_pushes_fields() {
        let api = FakeApi::default();
        let mut rule = rule();
        create(&mut rule, &api).await.unwrap();

        rule.task.status = TaskStatus::Enabled;
        rule.task.database_retention_policies = vec!["metrics.one_day".to_string()];
        assert_ok!(update(&mut rule, &api).await);

        assert_eq!(rule.task.status, TaskStatus::Enabled);
        assert_eq!(rule.task.database_retention_policies, vec!["metrics.one_day"]);
        assert_eq!(rule.task.id.as_deref(), Some("task-1"));
    }

    #[tokio::test]
    async fn test_delete_clears_id() {
        let api = FakeApi::default();
        let mut rule = rule();
        create(&mut rule, &api).await.unwrap();

        assert_ok!(delete(&mut rule, &api).await);
        assert!(rule.task.id.is_none());
        assert!(api.tasks.lock().unwrap().is_empty());

        // Nothing left to delete
        assert_err!(delete(&mut rule, &api).await);
    }

    #[tokio::test]
    async fn test_apply_outcomes() {
        let api = FakeApi::default();
        let mut rule = rule();

        assert_eq!(apply(&mut rule, &api).await.unwrap(), ApplyOutcome::Created);

        let mut desired = self::rule();
        desired.task.id = rule.task.id.clone();
        assert_eq!(
            apply(&mut desired, &api).await.unwrap(),
            ApplyOutcome::Unchanged
        );

        desired.task.tick_script = "batch\n    |query('SELECT 1')".to_string();
        assert_eq!(apply(&mut desired, &api).await.unwrap(), ApplyOutcome::Updated);
        assert_eq!(desired.task.tick_script, "batch\n    |query('SELECT 1')");

        api.remove("task-1");
        assert_eq!(
            apply(&mut desired, &api).await.unwrap(),
            ApplyOutcome::Recreated
        );
        assert_eq!(desired.task.id.as_deref(), Some("task-1"));
    }
}
