/// Kapacitor API data models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::identifier::QualifiedIdentifier;

/// Task execution model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum TaskType {
    #[default]
    Stream,
    Batch,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown task type {0}")]
pub struct ParseTaskTypeError(String);

impl FromStr for TaskType {
    type Err = ParseTaskTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stream" => Ok(TaskType::Stream),
            "batch" => Ok(TaskType::Batch),
            _ => Err(ParseTaskTypeError(s.to_string())),
        }
    }
}

impl TryFrom<String> for TaskType {
    type Error = ParseTaskTypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Stream => write!(f, "stream"),
            TaskType::Batch => write!(f, "batch"),
        }
    }
}

/// Whether a task is running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum TaskStatus {
    #[default]
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown task status {0}")]
pub struct ParseTaskStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "enabled" => Ok(TaskStatus::Enabled),
            "disabled" => Ok(TaskStatus::Disabled),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Enabled => write!(f, "enabled"),
            TaskStatus::Disabled => write!(f, "disabled"),
        }
    }
}

/// Database/retention policy pair as sent over the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dbrp {
    pub db: String,
    pub rp: String,
}

impl From<QualifiedIdentifier> for Dbrp {
    fn from(id: QualifiedIdentifier) -> Self {
        Self {
            db: id.namespace().to_string(),
            rp: id.qualifier().to_string(),
        }
    }
}

impl From<&Dbrp> for QualifiedIdentifier {
    fn from(dbrp: &Dbrp) -> Self {
        QualifiedIdentifier::new(dbrp.db.clone(), dbrp.rp.clone())
    }
}

/// Hypermedia link to a resource
#[allow(dead_code)]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

/// Kapacitor task resource
///
/// Every field may be missing, so a body with an empty id still parses and
/// can be recognised as a missing task.
#[allow(dead_code)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub link: Link,
    #[serde(default)]
    pub id: String,
    #[serde(rename = "template-id", default)]
    pub template_id: String,
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub dbrps: Vec<Dbrp>,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub executing: bool,
    #[serde(default)]
    pub error: String,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    #[serde(rename = "last-enabled")]
    pub last_enabled: Option<DateTime<Utc>>,
}

/// Request structure for creating a task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub dbrps: Vec<Dbrp>,
    pub script: String,
    pub status: TaskStatus,
}

/// Request structure for updating a task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub dbrps: Vec<Dbrp>,
    pub script: String,
    pub status: TaskStatus,
}

impl UpdateTaskRequest {
    /// Reuse the fields of a create request for the task with the given id
    pub fn from_create(id: &str, request: CreateTaskRequest) -> Self {
        Self {
            id: Some(id.to_string()),
            task_type: request.task_type,
            dbrps: request.dbrps,
            script: request.script,
            status: request.status,
        }
    }
}

/// Error response from API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_parse() {
        assert_eq!("stream".parse::<TaskType>().unwrap(), TaskType::Stream);
        assert_eq!("BATCH".parse::<TaskType>().unwrap(), TaskType::Batch);
        let err = "streaming".parse::<TaskType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown task type streaming");
    }

    #[test]
    fn test_task_status_parse() {
        assert_eq!("Enabled".parse::<TaskStatus>().unwrap(), TaskStatus::Enabled);
        assert_eq!(
            "disabled".parse::<TaskStatus>().unwrap(),
            TaskStatus::Disabled
        );
        assert!("paused".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_task_deserialize() {
        let body = r#"{
            "link": {"rel": "self", "href": "/kapacitor/v1/tasks/cpu_alert"},
            "id": "cpu_alert",
            "template-id": "",
            "type": "stream",
            "dbrps": [{"db": "telegraf", "rp": "autogen"}],
            "script": "stream\n    |from()\n",
            "vars": {},
            "dot": "digraph cpu_alert {}",
            "status": "enabled",
            "executing": true,
            "error": "",
            "created": "2024-03-01T10:00:00.123456789Z",
            "modified": "2024-03-01T10:05:00Z",
            "last-enabled": "2024-03-01T10:05:00Z"
        }"#;

        let task: Task = serde_json::from_str(body).unwrap();
        assert_eq!(task.id, "cpu_alert");
        assert_eq!(task.task_type, TaskType::Stream);
        assert_eq!(task.status, TaskStatus::Enabled);
        assert_eq!(
            task.dbrps,
            vec![Dbrp {
                db: "telegraf".to_string(),
                rp: "autogen".to_string()
            }]
        );
        assert!(task.created.is_some());
    }

    #[test]
    fn test_empty_task_deserialize() {
        let task: Task = serde_json::from_str(r#"{"id": ""}"#).unwrap();
        assert!(task.id.is_empty());
        assert!(task.link.href.is_empty());
    }

    #[test]
    fn test_enum_deserialize_ignores_case() {
        let task_type: TaskType = serde_json::from_str(r#""Batch""#).unwrap();
        assert_eq!(task_type, TaskType::Batch);
        let status: TaskStatus = serde_json::from_str(r#""DISABLED""#).unwrap();
        assert_eq!(status, TaskStatus::Disabled);

        let err = serde_json::from_str::<TaskType>(r#""streaming""#).unwrap_err();
        assert!(err.to_string().contains("unknown task type streaming"));
    }

    #[test]
    fn test_create_request_serialize() {
        let request = CreateTaskRequest {
            id: None,
            task_type: TaskType::Batch,
            dbrps: vec![QualifiedIdentifier::new("db", "rp").into()],
            script: "batch".to_string(),
            status: TaskStatus::Disabled,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "batch",
                "dbrps": [{"db": "db", "rp": "rp"}],
                "script": "batch",
                "status": "disabled"
            })
        );
    }
}
