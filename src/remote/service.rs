//! The [`TaskService`] contract, its error taxonomy and the request inputs
//! that are validated locally before anything goes over the wire.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use super::types::{Comment, Filter, Label, Project, Task};

/// Stable, inspectable classification of a [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    NotFound,
    DeprecatedEndpoint,
    TransientNetwork,
    Timeout,
    Validation,
    Protocol,
}

/// Errors surfaced by a [`TaskService`]. Transport detail is flattened into
/// messages; callers branch on [`ServiceError::kind`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    /// Missing or rejected credential. Not retryable.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// The referenced resource no longer exists server-side.
    #[error("not found: {0}")]
    NotFound(String),
    /// The service answered 410 Gone. Fatal configuration problem, never retried.
    #[error("endpoint is no longer served: {0}")]
    DeprecatedEndpoint(String),
    /// Connection failure, 429 or 5xx. Retried with backoff before surfacing.
    #[error("network error: {0}")]
    TransientNetwork(String),
    /// The configured request timeout elapsed. Not retried.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// Input rejected before (or, for 400/422, by) the service.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Unexpected status or undecodable body.
    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Authentication(_) => ErrorKind::Authentication,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::DeprecatedEndpoint(_) => ErrorKind::DeprecatedEndpoint,
            ServiceError::TransientNetwork(_) => ErrorKind::TransientNetwork,
            ServiceError::Timeout(_) => ErrorKind::Timeout,
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::Protocol(_) => ErrorKind::Protocol,
        }
    }

    /// Whether the client may retry the request after a backoff.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientNetwork
    }

    /// Whether a cache may answer with an expired entry instead of failing.
    pub fn allows_stale_fallback(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransientNetwork | ErrorKind::Timeout
        )
    }
}

/// How a due date is expressed when creating or editing a task.
#[derive(Debug, Clone, PartialEq)]
pub enum DueSpec {
    /// Free text interpreted by the service ("every monday", "tomorrow 5pm").
    Natural(String),
    Date(NaiveDate),
    Clear,
}

/// Wire form of a [`DueSpec`], flattened into task request bodies.
#[derive(Serialize, Debug, Default, PartialEq)]
pub(crate) struct DueFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

impl From<Option<&DueSpec>> for DueFields {
    fn from(spec: Option<&DueSpec>) -> Self {
        match spec {
            None => DueFields::default(),
            Some(DueSpec::Natural(text)) => DueFields {
                due_string: Some(text.clone()),
                due_date: None,
            },
            Some(DueSpec::Date(date)) => DueFields {
                due_string: None,
                due_date: Some(date.format("%Y-%m-%d").to_string()),
            },
            Some(DueSpec::Clear) => DueFields {
                due_string: Some("no date".to_string()),
                due_date: None,
            },
        }
    }
}

/// Everything needed to create a task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub content: String,
    pub description: Option<String>,
    pub project_id: Option<String>,
    pub due: Option<DueSpec>,
    pub labels: Vec<String>,
    pub priority: Option<u8>,
}

impl NewTask {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        validate_content(&self.content)?;
        if let Some(p) = self.priority {
            validate_priority(p)?;
        }
        Ok(())
    }
}

/// Partial update of a task. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFields {
    pub content: Option<String>,
    pub description: Option<String>,
    pub labels: Option<Vec<String>>,
    pub priority: Option<u8>,
    pub due: Option<DueSpec>,
}

impl TaskFields {
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.description.is_none()
            && self.labels.is_none()
            && self.priority.is_none()
            && self.due.is_none()
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.is_empty() {
            return Err(ServiceError::Validation("update has no fields".to_string()));
        }
        if let Some(content) = &self.content {
            validate_content(content)?;
        }
        if let Some(p) = self.priority {
            validate_priority(p)?;
        }
        Ok(())
    }
}

pub fn validate_content(content: &str) -> Result<(), ServiceError> {
    if content.trim().is_empty() {
        return Err(ServiceError::Validation(
            "task content must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_priority(priority: u8) -> Result<(), ServiceError> {
    if !(1..=4).contains(&priority) {
        return Err(ServiceError::Validation(format!(
            "priority must be between 1 and 4, got {priority}"
        )));
    }
    Ok(())
}

pub fn validate_id(what: &str, id: &str) -> Result<(), ServiceError> {
    if id.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{what} id must not be empty")));
    }
    Ok(())
}

/// Contract of the remote to-do service.
///
/// Implementations map every failure onto [`ServiceError`]; nothing
/// transport-specific crosses this boundary.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Lists active tasks, optionally narrowed by a server-side filter query
    /// that is passed through verbatim.
    async fn list_tasks(&self, filter_query: Option<&str>) -> Result<Vec<Task>, ServiceError>;

    /// Lists tasks completed between `since` and `until`.
    async fn list_completed_tasks(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Task>, ServiceError>;

    async fn create_task(&self, task: &NewTask) -> Result<Task, ServiceError>;

    /// Creates a task from free text, leaving date/project/label parsing to the service.
    async fn quick_add_task(&self, text: &str) -> Result<Task, ServiceError>;

    async fn update_task(&self, id: &str, fields: &TaskFields) -> Result<Task, ServiceError>;

    async fn complete_task(&self, id: &str) -> Result<(), ServiceError>;

    async fn delete_task(&self, id: &str) -> Result<(), ServiceError>;

    async fn move_task(&self, id: &str, project_id: &str) -> Result<Task, ServiceError>;

    /// Replaces the task's label set.
    async fn update_task_labels(
        &self,
        id: &str,
        label_names: &[String],
    ) -> Result<Task, ServiceError>;

    async fn list_projects(&self) -> Result<Vec<Project>, ServiceError>;

    async fn list_labels(&self) -> Result<Vec<Label>, ServiceError>;

    async fn create_label(&self, name: &str) -> Result<Label, ServiceError>;

    async fn list_filters(&self) -> Result<Vec<Filter>, ServiceError>;

    async fn list_comments(&self, task_id: &str) -> Result<Vec<Comment>, ServiceError>;

    async fn add_comment(&self, task_id: &str, content: &str) -> Result<Comment, ServiceError>;

    /// UTC offset configured on the remote account.
    async fn user_utc_offset(&self) -> Result<FixedOffset, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(
            ServiceError::Authentication("x".into()).kind(),
            ErrorKind::Authentication
        );
        assert_eq!(ServiceError::Timeout(Duration::from_secs(5)).kind(), ErrorKind::Timeout);
        assert_eq!(
            ServiceError::DeprecatedEndpoint("x".into()).kind(),
            ErrorKind::DeprecatedEndpoint
        );
    }

    #[test]
    fn test_only_transient_errors_retry() {
        assert!(ServiceError::TransientNetwork("503".into()).is_retryable());
        assert!(!ServiceError::Timeout(Duration::from_secs(10)).is_retryable());
        assert!(!ServiceError::DeprecatedEndpoint("gone".into()).is_retryable());
        assert!(!ServiceError::Authentication("bad".into()).is_retryable());
    }

    #[test]
    fn test_stale_fallback_kinds() {
        assert!(ServiceError::TransientNetwork("x".into()).allows_stale_fallback());
        assert!(ServiceError::Timeout(Duration::from_secs(10)).allows_stale_fallback());
        assert!(!ServiceError::Authentication("x".into()).allows_stale_fallback());
        assert!(!ServiceError::Validation("x".into()).allows_stale_fallback());
        assert!(!ServiceError::DeprecatedEndpoint("x".into()).allows_stale_fallback());
    }

    #[test]
    fn test_new_task_rejects_blank_content() {
        let err = NewTask::new("   ").validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_priority_range() {
        assert!(validate_priority(1).is_ok());
        assert!(validate_priority(4).is_ok());
        assert!(validate_priority(0).is_err());
        assert!(validate_priority(5).is_err());
    }

    #[test]
    fn test_empty_update_is_invalid() {
        assert!(TaskFields::default().validate().is_err());
        let fields = TaskFields {
            priority: Some(3),
            ..Default::default()
        };
        assert!(fields.validate().is_ok());
    }

    #[test]
    fn test_due_fields_serialization() {
        let date = DueSpec::Date(NaiveDate::from_ymd_opt(2025, 6, 22).unwrap());
        let json = serde_json::to_string(&DueFields::from(Some(&date))).unwrap();
        assert_eq!(json, r#"{"due_date":"2025-06-22"}"#);

        let clear = serde_json::to_string(&DueFields::from(Some(&DueSpec::Clear))).unwrap();
        assert_eq!(clear, r#"{"due_string":"no date"}"#);

        let none = serde_json::to_string(&DueFields::from(None)).unwrap();
        assert_eq!(none, "{}");
    }
}
