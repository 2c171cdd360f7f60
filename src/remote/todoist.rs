//! Todoist implementation of [`TaskService`] over the REST API v1.
//!
//! Every call goes through [`TodoistClient::send`], which attaches the bearer
//! credential, applies the bounded retry policy and maps failures onto
//! [`ServiceError`]. Listing endpoints are cursor-paginated and are drained
//! through [`TodoistClient::get_all`].

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::service::{
    DueFields, NewTask, ServiceError, TaskFields, TaskService, validate_content, validate_id,
};
use super::types::{Comment, DEFAULT_COLOR, Filter, Label, Page, Project, Task};

pub const DEFAULT_BASE_URL: &str = "https://api.todoist.com/api/v1";

/// Upper bound on pages drained per listing, guards against a cursor loop.
const MAX_PAGES: usize = 50;
const PAGE_LIMIT: u32 = 200;
/// Longest single backoff sleep, whatever the attempt count.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

// ============================================================================
// Request / Response Bodies
// ============================================================================

#[derive(Serialize, Debug)]
struct CreateTaskBody<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<u8>,
    #[serde(flatten)]
    due: DueFields,
}

impl<'a> From<&'a NewTask> for CreateTaskBody<'a> {
    fn from(task: &'a NewTask) -> Self {
        Self {
            content: task.content.trim(),
            description: task.description.as_deref(),
            project_id: task.project_id.as_deref(),
            labels: (!task.labels.is_empty()).then_some(task.labels.as_slice()),
            priority: task.priority,
            due: DueFields::from(task.due.as_ref()),
        }
    }
}

#[derive(Serialize, Debug)]
struct UpdateTaskBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<u8>,
    #[serde(flatten)]
    due: DueFields,
}

impl<'a> From<&'a TaskFields> for UpdateTaskBody<'a> {
    fn from(fields: &'a TaskFields) -> Self {
        Self {
            content: fields.content.as_deref().map(str::trim),
            description: fields.description.as_deref(),
            labels: fields.labels.as_deref(),
            priority: fields.priority,
            due: DueFields::from(fields.due.as_ref()),
        }
    }
}

#[derive(Serialize, Debug)]
struct QuickAddBody<'a> {
    text: &'a str,
}

#[derive(Serialize, Debug)]
struct MoveBody<'a> {
    project_id: &'a str,
}

#[derive(Serialize, Debug)]
struct LabelsBody<'a> {
    labels: &'a [String],
}

#[derive(Serialize, Debug)]
struct CreateLabelBody<'a> {
    name: &'a str,
    color: &'a str,
}

#[derive(Serialize, Debug)]
struct CommentBody<'a> {
    task_id: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct SyncFilters {
    #[serde(default)]
    filters: Vec<Filter>,
}

#[derive(Deserialize, Debug)]
struct SyncUser {
    user: Option<SyncUserData>,
}

#[derive(Deserialize, Debug)]
struct SyncUserData {
    tz_info: Option<TzInfo>,
}

#[derive(Deserialize, Debug)]
struct TzInfo {
    gmt_string: String,
}

// ============================================================================
// Failure Mapping
// ============================================================================

/// Maps a non-success HTTP status (and its body) onto the error taxonomy.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> ServiceError {
    let message = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", body.trim())
    };
    match status.as_u16() {
        401 | 403 => ServiceError::Authentication(message),
        404 => ServiceError::NotFound(message),
        410 => ServiceError::DeprecatedEndpoint(message),
        400 | 422 => ServiceError::Validation(message),
        429 | 500..=599 => ServiceError::TransientNetwork(message),
        _ => ServiceError::Protocol(message),
    }
}

/// Exponential backoff: `base * 2^attempt`, capped at [`MAX_BACKOFF`].
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn sync_form(resource: &str) -> [(&'static str, String); 2] {
    [
        ("sync_token", "*".to_string()),
        ("resource_types", format!("[\"{resource}\"]")),
    ]
}

// ============================================================================
// Client
// ============================================================================

/// Connection settings for [`TodoistClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 2,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

pub struct TodoistClient {
    token: String,
    options: ClientOptions,
    client: reqwest::Client,
}

impl TodoistClient {
    /// Creates a client bound to one bearer credential.
    ///
    /// # Arguments
    /// * `token` - Todoist API token; an empty token is an authentication error
    /// * `options` - base URL, timeout and retry policy
    pub fn new(token: String, options: ClientOptions) -> Result<Self, ServiceError> {
        if token.trim().is_empty() {
            return Err(ServiceError::Authentication(
                "no API token provided".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| ServiceError::Protocol(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            token,
            options,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.options.base_url, path)
    }

    fn transport_error(&self, err: &reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::Timeout(self.options.timeout)
        } else if err.is_builder() {
            // A request that cannot even be built (bad base URL) fails the same way every time.
            ServiceError::Protocol(format!("invalid request to {}: {err}", self.options.base_url))
        } else if err.is_decode() || err.is_redirect() {
            ServiceError::Protocol(err.to_string())
        } else {
            ServiceError::TransientNetwork(err.to_string())
        }
    }

    /// Sends the request produced by `build`, retrying transient failures.
    ///
    /// `build` is called once per attempt so each retry starts from a fresh
    /// request; anything that must stay stable across attempts (like an
    /// idempotency key) is captured by the closure.
    async fn send<F>(&self, label: &str, build: F) -> Result<reqwest::Response, ServiceError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            let err = match build().bearer_auth(&self.token).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("{label}: HTTP {}", response.status());
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status();
                    let body = match response.text().await {
                        Ok(body) => body,
                        Err(e) => {
                            debug!("{label}: could not read HTTP {status} body: {e}");
                            String::new()
                        }
                    };
                    classify_status(status, &body)
                }
                Err(e) => self.transport_error(&e),
            };

            if !err.is_retryable() || attempt >= self.options.max_retries {
                warn!("{label} failed: {err}");
                return Err(err);
            }

            let delay = backoff_delay(self.options.retry_backoff, attempt);
            attempt += 1;
            warn!(
                "{label} failed ({err}), retry {attempt}/{} in {delay:?}",
                self.options.max_retries
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ServiceError> {
        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::Timeout(self.options.timeout)
            } else {
                ServiceError::Protocol(format!("could not decode response: {e}"))
            }
        })
    }

    /// Drains a cursor-paginated listing.
    async fn get_all<T: DeserializeOwned>(
        &self,
        label: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ServiceError> {
        let url = self.url(path);
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for page_number in 0..MAX_PAGES {
            let mut params: Vec<(&str, String)> = query.to_vec();
            params.push(("limit", PAGE_LIMIT.to_string()));
            if let Some(c) = &cursor {
                params.push(("cursor", c.clone()));
            }

            let response = self
                .send(label, || self.client.get(&url).query(&params))
                .await?;
            let page: Page<T> = self.decode(response).await?;
            debug!(
                "{label}: page {} with {} items",
                page_number + 1,
                page.results.len()
            );
            items.extend(page.results);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(items),
            }
        }

        warn!("{label}: stopped after {MAX_PAGES} pages, result may be incomplete");
        Ok(items)
    }

    async fn sync<T: DeserializeOwned>(&self, resource: &str) -> Result<T, ServiceError> {
        let url = self.url("sync");
        let form = sync_form(resource);
        let label = format!("sync {resource}");
        let response = self
            .send(&label, || self.client.post(&url).form(&form[..]))
            .await?;
        self.decode(response).await
    }
}

#[async_trait]
impl TaskService for TodoistClient {
    async fn list_tasks(&self, filter_query: Option<&str>) -> Result<Vec<Task>, ServiceError> {
        let tasks = match filter_query {
            Some(query) => {
                info!("Fetching tasks with filter query: {query}");
                self.get_all("list tasks (filter)", "tasks/filter", &[("query", query.to_string())])
                    .await?
            }
            None => {
                info!("Fetching active tasks");
                self.get_all("list tasks", "tasks", &[]).await?
            }
        };
        info!("Fetched {} tasks", tasks.len());
        Ok(tasks)
    }

    async fn list_completed_tasks(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Task>, ServiceError> {
        let query = [
            ("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("until", until.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ];
        let mut tasks: Vec<Task> = self
            .get_all(
                "list completed tasks",
                "tasks/completed/by_completion_date",
                &query,
            )
            .await?;
        for task in &mut tasks {
            task.checked = true;
        }
        info!("Fetched {} completed tasks", tasks.len());
        Ok(tasks)
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, ServiceError> {
        task.validate()?;
        let url = self.url("tasks");
        let body = CreateTaskBody::from(task);
        let request_id = uuid::Uuid::new_v4().to_string();
        let response = self
            .send("create task", || {
                self.client
                    .post(&url)
                    .header("X-Request-Id", &request_id)
                    .json(&body)
            })
            .await?;
        let created: Task = self.decode(response).await?;
        info!("Created task {} ({})", created.id, created.content);
        Ok(created)
    }

    async fn quick_add_task(&self, text: &str) -> Result<Task, ServiceError> {
        validate_content(text)?;
        let url = self.url("tasks/quick");
        let body = QuickAddBody { text: text.trim() };
        let request_id = uuid::Uuid::new_v4().to_string();
        let response = self
            .send("quick add", || {
                self.client
                    .post(&url)
                    .header("X-Request-Id", &request_id)
                    .json(&body)
            })
            .await?;
        let created: Task = self.decode(response).await?;
        info!("Quick-added task {} ({})", created.id, created.content);
        Ok(created)
    }

    async fn update_task(&self, id: &str, fields: &TaskFields) -> Result<Task, ServiceError> {
        validate_id("task", id)?;
        fields.validate()?;
        let url = self.url(&format!("tasks/{id}"));
        let body = UpdateTaskBody::from(fields);
        let response = self
            .send("update task", || self.client.post(&url).json(&body))
            .await?;
        let updated: Task = self.decode(response).await?;
        info!("Updated task {}", updated.id);
        Ok(updated)
    }

    async fn complete_task(&self, id: &str) -> Result<(), ServiceError> {
        validate_id("task", id)?;
        let url = self.url(&format!("tasks/{id}/close"));
        self.send("complete task", || self.client.post(&url)).await?;
        info!("Completed task {id}");
        Ok(())
    }

    async fn delete_task(&self, id: &str) -> Result<(), ServiceError> {
        validate_id("task", id)?;
        let url = self.url(&format!("tasks/{id}"));
        self.send("delete task", || self.client.delete(&url)).await?;
        info!("Deleted task {id}");
        Ok(())
    }

    async fn move_task(&self, id: &str, project_id: &str) -> Result<Task, ServiceError> {
        validate_id("task", id)?;
        validate_id("project", project_id)?;
        let url = self.url(&format!("tasks/{id}/move"));
        let body = MoveBody { project_id };
        let response = self
            .send("move task", || self.client.post(&url).json(&body))
            .await?;
        let moved: Task = self.decode(response).await?;
        info!("Moved task {id} to project {project_id}");
        Ok(moved)
    }

    async fn update_task_labels(
        &self,
        id: &str,
        label_names: &[String],
    ) -> Result<Task, ServiceError> {
        validate_id("task", id)?;
        if label_names.iter().any(|n| n.trim().is_empty()) {
            return Err(ServiceError::Validation(
                "label names must not be empty".to_string(),
            ));
        }
        let url = self.url(&format!("tasks/{id}"));
        let body = LabelsBody {
            labels: label_names,
        };
        let response = self
            .send("update labels", || self.client.post(&url).json(&body))
            .await?;
        let updated: Task = self.decode(response).await?;
        info!("Updated task {id} labels to {label_names:?}");
        Ok(updated)
    }

    async fn list_projects(&self) -> Result<Vec<Project>, ServiceError> {
        info!("Fetching projects");
        let projects: Vec<Project> = self.get_all("list projects", "projects", &[]).await?;
        info!("Fetched {} projects", projects.len());
        Ok(projects)
    }

    async fn list_labels(&self) -> Result<Vec<Label>, ServiceError> {
        info!("Fetching labels");
        let labels: Vec<Label> = self.get_all("list labels", "labels", &[]).await?;
        info!("Fetched {} labels", labels.len());
        Ok(labels)
    }

    async fn create_label(&self, name: &str) -> Result<Label, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation(
                "label name must not be empty".to_string(),
            ));
        }
        let url = self.url("labels");
        let body = CreateLabelBody {
            name,
            color: DEFAULT_COLOR,
        };
        let request_id = uuid::Uuid::new_v4().to_string();
        let response = self
            .send("create label", || {
                self.client
                    .post(&url)
                    .header("X-Request-Id", &request_id)
                    .json(&body)
            })
            .await?;
        let label: Label = self.decode(response).await?;
        info!("Created label {} ({})", label.name, label.id);
        Ok(label)
    }

    async fn list_filters(&self) -> Result<Vec<Filter>, ServiceError> {
        info!("Fetching filters via sync");
        let sync: SyncFilters = self.sync("filters").await?;
        let filters: Vec<Filter> = sync.filters.into_iter().filter(|f| !f.is_deleted).collect();
        for filter in &filters {
            debug!("Filter {} ({}): {}", filter.name, filter.id, filter.query);
        }
        info!("Fetched {} filters", filters.len());
        Ok(filters)
    }

    async fn list_comments(&self, task_id: &str) -> Result<Vec<Comment>, ServiceError> {
        validate_id("task", task_id)?;
        self.get_all("list comments", "comments", &[("task_id", task_id.to_string())])
            .await
    }

    async fn add_comment(&self, task_id: &str, content: &str) -> Result<Comment, ServiceError> {
        validate_id("task", task_id)?;
        if content.trim().is_empty() {
            return Err(ServiceError::Validation(
                "comment must not be empty".to_string(),
            ));
        }
        let url = self.url("comments");
        let body = CommentBody { task_id, content };
        let request_id = uuid::Uuid::new_v4().to_string();
        let response = self
            .send("add comment", || {
                self.client
                    .post(&url)
                    .header("X-Request-Id", &request_id)
                    .json(&body)
            })
            .await?;
        self.decode(response).await
    }

    async fn user_utc_offset(&self) -> Result<FixedOffset, ServiceError> {
        let sync: SyncUser = self.sync("user").await?;
        let gmt = sync
            .user
            .and_then(|u| u.tz_info)
            .map(|tz| tz.gmt_string)
            .ok_or_else(|| ServiceError::Protocol("user payload has no tz_info".to_string()))?;
        FixedOffset::from_str(&gmt)
            .map_err(|e| ServiceError::Protocol(format!("bad gmt_string '{gmt}': {e}")))
    }
}
