//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::oneshot;

use crate::remote::{
    Comment, Due, Filter, Label, NewTask, Project, ServiceError, Task, TaskFields, TaskService,
};

pub fn task(id: &str, content: &str, due: Option<&str>) -> Task {
    Task {
        id: id.to_string(),
        content: content.to_string(),
        description: String::new(),
        project_id: "p1".to_string(),
        labels: Vec::new(),
        due: due.map(|date| Due {
            date: date.to_string(),
            string: date.to_string(),
            is_recurring: false,
            timezone: None,
            datetime: None,
        }),
        priority: 1,
        checked: false,
        added_at: None,
        updated_at: None,
    }
}

pub fn project(id: &str, name: &str) -> Project {
    Project {
        id: id.to_string(),
        name: name.to_string(),
        color: "blue".to_string(),
        parent_id: None,
    }
}

pub fn label(id: &str, name: &str, color: &str) -> Label {
    Label {
        id: id.to_string(),
        name: name.to_string(),
        color: color.to_string(),
    }
}

pub fn filter(id: &str, name: &str, query: &str) -> Filter {
    Filter {
        id: id.to_string(),
        name: name.to_string(),
        query: query.to_string(),
        color: "charcoal".to_string(),
        is_deleted: false,
    }
}

struct FakeState {
    tasks: Vec<Task>,
    completed: Vec<Task>,
    projects: Vec<Project>,
    labels: Vec<Label>,
    filters: Vec<Filter>,
    comments: Vec<Comment>,
    offset: FixedOffset,
    calls: HashMap<&'static str, usize>,
    queries: Vec<Option<String>>,
    failures: HashMap<&'static str, VecDeque<ServiceError>>,
    project_gates: VecDeque<(oneshot::Receiver<()>, Vec<Project>)>,
    next_id: usize,
}

/// In-memory [`TaskService`] that records every call.
///
/// Failures can be queued per operation with [`FakeService::fail_next`];
/// project fetches can be held open with [`FakeService::gate_project_fetch`]
/// to stage overlapping requests.
pub struct FakeService {
    state: Mutex<FakeState>,
}

impl Default for FakeService {
    fn default() -> Self {
        Self {
            state: Mutex::new(FakeState {
                tasks: Vec::new(),
                completed: Vec::new(),
                projects: vec![project("p1", "Inbox"), project("p2", "Work")],
                labels: vec![
                    label("l1", "urgent", "red"),
                    label("l2", "errands", "green"),
                ],
                filters: vec![filter("f1", "Work focus", "#Work & p1")],
                comments: Vec::new(),
                offset: FixedOffset::east_opt(0).unwrap(),
                calls: HashMap::new(),
                queries: Vec::new(),
                failures: HashMap::new(),
                project_gates: VecDeque::new(),
                next_id: 100,
            }),
        }
    }
}

impl FakeService {
    pub fn shared() -> Arc<FakeService> {
        Arc::new(FakeService::default())
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn set_tasks(&self, tasks: Vec<Task>) {
        self.lock().tasks = tasks;
    }

    pub fn set_completed(&self, tasks: Vec<Task>) {
        self.lock().completed = tasks;
    }

    pub fn set_projects(&self, projects: Vec<Project>) {
        self.lock().projects = projects;
    }

    pub fn set_offset(&self, offset: FixedOffset) {
        self.lock().offset = offset;
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    pub fn labels(&self) -> Vec<Label> {
        self.lock().labels.clone()
    }

    /// Number of times `op` was invoked (including failed invocations).
    pub fn calls(&self, op: &str) -> usize {
        self.lock().calls.get(op).copied().unwrap_or(0)
    }

    /// Filter queries passed to `list_tasks`, in call order.
    pub fn queries(&self) -> Vec<Option<String>> {
        self.lock().queries.clone()
    }

    pub fn fail_next(&self, op: &'static str, err: ServiceError) {
        self.lock().failures.entry(op).or_default().push_back(err);
    }

    /// The next `list_projects` call answers `response` once `gate` fires.
    pub fn gate_project_fetch(&self, gate: oneshot::Receiver<()>, response: Vec<Project>) {
        self.lock().project_gates.push_back((gate, response));
    }

    fn record(&self, op: &'static str) -> Result<(), ServiceError> {
        let mut state = self.lock();
        *state.calls.entry(op).or_default() += 1;
        match state.failures.get_mut(op).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.lock();
        state.next_id += 1;
        format!("{prefix}{}", state.next_id)
    }

    fn with_task<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Task) -> R,
    ) -> Result<R, ServiceError> {
        let mut state = self.lock();
        state
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .map(f)
            .ok_or_else(|| ServiceError::NotFound(format!("task {id}")))
    }
}

#[async_trait]
impl TaskService for FakeService {
    async fn list_tasks(&self, filter_query: Option<&str>) -> Result<Vec<Task>, ServiceError> {
        self.record("list_tasks")?;
        let mut state = self.lock();
        state.queries.push(filter_query.map(str::to_string));
        Ok(state.tasks.iter().filter(|t| !t.checked).cloned().collect())
    }

    async fn list_completed_tasks(
        &self,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<Vec<Task>, ServiceError> {
        self.record("list_completed_tasks")?;
        Ok(self.lock().completed.clone())
    }

    async fn create_task(&self, new_task: &NewTask) -> Result<Task, ServiceError> {
        new_task.validate()?;
        self.record("create_task")?;
        let mut created = task(&self.next_id("t"), &new_task.content, None);
        if let Some(project_id) = &new_task.project_id {
            created.project_id = project_id.clone();
        }
        created.labels = new_task.labels.clone();
        created.priority = new_task.priority.unwrap_or(1);
        self.lock().tasks.push(created.clone());
        Ok(created)
    }

    async fn quick_add_task(&self, text: &str) -> Result<Task, ServiceError> {
        crate::remote::service::validate_content(text)?;
        self.record("quick_add_task")?;
        let created = task(&self.next_id("t"), text, None);
        self.lock().tasks.push(created.clone());
        Ok(created)
    }

    async fn update_task(&self, id: &str, fields: &TaskFields) -> Result<Task, ServiceError> {
        fields.validate()?;
        self.record("update_task")?;
        self.with_task(id, |t| {
            if let Some(content) = &fields.content {
                t.content = content.clone();
            }
            if let Some(description) = &fields.description {
                t.description = description.clone();
            }
            if let Some(labels) = &fields.labels {
                t.labels = labels.clone();
            }
            if let Some(priority) = fields.priority {
                t.priority = priority;
            }
            t.clone()
        })
    }

    async fn complete_task(&self, id: &str) -> Result<(), ServiceError> {
        self.record("complete_task")?;
        self.with_task(id, |t| t.checked = true)
    }

    async fn delete_task(&self, id: &str) -> Result<(), ServiceError> {
        self.record("delete_task")?;
        let mut state = self.lock();
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);
        if state.tasks.len() == before {
            return Err(ServiceError::NotFound(format!("task {id}")));
        }
        Ok(())
    }

    async fn move_task(&self, id: &str, project_id: &str) -> Result<Task, ServiceError> {
        self.record("move_task")?;
        self.with_task(id, |t| {
            t.project_id = project_id.to_string();
            t.clone()
        })
    }

    async fn update_task_labels(
        &self,
        id: &str,
        label_names: &[String],
    ) -> Result<Task, ServiceError> {
        self.record("update_task_labels")?;
        self.with_task(id, |t| {
            t.labels = label_names.to_vec();
            t.clone()
        })
    }

    async fn list_projects(&self) -> Result<Vec<Project>, ServiceError> {
        self.record("list_projects")?;
        let gated = self.lock().project_gates.pop_front();
        if let Some((gate, response)) = gated {
            let _ = gate.await;
            return Ok(response);
        }
        Ok(self.lock().projects.clone())
    }

    async fn list_labels(&self) -> Result<Vec<Label>, ServiceError> {
        self.record("list_labels")?;
        Ok(self.lock().labels.clone())
    }

    async fn create_label(&self, name: &str) -> Result<Label, ServiceError> {
        self.record("create_label")?;
        let created = label(&self.next_id("l"), name, "charcoal");
        self.lock().labels.push(created.clone());
        Ok(created)
    }

    async fn list_filters(&self) -> Result<Vec<Filter>, ServiceError> {
        self.record("list_filters")?;
        Ok(self.lock().filters.clone())
    }

    async fn list_comments(&self, task_id: &str) -> Result<Vec<Comment>, ServiceError> {
        self.record("list_comments")?;
        Ok(self
            .lock()
            .comments
            .iter()
            .filter(|c| c.task_id.as_deref() == Some(task_id))
            .cloned()
            .collect())
    }

    async fn add_comment(&self, task_id: &str, content: &str) -> Result<Comment, ServiceError> {
        self.record("add_comment")?;
        let comment = Comment {
            id: self.next_id("c"),
            task_id: Some(task_id.to_string()),
            content: content.to_string(),
            posted_at: None,
        };
        self.lock().comments.push(comment.clone());
        Ok(comment)
    }

    async fn user_utc_offset(&self) -> Result<FixedOffset, ServiceError> {
        self.record("user_utc_offset")?;
        Ok(self.lock().offset)
    }
}
