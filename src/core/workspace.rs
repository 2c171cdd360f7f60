//! # Workspace
//!
//! The single coordinator between the front end and the remote service.
//! Every mutation goes through here so the catalog can be invalidated
//! before control returns to the caller:
//!
//! | Operation                        | Invalidates        |
//! |----------------------------------|--------------------|
//! | `move_task`, edit with `#project`| projects           |
//! | `set_labels`                     | labels             |
//! | any add or edit with labels      | labels             |
//!
//! Task lists themselves are never cached; each `fetch_tasks` goes to the
//! service and is narrowed by the resolved [`QueryDescriptor`].

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, Utc};
use log::{debug, info, warn};

use crate::core::cache::{CacheKind, Catalog, StaleWarning};
use crate::core::config::TimezoneSetting;
use crate::core::query::{HISTORY_DAYS, LogicalFilter, QueryDescriptor, QueryTranslator, TimeBasis};
use crate::core::quick_entry::{EntryParser, ParsedEntry, PatternParser};
use crate::remote::{
    Comment, DueSpec, NewTask, ServiceError, Task, TaskFields, TaskService,
};

/// A freshly fetched, filtered task list.
#[derive(Debug, Clone)]
pub struct TaskList {
    pub filter: LogicalFilter,
    pub tasks: Vec<Task>,
    pub descriptor: QueryDescriptor,
    pub warnings: Vec<StaleWarning>,
}

pub struct Workspace {
    service: Arc<dyn TaskService>,
    catalog: Arc<Catalog>,
    translator: QueryTranslator,
    parser: Box<dyn EntryParser>,
}

/// Turns the configured timezone into a usable basis, asking the service
/// for the account offset when configured to.
pub async fn resolve_time_basis(
    service: &dyn TaskService,
    setting: TimezoneSetting,
) -> Result<TimeBasis, ServiceError> {
    match setting {
        TimezoneSetting::Local => Ok(TimeBasis::Local),
        TimezoneSetting::Offset(offset) => Ok(TimeBasis::Fixed(offset)),
        TimezoneSetting::Service => {
            let offset = service.user_utc_offset().await?;
            info!("Using account UTC offset {offset} as date basis");
            Ok(TimeBasis::Fixed(offset))
        }
    }
}

impl Workspace {
    pub fn new(service: Arc<dyn TaskService>, cache_ttl: Duration, basis: TimeBasis) -> Self {
        let catalog = Arc::new(Catalog::new(service.clone(), cache_ttl));
        Self {
            service,
            catalog,
            translator: QueryTranslator::new(basis),
            parser: Box::new(PatternParser),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn basis(&self) -> TimeBasis {
        self.translator.basis()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Resolves `filter`, consulting the saved-filter cache only for named filters.
    pub async fn resolve(
        &self,
        filter: &LogicalFilter,
        now: DateTime<Utc>,
    ) -> Result<(QueryDescriptor, Option<StaleWarning>), ServiceError> {
        if !filter.is_named() {
            return Ok((self.translator.resolve(filter, &[], now)?, None));
        }
        let saved = self.catalog.get_filters(false).await?;
        let descriptor = self.translator.resolve(filter, &saved.items, now)?;
        Ok((descriptor, saved.warning))
    }

    /// Fetches the task list for `filter`, limited to `project` when given.
    pub async fn fetch_tasks(
        &self,
        filter: &LogicalFilter,
        project: Option<&str>,
    ) -> Result<TaskList, ServiceError> {
        self.fetch_tasks_at(filter, project, Utc::now()).await
    }

    pub async fn fetch_tasks_at(
        &self,
        filter: &LogicalFilter,
        project: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<TaskList, ServiceError> {
        let (descriptor, warning) = self.resolve(filter, now).await?;
        let descriptor = descriptor.in_project(project.map(str::to_string));
        let mut tasks = self
            .service
            .list_tasks(descriptor.server_query.as_deref())
            .await?;

        if descriptor.include_completed {
            let since = now
                .checked_sub_days(Days::new(HISTORY_DAYS))
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            let completed = self.service.list_completed_tasks(since, now).await?;
            let seen: HashSet<String> = tasks.iter().map(|t| t.id.clone()).collect();
            tasks.extend(completed.into_iter().filter(|t| !seen.contains(&t.id)));
        }

        let mut tasks = descriptor.apply(tasks);
        let offset = descriptor.offset;
        tasks.sort_by_key(|t| {
            let due = t.due_date(offset);
            (t.checked, due.is_none(), due, Reverse(t.priority))
        });
        debug!("{filter}: {} tasks after filtering", tasks.len());

        Ok(TaskList {
            filter: filter.clone(),
            tasks,
            descriptor,
            warnings: warning.into_iter().collect(),
        })
    }

    /// Loads (or force-reloads) every catalog collection, collecting stale warnings.
    pub async fn refresh_catalog(&self, force: bool) -> Result<Vec<StaleWarning>, ServiceError> {
        let projects = self.catalog.get_projects(force).await?;
        let labels = self.catalog.get_labels(force).await?;
        let filters = self.catalog.get_filters(force).await?;
        Ok([projects.warning, labels.warning, filters.warning]
            .into_iter()
            .flatten()
            .collect())
    }

    /// Comments on one task, oldest first.
    pub async fn comments(&self, task_id: &str) -> Result<Vec<Comment>, ServiceError> {
        let mut comments = self.service.list_comments(task_id).await?;
        comments.sort_by(|a, b| a.posted_at.cmp(&b.posted_at));
        Ok(comments)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Sends free text to the service's own natural-language parser.
    pub async fn quick_add(&self, text: &str) -> Result<Task, ServiceError> {
        let task = self.service.quick_add_task(text).await?;
        // The service creates unknown labels on the fly.
        if text.contains('@') {
            self.catalog.invalidate(CacheKind::Labels);
        }
        Ok(task)
    }

    pub async fn add_task(&self, new_task: &NewTask) -> Result<Task, ServiceError> {
        new_task.validate()?;
        let task = self.service.create_task(new_task).await?;
        if !new_task.labels.is_empty() {
            self.catalog.invalidate(CacheKind::Labels);
        }
        Ok(task)
    }

    /// Creates a task from locally parsed entry text.
    pub async fn add_from_entry(&self, text: &str) -> Result<Task, ServiceError> {
        let parsed = self.parser.parse(text);
        let project_id = match &parsed.project {
            Some(name) => Some(self.project_id_by_name(name).await?),
            None => None,
        };
        let labels = self.ensure_labels(&parsed.labels).await?;
        let new_task = NewTask {
            content: parsed.content,
            project_id,
            due: parsed.due.map(DueSpec::Natural),
            labels,
            ..Default::default()
        };
        self.add_task(&new_task).await
    }

    pub async fn update_task(&self, id: &str, fields: &TaskFields) -> Result<Task, ServiceError> {
        fields.validate()?;
        let task = self.service.update_task(id, fields).await?;
        if fields.labels.is_some() {
            self.catalog.invalidate(CacheKind::Labels);
        }
        Ok(task)
    }

    /// Applies entry text to an existing task: new content, labels, due
    /// phrase and, for `#project`, a move.
    pub async fn edit_task(&self, id: &str, text: &str) -> Result<Task, ServiceError> {
        let ParsedEntry {
            content,
            project,
            labels,
            due,
        } = self.parser.parse(text);

        let project_id = match &project {
            Some(name) => Some(self.project_id_by_name(name).await?),
            None => None,
        };
        let labels = if labels.is_empty() {
            None
        } else {
            Some(self.ensure_labels(&labels).await?)
        };
        let fields = TaskFields {
            content: (!content.is_empty()).then_some(content),
            labels,
            due: due.map(DueSpec::Natural),
            ..Default::default()
        };

        let mut task = match (fields.is_empty(), &project_id) {
            (true, None) => {
                return Err(ServiceError::Validation("nothing to change".to_string()));
            }
            (true, Some(_)) => None,
            (false, _) => Some(self.update_task(id, &fields).await?),
        };
        if let Some(project_id) = project_id {
            task = Some(self.move_task(id, &project_id).await?);
        }
        task.ok_or_else(|| ServiceError::Protocol("edit produced no task".to_string()))
    }

    pub async fn complete_task(&self, id: &str) -> Result<(), ServiceError> {
        self.service.complete_task(id).await
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), ServiceError> {
        self.service.delete_task(id).await
    }

    pub async fn move_task(&self, id: &str, project_id: &str) -> Result<Task, ServiceError> {
        let task = self.service.move_task(id, project_id).await?;
        self.catalog.invalidate(CacheKind::Projects);
        Ok(task)
    }

    pub async fn set_priority(&self, id: &str, priority: u8) -> Result<Task, ServiceError> {
        let fields = TaskFields {
            priority: Some(priority),
            ..Default::default()
        };
        self.update_task(id, &fields).await
    }

    /// Replaces a task's labels, creating any that do not exist yet.
    pub async fn set_labels(&self, id: &str, names: &[String]) -> Result<Task, ServiceError> {
        let names = self.ensure_labels(names).await?;
        let task = self.service.update_task_labels(id, &names).await?;
        self.catalog.invalidate(CacheKind::Labels);
        Ok(task)
    }

    pub async fn add_comment(&self, task_id: &str, content: &str) -> Result<Comment, ServiceError> {
        if content.trim().is_empty() {
            return Err(ServiceError::Validation("comment must not be empty".to_string()));
        }
        self.service.add_comment(task_id, content).await
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn project_id_by_name(&self, name: &str) -> Result<String, ServiceError> {
        let projects = self.catalog.get_projects(false).await?;
        if let Some(warning) = &projects.warning {
            warn!("Resolving project '{name}' against {warning}");
        }
        projects
            .items
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.id.clone())
            .ok_or_else(|| ServiceError::Validation(format!("no project named '{name}'")))
    }

    /// Maps names onto existing labels (case-insensitively) and creates the
    /// rest. Returns canonical names in input order.
    async fn ensure_labels(&self, names: &[String]) -> Result<Vec<String>, ServiceError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let known = self.catalog.get_labels(false).await?;
        let mut resolved: Vec<String> = Vec::with_capacity(names.len());
        let mut created = false;

        for name in names {
            let name = name.trim();
            if name.is_empty() || resolved.iter().any(|r| r.eq_ignore_ascii_case(name)) {
                continue;
            }
            match known.items.iter().find(|l| l.name.eq_ignore_ascii_case(name)) {
                Some(existing) => resolved.push(existing.name.clone()),
                None => {
                    info!("Creating missing label '{name}'");
                    let label = self.service.create_label(name).await?;
                    created = true;
                    resolved.push(label.name);
                }
            }
        }

        if created {
            self.catalog.invalidate(CacheKind::Labels);
        }
        Ok(resolved)
    }
}
