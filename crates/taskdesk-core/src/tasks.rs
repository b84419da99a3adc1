//! View-local task cache.
//!
//! The cache only changes after the backend confirmed a mutation, using the
//! object the backend returned. Every mutation takes `&mut self`, so a store
//! never has two operations in flight.

use std::fmt;

use chrono::{DateTime, Local, TimeZone};
use taskdesk_types::{Task, TaskStatus, UpdateTaskPayload};

use crate::api::{ApiError, ApiResult, TasksApi};
use crate::validation::{self, FieldError, TaskForm, ValidationErrors};

/// Status tab of the task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskFilter {
    #[default]
    All,
    Status(TaskStatus),
}

impl TaskFilter {
    pub fn status(self) -> Option<TaskStatus> {
        match self {
            TaskFilter::All => None,
            TaskFilter::Status(status) => Some(status),
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        self.status().is_none_or(|status| task.status == status)
    }
}

impl From<Option<TaskStatus>> for TaskFilter {
    fn from(status: Option<TaskStatus>) -> Self {
        status.map_or(TaskFilter::All, TaskFilter::Status)
    }
}

/// Failure of a task mutation.
#[derive(Debug)]
pub enum TaskError {
    /// Rejected locally; nothing was sent
    Validation(ValidationErrors),
    Api(ApiError),
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Validation(errors) => write!(f, "{errors}"),
            TaskError::Api(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TaskError::Validation(errors) => Some(errors),
            TaskError::Api(err) => Some(err),
        }
    }
}

impl From<ValidationErrors> for TaskError {
    fn from(errors: ValidationErrors) -> Self {
        TaskError::Validation(errors)
    }
}

impl From<ApiError> for TaskError {
    fn from(err: ApiError) -> Self {
        TaskError::Api(err)
    }
}

/// Holds the loading flag up until dropped, including when a fetch is cancelled.
struct LoadingFlag<'a>(&'a mut bool);

impl<'a> LoadingFlag<'a> {
    fn raise(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

#[derive(Debug)]
pub struct TaskStore {
    api: TasksApi,
    tasks: Vec<Task>,
    filter: TaskFilter,
    loading: bool,
}

impl TaskStore {
    pub fn new(api: TasksApi) -> Self {
        Self {
            api,
            tasks: Vec::new(),
            filter: TaskFilter::All,
            loading: false,
        }
    }

    /// Every cached task, newest first as the backend ordered them.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Cached tasks matching the active tab.
    pub fn visible(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| self.filter.matches(t)).collect()
    }

    pub fn filter(&self) -> TaskFilter {
        self.filter
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Reloads the cache for the active tab. A failed fetch keeps the old cache.
    ///
    /// # Errors
    /// Returns the API error of the fetch.
    pub async fn fetch(&mut self) -> ApiResult<()> {
        let result = {
            let _loading = LoadingFlag::raise(&mut self.loading);
            self.api.get_all(self.filter.status()).await
        };

        match result {
            Ok(tasks) => {
                tracing::debug!(count = tasks.len(), filter = ?self.filter, "Tasks loaded");
                self.tasks = tasks;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load tasks");
                Err(err)
            }
        }
    }

    /// Switches tab and fetches the server-side scoped list.
    ///
    /// # Errors
    /// Returns the API error of the fetch.
    pub async fn set_filter(&mut self, filter: TaskFilter) -> ApiResult<()> {
        self.filter = filter;
        self.fetch().await
    }

    /// Loads a single task without touching the cache.
    ///
    /// # Errors
    /// Returns the API error of the request.
    pub async fn fetch_one(&self, id: &str) -> ApiResult<Task> {
        self.api.get_by_id(id).await
    }

    /// Validates `form`, creates the task and prepends the backend's copy.
    ///
    /// # Errors
    /// Validation errors are returned before any request is made.
    pub async fn create(&mut self, form: TaskForm) -> Result<Task, TaskError> {
        let payload = form.into_payload()?;
        let task = self.api.create(&payload).await?;
        tracing::info!(task_id = %task.id, "Task created");
        self.tasks.insert(0, task.clone());
        Ok(task)
    }

    /// Applies a partial update and replaces the cached entry with the result.
    ///
    /// # Errors
    /// Validation errors are returned before any request is made.
    pub async fn update(&mut self, id: &str, payload: UpdateTaskPayload) -> Result<Task, TaskError> {
        validate_update(&payload)?;
        let task = self.api.update(id, &payload).await?;
        tracing::info!(task_id = %task.id, "Task updated");
        self.replace(&task);
        Ok(task)
    }

    /// Moves a task to `status`. A task already in that status is returned as-is.
    ///
    /// # Errors
    /// Returns the API error of the update.
    pub async fn update_status(&mut self, id: &str, status: TaskStatus) -> Result<Task, TaskError> {
        if let Some(task) = self.tasks.iter().find(|t| t.id == id && t.status == status) {
            return Ok(task.clone());
        }
        self.update(id, UpdateTaskPayload::status(status)).await
    }

    /// Deletes a task and drops it from the cache once the backend confirmed.
    ///
    /// # Errors
    /// Returns the API error; the cached entry is kept.
    pub async fn delete(&mut self, id: &str) -> ApiResult<()> {
        if let Err(err) = self.api.delete(id).await {
            tracing::warn!(task_id = %id, error = %err, "Failed to delete task");
            return Err(err);
        }
        tracing::info!(task_id = %id, "Task deleted");
        self.tasks.retain(|t| t.id != id);
        Ok(())
    }

    fn replace(&mut self, task: &Task) {
        if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *slot = task.clone();
        }
    }
}

fn validate_update(payload: &UpdateTaskPayload) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    if payload.is_empty() {
        errors.push(FieldError {
            field: "task",
            message: "Nothing to update",
        });
    }
    if let Some(Err(message)) = payload.title.as_deref().map(validation::validate_title) {
        errors.push(FieldError {
            field: "title",
            message,
        });
    }
    if let Some(Err(message)) = payload
        .description
        .as_deref()
        .map(validation::validate_description)
    {
        errors.push(FieldError {
            field: "description",
            message,
        });
    }
    ValidationErrors::from_errors(errors)
}

/// Renders a backend timestamp as `Mar 1, 2025` in local time.
/// Unparseable values are shown unchanged.
pub fn format_created_at(raw: &str) -> String {
    format_created_at_in(raw, &Local)
}

/// [`format_created_at`] in an explicit time zone.
pub fn format_created_at_in<Tz: TimeZone>(raw: &str, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    DateTime::parse_from_rfc3339(raw).map_or_else(
        |_| raw.to_string(),
        |dt| dt.with_timezone(tz).format("%b %-d, %Y").to_string(),
    )
}
