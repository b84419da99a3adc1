//! `/tasks` endpoints.

use std::sync::LazyLock;

use taskdesk_types::{CreateTaskPayload, DeleteResponse, Task, TaskStatus, UpdateTaskPayload};

use super::client::{ApiClient, ApiRequest};
use super::error::ApiResult;

/// Only used to percent-encode ids as path segments.
static TASKS_URL: LazyLock<url::Url> =
    LazyLock::new(|| url::Url::parse("http://localhost/tasks").expect("static URL parses"));

/// Typed wrappers over the task collection. All calls carry the session token.
#[derive(Debug, Clone)]
pub struct TasksApi {
    client: ApiClient,
}

impl TasksApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// `GET /tasks`, scoped to `status` when given.
    ///
    /// # Errors
    /// Returns the API error of the request.
    pub async fn get_all(&self, status: Option<TaskStatus>) -> ApiResult<Vec<Task>> {
        let mut request = ApiRequest::get("/tasks");
        if let Some(status) = status {
            request = request.query("status", status.as_str());
        }
        self.client.send(&request).await
    }

    /// `GET /tasks/:id`.
    ///
    /// # Errors
    /// Returns the API error of the request.
    pub async fn get_by_id(&self, id: &str) -> ApiResult<Task> {
        self.client.send(&ApiRequest::get(task_path(id))).await
    }

    /// `POST /tasks`.
    ///
    /// # Errors
    /// Returns the API error of the request.
    pub async fn create(&self, payload: &CreateTaskPayload) -> ApiResult<Task> {
        let request = ApiRequest::post("/tasks").json(payload)?;
        self.client.send(&request).await
    }

    /// `PATCH /tasks/:id`.
    ///
    /// # Errors
    /// Returns the API error of the request.
    pub async fn update(&self, id: &str, payload: &UpdateTaskPayload) -> ApiResult<Task> {
        let request = ApiRequest::patch(task_path(id)).json(payload)?;
        self.client.send(&request).await
    }

    /// `DELETE /tasks/:id`.
    ///
    /// # Errors
    /// Returns the API error of the request.
    pub async fn delete(&self, id: &str) -> ApiResult<DeleteResponse> {
        let response = self.client.execute(&ApiRequest::delete(task_path(id))).await?;
        // Some backends answer 204 with an empty body.
        let body = response.text().await.unwrap_or_default();
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}

fn task_path(id: &str) -> String {
    let mut url = TASKS_URL.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.push(id);
    }
    url.path().to_string()
}
