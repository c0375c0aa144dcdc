//! REST access to the store, behind a trait so tests can swap in a mock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crewboard_common::chat::ChatMessageRecord;
use crewboard_common::task::{TaskRecord, TaskStatus};

use crate::error::ClientError;

/// Fields for a new task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskDraft {
    pub content: String,
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update for an existing task. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

/// The persistence collaborator, as seen from the client. Every mutation
/// returns the canonical post-persistence record.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_tasks(&self, project_id: &str) -> Result<Vec<TaskRecord>, ClientError>;

    async fn fetch_messages(&self, project_id: &str)
        -> Result<Vec<ChatMessageRecord>, ClientError>;

    async fn create_task(
        &self,
        project_id: &str,
        draft: &TaskDraft,
    ) -> Result<TaskRecord, ClientError>;

    async fn update_task(
        &self,
        project_id: &str,
        task_id: i64,
        patch: &TaskPatch,
    ) -> Result<TaskRecord, ClientError>;

    async fn delete_task(&self, project_id: &str, task_id: i64) -> Result<(), ClientError>;

    async fn send_message(
        &self,
        project_id: &str,
        content: &str,
    ) -> Result<ChatMessageRecord, ClientError>;
}

// ---------------------------------------------------------------------------
// reqwest implementation against the board-api REST surface
// ---------------------------------------------------------------------------

pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    data: Vec<ChatMessageRecord>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl RestStore {
    /// `base_url` is the API origin, e.g. `http://localhost:4010`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let message = response
            .json::<ErrorBody>()
            .await
            .map(|b| b.error.message)
            .unwrap_or_else(|_| status.to_string());
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn expect_ok(response: reqwest::Response) -> Result<(), ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response
            .json::<ErrorBody>()
            .await
            .map(|b| b.error.message)
            .unwrap_or_else(|_| status.to_string());
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn fetch_tasks(&self, project_id: &str) -> Result<Vec<TaskRecord>, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/projects/{project_id}/tasks")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn fetch_messages(
        &self,
        project_id: &str,
    ) -> Result<Vec<ChatMessageRecord>, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/projects/{project_id}/messages")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let page: MessagePage = Self::parse(response).await?;
        Ok(page.data)
    }

    async fn create_task(
        &self,
        project_id: &str,
        draft: &TaskDraft,
    ) -> Result<TaskRecord, ClientError> {
        let response = self
            .http
            .post(self.url(&format!("/projects/{project_id}/tasks")))
            .bearer_auth(&self.token)
            .json(draft)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn update_task(
        &self,
        project_id: &str,
        task_id: i64,
        patch: &TaskPatch,
    ) -> Result<TaskRecord, ClientError> {
        let response = self
            .http
            .patch(self.url(&format!("/projects/{project_id}/tasks/{task_id}")))
            .bearer_auth(&self.token)
            .json(patch)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn delete_task(&self, project_id: &str, task_id: i64) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/projects/{project_id}/tasks/{task_id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::expect_ok(response).await
    }

    async fn send_message(
        &self,
        project_id: &str,
        content: &str,
    ) -> Result<ChatMessageRecord, ClientError> {
        let response = self
            .http
            .post(self.url(&format!("/projects/{project_id}/messages")))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await?;
        Self::parse(response).await
    }
}
