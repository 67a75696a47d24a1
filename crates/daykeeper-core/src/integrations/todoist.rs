//! Todoist task service -- morning-summary tasks via the v1 REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::TaskServiceError;
use crate::integrations::traits::{TaskItem, TaskService};

const TODOIST_API_BASE: &str = "https://api.todoist.com/api/v1";

// Cursor pagination hard cap; a well-formed account never needs more.
const MAX_PAGES: usize = 10;
const PAGE_LIMIT: u32 = 200;

/// `GET /tasks` returns `{ "results": [...], "next_cursor": "..." }`.
#[derive(Deserialize)]
struct TaskPage {
    #[serde(default)]
    results: Vec<TaskItem>,
    #[serde(default)]
    next_cursor: Option<String>,
}

pub struct TodoistService {
    client: Client,
    base_url: String,
    api_token: String,
    project_id: Option<String>,
}

impl TodoistService {
    pub fn new(api_token: &str, project_id: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            base_url: TODOIST_API_BASE.to_string(),
            api_token: api_token.trim().trim_matches('"').trim_matches('\'').to_string(),
            project_id: project_id
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }
    }

    /// Point the service at a different API host (test servers).
    pub fn with_base_url(api_token: &str, project_id: Option<&str>, base_url: &str) -> Self {
        let mut svc = Self::new(api_token, project_id);
        svc.base_url = base_url.trim_end_matches('/').to_string();
        svc
    }

    pub fn is_configured(&self) -> bool {
        !self.api_token.is_empty()
    }

    fn bearer(&self) -> Result<String, TaskServiceError> {
        if self.api_token.is_empty() {
            return Err(TaskServiceError::NotConfigured(
                "todoist api token is empty".to_string(),
            ));
        }
        Ok(format!("Bearer {}", self.api_token))
    }
}

async fn check(
    resp: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, TaskServiceError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let detail = resp.text().await.unwrap_or_default();
    Err(TaskServiceError::Api {
        context: context.to_string(),
        status,
        detail,
    })
}

#[async_trait]
impl TaskService for TodoistService {
    async fn list_active_tasks(&self) -> Result<Vec<TaskItem>, TaskServiceError> {
        let auth = self.bearer()?;
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut req = self
                .client
                .get(format!("{}/tasks", self.base_url))
                .header("Authorization", &auth)
                .query(&[("limit", PAGE_LIMIT.to_string())]);
            if let Some(pid) = &self.project_id {
                req = req.query(&[("project_id", pid)]);
            }
            if let Some(c) = &cursor {
                req = req.query(&[("cursor", c)]);
            }

            let resp = check(req.send().await?, "list_active_tasks").await?;
            let page: TaskPage = resp.json().await?;
            out.extend(page.results);

            match page.next_cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }

        Ok(out)
    }

    async fn add_task(
        &self,
        content: &str,
        due: Option<&str>,
    ) -> Result<TaskItem, TaskServiceError> {
        let auth = self.bearer()?;
        let content = content.trim();
        if content.is_empty() {
            return Err(TaskServiceError::Api {
                context: "add_task".to_string(),
                status: 0,
                detail: "task content is empty".to_string(),
            });
        }

        let mut payload = json!({ "content": content });
        if let Some(pid) = &self.project_id {
            payload["project_id"] = json!(pid);
        }
        if let Some(due) = due.map(str::trim).filter(|d| !d.is_empty()) {
            payload["due_string"] = json!(due);
        }

        let resp = self
            .client
            .post(format!("{}/tasks", self.base_url))
            .header("Authorization", &auth)
            .json(&payload)
            .send()
            .await?;
        let resp = check(resp, "add_task").await?;
        Ok(resp.json().await?)
    }

    async fn close_task(&self, task_id: &str) -> Result<(), TaskServiceError> {
        let auth = self.bearer()?;
        let tid = task_id.trim();
        if tid.is_empty() {
            return Err(TaskServiceError::Api {
                context: "close_task".to_string(),
                status: 0,
                detail: "task_id is empty".to_string(),
            });
        }

        let resp = self
            .client
            .post(format!("{}/tasks/{}/close", self.base_url, tid))
            .header("Authorization", &auth)
            .send()
            .await?;
        check(resp, "close_task").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn list_follows_next_cursor() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tasks")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "200".into()),
            ]))
            .with_body(r#"{"results":[{"id":"1","content":"first"}],"next_cursor":"abc"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/tasks")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("cursor".into(), "abc".into()),
            ]))
            .with_body(r#"{"results":[{"id":"2","content":"second"}],"next_cursor":null}"#)
            .create_async()
            .await;

        let svc = TodoistService::with_base_url("tok", None, &server.url());
        let tasks = svc.list_active_tasks().await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].content, "second");
    }

    #[tokio::test]
    async fn add_task_sends_project_and_due() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/tasks")
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::PartialJson(json!({
                "content": "buy milk",
                "project_id": "p1",
                "due_string": "today 18:00"
            })))
            .with_body(r#"{"id":"9","content":"buy milk"}"#)
            .create_async()
            .await;

        let svc = TodoistService::with_base_url("tok", Some("p1"), &server.url());
        let task = svc.add_task(" buy milk ", Some("today 18:00")).await.unwrap();
        assert_eq!(task.id, "9");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_error_carries_context_and_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/tasks/42/close")
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let svc = TodoistService::with_base_url("tok", None, &server.url());
        match svc.close_task("42").await.unwrap_err() {
            TaskServiceError::Api { context, status, .. } => {
                assert_eq!(context, "close_task");
                assert_eq!(status, 404);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_token_is_rejected_locally() {
        let svc = TodoistService::new("", None);
        assert!(matches!(
            svc.list_active_tasks().await,
            Err(TaskServiceError::NotConfigured(_))
        ));
    }
}
