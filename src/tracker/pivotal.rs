//! Pivotal Tracker REST client (API v5, JSON).
//!
//! Authenticates with the `X-TrackerToken` header. One [`PivotalTracker`] is
//! scoped to a single project; all handles built by a [`PivotalFactory`] share
//! one `reqwest::Client` for connection pooling.

use super::{
    Note, Project, Story, StoryAttrs, StoryFilter, StoryState, Tracker, TrackerError,
    TrackerFactory,
};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.pivotaltracker.com/services/v5";

/// Builds [`PivotalTracker`] handles sharing one HTTP client.
pub struct PivotalFactory {
    client: reqwest::Client,
    base_url: String,
}

impl PivotalFactory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TrackerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }
}

impl TrackerFactory for PivotalFactory {
    fn connect(&self, project_id: u64, token: &str) -> Arc<dyn Tracker> {
        Arc::new(PivotalTracker {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            project_id,
            token: token.to_owned(),
        })
    }
}

/// A Pivotal Tracker client bound to one project and token.
pub struct PivotalTracker {
    client: reqwest::Client,
    base_url: String,
    project_id: u64,
    token: String,
}

#[derive(Serialize)]
struct CommentBody<'a> {
    text: &'a str,
}

#[derive(serde::Deserialize)]
struct CommentResponse {
    id: u64,
    story_id: u64,
    text: String,
}

impl PivotalTracker {
    fn project_url(&self, path: &str) -> String {
        format!("{}/projects/{}{path}", self.base_url, self.project_id)
    }

    /// Send a request and decode the JSON body, mapping HTTP failures to
    /// [`TrackerError`]. `what` names the resource for not-found errors.
    async fn send<T: DeserializeOwned + Send>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T, TrackerError> {
        let response = request
            .header("X-TrackerToken", &self.token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        match status.as_u16() {
            404 => Err(TrackerError::NotFound(what.to_owned())),
            401 | 403 => Err(TrackerError::Unauthorized),
            code => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<unreadable>".to_string());
                tracing::warn!(project = self.project_id, status = code, "tracker API error: {body}");
                Err(TrackerError::Api {
                    status: code,
                    message: api_error_message(&body),
                })
            }
        }
    }
}

/// Pull the human-readable message out of an API error body, if it has one.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("general_problem"))
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[async_trait]
impl Tracker for PivotalTracker {
    fn project_id(&self) -> u64 {
        self.project_id
    }

    async fn fetch_project(&self) -> Result<Project, TrackerError> {
        let what = format!("project {}", self.project_id);
        self.send(self.client.get(self.project_url("")), &what).await
    }

    async fn list_stories(&self, filter: &StoryFilter) -> Result<Vec<Story>, TrackerError> {
        let mut request = self.client.get(self.project_url("/stories"));
        let query = filter.to_query();
        if !query.is_empty() {
            request = request.query(&[("filter", query)]);
        }
        let what = format!("stories of project {}", self.project_id);
        self.send(request, &what).await
    }

    async fn find_story(&self, story_id: u64) -> Result<Story, TrackerError> {
        let url = self.project_url(&format!("/stories/{story_id}"));
        self.send(self.client.get(url), &format!("story {story_id}"))
            .await
    }

    async fn create_story(&self, attrs: &StoryAttrs) -> Result<Story, TrackerError> {
        let what = format!("project {}", self.project_id);
        self.send(
            self.client.post(self.project_url("/stories")).json(attrs),
            &what,
        )
        .await
    }

    async fn update_story(
        &self,
        story_id: u64,
        attrs: &StoryAttrs,
    ) -> Result<Story, TrackerError> {
        let url = self.project_url(&format!("/stories/{story_id}"));
        self.send(self.client.put(url).json(attrs), &format!("story {story_id}"))
            .await
    }

    async fn create_note(&self, story_id: u64, text: &str) -> Result<Note, TrackerError> {
        let url = self.project_url(&format!("/stories/{story_id}/comments"));
        let comment: CommentResponse = self
            .send(
                self.client.post(url).json(&CommentBody { text }),
                &format!("story {story_id}"),
            )
            .await?;
        Ok(Note {
            id: comment.id,
            story_id: comment.story_id,
            text: comment.text,
        })
    }

    async fn deliver_finished_stories(&self) -> Result<Vec<Story>, TrackerError> {
        let finished = self
            .list_stories(&StoryFilter::state(StoryState::Finished))
            .await?;
        let attrs = StoryAttrs {
            current_state: Some(StoryState::Delivered),
            ..StoryAttrs::default()
        };

        let mut delivered = Vec::with_capacity(finished.len());
        for story in finished {
            delivered.push(self.update_story(story.id, &attrs).await?);
        }
        Ok(delivered)
    }
}
