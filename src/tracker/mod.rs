//! Remote project-tracker abstraction (Pivotal Tracker and test doubles).
//!
//! A [`Tracker`] is a client handle bound to one project and one API token.
//! Handles are built by a [`TrackerFactory`] and memoized per (nick, project)
//! in [`cache::TrackerCache`].

pub mod cache;
pub mod pivotal;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A tracker project snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_start_day: Option<String>,
}

/// Kind of story. Chores have no `finished` state in the tracker workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryType {
    Feature,
    Bug,
    Chore,
    Release,
}

impl StoryType {
    /// Capitalized form used at the start of reply lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Feature => "Feature",
            Self::Bug => "Bug",
            Self::Chore => "Chore",
            Self::Release => "Release",
        }
    }
}

impl fmt::Display for StoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feature => write!(f, "feature"),
            Self::Bug => write!(f, "bug"),
            Self::Chore => write!(f, "chore"),
            Self::Release => write!(f, "release"),
        }
    }
}

impl FromStr for StoryType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "feature" | "f" => Ok(Self::Feature),
            "bug" | "b" => Ok(Self::Bug),
            "chore" | "c" => Ok(Self::Chore),
            "release" | "r" => Ok(Self::Release),
            _ => Err(UnknownVariant::new("story type", s)),
        }
    }
}

/// Workflow state of a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryState {
    Unscheduled,
    Unstarted,
    Planned,
    Started,
    Finished,
    Delivered,
    Accepted,
    Rejected,
}

impl fmt::Display for StoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unscheduled => "unscheduled",
            Self::Unstarted => "unstarted",
            Self::Planned => "planned",
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Delivered => "delivered",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

impl FromStr for StoryState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unscheduled" => Ok(Self::Unscheduled),
            "unstarted" => Ok(Self::Unstarted),
            "planned" => Ok(Self::Planned),
            "started" => Ok(Self::Started),
            "finished" => Ok(Self::Finished),
            "delivered" => Ok(Self::Delivered),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            _ => Err(UnknownVariant::new("story state", s)),
        }
    }
}

/// Returned when a chat argument names no known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} {value:?}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
}

impl Label {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

/// A tracker story snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: u64,
    pub project_id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub story_type: StoryType,
    pub current_state: StoryState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Story {
    /// One-line summary: `Feature 1234: Name (started)`.
    pub fn summary(&self) -> String {
        format!(
            "{} {}: {} ({})",
            self.story_type.label(),
            self.id,
            self.name,
            self.current_state
        )
    }
}

/// Writable story attributes. Only fields that are set get sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoryAttrs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_type: Option<StoryType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_state: Option<StoryState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<Label>>,
}

/// Story search criteria, rendered into the tracker's filter syntax.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryFilter {
    pub state: Option<StoryState>,
    /// Owner initials for "my work" queries.
    pub mywork: Option<String>,
    pub text: Option<String>,
}

impl StoryFilter {
    pub fn state(state: StoryState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn mywork(initials: impl Into<String>) -> Self {
        Self {
            mywork: Some(initials.into()),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Render as a search filter, e.g. `state:finished mywork:AB login`.
    pub fn to_query(&self) -> String {
        let mut parts = Vec::new();
        if let Some(state) = self.state {
            parts.push(format!("state:{state}"));
        }
        if let Some(initials) = &self.mywork {
            parts.push(format!("mywork:{initials}"));
        }
        if let Some(text) = &self.text {
            parts.push(text.trim().to_owned());
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: u64,
    pub story_id: u64,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("tracker rejected the API token")]
    Unauthorized,

    #[error("tracker API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("tracker request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Client handle for one tracker project.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Tracker: Send + Sync {
    /// The project this handle is scoped to.
    fn project_id(&self) -> u64;

    async fn fetch_project(&self) -> Result<Project, TrackerError>;

    async fn list_stories(&self, filter: &StoryFilter) -> Result<Vec<Story>, TrackerError>;

    async fn find_story(&self, story_id: u64) -> Result<Story, TrackerError>;

    async fn create_story(&self, attrs: &StoryAttrs) -> Result<Story, TrackerError>;

    async fn update_story(&self, story_id: u64, attrs: &StoryAttrs)
    -> Result<Story, TrackerError>;

    async fn create_note(&self, story_id: u64, text: &str) -> Result<Note, TrackerError>;

    /// Move every finished story to delivered; returns the delivered stories.
    async fn deliver_finished_stories(&self) -> Result<Vec<Story>, TrackerError>;
}

/// Builds tracker handles. One handle per (project, token).
pub trait TrackerFactory: Send + Sync {
    fn connect(&self, project_id: u64, token: &str) -> Arc<dyn Tracker>;
}
