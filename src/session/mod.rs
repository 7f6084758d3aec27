//! Per-nick conversational state.
//!
//! A [`Session`] remembers who someone is to the tracker (token, initials) and
//! what they are talking about (current project/story, last search) so that
//! follow-up commands can omit arguments.

pub mod store;

use crate::error::CommandError;
use crate::tracker::{Project, Story};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Numeric story tokens shorter than this many digits are list indices;
/// longer ones are tracker story ids.
pub const STORY_ID_MIN_DIGITS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub nick: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub initials: Option<String>,
    #[serde(default)]
    current_project_id: Option<u64>,
    #[serde(default)]
    current_project: Option<Project>,
    #[serde(default)]
    current_story_id: Option<u64>,
    #[serde(default)]
    current_story: Option<Story>,
    #[serde(default)]
    known_projects: BTreeSet<u64>,
    #[serde(default)]
    last_search_results: Option<Vec<Story>>,
}

/// How a story argument resolves against a session.
#[derive(Debug, Clone, PartialEq)]
pub enum StoryRef {
    /// Picked from the last search results by 1-based index.
    Listed(Story),
    /// A literal tracker story id to look up.
    Remote(u64),
}

impl Session {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            token: None,
            initials: None,
            current_project_id: None,
            current_project: None,
            current_story_id: None,
            current_story: None,
            known_projects: BTreeSet::new(),
            last_search_results: None,
        }
    }

    pub fn current_project_id(&self) -> Option<u64> {
        self.current_project_id
    }

    pub fn current_project(&self) -> Option<&Project> {
        self.current_project.as_ref()
    }

    pub fn current_story_id(&self) -> Option<u64> {
        self.current_story_id
    }

    pub fn current_story(&self) -> Option<&Story> {
        self.current_story.as_ref()
    }

    pub fn known_projects(&self) -> &BTreeSet<u64> {
        &self.known_projects
    }

    /// Results of the most recent search, or `None` if there has been none.
    pub fn last_search_results(&self) -> Option<&[Story]> {
        self.last_search_results.as_deref()
    }

    /// Make `project` current. The id and the snapshot always move together,
    /// and the project becomes known.
    pub fn select_project(&mut self, project: Project) {
        self.current_project_id = Some(project.id);
        self.known_projects.insert(project.id);
        self.current_project = Some(project);
    }

    /// Add a project to the known set without making it current.
    pub fn remember_project(&mut self, project_id: u64) {
        self.known_projects.insert(project_id);
    }

    pub fn select_story(&mut self, story: Story) {
        self.current_story_id = Some(story.id);
        self.current_story = Some(story);
    }

    /// Replace the search results wholesale.
    pub fn record_search(&mut self, results: Vec<Story>) {
        self.last_search_results = Some(results);
    }

    /// Interpret a numeric story argument.
    ///
    /// Short numbers index into the last search results (1-based); numbers
    /// with [`STORY_ID_MIN_DIGITS`] or more digits are tracker ids.
    pub fn resolve_story_arg(&self, arg: &str) -> Result<StoryRef, CommandError> {
        let arg = arg.trim().trim_start_matches('#');
        let number: u64 = arg
            .parse()
            .map_err(|_| CommandError::Validation(format!("{arg:?} is not a story number.")))?;

        if arg.len() >= STORY_ID_MIN_DIGITS {
            return Ok(StoryRef::Remote(number));
        }

        let results = self
            .last_search_results
            .as_ref()
            .ok_or(CommandError::NoPriorSearch)?;
        let index = usize::try_from(number).unwrap_or(usize::MAX);
        if index == 0 || index > results.len() {
            return Err(CommandError::IndexOutOfRange {
                index: number,
                len: results.len(),
            });
        }
        Ok(StoryRef::Listed(results[index - 1].clone()))
    }
}
