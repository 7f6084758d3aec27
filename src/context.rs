//! Channel-wide "last mentioned" pointers.
//!
//! This is deliberately shared across every session: when anyone resolves a
//! story or project, a bare `story` / `project` from anyone else refers to it.
//! It lives only in memory.

use crate::tracker::{Project, Story};

#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    last_story: Option<Story>,
    last_project: Option<Project>,
}

impl ConversationContext {
    pub fn mention_story(&mut self, story: &Story) {
        self.last_story = Some(story.clone());
    }

    pub fn mention_project(&mut self, project: &Project) {
        self.last_project = Some(project.clone());
    }

    pub fn last_story(&self) -> Option<&Story> {
        self.last_story.as_ref()
    }

    pub fn last_project(&self) -> Option<&Project> {
        self.last_project.as_ref()
    }
}
