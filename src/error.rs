//! Outcome kinds of a chat command.

use crate::tracker::{TrackerError, UnknownVariant};

/// Why a command handler stopped.
///
/// Every variant except [`CommandError::Internal`] is shown to the user as a
/// reply. Internal errors are only logged.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// A tracker lookup came back empty.
    #[error("I couldn't find {what}{}", project_guidance(.project))]
    NotFound {
        what: String,
        project: Option<String>,
    },

    #[error("{0}")]
    Validation(String),

    #[error("There's nothing to pick from yet. Try find, finished or mine first.")]
    NoPriorSearch,

    #[error("{index} is out of range; the last search had {len} result(s).")]
    IndexOutOfRange { index: u64, len: usize },

    /// Missing token, project, story or initials.
    #[error("{0}")]
    Unconfigured(String),

    #[error("I have nothing to refer to yet.")]
    NothingToReferTo,

    /// Anything else. Logged with full detail, never sent to chat.
    #[error("{0}")]
    Internal(color_eyre::Report),
}

fn project_guidance(project: &Option<String>) -> String {
    match project {
        Some(name) => format!(" in project {name}. Is that the right project?"),
        None => ".".to_owned(),
    }
}

impl CommandError {
    pub fn not_found(what: impl Into<String>, project: Option<&str>) -> Self {
        Self::NotFound {
            what: what.into(),
            project: project.map(str::to_owned),
        }
    }

    pub fn unconfigured(message: impl Into<String>) -> Self {
        Self::Unconfigured(message.into())
    }

    /// Whether the error text should be sent back to chat.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }

    /// Map a tracker failure, naming the current project for not-found.
    pub fn from_tracker(err: TrackerError, project: Option<&str>) -> Self {
        match err {
            TrackerError::NotFound(what) => Self::not_found(what, project),
            TrackerError::Unauthorized => Self::unconfigured(
                "The tracker rejected your token. Set a new one with `token <token>`.",
            ),
            other => Self::Internal(color_eyre::Report::new(other)),
        }
    }
}

impl From<color_eyre::Report> for CommandError {
    fn from(report: color_eyre::Report) -> Self {
        Self::Internal(report)
    }
}

impl From<TrackerError> for CommandError {
    fn from(err: TrackerError) -> Self {
        Self::from_tracker(err, None)
    }
}

impl From<UnknownVariant> for CommandError {
    fn from(err: UnknownVariant) -> Self {
        Self::Validation(format!("{err}."))
    }
}

pub type CommandResult = Result<(), CommandError>;
