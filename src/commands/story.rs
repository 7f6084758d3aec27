//! Story selection, creation and updates.

use crate::bot::Bot;
use crate::dispatch::Invocation;
use crate::error::{CommandError, CommandResult};
use crate::session::StoryRef;
use crate::tracker::{Label, Story, StoryAttrs, StoryState, StoryType};
use std::str::FromStr;

/// A story field that can be changed from chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryField {
    Name,
    Description,
    Type,
    State,
    Estimate,
    Labels,
}

impl FromStr for StoryField {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "description" | "desc" => Ok(Self::Description),
            "type" | "story_type" => Ok(Self::Type),
            "state" | "current_state" => Ok(Self::State),
            "estimate" | "points" => Ok(Self::Estimate),
            "labels" => Ok(Self::Labels),
            _ => Err(CommandError::Validation(format!(
                "I can't update {s:?}. Try name, description, type, state, estimate or labels."
            ))),
        }
    }
}

impl StoryField {
    /// Attributes that set this field to `value`.
    pub fn attrs(self, value: &str) -> Result<StoryAttrs, CommandError> {
        let value = value.trim();
        let mut attrs = StoryAttrs::default();
        match self {
            Self::Name => attrs.name = Some(value.to_owned()),
            Self::Description => attrs.description = Some(value.to_owned()),
            Self::Type => attrs.story_type = Some(value.parse()?),
            Self::State => attrs.current_state = Some(value.parse()?),
            Self::Estimate => {
                let points: f32 = value.parse().map_err(|_| {
                    CommandError::Validation(format!("{value:?} is not an estimate."))
                })?;
                attrs.estimate = Some(points);
            }
            Self::Labels => {
                attrs.labels = Some(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(Label::named)
                        .collect(),
                );
            }
        }
        Ok(attrs)
    }
}

/// Reject updates the tracker's workflow does not allow.
pub fn validate_update(story: &Story, attrs: &StoryAttrs) -> Result<(), CommandError> {
    let story_type = attrs.story_type.unwrap_or(story.story_type);
    if story_type == StoryType::Chore && attrs.current_state == Some(StoryState::Finished) {
        return Err(CommandError::Validation(
            "Chores can't be finished. Accept it instead.".into(),
        ));
    }
    Ok(())
}

/// `story 1686672` or `story 2`: select by tracker id, or by number from
/// the last search.
pub async fn select(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let nick = inv.nick();
    let arg = inv.required(1)?;

    let story = match bot.session(nick).resolve_story_arg(arg)? {
        StoryRef::Listed(story) => story,
        StoryRef::Remote(story_id) => {
            let tracker = bot.current_tracker(nick)?;
            let project = bot.current_project_name(nick);
            tracker
                .find_story(story_id)
                .await
                .map_err(|e| CommandError::from_tracker(e, project.as_deref()))?
        }
    };

    adopt(bot, nick, story.clone())?;
    bot.reply(&inv.message, &story.summary());
    Ok(())
}

/// Bare `story`: the story anyone last mentioned, else the sender's own.
pub async fn last_mentioned(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let nick = inv.nick();
    let story = match bot.context.last_story() {
        Some(story) => story.clone(),
        None => bot
            .session(nick)
            .current_story()
            .cloned()
            .ok_or(CommandError::NothingToReferTo)?,
    };

    if bot.session(nick).current_story_id() != Some(story.id) {
        adopt(bot, nick, story.clone())?;
    }
    bot.reply(&inv.message, &story.summary());
    Ok(())
}

/// `new bug i like fish`: create a story in the current project and select it.
pub async fn create(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let nick = inv.nick();
    let story_type: StoryType = inv.required(1)?.parse()?;
    let name = inv.required(2)?;

    let tracker = bot.current_tracker(nick)?;
    let attrs = StoryAttrs {
        name: Some(name.to_owned()),
        story_type: Some(story_type),
        ..StoryAttrs::default()
    };
    let story = tracker.create_story(&attrs).await?;
    tracing::info!(nick, story_id = story.id, "created story");

    adopt(bot, nick, story.clone())?;
    let reply = match &story.url {
        Some(url) => format!("Created {} {url}", story.summary()),
        None => format!("Created {}", story.summary()),
    };
    bot.reply(&inv.message, &reply);
    Ok(())
}

/// `update state accepted`: change one field of the current story.
pub async fn update_field(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let field: StoryField = inv.required(1)?.parse()?;
    let attrs = field.attrs(inv.required(2)?)?;
    apply_update(bot, inv, attrs).await
}

/// `start`, `finish`, `deliver`, `accept`, `reject`.
pub async fn move_state(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let state = match inv.required(1)? {
        "start" => StoryState::Started,
        "finish" => StoryState::Finished,
        "deliver" => StoryState::Delivered,
        "accept" => StoryState::Accepted,
        "reject" => StoryState::Rejected,
        other => {
            return Err(color_eyre::eyre::eyre!("no state shortcut {other:?}").into());
        }
    };
    let attrs = StoryAttrs {
        current_state: Some(state),
        ..StoryAttrs::default()
    };
    apply_update(bot, inv, attrs).await
}

async fn apply_update(bot: &mut Bot, inv: &Invocation, attrs: StoryAttrs) -> CommandResult {
    let nick = inv.nick();
    let story = current_story(bot, nick)?;
    validate_update(&story, &attrs)?;

    let tracker = bot.current_tracker(nick)?;
    let project = bot.current_project_name(nick);
    let updated = tracker
        .update_story(story.id, &attrs)
        .await
        .map_err(|e| CommandError::from_tracker(e, project.as_deref()))?;
    tracing::info!(nick, story_id = updated.id, "updated story");

    adopt(bot, nick, updated.clone())?;
    bot.reply(&inv.message, &format!("Updated {}", updated.summary()));
    Ok(())
}

/// `note looks good`: comment on the current story.
pub async fn add_note(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let nick = inv.nick();
    let text = inv.required(1)?;
    let story = current_story(bot, nick)?;

    let tracker = bot.current_tracker(nick)?;
    let project = bot.current_project_name(nick);
    tracker
        .create_note(story.id, text)
        .await
        .map_err(|e| CommandError::from_tracker(e, project.as_deref()))?;

    bot.context.mention_story(&story);
    bot.reply(&inv.message, &format!("Noted on story {}.", story.id));
    Ok(())
}

fn current_story(bot: &mut Bot, nick: &str) -> Result<Story, CommandError> {
    bot.session(nick)
        .current_story()
        .cloned()
        .ok_or_else(|| CommandError::unconfigured("Pick a story first with `story <id>`."))
}

/// Make `story` the sender's current story and the last mentioned one.
fn adopt(bot: &mut Bot, nick: &str, story: Story) -> CommandResult {
    bot.context.mention_story(&story);
    bot.session(nick).select_story(story);
    bot.save(nick)
}
