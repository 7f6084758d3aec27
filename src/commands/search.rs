//! Story searches and bulk delivery.

use super::numbered;
use crate::bot::Bot;
use crate::dispatch::Invocation;
use crate::error::{CommandError, CommandResult};
use crate::tracker::{StoryFilter, StoryState};

/// `find <text>`
pub async fn find(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let text = inv.required(1)?;
    search(bot, inv, StoryFilter::text(text)).await
}

/// `finished`
pub async fn finished(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    search(bot, inv, StoryFilter::state(StoryState::Finished)).await
}

/// `mine`: stories owned by the sender's initials.
pub async fn mine(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let initials = bot.session(inv.nick()).initials.clone().ok_or_else(|| {
        CommandError::unconfigured("Tell me your initials first with `initials <XY>`.")
    })?;
    search(bot, inv, StoryFilter::mywork(initials)).await
}

/// Run a search in the current project and remember the results.
///
/// Long result lists in a channel get a count and a pointer to `list`
/// instead of the listing itself. Direct messages always get the listing.
async fn search(bot: &mut Bot, inv: &Invocation, filter: StoryFilter) -> CommandResult {
    let nick = inv.nick();
    let tracker = bot.current_tracker(nick)?;
    let project = bot.current_project_name(nick);
    let stories = tracker
        .list_stories(&filter)
        .await
        .map_err(|e| CommandError::from_tracker(e, project.as_deref()))?;
    tracing::debug!(nick, query = %filter.to_query(), count = stories.len(), "search");

    let count = stories.len();
    let reply = if count == 0 {
        "No stories found.".to_owned()
    } else if count > bot.config().list_threshold && !inv.message.is_private(bot.nick()) {
        format!("I found {count} stories. Say `list` to see them all.")
    } else {
        numbered(&stories)
    };

    bot.session(nick).record_search(stories);
    bot.reply(&inv.message, &reply);
    Ok(())
}

/// `list`: enumerate the last search results, however many there are.
pub async fn list(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let reply = match bot.session(inv.nick()).last_search_results() {
        None => return Err(CommandError::NoPriorSearch),
        Some([]) => "The last search found nothing.".to_owned(),
        Some(stories) => numbered(stories),
    };
    bot.reply(&inv.message, &reply);
    Ok(())
}

/// `deliver finished`: move every finished story in the current project to
/// delivered.
pub async fn deliver_finished(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let nick = inv.nick();
    let tracker = bot.current_tracker(nick)?;
    let project = bot.current_project_name(nick);
    let delivered = tracker
        .deliver_finished_stories()
        .await
        .map_err(|e| CommandError::from_tracker(e, project.as_deref()))?;
    tracing::info!(nick, count = delivered.len(), "delivered finished stories");

    if delivered.is_empty() {
        bot.reply(&inv.message, "Nothing to deliver.");
        return Ok(());
    }
    let noun = if delivered.len() == 1 { "story" } else { "stories" };
    bot.reply(
        &inv.message,
        &format!("/me delivered {} {noun}:", delivered.len()),
    );
    bot.reply(&inv.message, &numbered(&delivered));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{IncomingMessage, Outbound};
    use crate::config::BotConfig;
    use crate::tracker::{MockTracker, Project, Story, StoryType, Tracker, TrackerFactory};
    use std::sync::{Arc, Mutex};

    struct OneShotFactory(Mutex<Option<MockTracker>>);

    impl TrackerFactory for OneShotFactory {
        fn connect(&self, _project_id: u64, _token: &str) -> Arc<dyn Tracker> {
            Arc::new(self.0.lock().unwrap().take().expect("connected twice"))
        }
    }

    fn story(id: u64) -> Story {
        Story {
            id,
            project_id: 2,
            name: format!("story {id}"),
            description: None,
            story_type: StoryType::Feature,
            current_state: StoryState::Finished,
            estimate: None,
            labels: vec![],
            url: None,
        }
    }

    fn bot_with(mock: MockTracker, dir: &std::path::Path) -> Bot {
        let config = BotConfig {
            storage_dir: dir.to_path_buf(),
            ..BotConfig::default()
        };
        let mut bot = Bot::new(config, Arc::new(OneShotFactory(Mutex::new(Some(mock)))));
        let session = bot.session("dug");
        session.token = Some("fish".into());
        session.select_project(Project {
            id: 2,
            name: "zbot".into(),
            iteration_length: None,
            week_start_day: None,
        });
        bot
    }

    fn invocation(channel: &str) -> Invocation {
        Invocation::new(IncomingMessage::new("dug", channel, "x"), vec![])
    }

    #[tokio::test]
    async fn finished_searches_by_state_and_records_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockTracker::new();
        mock.expect_list_stories()
            .withf(|filter| filter.to_query() == "state:finished")
            .times(1)
            .returning(|_| Ok(vec![story(1001), story(1002)]));
        let mut bot = bot_with(mock, dir.path());

        finished(&mut bot, &invocation("#traktest")).await.unwrap();

        assert_eq!(bot.session("dug").last_search_results().unwrap().len(), 2);
        assert_eq!(
            bot.take_outbox(),
            vec![Outbound::reply(
                "#traktest",
                "1. Feature 1001: story 1001 (finished)\n2. Feature 1002: story 1002 (finished)"
            )]
        );
    }

    #[tokio::test]
    async fn mine_needs_initials() {
        let dir = tempfile::tempdir().unwrap();
        let mut bot = bot_with(MockTracker::new(), dir.path());
        let err = mine(&mut bot, &invocation("#traktest")).await.unwrap_err();
        assert!(matches!(err, CommandError::Unconfigured(_)));
    }

    #[tokio::test]
    async fn deliver_with_nothing_finished() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockTracker::new();
        mock.expect_deliver_finished_stories()
            .times(1)
            .returning(|| Ok(vec![]));
        let mut bot = bot_with(mock, dir.path());

        deliver_finished(&mut bot, &invocation("#traktest"))
            .await
            .unwrap();
        assert_eq!(
            bot.take_outbox(),
            vec![Outbound::reply("#traktest", "Nothing to deliver.")]
        );
    }

    #[tokio::test]
    async fn deliver_announces_as_action_then_lists() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockTracker::new();
        mock.expect_deliver_finished_stories()
            .returning(|| Ok(vec![story(1001)]));
        let mut bot = bot_with(mock, dir.path());

        deliver_finished(&mut bot, &invocation("#traktest"))
            .await
            .unwrap();
        let out = bot.take_outbox();
        assert_eq!(
            out[0],
            Outbound::Action {
                target: "#traktest".into(),
                text: "delivered 1 story:".into()
            }
        );
        assert_eq!(
            out[1],
            Outbound::reply("#traktest", "1. Feature 1001: story 1001 (finished)")
        );
    }

    #[tokio::test]
    async fn list_without_search() {
        let dir = tempfile::tempdir().unwrap();
        let mut bot = bot_with(MockTracker::new(), dir.path());
        assert!(matches!(
            list(&mut bot, &invocation("#traktest")).await,
            Err(CommandError::NoPriorSearch)
        ));
    }
}
