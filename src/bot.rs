//! Mutable state handed to every command handler.

use crate::channel::{IncomingMessage, Outbound};
use crate::config::BotConfig;
use crate::context::ConversationContext;
use crate::error::CommandError;
use crate::session::Session;
use crate::session::store::SessionStore;
use crate::tracker::cache::TrackerCache;
use crate::tracker::{Tracker, TrackerFactory};
use std::sync::Arc;

/// Sessions, tracker handles, the shared context and pending replies.
///
/// Handlers get `&mut Bot` one at a time, so none of this needs locking.
/// Fields are public so a handler can borrow the session store and the
/// tracker cache at the same time.
pub struct Bot {
    config: BotConfig,
    pub sessions: SessionStore,
    pub trackers: TrackerCache,
    pub context: ConversationContext,
    outbox: Vec<Outbound>,
}

impl Bot {
    pub fn new(config: BotConfig, factory: Arc<dyn TrackerFactory>) -> Self {
        let sessions = SessionStore::new(config.storage_dir.clone());
        Self {
            config,
            sessions,
            trackers: TrackerCache::new(factory),
            context: ConversationContext::default(),
            outbox: Vec::new(),
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn nick(&self) -> &str {
        &self.config.nick
    }

    /// The session for `nick`, loaded or created on first use.
    pub fn session(&mut self, nick: &str) -> &mut Session {
        self.sessions.for_nick(nick)
    }

    /// Persist `nick`'s session.
    pub fn save(&self, nick: &str) -> Result<(), CommandError> {
        self.sessions.save(nick)?;
        Ok(())
    }

    /// Queue a reply where `msg` came from: the channel, or the sender for a
    /// direct message. Text starting with `/me ` is sent as an action.
    pub fn reply(&mut self, msg: &IncomingMessage, text: &str) {
        let target = msg.reply_target(&self.config.nick).to_owned();
        self.outbox.push(Outbound::reply(target, text));
    }

    /// Queue a reply straight to the sender, whatever channel `msg` was in.
    pub fn reply_private(&mut self, msg: &IncomingMessage, text: &str) {
        self.outbox.push(Outbound::reply(msg.from.clone(), text));
    }

    pub fn push(&mut self, out: Outbound) {
        self.outbox.push(out);
    }

    /// Drain everything queued since the last call.
    pub fn take_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    /// The token `nick` talks to the tracker with: their own, else the
    /// configured default.
    pub fn token_for(&mut self, nick: &str) -> Option<String> {
        let own = self.sessions.for_nick(nick).token.clone();
        own.or_else(|| self.config.default_token.clone())
    }

    pub fn require_token(&mut self, nick: &str) -> Result<String, CommandError> {
        self.token_for(nick).ok_or_else(|| {
            CommandError::unconfigured(format!(
                "I don't have a tracker token for {nick}. Set one with `token <token>`."
            ))
        })
    }

    /// Tracker handle for `nick` on `project_id`.
    pub fn tracker_for(
        &mut self,
        nick: &str,
        project_id: u64,
    ) -> Result<Arc<dyn Tracker>, CommandError> {
        let token = self.require_token(nick)?;
        Ok(self.trackers.tracker_for(nick, project_id, &token))
    }

    /// Tracker handle for `nick`'s current project.
    pub fn current_tracker(&mut self, nick: &str) -> Result<Arc<dyn Tracker>, CommandError> {
        let project_id = self
            .sessions
            .for_nick(nick)
            .current_project_id()
            .ok_or_else(|| {
                CommandError::unconfigured("Pick a project first with `project <id>`.")
            })?;
        self.tracker_for(nick, project_id)
    }

    /// Name of `nick`'s current project, for not-found guidance.
    pub fn current_project_name(&mut self, nick: &str) -> Option<String> {
        self.sessions
            .for_nick(nick)
            .current_project()
            .map(|p| p.name.clone())
    }
}
