//! Ordered regex command table.
//!
//! Every incoming message is matched in full against every registered
//! pattern, in registration order. All matching entries fire. A handler that
//! returns an error or panics is logged and the remaining entries still run.

use crate::bot::Bot;
use crate::channel::{Channel, IncomingMessage};
use crate::error::{CommandError, CommandResult};
use futures::FutureExt;
use futures::future::BoxFuture;
use regex::Regex;
use std::panic::AssertUnwindSafe;

/// A command handler. Register async fns through a closure:
/// `|bot, inv| Box::pin(story::select(bot, inv))`.
pub type Handler = for<'a> fn(&'a mut Bot, &'a Invocation) -> BoxFuture<'a, CommandResult>;

/// A whole-message matcher.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    /// `botnick, w1 w2 ...` with flexible whitespace between tokens.
    pub fn addressed(bot_nick: &str, tokens: &[&str]) -> Result<Self, regex::Error> {
        Self::raw(&format!(
            r"^{},\s+{}$",
            regex::escape(bot_nick),
            tokens.join(r"\s+")
        ))
    }

    /// `.w1w2...` with optional whitespace between tokens.
    pub fn short(tokens: &[&str]) -> Result<Self, regex::Error> {
        Self::raw(&format!(r"^\.{}$", tokens.join(r"\s*")))
    }

    /// A ready-made expression. Callers anchor it themselves.
    pub fn raw(expr: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(expr)?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Capture groups 1.. when the pattern matches all of `text`.
    pub fn captures(&self, text: &str) -> Option<Vec<Option<String>>> {
        let caps = self.regex.captures(text)?;
        let whole = caps.get(0)?;
        if whole.start() != 0 || whole.end() != text.len() {
            return None;
        }
        Some(
            caps.iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_owned()))
                .collect(),
        )
    }
}

/// One matched command: the message plus its capture groups.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub message: IncomingMessage,
    captures: Vec<Option<String>>,
}

impl Invocation {
    pub fn new(message: IncomingMessage, captures: Vec<Option<String>>) -> Self {
        Self { message, captures }
    }

    /// Who sent the command.
    pub fn nick(&self) -> &str {
        &self.message.from
    }

    /// Capture group `group` (1-based, like the regex), trimmed. `None` if the
    /// group did not take part in the match.
    pub fn arg(&self, group: usize) -> Option<&str> {
        let index = group.checked_sub(1)?;
        self.captures
            .get(index)?
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Like [`Invocation::arg`] but a missing group is a handler bug.
    pub fn required(&self, group: usize) -> Result<&str, CommandError> {
        self.arg(group).ok_or_else(|| {
            color_eyre::eyre::eyre!("pattern has no capture group {group}").into()
        })
    }
}

struct Entry {
    pattern: Pattern,
    handler: Handler,
}

/// Ordered list of (pattern, handler) pairs. Duplicate patterns are kept.
#[derive(Default)]
pub struct CommandTable {
    entries: Vec<Entry>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pattern: Pattern, handler: Handler) {
        self.entries.push(Entry { pattern, handler });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every matching handler for `msg`, in order.
    ///
    /// Replies a handler queued are sent after it finishes, including when it
    /// failed. User-facing errors are sent as a reply; internal errors and
    /// panics are only logged. Nothing escapes this call.
    pub async fn dispatch(&self, bot: &mut Bot, channel: &dyn Channel, msg: &IncomingMessage) {
        let text = msg.text.trim();
        for entry in &self.entries {
            let Some(captures) = entry.pattern.captures(text) else {
                continue;
            };
            tracing::info!(
                nick = %msg.from,
                channel = %msg.channel,
                pattern = entry.pattern.as_str(),
                "command matched"
            );

            let invocation = Invocation::new(msg.clone(), captures);
            let outcome = AssertUnwindSafe((entry.handler)(bot, &invocation))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.is_user_facing() => {
                    tracing::info!(nick = %msg.from, "command refused: {err}");
                    bot.reply(msg, &err.to_string());
                }
                Ok(Err(err)) => {
                    tracing::error!(
                        nick = %msg.from,
                        pattern = entry.pattern.as_str(),
                        "command failed: {err:?}"
                    );
                }
                Err(panic) => {
                    tracing::error!(
                        nick = %msg.from,
                        pattern = entry.pattern.as_str(),
                        "command panicked: {}",
                        panic_message(&*panic)
                    );
                }
            }

            for out in bot.take_outbox() {
                if let Err(e) = channel.send(&out).await {
                    tracing::warn!(channel = channel.name(), "send failed: {e}");
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addressed_pattern_requires_nick_and_whole_message() {
        let p = Pattern::addressed("trakbot", &["project", r"(\d+)"]).unwrap();
        assert_eq!(p.as_str(), r"^trakbot,\s+project\s+(\d+)$");
        assert_eq!(
            p.captures("trakbot,   project 42"),
            Some(vec![Some("42".to_owned())])
        );
        assert_eq!(p.captures("trakbot, project 42 please"), None);
        assert_eq!(p.captures("hey trakbot, project 42"), None);
        assert_eq!(p.captures("trakbot,project 42"), None);
    }

    #[test]
    fn nick_is_escaped() {
        let p = Pattern::addressed("trak.bot", &["help"]).unwrap();
        assert!(p.captures("trak.bot, help").is_some());
        assert!(p.captures("trakXbot, help").is_none());
    }

    #[test]
    fn short_pattern_allows_optional_whitespace() {
        let p = Pattern::short(&["p", r"(\d+)"]).unwrap();
        assert_eq!(p.as_str(), r"^\.p\s*(\d+)$");
        assert_eq!(p.captures(".p42"), Some(vec![Some("42".to_owned())]));
        assert_eq!(p.captures(".p 42"), Some(vec![Some("42".to_owned())]));
        assert_eq!(p.captures("x.p 42"), None);
    }

    #[test]
    fn raw_pattern_still_matches_whole_message_only() {
        let p = Pattern::raw("help").unwrap();
        assert!(p.captures("help").is_some());
        assert!(p.captures("help me").is_none());
    }

    #[test]
    fn optional_groups_that_did_not_match_are_none() {
        let p = Pattern::short(&["s", r"(\d+)?"]).unwrap();
        assert_eq!(p.captures(".s"), Some(vec![None]));
        assert_eq!(p.captures(".s 7"), Some(vec![Some("7".to_owned())]));
    }

    #[test]
    fn invocation_args_are_one_based_and_trimmed() {
        let inv = Invocation::new(
            IncomingMessage::new("dug", "#t", "x"),
            vec![Some(" 42 ".into()), None, Some("   ".into())],
        );
        assert_eq!(inv.nick(), "dug");
        assert_eq!(inv.arg(0), None);
        assert_eq!(inv.arg(1), Some("42"));
        assert_eq!(inv.arg(2), None);
        assert_eq!(inv.arg(3), None);
        assert!(inv.required(4).is_err());
    }
}
