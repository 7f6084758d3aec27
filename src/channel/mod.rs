//! Chat transport abstraction (IRC today).

pub mod irc;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

/// A chat message delivered to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Nick of the sender.
    pub from: String,
    /// Channel the message was sent to, or the bot's own nick for a direct
    /// message.
    pub channel: String,
    pub text: String,
}

impl IncomingMessage {
    pub fn new(from: impl Into<String>, channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            channel: channel.into(),
            text: text.into(),
        }
    }

    /// Whether this was sent directly to `bot_nick` rather than to a channel.
    pub fn is_private(&self, bot_nick: &str) -> bool {
        self.channel.eq_ignore_ascii_case(bot_nick)
    }

    /// Where replies go: the sender for direct messages, else the channel.
    pub fn reply_target(&self, bot_nick: &str) -> &str {
        if self.is_private(bot_nick) {
            &self.from
        } else {
            &self.channel
        }
    }
}

/// Something for the transport to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message { target: String, text: String },
    /// An emote (`/me waves`).
    Action { target: String, text: String },
    Join { channel: String },
    Part { channel: String },
}

impl Outbound {
    /// A reply to `target`. Text starting with `/me ` becomes an action.
    pub fn reply(target: impl Into<String>, text: &str) -> Self {
        let target = target.into();
        match text.strip_prefix("/me ") {
            Some(action) => Self::Action {
                target,
                text: action.trim_start().to_owned(),
            },
            None => Self::Message {
                target,
                text: text.to_owned(),
            },
        }
    }
}

/// A chat transport.
///
/// `run` drives the receive loop, pushing messages into `tx` until `cancel`
/// fires or the connection ends. `send` may be called concurrently with it.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    async fn run(&self, tx: Sender<IncomingMessage>, cancel: CancellationToken);

    async fn send(&self, out: &Outbound) -> color_eyre::Result<()>;
}
