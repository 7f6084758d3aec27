//! IRC transport over a plain TCP connection (RFC 1459 line protocol).
//!
//! Registers with `NICK`/`USER`, answers `PING`, joins the configured
//! channels once the server has sent its MOTD, and turns `PRIVMSG` lines into
//! [`IncomingMessage`]s.

use super::{Channel, IncomingMessage, Outbound};
use crate::config::BotConfig;
use async_trait::async_trait;
use color_eyre::eyre::{Result, WrapErr};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

/// Payload bytes per line; keeps `PRIVMSG <target> :` plus payload well
/// under the protocol's 512-byte limit.
const MAX_PAYLOAD_BYTES: usize = 400;

/// How many `_` may be appended to the configured nick while it is taken.
const MAX_NICK_SUFFIX: usize = 3;

pub struct IrcChannel {
    nick: String,
    channels: Vec<String>,
    reader: Mutex<Option<BufReader<OwnedReadHalf>>>,
    writer: Mutex<OwnedWriteHalf>,
}

/// A parsed protocol line, borrowing from the raw text.
#[derive(Debug, PartialEq, Eq)]
pub struct IrcLine<'a> {
    pub prefix: Option<&'a str>,
    pub command: &'a str,
    pub params: Vec<&'a str>,
}

impl IrcLine<'_> {
    /// Nick part of a `nick!user@host` prefix.
    pub fn nick(&self) -> Option<&str> {
        self.prefix.map(|p| p.split('!').next().unwrap_or(p))
    }
}

/// Parse `[:prefix] COMMAND params... [:trailing]`.
pub fn parse_line(line: &str) -> Option<IrcLine<'_>> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (prefix, rest) = match line.strip_prefix(':') {
        Some(rest) => {
            let (prefix, rest) = rest.split_once(' ')?;
            (Some(prefix), rest)
        }
        None => (None, line),
    };

    let (head, trailing) = match rest.split_once(" :") {
        Some((head, trailing)) => (head, Some(trailing)),
        None => match rest.strip_prefix(':') {
            Some(trailing) => ("", Some(trailing)),
            None => (rest, None),
        },
    };

    let mut words = head.split(' ').filter(|w| !w.is_empty());
    let command = words.next()?;
    let mut params: Vec<&str> = words.collect();
    params.extend(trailing);

    Some(IrcLine {
        prefix,
        command,
        params,
    })
}

/// Turn a `PRIVMSG` into an incoming message. CTCP requests are ignored.
///
/// Direct messages to `current_nick` are reported as sent to `configured_nick`,
/// so the rest of the bot keeps one identity after a nick fallback.
fn to_incoming(
    line: &IrcLine<'_>,
    current_nick: &str,
    configured_nick: &str,
) -> Option<IncomingMessage> {
    if line.command != "PRIVMSG" {
        return None;
    }
    let [target, text] = line.params.as_slice() else {
        return None;
    };
    if text.starts_with('\u{1}') {
        return None;
    }
    let from = line.nick()?;
    let channel = if target.eq_ignore_ascii_case(current_nick) {
        configured_nick
    } else {
        *target
    };
    Some(IncomingMessage::new(from, channel, text.trim()))
}

/// Next nick to try after `current` was refused: one more trailing `_`, up
/// to [`MAX_NICK_SUFFIX`] of them.
fn next_nick(configured: &str, current: &str) -> Option<String> {
    (current.len() < configured.len() + MAX_NICK_SUFFIX).then(|| format!("{current}_"))
}

/// Render an outbound item as protocol lines. Multi-line text becomes one
/// `PRIVMSG` per line; long lines are split on character boundaries.
pub fn render(out: &Outbound) -> Vec<String> {
    match out {
        Outbound::Message { target, text } => payload_lines(text)
            .into_iter()
            .map(|chunk| format!("PRIVMSG {target} :{chunk}"))
            .collect(),
        Outbound::Action { target, text } => payload_lines(text)
            .into_iter()
            .map(|chunk| format!("PRIVMSG {target} :\u{1}ACTION {chunk}\u{1}"))
            .collect(),
        Outbound::Join { channel } => vec![format!("JOIN {channel}")],
        Outbound::Part { channel } => vec![format!("PART {channel}")],
    }
}

/// Break reply text into sendable payloads. A bare `\r` ends a line just
/// like `\n`, and NUL is dropped, so text from the tracker can never start a
/// new protocol line.
fn payload_lines(text: &str) -> Vec<String> {
    text.split(['\r', '\n'])
        .map(|l| l.replace('\0', ""))
        .filter(|l| !l.trim().is_empty())
        .flat_map(|l| split_line(&l, MAX_PAYLOAD_BYTES))
        .collect()
}

/// Split `text` into pieces of at most `limit` bytes without cutting a
/// character in half.
fn split_line(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > limit {
        let mut cut = limit;
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let (head, tail) = rest.split_at(cut.max(1));
        chunks.push(head.to_owned());
        rest = tail;
    }
    chunks.push(rest.to_owned());
    chunks
}

impl IrcChannel {
    /// Connect and register. Failing here is fatal to the daemon.
    pub async fn connect(config: &BotConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.server, config.port);
        let stream = TcpStream::connect(&addr)
            .await
            .wrap_err_with(|| format!("failed to connect to {addr}"))?;
        let (read, write) = stream.into_split();
        tracing::info!(%addr, nick = %config.nick, "connected to IRC server");

        let channel = Self {
            nick: config.nick.clone(),
            channels: config.channels.clone(),
            reader: Mutex::new(Some(BufReader::new(read))),
            writer: Mutex::new(write),
        };
        channel.write_line(&format!("NICK {}", config.nick)).await?;
        channel
            .write_line(&format!("USER {} 0 * :{}", config.nick, config.full_name))
            .await?;
        Ok(channel)
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        tracing::trace!(line, "irc >>");
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;
        Ok(())
    }

    /// Say goodbye to the server.
    pub async fn quit(&self, reason: &str) -> Result<()> {
        self.write_line(&format!("QUIT :{reason}")).await
    }

    async fn join_configured(&self) {
        for channel in &self.channels {
            tracing::info!(%channel, "joining");
            if let Err(e) = self.write_line(&format!("JOIN {channel}")).await {
                tracing::warn!(%channel, "join failed: {e}");
            }
        }
    }
}

#[async_trait]
impl Channel for IrcChannel {
    fn name(&self) -> &str {
        "irc"
    }

    async fn run(&self, tx: Sender<IncomingMessage>, cancel: CancellationToken) {
        let Some(mut reader) = self.reader.lock().await.take() else {
            tracing::warn!("IRC receive loop already running");
            return;
        };

        let mut nick = self.nick.clone();
        let mut registered = false;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = tokio::select! {
                _ = cancel.cancelled() => break,
                result = reader.read_until(b'\n', &mut buf) => result,
            };
            match read {
                Ok(0) => {
                    tracing::warn!("IRC server closed the connection");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("IRC read failed: {e}");
                    break;
                }
            }

            // IRC mandates no encoding; undecodable bytes become U+FFFD.
            let text = String::from_utf8_lossy(&buf);
            let Some(line) = parse_line(&text) else {
                continue;
            };
            tracing::trace!(line = text.trim_end(), "irc <<");

            match line.command {
                "PING" => {
                    let token = line.params.first().copied().unwrap_or_default();
                    if let Err(e) = self.write_line(&format!("PONG :{token}")).await {
                        tracing::warn!("PONG failed: {e}");
                    }
                }
                "001" => {
                    registered = true;
                    tracing::info!(%nick, "registered");
                }
                // End of MOTD, or no MOTD at all.
                "376" | "422" => self.join_configured().await,
                "433" if !registered => match next_nick(&self.nick, &nick) {
                    Some(next) => {
                        tracing::warn!(taken = %nick, trying = %next, "nick already in use");
                        nick = next;
                        if let Err(e) = self.write_line(&format!("NICK {nick}")).await {
                            tracing::warn!("NICK failed: {e}");
                        }
                    }
                    None => tracing::error!(%nick, "no free nick left to try"),
                },
                "ERROR" => {
                    tracing::warn!("IRC server error: {}", line.params.join(" "));
                    break;
                }
                "PRIVMSG" => {
                    if let Some(message) = to_incoming(&line, &nick, &self.nick)
                        && tx.send(message).await.is_err()
                    {
                        // Receiver dropped; the daemon is shutting down.
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    async fn send(&self, out: &Outbound) -> Result<()> {
        for line in render(out) {
            self.write_line(&line).await?;
        }
        Ok(())
    }
}
