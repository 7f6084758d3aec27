//! The chat command vocabulary and its handlers.
//!
//! Each command is registered twice: addressed (`trakbot, story 42`) and short
//! (`.s 42`). Short forms that take free text require whitespace after the
//! sigil word so they never overlap a longer sigil word (`.f x` vs `.fin`).

pub mod account;
pub mod project;
pub mod search;
pub mod story;

use crate::dispatch::{CommandTable, Handler, Pattern};
use color_eyre::eyre::{Result, WrapErr};

pub const HELP: &str = "\
help (.?): this
token <token> (.token): teach me your Pivotal Tracker API token
initials <XY> (.i): your initials, for `mine`
new project <id> (.np): add a project without switching to it
project <id|name> (.p): set your current project
project (.p): the project last mentioned
projects (.ps): list your known projects
story <id|n> (.s): set your current story by id, or by number from the last search
story (.s): the story last mentioned
new <feature|bug|chore|release> <name> (.nf/.nb/.nc/.nr): create a story
update <field> <value> (.u): change name, description, type, state, estimate or labels
start, finish, deliver, accept, reject (.start ...): move the current story
note <text> (.c): comment on the current story
find <text> (.f): search stories
finished (.fin): finished stories
mine (.m): your stories
list (.l): show the last search results
deliver finished (.df): deliver every finished story
join #channel, part #channel";

/// A command in both spellings.
struct Command {
    addressed: &'static [&'static str],
    short: Option<&'static [&'static str]>,
    handler: Handler,
}

fn commands() -> Vec<Command> {
    vec![
        Command {
            addressed: &["help"],
            short: Some(&[r"\?"]),
            handler: |bot, inv| Box::pin(account::help(bot, inv)),
        },
        Command {
            addressed: &["token", r"(\S+)"],
            short: Some(&["token", r"\s(\S+)"]),
            handler: |bot, inv| Box::pin(account::set_token(bot, inv)),
        },
        Command {
            addressed: &["initials", r"(\w+)"],
            short: Some(&["i", r"\s(\w+)"]),
            handler: |bot, inv| Box::pin(account::set_initials(bot, inv)),
        },
        Command {
            addressed: &["project", r"#?(\d+)"],
            short: Some(&["p", r"#?(\d+)"]),
            handler: |bot, inv| Box::pin(project::select_by_id(bot, inv)),
        },
        Command {
            addressed: &["new", "project", r"#?(\d+)"],
            short: Some(&["np", r"#?(\d+)"]),
            handler: |bot, inv| Box::pin(project::add_known(bot, inv)),
        },
        Command {
            addressed: &["project", r"(.*[^\d#].*)"],
            short: Some(&["p", r"\s(.*[^\d#].*)"]),
            handler: |bot, inv| Box::pin(project::select_by_name(bot, inv)),
        },
        Command {
            addressed: &["project"],
            short: Some(&["p"]),
            handler: |bot, inv| Box::pin(project::last_mentioned(bot, inv)),
        },
        Command {
            addressed: &["projects"],
            short: Some(&["ps"]),
            handler: |bot, inv| Box::pin(project::list_known(bot, inv)),
        },
        Command {
            addressed: &["story", r"(#?\d+)"],
            short: Some(&["s", r"(#?\d+)"]),
            handler: |bot, inv| Box::pin(story::select(bot, inv)),
        },
        Command {
            addressed: &["story"],
            short: Some(&["s"]),
            handler: |bot, inv| Box::pin(story::last_mentioned(bot, inv)),
        },
        Command {
            addressed: &["new", r"(feature|bug|chore|release)", r"(.+)"],
            short: Some(&["n", r"([fbcr])", r"\s(.+)"]),
            handler: |bot, inv| Box::pin(story::create(bot, inv)),
        },
        Command {
            addressed: &["update", r"(\w+)", r"(.+)"],
            short: Some(&["u", r"\s(\w+)", r"\s(.+)"]),
            handler: |bot, inv| Box::pin(story::update_field(bot, inv)),
        },
        Command {
            addressed: &[r"(start|finish|deliver|accept|reject)"],
            short: Some(&[r"(start|finish|deliver|accept|reject)"]),
            handler: |bot, inv| Box::pin(story::move_state(bot, inv)),
        },
        Command {
            addressed: &["note", r"(.+)"],
            short: Some(&["c", r"\s(.+)"]),
            handler: |bot, inv| Box::pin(story::add_note(bot, inv)),
        },
        Command {
            addressed: &["find", r"(.+)"],
            short: Some(&["f", r"\s(.+)"]),
            handler: |bot, inv| Box::pin(search::find(bot, inv)),
        },
        Command {
            addressed: &["finished"],
            short: Some(&["fin"]),
            handler: |bot, inv| Box::pin(search::finished(bot, inv)),
        },
        Command {
            addressed: &["mine"],
            short: Some(&["m"]),
            handler: |bot, inv| Box::pin(search::mine(bot, inv)),
        },
        Command {
            addressed: &["list"],
            short: Some(&["l"]),
            handler: |bot, inv| Box::pin(search::list(bot, inv)),
        },
        Command {
            addressed: &["deliver", "finished"],
            short: Some(&["df"]),
            handler: |bot, inv| Box::pin(search::deliver_finished(bot, inv)),
        },
        Command {
            addressed: &["join", r"([#&]\S+)"],
            short: None,
            handler: |bot, inv| Box::pin(account::join(bot, inv)),
        },
        Command {
            addressed: &[r"(?:part|leave|exit)", r"([#&]\S+)"],
            short: None,
            handler: |bot, inv| Box::pin(account::part(bot, inv)),
        },
    ]
}

/// Build the full command table for a bot called `bot_nick`.
pub fn build_table(bot_nick: &str) -> Result<CommandTable> {
    let mut table = CommandTable::new();
    for command in commands() {
        let pattern = Pattern::addressed(bot_nick, command.addressed)
            .wrap_err_with(|| format!("bad command pattern {:?}", command.addressed))?;
        table.register(pattern, command.handler);
        if let Some(short) = command.short {
            let pattern = Pattern::short(short)
                .wrap_err_with(|| format!("bad command pattern {short:?}"))?;
            table.register(pattern, command.handler);
        }
    }
    Ok(table)
}

/// Numbered listing, one story per line.
pub(crate) fn numbered<'a>(stories: impl IntoIterator<Item = &'a crate::tracker::Story>) -> String {
    stories
        .into_iter()
        .enumerate()
        .map(|(i, story)| format!("{}. {}", i + 1, story.summary()))
        .collect::<Vec<_>>()
        .join("\n")
}
