//! Project selection.

use crate::bot::Bot;
use crate::dispatch::Invocation;
use crate::error::{CommandError, CommandResult};
use crate::tracker::{Project, TrackerError};

/// `project 42`: fetch the project and make it current.
pub async fn select_by_id(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let nick = inv.nick();
    let project_id = project_id(inv.required(1)?)?;

    let tracker = bot.tracker_for(nick, project_id)?;
    let project = tracker
        .fetch_project()
        .await
        .map_err(|e| CommandError::from_tracker(e, None))?;

    adopt(bot, nick, project.clone())?;
    bot.reply(&inv.message, &format!("Current project: {}", project.name));
    Ok(())
}

/// `new project 42`: add a project to the sender's known projects, for
/// `projects` and fuzzy selection, without switching to it.
pub async fn add_known(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let nick = inv.nick();
    let project_id = project_id(inv.required(1)?)?;

    let tracker = bot.tracker_for(nick, project_id)?;
    let project = tracker
        .fetch_project()
        .await
        .map_err(|e| CommandError::from_tracker(e, None))?;

    bot.session(nick).remember_project(project.id);
    bot.save(nick)?;
    bot.reply(&inv.message, &format!("Added project: {}", project.name));
    Ok(())
}

/// `project alpha`: pick among the sender's known projects by a
/// case-insensitive substring of the name. More than one match selects
/// nothing and lists the candidates.
pub async fn select_by_name(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let nick = inv.nick();
    let query = inv.required(1)?;
    let needle = query.to_lowercase();

    let known: Vec<u64> = bot.session(nick).known_projects().iter().copied().collect();
    if known.is_empty() {
        return Err(CommandError::unconfigured(
            "I don't know any of your projects yet. Pick one by id first with `project <id>`.",
        ));
    }

    let mut matches = Vec::new();
    for project in fetch_all(bot, nick, &known).await? {
        if project.name.to_lowercase().contains(&needle) {
            matches.push(project);
        }
    }

    match matches.len() {
        0 => Err(CommandError::not_found(
            format!("a project matching {query:?}"),
            None,
        )),
        1 => {
            let project = matches.remove(0);
            let name = project.name.clone();
            adopt(bot, nick, project)?;
            bot.reply(&inv.message, &format!("Current project: {name}"));
            Ok(())
        }
        n => {
            let candidates: Vec<String> = matches
                .iter()
                .map(|p| format!("{}: {}", p.id, p.name))
                .collect();
            bot.reply(
                &inv.message,
                &format!(
                    "{query:?} matches {n} projects. Which one?\n{}",
                    candidates.join("\n")
                ),
            );
            Ok(())
        }
    }
}

/// Bare `project`: the project anyone last mentioned, else the sender's own.
pub async fn last_mentioned(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let nick = inv.nick();
    let project = match bot.context.last_project() {
        Some(project) => project.clone(),
        None => bot
            .session(nick)
            .current_project()
            .cloned()
            .ok_or(CommandError::NothingToReferTo)?,
    };

    // Without a token the sender couldn't use it as their current project.
    if bot.token_for(nick).is_some() && bot.session(nick).current_project_id() != Some(project.id)
    {
        adopt(bot, nick, project.clone())?;
    }
    bot.reply(
        &inv.message,
        &format!("Current project: {} ({})", project.name, project.id),
    );
    Ok(())
}

/// `projects`: every project the sender has selected before.
pub async fn list_known(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let nick = inv.nick();
    let known: Vec<u64> = bot.session(nick).known_projects().iter().copied().collect();
    if known.is_empty() {
        bot.reply(&inv.message, "No known projects yet.");
        return Ok(());
    }

    let lines: Vec<String> = fetch_all(bot, nick, &known)
        .await?
        .iter()
        .map(|p| format!("{}: {}", p.id, p.name))
        .collect();
    bot.reply(&inv.message, &lines.join("\n"));
    Ok(())
}

fn project_id(arg: &str) -> Result<u64, CommandError> {
    let arg = arg.trim_start_matches('#');
    arg.parse()
        .map_err(|_| CommandError::Validation(format!("{arg:?} is not a project id.")))
}

/// Fetch each project through the sender's cached handles. Projects that
/// have gone missing are skipped.
async fn fetch_all(bot: &mut Bot, nick: &str, ids: &[u64]) -> Result<Vec<Project>, CommandError> {
    let mut projects = Vec::with_capacity(ids.len());
    for &id in ids {
        let tracker = bot.tracker_for(nick, id)?;
        match tracker.fetch_project().await {
            Ok(project) => projects.push(project),
            Err(TrackerError::NotFound(_)) => {
                tracing::warn!(nick, project_id = id, "known project no longer exists");
            }
            Err(e) => return Err(CommandError::from_tracker(e, None)),
        }
    }
    Ok(projects)
}

/// Make `project` the sender's current project and the last mentioned one.
fn adopt(bot: &mut Bot, nick: &str, project: Project) -> CommandResult {
    bot.context.mention_project(&project);
    bot.session(nick).select_project(project);
    bot.save(nick)
}
