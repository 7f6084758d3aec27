//! Who you are to the tracker, plus channel control.

use super::HELP;
use crate::bot::Bot;
use crate::channel::Outbound;
use crate::dispatch::Invocation;
use crate::error::CommandResult;

pub async fn help(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    bot.reply_private(&inv.message, HELP);
    Ok(())
}

/// Store the sender's API token. Cached tracker handles built with the old
/// token are dropped.
pub async fn set_token(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let nick = inv.nick();
    let token = inv.required(1)?;

    bot.session(nick).token = Some(token.to_owned());
    bot.trackers.forget(nick);
    bot.save(nick)?;

    bot.reply(&inv.message, &format!("Got it, {nick}."));
    Ok(())
}

pub async fn set_initials(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let nick = inv.nick();
    let initials = inv.required(1)?.to_uppercase();

    bot.session(nick).initials = Some(initials.clone());
    bot.save(nick)?;

    bot.reply(&inv.message, &format!("Ok, {nick} is {initials}."));
    Ok(())
}

pub async fn join(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let channel = inv.required(1)?.to_owned();
    tracing::info!(nick = %inv.nick(), %channel, "join requested");
    bot.push(Outbound::Join { channel });
    bot.reply(&inv.message, "Ok.");
    Ok(())
}

pub async fn part(bot: &mut Bot, inv: &Invocation) -> CommandResult {
    let channel = inv.required(1)?.to_owned();
    tracing::info!(nick = %inv.nick(), %channel, "part requested");
    // Reply before leaving, or the reply lands in a channel we just left.
    bot.reply(&inv.message, "Ok.");
    bot.push(Outbound::Part { channel });
    Ok(())
}
