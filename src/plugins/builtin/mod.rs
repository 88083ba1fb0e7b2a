//! Built-in plugins shipped with the bot

pub mod admin;
pub mod bot_logger;
pub mod build_command;
pub mod link_checker;
pub mod logs_command;
pub mod zendesk_links;

use tracing::debug;

use crate::application::errors::{BotError, PluginResult};
use crate::application::messaging::Connection;
use crate::domain::entities::CommandRequest;
use super::catalog::StaticCatalog;
use super::trait_def::FnFactory;

pub use admin::Admin;
pub use bot_logger::BotLogger;
pub use build_command::BuildCommand;
pub use link_checker::LinkChecker;
pub use logs_command::LogsCommand;
pub use zendesk_links::ZendeskLinks;

/// Add every built-in plugin to `catalog`
pub fn register_builtins(catalog: &StaticCatalog) -> PluginResult<()> {
    catalog.register(
        FnFactory::of::<Admin>(admin::NAME)
            .with_description(admin::DESCRIPTION),
    )?;
    catalog.register(
        FnFactory::of::<BotLogger>(bot_logger::NAME)
            .with_description(bot_logger::DESCRIPTION),
    )?;
    catalog.register(
        FnFactory::of::<LinkChecker>(link_checker::NAME)
            .with_description(link_checker::DESCRIPTION),
    )?;
    catalog.register(
        FnFactory::of::<ZendeskLinks>(zendesk_links::NAME)
            .with_description(zendesk_links::DESCRIPTION),
    )?;
    catalog.register(
        FnFactory::of::<LogsCommand>(logs_command::NAME)
            .with_description(logs_command::DESCRIPTION),
    )?;
    catalog.register(
        FnFactory::of::<BuildCommand>(build_command::NAME)
            .with_description(build_command::DESCRIPTION),
    )?;
    Ok(())
}

/// Catalog holding exactly the built-in plugins
pub fn builtin_catalog() -> PluginResult<StaticCatalog> {
    let catalog = StaticCatalog::new();
    register_builtins(&catalog)?;
    Ok(catalog)
}

/// Check `privilege` for the requester, replying with a denial if missing
pub async fn require_priv(bot: &Connection, req: &CommandRequest, privilege: &str) -> Result<bool, BotError> {
    if bot.service().principal_has(&req.user, privilege) {
        return Ok(true);
    }
    debug!(command = %req.verb, "{} lacks privilege {}", req.user, privilege);
    bot.reply(req, &format!("You need the {} privilege to do that.", privilege))
        .await?;
    Ok(false)
}

/// `a`, `a and b`, `a, b and c`; `nothing` when empty
pub fn natural_list<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => "nothing".to_string(),
        [only] => only.as_ref().to_string(),
        [init @ .., last] => {
            let init: Vec<&str> = init.iter().map(AsRef::as_ref).collect();
            format!("{} and {}", init.join(", "), last.as_ref())
        }
    }
}

/// Sorted, comma separated; `none` when empty
pub fn make_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut items: Vec<String> = items.into_iter().map(Into::into).collect();
    if items.is_empty() {
        return "none".to_string();
    }
    items.sort();
    items.join(", ")
}
