//! Admin plugin - enable, disable and reload plugins, manage privileges

use async_trait::async_trait;

use crate::application::errors::{BotError, PluginError, PluginResult};
use crate::application::messaging::Connection;
use crate::domain::entities::CommandRequest;
use crate::plugins::registry::EnableOutcome;
use crate::plugins::trait_def::BotPlugin;
use super::{make_list, require_priv};

pub const NAME: &str = "Admin";
pub const DESCRIPTION: &str = "Plugin management and privilege administration";

/// Privilege needed for everything that changes bot state
pub const ADMIN_PRIV: &str = "admin";

const COMMANDS: &[&str] = &[
    "modules",
    "modenable",
    "moddisable",
    "modreload",
    "grant",
    "revoke",
    "whohas",
    "savestate",
];

#[derive(Debug, Default)]
pub struct Admin;

impl Admin {
    async fn modules(&self, bot: &Connection, req: &CommandRequest) -> Result<(), BotError> {
        if !req.args.is_empty() {
            return bot.reply(req, "usage: modules").await;
        }

        let registry = bot.service().registry();
        let loaded = registry.list_enabled();
        let missing = registry.list_missing();
        let available: Vec<String> = registry
            .list_available()
            .into_iter()
            .map(|info| info.name)
            .filter(|name| !loaded.contains(name) && !missing.contains(name))
            .collect();

        let mut output = vec![format!("loaded modules: {}", make_list(loaded))];
        if !missing.is_empty() {
            output.push(format!("modules enabled but not found: {}", make_list(missing)));
        }
        output.push(format!("other available modules: {}", make_list(available)));
        bot.reply(req, &output.join("\n")).await
    }

    async fn modenable(&self, bot: &Connection, req: &CommandRequest) -> Result<(), BotError> {
        if req.args.is_empty() {
            return bot.reply(req, "usage: modenable [modulenames]").await;
        }
        for name in &req.args {
            let output = match bot.service().registry().enable_by_name(name) {
                Ok(EnableOutcome::Enabled) | Ok(EnableOutcome::AlreadyEnabled) => {
                    format!("Module {} loaded.", name)
                }
                Ok(EnableOutcome::Pending) => {
                    format!("Module {} marked for loading once it is found.", name)
                }
                Err(e) => format!("Problem loading {}: {}", name, e),
            };
            bot.reply(req, &output).await?;
        }
        Ok(())
    }

    async fn moddisable(&self, bot: &Connection, req: &CommandRequest) -> Result<(), BotError> {
        if req.args.is_empty() {
            return bot.reply(req, "usage: moddisable [modulenames]").await;
        }
        for name in &req.args {
            let output = if bot.service().registry().disable_by_name(name) {
                format!("Module {} disabled.", name)
            } else {
                format!("Module {} is not loaded.", name)
            };
            bot.reply(req, &output).await?;
        }
        Ok(())
    }

    async fn modreload(&self, bot: &Connection, req: &CommandRequest) -> Result<(), BotError> {
        if req.args.is_empty() {
            return bot.reply(req, "usage: modreload [modulenames]").await;
        }
        for name in &req.args {
            let output = match bot.service().registry().reload(name) {
                Ok(()) => format!("Module {} reloaded.", name),
                Err(PluginError::NotEnabled(_)) => format!("Module {} is not loaded.", name),
                Err(e) => format!("Problem reloading {}: {}", name, e),
            };
            bot.reply(req, &output).await?;
        }
        Ok(())
    }

    async fn grant(&self, bot: &Connection, req: &CommandRequest) -> Result<(), BotError> {
        let [mask, privilege] = req.args.as_slice() else {
            return bot.reply(req, "usage: grant <mask> <privilege>").await;
        };
        let output = if bot.service().grant(mask, privilege) {
            format!("Granted {} to {}.", privilege, mask)
        } else {
            format!("{} already has {}.", mask, privilege)
        };
        bot.reply(req, &output).await
    }

    async fn revoke(&self, bot: &Connection, req: &CommandRequest) -> Result<(), BotError> {
        let [mask, privilege] = req.args.as_slice() else {
            return bot.reply(req, "usage: revoke <mask> <privilege>").await;
        };
        let output = if bot.service().revoke(mask, privilege) {
            format!("Revoked {} from {}.", privilege, mask)
        } else {
            format!("{} does not have {}.", mask, privilege)
        };
        bot.reply(req, &output).await
    }

    async fn whohas(&self, bot: &Connection, req: &CommandRequest) -> Result<(), BotError> {
        let [privilege] = req.args.as_slice() else {
            return bot.reply(req, "usage: whohas <privilege>").await;
        };
        let holders = bot.service().holders(privilege);
        bot.reply(req, &format!("Holders of {}: {}", privilege, make_list(holders)))
            .await
    }

    async fn savestate(&self, bot: &Connection, req: &CommandRequest) -> Result<(), BotError> {
        match bot.service().save().await {
            Ok(()) => bot.reply(req, "State saved.").await,
            Err(e) => {
                bot.reply(req, &format!("Could not save state: {}", e)).await?;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl BotPlugin for Admin {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> Option<&str> {
        Some(DESCRIPTION)
    }

    fn implemented_commands(&self) -> PluginResult<Vec<String>> {
        Ok(COMMANDS.iter().map(|c| c.to_string()).collect())
    }

    async fn on_command(&self, bot: &Connection, req: &CommandRequest) -> Result<(), BotError> {
        let open = matches!(req.verb.as_str(), "modules" | "whohas");
        if !open && !require_priv(bot, req, ADMIN_PRIV).await? {
            return Ok(());
        }

        match req.verb.as_str() {
            "modules" => self.modules(bot, req).await,
            "modenable" => self.modenable(bot, req).await,
            "moddisable" => self.moddisable(bot, req).await,
            "modreload" => self.modreload(bot, req).await,
            "grant" => self.grant(bot, req).await,
            "revoke" => self.revoke(bot, req).await,
            "whohas" => self.whohas(bot, req).await,
            "savestate" => self.savestate(bot, req).await,
            _ => Ok(()),
        }
    }
}
