//! `build` command - pokes the CI server to start a job

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

use crate::application::errors::{BotError, PluginResult};
use crate::application::messaging::Connection;
use crate::domain::entities::{CommandRequest, StateValue};
use crate::plugins::trait_def::BotPlugin;

pub const NAME: &str = "BuildCommand";
pub const DESCRIPTION: &str = "Triggers CI builds";

const DEFAULT_BUILD_URL: &str = "http://hudson.zones.apache.org/hudson/job";
const DEFAULT_BUILD_TOKEN: &str = "xxxxxxxxxxxx";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct Target {
    build_url: String,
    build_token: String,
}

#[derive(Debug)]
pub struct BuildCommand {
    client: Client,
    target: Mutex<Target>,
}

impl Default for BuildCommand {
    fn default() -> Self {
        Self {
            client: Client::new(),
            target: Mutex::new(Target {
                build_url: DEFAULT_BUILD_URL.to_string(),
                build_token: DEFAULT_BUILD_TOKEN.to_string(),
            }),
        }
    }
}

impl BuildCommand {
    fn target(&self) -> MutexGuard<'_, Target> {
        self.target.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Trigger URL for `job`
    pub fn trigger_url(&self, job: &str) -> String {
        let target = self.target();
        format!(
            "{}/{}/polling?token={}",
            target.build_url.trim_end_matches('/'),
            job,
            target.build_token
        )
    }

    /// Fire the trigger and describe the outcome for the requester
    async fn trigger(&self, job: &str) -> String {
        let url = self.trigger_url(job);
        info!("Triggering build {}", job);

        match self.client.get(url.as_str()).timeout(REQUEST_TIMEOUT).send().await {
            // the CI server answers 404 even when the trigger worked
            Ok(resp) if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND => {
                "request sent!".to_string()
            }
            Ok(resp) => {
                warn!("Build trigger for {} returned {}", job, resp.status());
                resp.status().to_string()
            }
            Err(e) => {
                warn!("Build trigger for {} failed: {}", job, e);
                e.to_string()
            }
        }
    }
}

#[async_trait]
impl BotPlugin for BuildCommand {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> Option<&str> {
        Some(DESCRIPTION)
    }

    fn implemented_commands(&self) -> PluginResult<Vec<String>> {
        Ok(vec!["build".to_string()])
    }

    fn save_state(&self) -> Option<StateValue> {
        let target = self.target();
        Some(
            StateValue::map()
                .with("build_url", target.build_url.as_str())
                .with("build_token", target.build_token.as_str()),
        )
    }

    fn load_state(&self, state: StateValue) -> PluginResult<()> {
        let mut target = self.target();
        if let Some(url) = state.get("build_url").and_then(StateValue::as_str) {
            target.build_url = url.to_string();
        }
        if let Some(token) = state.get("build_token").and_then(StateValue::as_str) {
            target.build_token = token.to_string();
        }
        Ok(())
    }

    async fn on_command(&self, bot: &Connection, req: &CommandRequest) -> Result<(), BotError> {
        let Some(job) = req.arg(0) else {
            return bot.reply(req, "usage: build <buildname>").await;
        };
        let outcome = self.trigger(job).await;
        bot.reply(req, &outcome).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_url_uses_state() {
        let build = BuildCommand::default();
        build
            .load_state(
                StateValue::map()
                    .with("build_url", "https://ci.example.org/job/")
                    .with("build_token", "s3cret"),
            )
            .unwrap();
        assert_eq!(
            build.trigger_url("nightly"),
            "https://ci.example.org/job/nightly/polling?token=s3cret"
        );
    }
}
