use crate::error::{Error, Result};
use crate::ipmi::executor::CommandRunner;
use crate::ipmi::fan;
use log::{debug, info, warn};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

/// The inbound command kinds the bridge listens for.
///
/// Each one gets its own topic, `{prefix}/{serial}/{suffix}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum CommandKind {
    /// Sets the speed of one fan by id. The raw protocol can only address
    /// every fan at once, so the id is accepted and the speed applies to all.
    FanSpeedById,

    /// Sets the speed of every fan; the payload is a bare percent number
    FanSpeedPercentage,

    /// Selects a named preset mode
    FanSpeedPresetMode,
}

impl CommandKind {
    /// Topic suffix of the command
    pub fn suffix(self) -> &'static str {
        match self {
            CommandKind::FanSpeedById => "set/fanspeed",
            CommandKind::FanSpeedPercentage => "set/fanspeedpercentage",
            CommandKind::FanSpeedPresetMode => "set/fanspeedpresetmode",
        }
    }
}

/// Named fan-speed profile.
///
/// The percent behind each profile is a deployment convention, not a
/// hardware-reported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PresetMode {
    Auto,
    Quiet,
    Boost,
    Max,
}

impl PresetMode {
    /// Fixed percent of the profile, `None` for automatic control
    pub fn percent(self) -> Option<f64> {
        match self {
            PresetMode::Auto => None,
            PresetMode::Quiet => Some(24.0),
            PresetMode::Boost => Some(50.0),
            PresetMode::Max => Some(100.0),
        }
    }
}

#[derive(Deserialize, Debug)]
struct SetFanSpeed {
    id: u32,
    speed_pct: f64,
}

#[derive(Deserialize, Debug)]
struct SetFanSpeedPresetMode {
    preset_mode: PresetMode,
}

/// Routes inbound MQTT messages to fan commands.
///
/// Subscribed once per command kind at startup. Anything wrong with a message
/// (malformed JSON, failed validation, a failing action) is logged and
/// dropped; the router itself never crashes the process.
pub struct CommandRouter {
    runner: Arc<dyn CommandRunner>,
    routes: HashMap<String, CommandKind>,
}

impl CommandRouter {
    pub fn new(runner: Arc<dyn CommandRunner>, prefix: &str, serial: &str) -> CommandRouter {
        CommandRouter {
            runner,
            routes: CommandKind::iter()
                .map(|kind| (format!("{prefix}/{serial}/{}", kind.suffix()), kind))
                .collect(),
        }
    }

    /// The topics the router wants subscribed
    pub fn topics(&self) -> Vec<String> {
        self.routes.keys().cloned().collect()
    }

    /// Handles one inbound message. Never fails, only logs.
    pub async fn dispatch(&self, topic: &str, payload: &[u8]) {
        let Some(kind) = self.routes.get(topic) else {
            debug!("Ignoring message on unrouted topic {topic}");
            return;
        };

        match self.handle(*kind, payload).await {
            Ok(()) => info!("Command on {topic} done"),
            Err(err) => warn!(
                "Dropping command on {topic}: {err}. Payload: {}",
                String::from_utf8_lossy(payload)
            ),
        }
    }

    async fn handle(&self, kind: CommandKind, payload: &[u8]) -> Result<()> {
        let runner = self.runner.as_ref();

        match kind {
            CommandKind::FanSpeedById => {
                let command: SetFanSpeed = parse_json(payload)?;
                debug!(
                    "Fan {} requested; the raw protocol sets every fan at once",
                    command.id
                );
                fan::set_fan_speed_percent(runner, command.speed_pct).await
            }
            CommandKind::FanSpeedPercentage => {
                let percent: f64 = parse_json(payload)?;
                fan::set_fan_speed_percent(runner, percent).await
            }
            CommandKind::FanSpeedPresetMode => {
                let command: SetFanSpeedPresetMode = parse_json(payload)?;
                match command.preset_mode.percent() {
                    None => fan::set_auto_fan_control(runner).await,
                    Some(percent) => fan::set_fan_speed_percent(runner, percent).await,
                }
            }
        }
    }
}

fn parse_json<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    serde_json::from_slice(payload).map_err(|err| Error::Validation(err.to_string()))
}
