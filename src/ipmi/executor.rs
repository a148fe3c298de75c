use crate::configuration::Ipmi;
use crate::error::Error;
use async_trait::async_trait;
use log::{debug, trace};
use serde::Deserialize;
use strum_macros::{Display, EnumString};
use tokio::process::Command;

/// Wire interface used by `ipmitool` to reach the BMC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InterfaceType {
    Lan,
    #[default]
    Lanplus,
    Open,
}

/// Builds the full `ipmitool` command line for a sub-command
///
/// ## Example
///
/// ```
/// use mqtt_ipmi_bridge::Configuration;
/// use mqtt_ipmi_bridge::ipmi::executor::format_command;
///
/// let config = Configuration::load("conf/mqtt-ipmi-bridge.conf").expect("Cannot load configuration");
/// let command = format_command("chassis status", &config.ipmi);
///
/// assert!(command.starts_with("ipmitool -I lanplus"));
/// ```
pub fn format_command(subcommand: &str, config: &Ipmi) -> String {
    format!(
        "ipmitool -I {} -H {} -U {} -P {} {}",
        config.interface, config.host, config.user, config.password, subcommand
    )
}

/// Argument vector for one `ipmitool` invocation.
///
/// Credentials and host stay single arguments even when they contain
/// whitespace. Only the sub-command itself is split into words.
fn command_args(subcommand: &str, config: &Ipmi) -> Vec<String> {
    let mut args = vec![
        String::from("-I"),
        config.interface.to_string(),
        String::from("-H"),
        config.host.clone(),
        String::from("-U"),
        config.user.clone(),
        String::from("-P"),
        config.password.clone(),
    ];
    args.extend(subcommand.split_whitespace().map(String::from));
    args
}

/// Executes BMC sub-commands and returns their raw stdout.
///
/// The bridge only ever talks to the hardware through this trait, so tests can
/// substitute a scripted fake and the parsers stay free of process handling.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs a single sub-command and returns its stdout.
    ///
    /// Empty stdout on success is normalized to `"ok"`.
    async fn run(&self, subcommand: &str) -> Result<String, Error>;
}

/// Production executor that spawns the `ipmitool` binary
pub struct IpmiTool {
    config: Ipmi,
}

impl IpmiTool {
    pub fn new(config: Ipmi) -> IpmiTool {
        IpmiTool { config }
    }
}

#[async_trait]
impl CommandRunner for IpmiTool {
    async fn run(&self, subcommand: &str) -> Result<String, Error> {
        debug!("Executing ipmitool {subcommand}");

        let output = Command::new("ipmitool")
            .args(command_args(subcommand, &self.config))
            .output()
            .await
            .map_err(|err| Error::Command {
                command: subcommand.to_string(),
                message: err.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::Command {
                command: subcommand.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        trace!("ipmitool {subcommand} returned {} bytes", stdout.len());

        if stdout.is_empty() {
            Ok(String::from("ok"))
        } else {
            Ok(stdout)
        }
    }
}
