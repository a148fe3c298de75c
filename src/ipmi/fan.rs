use crate::configuration::Ipmi;
use crate::error::{Error, Result};
use crate::ipmi::component::{Component, Entity};
use crate::ipmi::executor::CommandRunner;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use strum_macros::Display;

const QUERY: &str = "sdr type Fan";

/// Hands fan control back to the BMC firmware
const AUTO_FAN_CONTROL: &str = "raw 0x30 0x30 0x01 0x01";

/// Takes fan control away from the BMC firmware, required before setting a
/// manual speed
const MANUAL_FAN_CONTROL: &str = "raw 0x30 0x30 0x01 0x00";

/// Queries the Dell third-party-cards fan override state
const QUERY_OVERRIDE: &str = "raw 0x30 0xce 0x01 0x16 0x05 0x00 0x00 0x00";

/// Disables the Dell third-party-cards fan override
const DISABLE_OVERRIDE: &str =
    "raw 0x30 0xce 0x00 0x16 0x05 0x00 0x00 0x00 0x05 0x00 0x01 0x00 0x00";

/// Restores the Dell third-party-cards fan override to its default
const RESTORE_OVERRIDE: &str =
    "raw 0x30 0xce 0x00 0x16 0x05 0x00 0x00 0x00 0x05 0x00 0x00 0x00 0x00";

/// Matches one tachometer line of `ipmitool sdr type Fan`:
///
/// ```text
/// Fan1 RPM         | 30h | ok  |  7.1 | 4200 RPM
/// ```
///
/// Group 1 is the name, group 2 the hexadecimal sensor address, group 3 the
/// RPM reading.
static FAN_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Fan\d+)\s+RPM\s*\|\s([0-9A-Fa-f]+)h\s.*\|\s(\d+)\sRPM$")
        .expect("Invalid regex pattern")
});

/// Matches the response to the override query on supported Dell models.
/// Group 1 is `1` when the override is disabled, `0` when enabled.
static OVERRIDE_RESPONSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^16 05 00 00 00 05 00 0([01]) 00 00").expect("Invalid regex pattern"));

/// State of the Dell third-party-cards fan override.
///
/// `Unknown` means the device did not answer the vendor protocol, which is a
/// valid, reportable state rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum OverrideStatus {
    Enabled,
    Disabled,
    Unknown,
}

/// Normalized fan speed for the configured calibration bounds.
///
/// Rounds half away from zero, so a reading exactly between two percents goes
/// to the larger one.
pub fn fan_percent(rpm: u32, min_fan_speed: u32, max_fan_speed: u32) -> i32 {
    let range = f64::from(max_fan_speed) - f64::from(min_fan_speed);
    ((f64::from(rpm) - f64::from(min_fan_speed)) / range * 100.0).round() as i32
}

/// Parses the output of `ipmitool sdr type Fan`.
///
/// Non-matching lines are silently discarded; the only parse failure is when
/// no line matches at all.
pub fn parse_fan_speeds(output: &str, config: &Ipmi) -> Result<Vec<Component>> {
    let fans: Vec<Component> = output
        .lines()
        .filter_map(|line| {
            let captures = FAN_LINE.captures(line)?;
            let name = captures[1].to_string();
            let id = u32::from_str_radix(&captures[2], 16).ok()?;
            let rpm: u32 = captures[3].parse().ok()?;
            Some(Component::FanSpeed {
                entity: Entity { id, name },
                rpm,
                percent: fan_percent(rpm, config.min_fan_speed, config.max_fan_speed),
            })
        })
        .collect();

    if fans.is_empty() {
        return Err(Error::Parse {
            query: QUERY,
            output: output.to_string(),
        });
    }

    Ok(fans)
}

/// Reads all fan tachometers from the BMC
pub async fn get_fan_speeds(runner: &dyn CommandRunner, config: &Ipmi) -> Result<Vec<Component>> {
    parse_fan_speeds(&runner.run(QUERY).await?, config)
}

/// Gives fan control back to the firmware algorithm
pub async fn set_auto_fan_control(runner: &dyn CommandRunner) -> Result<()> {
    runner.run(AUTO_FAN_CONTROL).await?;
    info!("Fan control set to automatic");
    Ok(())
}

/// Pins every fan to a fixed speed.
///
/// Validates first, acts second: an out-of-range or NaN percent is rejected
/// before anything is sent to the device. The two raw commands (disable
/// automatic control, then set the target) are issued in that order and both
/// must succeed. A failure between them leaves automatic control disabled with
/// no speed set; the caller can retry or fall back to
/// [`set_auto_fan_control`].
pub async fn set_fan_speed_percent(runner: &dyn CommandRunner, percent: f64) -> Result<()> {
    if percent.is_nan() || !(0.0..=100.0).contains(&percent) {
        return Err(Error::Validation(format!(
            "speed percent out of range [0,100]. Got {percent}"
        )));
    }

    runner.run(MANUAL_FAN_CONTROL).await?;
    runner
        .run(&format!("raw 0x30 0x30 0x02 0xff 0x{:x}", percent.round() as u8))
        .await?;

    info!("Set fan speed to {percent}%");
    Ok(())
}

/// Extracts the override state from a raw byte-sequence response.
///
/// Unrecognized text maps to [`OverrideStatus::Unknown`], never to an error:
/// it usually just means the server is not a supported Dell model.
pub fn parse_override_status(output: &str) -> OverrideStatus {
    match OVERRIDE_RESPONSE.captures(output.trim()) {
        Some(captures) if &captures[1] == "1" => OverrideStatus::Disabled,
        Some(_) => OverrideStatus::Enabled,
        None => {
            debug!("Unrecognized override query response: {output}");
            OverrideStatus::Unknown
        }
    }
}

/// Queries the state of the third-party-cards fan override.
///
/// When any card not approved by Dell is installed and the override is
/// enabled, the firmware pins the fans to maximum instead of running its
/// automatic algorithm. See the PowerEdge community thread on the T130 fan
/// speed algorithm for the raw protocol.
pub async fn get_third_party_override(runner: &dyn CommandRunner) -> Result<OverrideStatus> {
    let status = parse_override_status(&runner.run(QUERY_OVERRIDE).await?);
    info!("Third-party fan override: {status}");
    Ok(status)
}

/// Disables the third-party-cards fan override.
///
/// Re-queries the current state first and only toggles from `enabled`, so
/// repeated invocations are idempotent.
pub async fn disable_third_party_override(runner: &dyn CommandRunner) -> Result<()> {
    if get_third_party_override(runner).await? != OverrideStatus::Enabled {
        return Ok(());
    }
    runner.run(DISABLE_OVERRIDE).await?;
    Ok(())
}

/// Restores the third-party-cards fan override to its factory default.
///
/// The mirror of [`disable_third_party_override`]: only toggles from
/// `disabled`.
pub async fn restore_third_party_override(runner: &dyn CommandRunner) -> Result<()> {
    if get_third_party_override(runner).await? != OverrideStatus::Disabled {
        return Ok(());
    }
    runner.run(RESTORE_OVERRIDE).await?;
    Ok(())
}
