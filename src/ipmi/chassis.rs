use crate::error::{Error, Result};
use crate::ipmi::component::{CHASSIS_ID_BASE, Component, Entity};
use crate::ipmi::executor::CommandRunner;

const QUERY: &str = "chassis status";

const ON_OFF: &[&str] = &["on", "off"];
const TRUE_FALSE: &[&str] = &["true", "false"];
const INACTIVE_ACTIVE: &[&str] = &["inactive", "active"];
const IS_ALLOWED: &[&str] = &["allowed", "not allowed"];

/// The chassis status fields the bridge models, with the vocabulary each one
/// is allowed to take.
///
/// `ipmitool chassis status` reports a few more (power restore policy, last
/// power event); anything not in this table is dropped during parsing.
pub const CHASSIS_FIELDS: &[(&str, &[&str])] = &[
    ("System Power", ON_OFF),
    ("Power Overload", TRUE_FALSE),
    ("Power Interlock", INACTIVE_ACTIVE),
    ("Main Power Fault", TRUE_FALSE),
    ("Power Control Fault", TRUE_FALSE),
    ("Chassis Intrusion", INACTIVE_ACTIVE),
    ("Front-Panel Lockout", INACTIVE_ACTIVE),
    ("Drive Fault", TRUE_FALSE),
    ("Cooling/Fan Fault", TRUE_FALSE),
    ("Sleep Button Disable", IS_ALLOWED),
    ("Diag Button Disable", IS_ALLOWED),
    ("Reset Button Disable", IS_ALLOWED),
    ("Power Button Disable", IS_ALLOWED),
    ("Sleep Button Disabled", TRUE_FALSE),
    ("Diag Button Disabled", TRUE_FALSE),
    ("Reset Button Disabled", TRUE_FALSE),
    ("Power Button Disabled", TRUE_FALSE),
];

/// Parses the output of `ipmitool chassis status` into known field/value
/// pairs, preserving the output order.
///
/// The block is colon-delimited `key : value` lines. Keys not in
/// [`CHASSIS_FIELDS`], and keys whose value is outside the field's vocabulary,
/// are silently dropped.
pub fn parse_chassis_status(output: &str) -> Result<Vec<(&'static str, String)>> {
    let status: Vec<(&'static str, String)> = output
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let (key, value) = (key.trim(), value.trim());
            let (name, valid_values) = CHASSIS_FIELDS
                .iter()
                .find(|(name, _)| *name == key)?;
            valid_values
                .contains(&value)
                .then(|| (*name, value.to_string()))
        })
        .collect();

    if status.is_empty() {
        return Err(Error::Parse {
            query: QUERY,
            output: output.to_string(),
        });
    }

    Ok(status)
}

/// Turns parsed chassis fields into sensor components.
///
/// Chassis fields have no hardware address, so ids are synthesized from the
/// field position.
pub fn make_chassis_sensors(status: Vec<(&'static str, String)>) -> Vec<Component> {
    status
        .into_iter()
        .enumerate()
        .map(|(index, (name, value))| {
            let valid_values = CHASSIS_FIELDS
                .iter()
                .find(|(field, _)| *field == name)
                .map(|(_, values)| *values)
                .unwrap_or(&[]);
            Component::Chassis {
                entity: Entity::new(CHASSIS_ID_BASE + index as u32, name),
                value,
                valid_values,
            }
        })
        .collect()
}

/// Reads the chassis status flags from the BMC
pub async fn get_chassis_sensors(runner: &dyn CommandRunner) -> Result<Vec<Component>> {
    Ok(make_chassis_sensors(parse_chassis_status(
        &runner.run(QUERY).await?,
    )?))
}

/// The `System Power` value out of a component batch, if present
pub fn system_power(components: &[Component]) -> Option<&str> {
    components.iter().find_map(|component| match component {
        Component::Chassis { entity, value, .. } if entity.name == "System Power" => {
            Some(value.as_str())
        }
        _ => None,
    })
}
