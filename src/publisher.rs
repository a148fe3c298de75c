use crate::home_assistant::DiscoveryBuilder;
use crate::ipmi::chassis::system_power;
use crate::ipmi::component::Component;
use log::debug;
use rumqttc::{AsyncClient, ClientError, QoS};
use serde_json::{Map, Value, json};

/// Batched temperature readings, keyed by unique id
pub const TEMPERATURE_STATE_TOPIC: &str = "stat/ipmi_sensor/temperature";

/// Batched fan RPM readings, keyed by unique id
pub const FANSPEED_STATE_TOPIC: &str = "stat/ipmi_sensor/fanspeed";

/// Batched chassis flags, keyed by unique id
pub const CHASSIS_STATE_TOPIC: &str = "stat/ipmi_sensor/chassis";

/// Average fan percent across all fan sensors
pub const FAN_PERCENTAGE_SIGNAL: &str = "fan_percentage";

/// Binary ON/OFF derived from the `System Power` chassis field
pub const POWER_SIGNAL: &str = "power";

/// Topic of a per-device signal
pub fn device_signal_topic(serial: &str, signal: &str) -> String {
    format!("stat/ipmi_sensor/{serial}/{signal}")
}

/// Binary payload for the power signal. Anything but `on` counts as off.
pub fn power_signal_payload(value: &str) -> &'static str {
    if value == "on" { "ON" } else { "OFF" }
}

/// Batches the temperature sensors of a snapshot into one payload
pub fn temperature_payload(serial: &str, components: &[Component]) -> Map<String, Value> {
    components
        .iter()
        .filter_map(|component| match component {
            Component::Temperature { celsius, .. } => {
                Some((component.unique_id(serial), json!(celsius)))
            }
            _ => None,
        })
        .collect()
}

/// Batches the fan sensors of a snapshot into one payload
pub fn fan_speed_payload(serial: &str, components: &[Component]) -> Map<String, Value> {
    components
        .iter()
        .filter_map(|component| match component {
            Component::FanSpeed { rpm, .. } => Some((component.unique_id(serial), json!(rpm))),
            _ => None,
        })
        .collect()
}

/// Batches the chassis flags of a snapshot into one payload
pub fn chassis_payload(serial: &str, components: &[Component]) -> Map<String, Value> {
    components
        .iter()
        .filter_map(|component| match component {
            Component::Chassis { value, .. } => Some((component.unique_id(serial), json!(value))),
            _ => None,
        })
        .collect()
}

/// Average percent across all fan sensors, rounded.
///
/// An empty batch averages over a population of one, which degenerates to 0
/// instead of dividing by zero.
pub fn average_fan_percent(components: &[Component]) -> i64 {
    let percents: Vec<i32> = components
        .iter()
        .filter_map(|component| match component {
            Component::FanSpeed { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();

    let total: i64 = percents.iter().map(|percent| i64::from(*percent)).sum();
    (total as f64 / percents.len().max(1) as f64).round() as i64
}

/// Publishes the batched temperature state, retained
pub async fn publish_temperatures(
    client: &AsyncClient,
    serial: &str,
    components: &[Component],
) -> Result<(), ClientError> {
    publish(
        client,
        TEMPERATURE_STATE_TOPIC,
        &Value::Object(temperature_payload(serial, components)).to_string(),
    )
    .await
}

/// Publishes the batched fan state and the average percent signal, retained
pub async fn publish_fan_speeds(
    client: &AsyncClient,
    serial: &str,
    components: &[Component],
) -> Result<(), ClientError> {
    publish(
        client,
        FANSPEED_STATE_TOPIC,
        &Value::Object(fan_speed_payload(serial, components)).to_string(),
    )
    .await?;

    publish(
        client,
        &device_signal_topic(serial, FAN_PERCENTAGE_SIGNAL),
        &average_fan_percent(components).to_string(),
    )
    .await
}

/// Publishes the batched chassis state, retained, and derives the binary
/// power signal from the `System Power` field
pub async fn publish_chassis_sensors(
    client: &AsyncClient,
    serial: &str,
    components: &[Component],
) -> Result<(), ClientError> {
    publish(
        client,
        CHASSIS_STATE_TOPIC,
        &Value::Object(chassis_payload(serial, components)).to_string(),
    )
    .await?;

    if let Some(value) = system_power(components) {
        publish(
            client,
            &device_signal_topic(serial, POWER_SIGNAL),
            power_signal_payload(value),
        )
        .await?;
    }

    Ok(())
}

/// Publishes one retained announcement per component, so Home Assistant
/// configures the matching entities
pub async fn publish_discovery(
    client: &AsyncClient,
    prefix: &str,
    builder: &DiscoveryBuilder,
    components: &[Component],
) -> Result<(), ClientError> {
    for announcement in builder.announce_all(components) {
        publish(
            client,
            &announcement.discovery_topic(prefix),
            &announcement.to_string(),
        )
        .await?;
    }
    Ok(())
}

/// Retracts every previously published announcement.
///
/// An empty retained payload is the protocol convention for "remove this
/// entity".
pub async fn retract_discovery(
    client: &AsyncClient,
    prefix: &str,
    builder: &DiscoveryBuilder,
    components: &[Component],
) -> Result<(), ClientError> {
    for announcement in builder.announce_all(components) {
        publish(client, &announcement.discovery_topic(prefix), "").await?;
    }
    Ok(())
}

// Retained publish, so late-joining subscribers see the current state
async fn publish(client: &AsyncClient, topic: &str, data: &str) -> Result<(), ClientError> {
    debug!("Publishing to topic {topic} : {data}");
    client.publish(topic, QoS::AtLeastOnce, true, data).await
}
