use crate::commands::CommandKind;
use crate::ipmi::component::{Component, DeviceInfo};
use crate::publisher::{
    CHASSIS_STATE_TOPIC, FAN_PERCENTAGE_SIGNAL, FANSPEED_STATE_TOPIC, TEMPERATURE_STATE_TOPIC,
    device_signal_topic,
};
use serde::Serialize;
use std::fmt;

/// Preset modes offered on the virtual fan.
///
/// The percent behind each mode is a deployment convention, see
/// [`crate::commands::PresetMode`].
pub const PRESET_MODES: &[&str] = &["auto", "quiet", "boost", "max"];

/// Device block shared by every announcement, so Home Assistant groups all
/// the entities under one device
#[derive(Serialize, Debug, Clone)]
pub struct Device {
    /// Product name from the firmware, or the configured override
    name: String,

    /// Stable identifier derived from the device serial number
    identifiers: Vec<String>,

    manufacturer: String,

    serial_number: String,

    /// Management console URL, only known for recognized vendors
    #[serde(skip_serializing_if = "String::is_empty")]
    configuration_url: String,
}

/// Describes the origin of the messages, in this case `mqtt-ipmi-bridge`
#[derive(Serialize, Debug, Clone)]
pub struct Origin {
    /// Name of the origin, always `mqtt-ipmi-bridge`
    name: &'static str,

    /// Version of `mqtt-ipmi-bridge`
    sw_version: &'static str,

    /// URL of `mqtt-ipmi-bridge`
    url: &'static str,
}

/// Discovery announcement for one component.
///
/// Published retained to `{prefix}/{integration}/{unique_id}/config` so a
/// newly-connecting Home Assistant immediately sees the device shape;
/// retracted by publishing an empty payload to the same topic.
#[derive(Serialize, Debug)]
pub struct Announcement {
    /// Home Assistant integration the entity belongs to, used in the topic
    /// rather than the payload
    #[serde(skip)]
    pub integration: &'static str,

    pub name: String,

    /// Unique ID for the entity, `{serial}_{role}_{kind}_{id}`
    pub unique_id: String,

    pub device: Device,

    pub origin: Origin,

    /// Topic the entity reads its state from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_topic: Option<String>,

    /// Tells Home Assistant where to find the value in the JSON payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,

    /// Device class helps Home Assistant to know how to interpret the
    /// reported values.
    ///
    /// See <https://www.home-assistant.io/integrations/sensor#device-class>
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,

    /// An icon for sensors that are too generic for a device class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,

    /// Vocabulary of an enum sensor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<&'static [&'static str]>,

    // Fan-specific fields below
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_command_topic: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_state_topic: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_mode_command_topic: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_mode_command_template: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_modes: Option<&'static [&'static str]>,
}

impl Announcement {
    /// Topic this announcement is published to
    pub fn discovery_topic(&self, prefix: &str) -> String {
        format!("{prefix}/{}/{}/config", self.integration, self.unique_id)
    }
}

impl fmt::Display for Announcement {
    /// Formats the announcement in JSON format
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let Ok(announcement) = serde_json::to_string(&self) else {
            return Err(fmt::Error);
        };
        write!(f, "{announcement}")
    }
}

/// Maps components onto Home Assistant announcements for one device
pub struct DiscoveryBuilder {
    device: Device,
    origin: Origin,
    serial: String,

    /// `{command-topic-prefix}/{serial}`, the base of the inbound command topics
    command_base: String,
}

impl DiscoveryBuilder {
    pub fn new(info: &DeviceInfo, command_topic_prefix: &str) -> DiscoveryBuilder {
        let serial = info.serial_number.clone();

        DiscoveryBuilder {
            device: Device {
                name: info.product_name.clone(),
                identifiers: vec![format!("mqttipmi_{serial}")],
                manufacturer: info.manufacturer.clone(),
                serial_number: serial.clone(),
                configuration_url: info.device_url.clone(),
            },
            origin: Origin {
                name: env!("CARGO_PKG_NAME"),
                sw_version: env!("CARGO_PKG_VERSION"),
                url: env!("CARGO_PKG_HOMEPAGE"),
            },
            command_base: format!("{command_topic_prefix}/{serial}"),
            serial,
        }
    }

    /// Builds the announcement for a component.
    ///
    /// Exhaustive over every component variant so a new kind cannot be
    /// silently left out of discovery.
    pub fn announce(&self, component: &Component) -> Announcement {
        match component {
            Component::Temperature { .. } => self.temperature_sensor(component),
            Component::FanSpeed { .. } => self.fan_speed_sensor(component),
            Component::Chassis { valid_values, .. } => self.chassis_sensor(component, valid_values),
            Component::ControllableFan { .. } => self.fan(component),
        }
    }

    /// Announcements for every component of the device
    pub fn announce_all(&self, components: &[Component]) -> Vec<Announcement> {
        components
            .iter()
            .map(|component| self.announce(component))
            .collect()
    }

    fn base_announcement(&self, component: &Component) -> Announcement {
        Announcement {
            integration: "sensor",
            name: component.entity().name.clone(),
            unique_id: component.unique_id(&self.serial),
            device: self.device.clone(),
            origin: self.origin.clone(),
            state_topic: None,
            value_template: None,
            unit_of_measurement: None,
            device_class: None,
            icon: None,
            options: None,
            command_topic: None,
            percentage_command_topic: None,
            percentage_state_topic: None,
            preset_mode_command_topic: None,
            preset_mode_command_template: None,
            preset_modes: None,
        }
    }

    /// Tells Home Assistant to read the value keyed by the unique id out of
    /// the batched state payload
    fn value_template(unique_id: &str) -> String {
        format!("{{{{ value_json['{unique_id}'] }}}}")
    }

    fn temperature_sensor(&self, component: &Component) -> Announcement {
        let mut announcement = self.base_announcement(component);
        announcement.state_topic = Some(String::from(TEMPERATURE_STATE_TOPIC));
        announcement.value_template = Some(Self::value_template(&announcement.unique_id));
        announcement.unit_of_measurement = Some("°C");
        announcement.device_class = Some("temperature");
        announcement
    }

    fn fan_speed_sensor(&self, component: &Component) -> Announcement {
        let mut announcement = self.base_announcement(component);
        announcement.state_topic = Some(String::from(FANSPEED_STATE_TOPIC));
        announcement.value_template = Some(Self::value_template(&announcement.unique_id));
        announcement.unit_of_measurement = Some("RPM");
        announcement.icon = Some("mdi:fan");
        announcement
    }

    fn chassis_sensor(
        &self,
        component: &Component,
        valid_values: &'static [&'static str],
    ) -> Announcement {
        let mut announcement = self.base_announcement(component);
        announcement.state_topic = Some(String::from(CHASSIS_STATE_TOPIC));
        announcement.value_template = Some(Self::value_template(&announcement.unique_id));
        announcement.device_class = Some("enum");
        announcement.options = Some(valid_values);
        announcement
    }

    /// The virtual "All Fans" control: a Home Assistant fan entity wired to
    /// the inbound command topics
    fn fan(&self, component: &Component) -> Announcement {
        let mut announcement = self.base_announcement(component);
        announcement.integration = "fan";
        announcement.icon = Some("mdi:fan");
        announcement.command_topic = Some(self.command_topic(CommandKind::FanSpeedById));
        announcement.percentage_command_topic =
            Some(self.command_topic(CommandKind::FanSpeedPercentage));
        announcement.percentage_state_topic =
            Some(device_signal_topic(&self.serial, FAN_PERCENTAGE_SIGNAL));
        announcement.preset_mode_command_topic =
            Some(self.command_topic(CommandKind::FanSpeedPresetMode));
        announcement.preset_mode_command_template =
            Some(r#"{"preset_mode": "{{ value }}"}"#);
        announcement.preset_modes = Some(PRESET_MODES);
        announcement
    }

    fn command_topic(&self, command: CommandKind) -> String {
        format!("{}/{}", self.command_base, command.suffix())
    }
}
