use serde::Serialize;

/// Synthetic entity id of the "All Fans" control.
///
/// The BMC raw protocol only supports setting every fan at once, so the
/// controllable fan is a virtual entity with an id outside the range of
/// observed sensor addresses.
pub const ALL_FANS_ID: u32 = 959;

/// Chassis sensors have no hardware address, their ids start here.
pub const CHASSIS_ID_BASE: u32 = 1000;

/// An addressable thing on the device.
///
/// `id` comes from the hexadecimal sensor address the BMC reports, or is a
/// synthetic constant for virtual entities. Names come straight from the
/// firmware and may repeat (several sensors can be called "Temp"), so the id is
/// the only reliable key within a kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub id: u32,
    pub name: String,
}

impl Entity {
    pub fn new(id: u32, name: impl Into<String>) -> Entity {
        Entity {
            id,
            name: name.into(),
        }
    }
}

/// A sensor reading or a controllable affordance of the device.
///
/// Every consumer (publisher, HTTP serializer, discovery builder) matches this
/// exhaustively, so adding a kind cannot silently drop it anywhere.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Component {
    /// A temperature sensor, reading in degrees Celsius
    Temperature { entity: Entity, celsius: i32 },

    /// A fan tachometer. The percent is derived from the configured RPM
    /// calibration bounds, not from hardware-reported limits.
    #[serde(rename = "fanspeed")]
    FanSpeed { entity: Entity, rpm: u32, percent: i32 },

    /// A chassis status flag with its fixed vocabulary of valid values
    Chassis {
        entity: Entity,
        value: String,
        valid_values: &'static [&'static str],
    },

    /// The virtual "All Fans" control. An affordance, not a reading.
    #[serde(rename = "fan")]
    ControllableFan { entity: Entity },
}

impl Component {
    pub fn entity(&self) -> &Entity {
        match self {
            Component::Temperature { entity, .. }
            | Component::FanSpeed { entity, .. }
            | Component::Chassis { entity, .. }
            | Component::ControllableFan { entity } => entity,
        }
    }

    /// Role of the component, `sensor` or `controllable`
    pub fn role(&self) -> &'static str {
        match self {
            Component::Temperature { .. }
            | Component::FanSpeed { .. }
            | Component::Chassis { .. } => "sensor",
            Component::ControllableFan { .. } => "controllable",
        }
    }

    /// Kind of the component as used in topics and unique ids
    pub fn kind(&self) -> &'static str {
        match self {
            Component::Temperature { .. } => "temperature",
            Component::FanSpeed { .. } => "fanspeed",
            Component::Chassis { .. } => "chassis",
            Component::ControllableFan { .. } => "fan",
        }
    }

    /// Identifier that is unique across the whole device
    ///
    /// ## Example
    ///
    /// ```
    /// use mqtt_ipmi_bridge::ipmi::component::{Component, Entity};
    ///
    /// let fan = Component::FanSpeed {
    ///     entity: Entity::new(48, "Fan1"),
    ///     rpm: 4200,
    ///     percent: 16,
    /// };
    /// assert_eq!(fan.unique_id("S1"), "S1_sensor_fanspeed_48");
    /// ```
    pub fn unique_id(&self, serial: &str) -> String {
        format!(
            "{serial}_{}_{}_{}",
            self.role(),
            self.kind(),
            self.entity().id
        )
    }
}

/// Device identity parsed from the firmware inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub product_name: String,
    pub serial_number: String,

    /// Management console URL. Only known for recognized vendors, empty otherwise.
    pub device_url: String,
}

/// Immutable snapshot of one full inventory pass.
///
/// Built once at startup and shared read-only afterwards; a fresh collection
/// always produces a fresh snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceData {
    pub device_info: DeviceInfo,
    pub components: Vec<Component>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_and_kinds() {
        let temperature = Component::Temperature {
            entity: Entity::new(14, "Temp"),
            celsius: 45,
        };
        assert_eq!(temperature.role(), "sensor");
        assert_eq!(temperature.kind(), "temperature");
        assert_eq!(temperature.unique_id("S1"), "S1_sensor_temperature_14");

        let all_fans = Component::ControllableFan {
            entity: Entity::new(ALL_FANS_ID, "All Fans"),
        };
        assert_eq!(all_fans.role(), "controllable");
        assert_eq!(all_fans.kind(), "fan");
        assert_eq!(all_fans.unique_id("S1"), "S1_controllable_fan_959");
    }

    #[test]
    fn test_serialized_shape() {
        let fan = Component::FanSpeed {
            entity: Entity::new(48, "Fan1"),
            rpm: 4200,
            percent: 16,
        };
        let json = serde_json::to_value(&fan).expect("component should serialize");

        assert_eq!(json["kind"], "fanspeed");
        assert_eq!(json["entity"]["id"], 48);
        assert_eq!(json["entity"]["name"], "Fan1");
        assert_eq!(json["rpm"], 4200);
        assert_eq!(json["percent"], 16);
    }
}
