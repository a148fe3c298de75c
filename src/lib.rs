//! # mqtt-ipmi-bridge
//!
//! `mqtt-ipmi-bridge` reports server hardware telemetry read over IPMI to the
//! MQTT integration of Home Assistant and exposes a small HTTP control API
//!
//!

pub use self::configuration::Configuration;
pub use self::configuration::Ipmi;
pub use self::configuration::Mqtt;
pub use self::daemon::Daemon;
pub use self::error::Error;
pub use self::home_assistant::DiscoveryBuilder;
pub use self::ipmi::component::{Component, DeviceData, DeviceInfo};

/// Contains the inbound MQTT command handling
pub mod commands;
/// Contains the configuration stuff
pub mod configuration;
/// Contains the daemon code
pub mod daemon;
/// Contains the error taxonomy of the bridge
pub mod error;
/// Contains Home Assistant discovery data
pub mod home_assistant;
/// Contains the HTTP control API
pub mod http_api;
/// Contains the BMC queries and their parsers
pub mod ipmi;
/// Contains the outbound MQTT state reporting
pub mod publisher;
/// Contains the periodic task runner
pub mod scheduler;

#[cfg(test)]
mod test_support;
