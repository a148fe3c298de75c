use crate::ipmi::executor::InterfaceType;
use serde::Deserialize;
use serde_inline_default::serde_inline_default;
use std::error::Error;

/// Contains the configuration for talking to the BMC through `ipmitool`
#[serde_inline_default]
#[derive(Deserialize, Clone)]
pub struct Ipmi {
    /// Hostname or IP address of the BMC. Default: 192.168.1.1
    #[serde_inline_default(String::from("192.168.1.1"))]
    pub host: String,

    /// Username for the BMC. Default: ADMIN
    #[serde_inline_default(String::from("ADMIN"))]
    pub user: String,

    /// Password for the BMC. Default: ADMIN
    #[serde_inline_default(String::from("ADMIN"))]
    pub password: String,

    /// Wire interface used by `ipmitool` (`lan`, `lanplus` or `open`). Default: lanplus
    #[serde(default)]
    pub interface: InterfaceType,

    /// RPM the fans run at when fully idle, used to calibrate the percent scale.
    ///
    /// This is a deployment measurement, not a value reported by the hardware.
    #[serde_inline_default(1680)]
    #[serde(rename = "min-fan-speed")]
    pub min_fan_speed: u32,

    /// RPM the fans run at when maxed out, used to calibrate the percent scale.
    #[serde_inline_default(17280)]
    #[serde(rename = "max-fan-speed")]
    pub max_fan_speed: u32,

    /// If set, overrides the product name reported by the device firmware.
    #[serde(rename = "device-name")]
    pub device_name: Option<String>,
}

/// Contains the configuration for communicating with the MQTT broker
#[serde_inline_default]
#[derive(Deserialize, Clone)]
pub struct Mqtt {
    /// Enables the MQTT side of the bridge. Default: false (HTTP only)
    #[serde(default)]
    pub enabled: bool,

    /// Hostname or IP address of the broker. Default: localhost
    #[serde_inline_default(String::from("localhost"))]
    pub host: String,

    /// Port of the connection to the broker. Default: 1883
    #[serde_inline_default(1883)]
    pub port: u16,

    /// Username for the connection to the broker. Default: empty
    #[serde(default)]
    pub user: String,

    /// Password for the connection to the broker. Default: empty
    #[serde(default)]
    pub password: String,

    /// Prefix for the discovery topics sent to Home Assistant. Default: homeassistant
    ///
    /// This must match the configuration of the MQTT integration in Home Assistant
    ///
    /// See <https://www.home-assistant.io/integrations/mqtt#discovery-options>
    #[serde_inline_default(String::from("homeassistant"))]
    #[serde(rename = "discovery-prefix")]
    pub discovery_prefix: String,

    /// Prefix for the inbound command topics. Default: command/ipmi
    ///
    /// The device serial number and the command suffix are appended to it.
    #[serde_inline_default(String::from("command/ipmi"))]
    #[serde(rename = "command-topic-prefix")]
    pub command_topic_prefix: String,

    /// Delay between temperature reports in seconds. 0 disables them. Default: 10
    #[serde_inline_default(10)]
    #[serde(rename = "temperature-interval")]
    pub temperature_interval: u64,

    /// Delay between fan speed reports in seconds. 0 disables them. Default: 10
    #[serde_inline_default(10)]
    #[serde(rename = "fan-interval")]
    pub fan_interval: u64,

    /// Delay between chassis status reports in seconds. 0 disables them. Default: 30
    #[serde_inline_default(30)]
    #[serde(rename = "chassis-interval")]
    pub chassis_interval: u64,
}

/// Contains the configuration for the HTTP API
#[serde_inline_default]
#[derive(Deserialize, Clone)]
pub struct Http {
    /// Port the HTTP API listens on. Default: 3000
    #[serde_inline_default(3000)]
    pub port: u16,
}

/// Contains all the configuration for `mqtt-ipmi-bridge`
#[serde_inline_default]
#[derive(Deserialize, Clone)]
pub struct Configuration {
    /// Contains the configuration for talking to the BMC
    pub ipmi: Ipmi,

    /// Contains the configuration for communicating with the MQTT broker
    pub mqtt: Mqtt,

    /// Contains the configuration for the HTTP API
    pub http: Http,

    /// Sets the verbosity of the logs.
    ///  * 1 => Error
    ///  * 2 => Warning
    ///  * 3 => Info
    ///  * 4 => Debug
    ///  * 5 => Trace
    #[serde_inline_default(2)]
    #[serde(rename = "log-verbosity")]
    pub log_verbosity: usize,
}

impl Configuration {
    /// Load the configuration from a file
    ///
    /// ## Example
    ///
    /// ```
    /// use mqtt_ipmi_bridge::Configuration;
    ///
    /// let config = Configuration::load("conf/mqtt-ipmi-bridge.conf").expect("Cannot load configuration");
    ///
    /// assert_eq!(config.mqtt.host, "localhost");
    /// ```
    pub fn load(path: &str) -> Result<Configuration, Box<dyn Error>> {
        toml::from_str(std::fs::read_to_string(path)?.as_str()).map_err(|err| err.into())
    }
}
