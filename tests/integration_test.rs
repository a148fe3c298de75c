use async_trait::async_trait;
use mqtt_ipmi_bridge::commands::CommandRouter;
use mqtt_ipmi_bridge::configuration;
use mqtt_ipmi_bridge::error::Error;
use mqtt_ipmi_bridge::home_assistant::DiscoveryBuilder;
use mqtt_ipmi_bridge::ipmi::component::ALL_FANS_ID;
use mqtt_ipmi_bridge::ipmi::device;
use mqtt_ipmi_bridge::ipmi::executor::CommandRunner;
use mqtt_ipmi_bridge::publisher;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Scripted stand-in for `ipmitool`, one canned response per sub-command
#[derive(Default)]
struct ScriptedRunner {
    responses: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    fn respond(&self, command: &str, output: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), output.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, subcommand: &str) -> Result<String, Error> {
        self.calls.lock().unwrap().push(subcommand.to_string());
        self.responses
            .lock()
            .unwrap()
            .get(subcommand)
            .cloned()
            .ok_or_else(|| Error::Command {
                command: subcommand.to_string(),
                message: String::from("no scripted response"),
            })
    }
}

fn scripted_server() -> ScriptedRunner {
    let runner = ScriptedRunner::default();
    runner.respond(
        "fru print",
        "FRU Device Description : Builtin FRU Device (ID 0)\n\
         Board Mfg             : DELL\n\
         Product Manufacturer  : DELL\n\
         Product Name          : Super Mega Hyper Server\n\
         Product Serial        : BARCODE1234567890\n",
    );
    runner.respond("mc getsysinfo delloem_url", "http://myhomelab.internal\n");
    runner.respond(
        "sdr type Temperature",
        "Inlet Temp       | 04h | ok  |  7.1 | 21 degrees C\n\
         Exhaust Temp     | 01h | ok  |  7.1 | 34 degrees C\n",
    );
    runner.respond(
        "sdr type Fan",
        "Fan1 RPM         | 30h | ok  |  7.1 | 4200 RPM\n\
         Fan2 RPM         | 31h | ok  |  7.1 | 9480 RPM\n",
    );
    runner.respond(
        "chassis status",
        "System Power         : on\n\
         Power Overload       : false\n\
         Drive Fault          : false\n",
    );
    // The override is reported disabled, nothing to warn about
    runner.respond(
        "raw 0x30 0xce 0x01 0x16 0x05 0x00 0x00 0x00",
        "16 05 00 00 00 05 00 01 00 00",
    );
    runner.respond("raw 0x30 0x30 0x01 0x00", "");
    runner.respond("raw 0x30 0x30 0x01 0x01", "");
    runner.respond("raw 0x30 0x30 0x02 0xff 0x32", "");
    runner
}

#[test]
fn test_default_configuration() -> Result<(), Box<dyn std::error::Error>> {
    let conf = configuration::Configuration::load("conf/mqtt-ipmi-bridge.conf")?;

    assert_eq!(conf.ipmi.min_fan_speed, 1680);
    assert_eq!(conf.ipmi.max_fan_speed, 17280);
    assert!(!conf.mqtt.enabled);
    assert_eq!(conf.mqtt.discovery_prefix, "homeassistant");
    assert_eq!(conf.mqtt.command_topic_prefix, "command/ipmi");
    assert_eq!(conf.http.port, 3000);

    Ok(())
}

#[tokio::test]
async fn test_full_collection_pass() -> Result<(), Box<dyn std::error::Error>> {
    let conf = configuration::Configuration::load("conf/mqtt-ipmi-bridge.conf")?;
    let runner = scripted_server();

    let data = device::collect_device_data(&runner, &conf.ipmi).await?;

    assert_eq!(data.device_info.manufacturer, "DELL");
    assert_eq!(data.device_info.serial_number, "BARCODE1234567890");
    assert_eq!(data.device_info.device_url, "http://myhomelab.internal");

    // 2 temperatures, 2 fans, 3 chassis fields and the virtual fan control
    assert_eq!(data.components.len(), 8);
    assert_eq!(data.components.last().unwrap().entity().id, ALL_FANS_ID);

    // Identity is read before any sensor
    assert_eq!(runner.calls().first().map(String::as_str), Some("fru print"));

    Ok(())
}

#[tokio::test]
async fn test_discovery_announcements() -> Result<(), Box<dyn std::error::Error>> {
    let conf = configuration::Configuration::load("conf/mqtt-ipmi-bridge.conf")?;
    let runner = scripted_server();

    let data = device::collect_device_data(&runner, &conf.ipmi).await?;
    let builder = DiscoveryBuilder::new(&data.device_info, &conf.mqtt.command_topic_prefix);

    let announcements = builder.announce_all(&data.components);
    assert_eq!(announcements.len(), data.components.len());

    let inlet = &announcements[0];
    assert_eq!(
        inlet.discovery_topic(&conf.mqtt.discovery_prefix),
        "homeassistant/sensor/BARCODE1234567890_sensor_temperature_4/config"
    );

    let json: Value = serde_json::from_str(&inlet.to_string())?;
    assert_eq!(json["name"].as_str().unwrap(), "Inlet Temp");
    assert_eq!(
        json["device"]["name"].as_str().unwrap(),
        "Super Mega Hyper Server"
    );
    assert_eq!(
        json["device"]["configuration_url"].as_str().unwrap(),
        "http://myhomelab.internal"
    );
    assert_eq!(
        json["state_topic"].as_str().unwrap(),
        "stat/ipmi_sensor/temperature"
    );
    assert_eq!(
        json["value_template"].as_str().unwrap(),
        "{{ value_json['BARCODE1234567890_sensor_temperature_4'] }}"
    );

    let all_fans = announcements.last().unwrap();
    assert_eq!(
        all_fans.discovery_topic(&conf.mqtt.discovery_prefix),
        "homeassistant/fan/BARCODE1234567890_controllable_fan_959/config"
    );

    let json: Value = serde_json::from_str(&all_fans.to_string())?;
    assert_eq!(
        json["percentage_command_topic"].as_str().unwrap(),
        "command/ipmi/BARCODE1234567890/set/fanspeedpercentage"
    );
    assert_eq!(
        json["percentage_state_topic"].as_str().unwrap(),
        "stat/ipmi_sensor/BARCODE1234567890/fan_percentage"
    );
    assert_eq!(
        json["preset_modes"],
        serde_json::json!(["auto", "quiet", "boost", "max"])
    );

    Ok(())
}

#[tokio::test]
async fn test_state_payloads() -> Result<(), Box<dyn std::error::Error>> {
    let conf = configuration::Configuration::load("conf/mqtt-ipmi-bridge.conf")?;
    let runner = scripted_server();

    let data = device::collect_device_data(&runner, &conf.ipmi).await?;
    let serial = &data.device_info.serial_number;

    let temperatures = publisher::temperature_payload(serial, &data.components);
    assert_eq!(
        temperatures["BARCODE1234567890_sensor_temperature_4"],
        serde_json::json!(21)
    );
    assert_eq!(temperatures.len(), 2);

    let fans = publisher::fan_speed_payload(serial, &data.components);
    assert_eq!(
        fans["BARCODE1234567890_sensor_fanspeed_48"],
        serde_json::json!(4200)
    );

    // (4200 - 1680) / (17280 - 1680) is 16%, (9480 - 1680) / 15600 is 50%
    assert_eq!(publisher::average_fan_percent(&data.components), 33);

    let chassis = publisher::chassis_payload(serial, &data.components);
    assert_eq!(
        chassis["BARCODE1234567890_sensor_chassis_1000"],
        serde_json::json!("on")
    );

    Ok(())
}

/// Inbound command messages reach the BMC as raw fan commands
#[tokio::test]
async fn test_command_routing() -> Result<(), Box<dyn std::error::Error>> {
    let conf = configuration::Configuration::load("conf/mqtt-ipmi-bridge.conf")?;
    let runner = Arc::new(scripted_server());
    let router = CommandRouter::new(
        Arc::clone(&runner) as Arc<dyn CommandRunner>,
        &conf.mqtt.command_topic_prefix,
        "BARCODE1234567890",
    );

    router
        .dispatch(
            "command/ipmi/BARCODE1234567890/set/fanspeedpercentage",
            b"50",
        )
        .await;

    assert_eq!(
        runner.calls(),
        vec!["raw 0x30 0x30 0x01 0x00", "raw 0x30 0x30 0x02 0xff 0x32"]
    );

    router
        .dispatch(
            "command/ipmi/BARCODE1234567890/set/fanspeedpresetmode",
            br#"{"preset_mode": "auto"}"#,
        )
        .await;

    assert_eq!(
        runner.calls().last().map(String::as_str),
        Some("raw 0x30 0x30 0x01 0x01")
    );

    Ok(())
}
