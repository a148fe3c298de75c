use crate::configuration::Ipmi;
use crate::error::{Error, Result};
use crate::ipmi::component::{ALL_FANS_ID, Component, DeviceData, DeviceInfo, Entity};
use crate::ipmi::executor::CommandRunner;
use crate::ipmi::fan::OverrideStatus;
use crate::ipmi::{chassis, fan, temperature};
use log::{info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

const QUERY: &str = "fru print";

/// Fetches the iDRAC URL, only answered by Dell machines
const DELL_URL_QUERY: &str = "mc getsysinfo delloem_url";

/// Marker of the built-in FRU section that carries the product identity
const MAIN_SECTION_MARKER: &str = "(ID 0)";

const RECOGNIZED_VENDOR: &str = "DELL";

/// Parses the output of `ipmitool fru print`.
///
/// The block is split into blank-line-separated sections; the one containing
/// `(ID 0)` describes the device itself. Its `Product Manufacturer`,
/// `Product Name` and `Product Serial` keys are load-bearing for identity and
/// topic naming, so all three must be present and non-empty.
pub fn parse_device_info(output: &str) -> Result<DeviceInfo> {
    let main_section = output
        .split("\n\n")
        .find(|section| section.contains(MAIN_SECTION_MARKER))
        .ok_or_else(|| Error::Parse {
            query: QUERY,
            output: output.to_string(),
        })?;

    let fields: HashMap<&str, &str> = main_section
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            Some((key.trim(), value.trim()))
        })
        .collect();

    let required = |key: &str| -> Result<String> {
        match fields.get(key) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(Error::Configuration(format!("missing `{key}` in FRU data"))),
        }
    };

    Ok(DeviceInfo {
        manufacturer: required("Product Manufacturer")?,
        product_name: required("Product Name")?,
        serial_number: required("Product Serial")?,
        device_url: String::new(),
    })
}

/// Reads the device identity from the firmware inventory.
///
/// The management console URL is vendor-specific and only fetched when the
/// manufacturer is recognized; it stays empty otherwise. A configured device
/// name takes precedence over the firmware-reported product name.
pub async fn get_device_info(
    runner: &dyn CommandRunner,
    device_name_override: Option<&str>,
) -> Result<DeviceInfo> {
    let mut info = parse_device_info(&runner.run(QUERY).await?)?;

    if let Some(name) = device_name_override {
        info.product_name = name.to_string();
    }

    if info.manufacturer == RECOGNIZED_VENDOR {
        info.device_url = runner.run(DELL_URL_QUERY).await?.trim().to_string();
    }

    Ok(info)
}

type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Component>>> + Send + 'a>>;

/// One step of the collection pass
struct SensorPoller {
    announce: &'static str,
    fetch: for<'a> fn(&'a dyn CommandRunner, &'a Ipmi) -> FetchFuture<'a>,
}

fn fetch_temperatures<'a>(runner: &'a dyn CommandRunner, _config: &'a Ipmi) -> FetchFuture<'a> {
    Box::pin(temperature::get_temperatures(runner))
}

fn fetch_fans<'a>(runner: &'a dyn CommandRunner, config: &'a Ipmi) -> FetchFuture<'a> {
    Box::pin(fan::get_fan_speeds(runner, config))
}

fn fetch_chassis<'a>(runner: &'a dyn CommandRunner, _config: &'a Ipmi) -> FetchFuture<'a> {
    Box::pin(chassis::get_chassis_sensors(runner))
}

/// The ordered list of sensor kinds one collection pass reads.
///
/// Adding a kind means adding an entry here; the orchestration below does not
/// change.
const SENSOR_POLLERS: &[SensorPoller] = &[
    SensorPoller {
        announce: "Reading temperature sensors",
        fetch: fetch_temperatures,
    },
    SensorPoller {
        announce: "Reading fan sensors",
        fetch: fetch_fans,
    },
    SensorPoller {
        announce: "Reading chassis status",
        fetch: fetch_chassis,
    },
];

/// Runs one full inventory pass and returns an immutable snapshot.
///
/// Identity comes first since everything downstream is named after the serial
/// number, then every sensor kind in [`SENSOR_POLLERS`] order. Any fetch
/// failure aborts the whole pass; there is no partial snapshot. On recognized
/// vendors the third-party fan override state is checked and surfaced to the
/// operator when enabled, never auto-remediated. The virtual "All Fans"
/// control is always appended last.
pub async fn collect_device_data(runner: &dyn CommandRunner, config: &Ipmi) -> Result<DeviceData> {
    info!("Reading device identity");
    let device_info = get_device_info(runner, config.device_name.as_deref()).await?;
    info!("{}", format_device_info(&device_info));

    let mut components = Vec::new();
    for poller in SENSOR_POLLERS {
        info!("{}", poller.announce);
        let batch = (poller.fetch)(runner, config).await?;
        info!("\n{}", format_components(&batch));
        components.extend(batch);
    }

    if device_info.manufacturer == RECOGNIZED_VENDOR
        && fan::get_third_party_override(runner).await? == OverrideStatus::Enabled
    {
        warn!(
            "The third-party cards fan override is enabled: automatic fan \
             control will run the fans at maximum speed"
        );
    }

    components.push(Component::ControllableFan {
        entity: Entity::new(ALL_FANS_ID, "All Fans"),
    });

    Ok(DeviceData {
        device_info,
        components,
    })
}

fn format_device_info(info: &DeviceInfo) -> String {
    format!(
        "\n  Manufacturer:  {}\n  Product Name:  {}\n  Serial Number: {}",
        info.manufacturer, info.product_name, info.serial_number
    )
}

fn format_components(components: &[Component]) -> String {
    components
        .iter()
        .map(|component| {
            let entity = component.entity();
            format!("  ID: {:03}, Name: {}", entity.id, entity.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
