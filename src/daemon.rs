use crate::commands::CommandRouter;
use crate::configuration::Configuration;
use crate::home_assistant::DiscoveryBuilder;
use crate::http_api::{self, AppState, MqttState};
use crate::ipmi::component::DeviceData;
use crate::ipmi::executor::{CommandRunner, IpmiTool};
use crate::ipmi::{chassis, device, fan, temperature};
use crate::publisher;
use crate::scheduler::PeriodicTask;
use convert_case::{Case, Casing};
use log::{debug, error, info, trace, warn};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::SignalKind;
use tokio::task;
use tokio::time::sleep;

/// Daemon that polls the BMC, reports to MQTT and serves the HTTP API
pub struct Daemon {
    config: Configuration,
    runner: Arc<dyn CommandRunner>,
}

impl Daemon {
    /// Constructs a daemon from the specified configuration
    ///
    /// ```
    /// use mqtt_ipmi_bridge::{Configuration, Daemon};
    ///
    /// let config = Configuration::load("conf/mqtt-ipmi-bridge.conf").expect("Cannot load configuration");
    /// let daemon = Daemon::new(config);
    ///
    /// // later, run daemon.run() in an async function
    /// ```
    pub fn new(config: Configuration) -> Daemon {
        info!("Bridge for BMC {} starting", config.ipmi.host);

        Daemon {
            runner: Arc::new(IpmiTool::new(config.ipmi.clone())),
            config,
        }
    }

    /// Runs the daemon until Ctrl-C or SIGTERM
    pub async fn run(&self) -> Result<(), Box<dyn Error>> {
        // Identity and sensor inventory are read once at startup, the
        // periodic publishers only refresh the values.
        let device_data = Arc::new(
            device::collect_device_data(self.runner.as_ref(), &self.config.ipmi).await?,
        );
        info!(
            "Found {} with {} components",
            device_data.device_info.product_name,
            device_data.components.len()
        );

        let mqtt = if self.config.mqtt.enabled {
            Some(self.start_mqtt(&device_data))
        } else {
            info!("MQTT reporting is disabled, only the HTTP API is available");
            None
        };

        let _publishers = match &mqtt {
            Some(state) => self.start_publishers(state),
            None => Vec::new(),
        };

        let state = AppState {
            runner: Arc::clone(&self.runner),
            ipmi: self.config.ipmi.clone(),
            mqtt,
        };

        let mut terminal_signal = tokio::signal::unix::signal(SignalKind::terminate())?;
        tokio::select! {
            served = http_api::serve(state, self.config.http.port) => served?,
            _ = tokio::signal::ctrl_c() => {
                debug!("Ctrl-C received");
            },
            _ = terminal_signal.recv() => {
                debug!("Interrupt received");
            }
        }

        Ok(())
    }

    /// Connects to the broker, announces the device and starts routing
    /// inbound commands.
    ///
    /// Nothing here waits on the broker. Subscriptions and the discovery
    /// announcements run in a background task, so an unreachable broker
    /// delays MQTT reporting but never the HTTP API.
    fn start_mqtt(&self, device_data: &Arc<DeviceData>) -> MqttState {
        let config = &self.config.mqtt;
        let client_id = format!(
            "ipmi_bridge_{}",
            device_data.device_info.product_name.to_case(Case::Snake)
        );

        let mut mqtt_config = MqttOptions::new(&client_id, &config.host, config.port);
        if !config.user.is_empty() {
            mqtt_config.set_credentials(&config.user, &config.password);
        }

        info!("Connecting to MQTT broker {}:{}", config.host, config.port);
        let (client, mut event_loop) = AsyncClient::new(mqtt_config, 10);

        let router = CommandRouter::new(
            Arc::clone(&self.runner),
            &config.command_topic_prefix,
            &device_data.device_info.serial_number,
        );
        let topics = router.topics();

        task::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(message))) => {
                        router.dispatch(&message.topic, &message.payload).await;
                    }
                    Ok(notification) => {
                        trace!("MQTT notification received: {notification:?}");
                    }
                    Err(err) => {
                        error!("MQTT connection error: {err}");
                        sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        let discovery = Arc::new(DiscoveryBuilder::new(
            &device_data.device_info,
            &config.command_topic_prefix,
        ));

        let setup_client = client.clone();
        let prefix = config.discovery_prefix.clone();
        let announce = Arc::clone(&discovery);
        let snapshot = Arc::clone(device_data);
        task::spawn(async move {
            for topic in &topics {
                if let Err(err) = setup_client.subscribe(topic, QoS::AtLeastOnce).await {
                    warn!("Could not subscribe to {topic}: {err}");
                    return;
                }
            }
            if let Err(err) = publisher::publish_discovery(
                &setup_client,
                &prefix,
                &announce,
                &snapshot.components,
            )
            .await
            {
                warn!("Could not publish the discovery announcements: {err}");
            }
        });

        MqttState {
            client,
            discovery_prefix: config.discovery_prefix.clone(),
            device_data: Arc::clone(device_data),
            discovery,
        }
    }

    /// Starts the periodic state publishers.
    ///
    /// Dropping the returned tasks stops them.
    fn start_publishers(&self, mqtt: &MqttState) -> Vec<PeriodicTask> {
        vec![
            self.spawn_temperature_publisher(mqtt),
            self.spawn_fan_publisher(mqtt),
            self.spawn_chassis_publisher(mqtt),
        ]
    }

    fn spawn_temperature_publisher(&self, mqtt: &MqttState) -> PeriodicTask {
        let runner = Arc::clone(&self.runner);
        let client = mqtt.client.clone();
        let serial = mqtt.device_data.device_info.serial_number.clone();

        PeriodicTask::spawn(
            Duration::from_secs(self.config.mqtt.temperature_interval),
            move || {
                let runner = Arc::clone(&runner);
                let client = client.clone();
                let serial = serial.clone();
                async move {
                    match temperature::get_temperatures(runner.as_ref()).await {
                        Ok(components) => {
                            publisher::publish_temperatures(&client, &serial, &components)
                                .await
                                .unwrap_or_else(|err| {
                                    error!("Could not publish temperatures: {err}");
                                });
                        }
                        Err(err) => error!("Could not read temperatures: {err}"),
                    }
                }
            },
        )
    }

    fn spawn_fan_publisher(&self, mqtt: &MqttState) -> PeriodicTask {
        let runner = Arc::clone(&self.runner);
        let ipmi = self.config.ipmi.clone();
        let client = mqtt.client.clone();
        let serial = mqtt.device_data.device_info.serial_number.clone();

        PeriodicTask::spawn(
            Duration::from_secs(self.config.mqtt.fan_interval),
            move || {
                let runner = Arc::clone(&runner);
                let ipmi = ipmi.clone();
                let client = client.clone();
                let serial = serial.clone();
                async move {
                    match fan::get_fan_speeds(runner.as_ref(), &ipmi).await {
                        Ok(components) => {
                            publisher::publish_fan_speeds(&client, &serial, &components)
                                .await
                                .unwrap_or_else(|err| {
                                    error!("Could not publish fan speeds: {err}");
                                });
                        }
                        Err(err) => error!("Could not read fan speeds: {err}"),
                    }
                }
            },
        )
    }

    fn spawn_chassis_publisher(&self, mqtt: &MqttState) -> PeriodicTask {
        let runner = Arc::clone(&self.runner);
        let client = mqtt.client.clone();
        let serial = mqtt.device_data.device_info.serial_number.clone();

        PeriodicTask::spawn(
            Duration::from_secs(self.config.mqtt.chassis_interval),
            move || {
                let runner = Arc::clone(&runner);
                let client = client.clone();
                let serial = serial.clone();
                async move {
                    match chassis::get_chassis_sensors(runner.as_ref()).await {
                        Ok(components) => {
                            publisher::publish_chassis_sensors(&client, &serial, &components)
                                .await
                                .unwrap_or_else(|err| {
                                    error!("Could not publish chassis state: {err}");
                                });
                        }
                        Err(err) => error!("Could not read chassis state: {err}"),
                    }
                }
            },
        )
    }
}
