use mqtt_ipmi_bridge::daemon::Daemon;

use log::error;
use mqtt_ipmi_bridge::configuration;
use std::process::ExitCode;

const DEFAULT_CONFIG_PATH: &str = "/etc/mqtt-ipmi-bridge.conf";

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => path.as_str(),
        None => DEFAULT_CONFIG_PATH,
    };

    let config =
        configuration::Configuration::load(config_path).expect("Failed to load configuration");

    stderrlog::new()
        .module(module_path!())
        .verbosity(config.log_verbosity)
        .init()
        .expect("Failed to initialize logging");

    match Daemon::new(config).run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Bridge failed: {err}");
            ExitCode::FAILURE
        }
    }
}
