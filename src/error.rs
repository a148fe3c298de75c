use thiserror::Error;

/// All the failure modes of the bridge.
///
/// Background tasks and the MQTT command router catch and log these locally;
/// HTTP handlers turn them into a 400 response.
#[derive(Error, Debug)]
pub enum Error {
    /// The external `ipmitool` invocation failed or could not be spawned.
    #[error("ipmi command `{command}` failed: {message}")]
    Command { command: String, message: String },

    /// `ipmitool` succeeded but its output did not have the expected shape.
    ///
    /// Carries the raw output so operators can diagnose unsupported hardware.
    #[error("could not parse `{query}` output: {output}")]
    Parse { query: &'static str, output: String },

    /// A malformed inbound HTTP or MQTT payload, rejected at the boundary.
    #[error("invalid payload: {0}")]
    Validation(String),

    /// Required device identity data is missing from the FRU inventory.
    ///
    /// Downstream topic naming depends on the serial number, so this aborts
    /// the whole collection pass.
    #[error("device identity is incomplete: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, Error>;
