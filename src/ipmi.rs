//! Sensor and command abstraction layer over `ipmitool`.
//!
//! Everything that knows about the shape of `ipmitool` output lives below this
//! module, so callers only ever see typed [`component::Component`] values.

/// Contains the chassis status parser and the known chassis field table
pub mod chassis;
/// Contains the entity and component model shared by all parsers and publishers
pub mod component;
/// Contains the device identity parser and the full collection pass
pub mod device;
/// Contains the command executor and the command string builder
pub mod executor;
/// Contains the fan parsers, fan speed commands and the Dell override protocol
pub mod fan;
/// Contains the temperature table parser
pub mod temperature;
