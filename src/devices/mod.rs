//! Device models that share the simulated household with the battery.

/// Battery pack: SOC, energy counters, cell temperature.
pub mod battery;
/// Synthetic household consumption.
pub mod household;
/// Optional PV input.
pub mod solar;
pub mod types;
/// WiFi RSSI placeholder.
pub mod wifi;

pub use battery::{BatteryPack, EnergyTotals};
pub use household::{EventKind, HouseholdLoad, LoadEvent};
pub use solar::PvArray;
pub use types::{Device, DeviceContext};
pub use wifi::WifiSignal;
