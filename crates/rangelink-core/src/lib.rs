//! Core RangeLink primitives shared across crates.
//!
//! Includes the relay message model, routing classification, the device
//! configuration record, and base errors.

pub mod device;
pub mod error;
pub mod message;
pub mod slot;

pub use device::{known_devices, ConfigStore, DeviceConfig, EmbeddedStatus, KnownDevice, WorkMode};
pub use error::RangelinkError;
pub use message::{
    classify, device_list_reply, forward_envelope, stamp_forward_envelope, RoutingIntent,
    TransportSource,
};
pub use slot::Slot;
