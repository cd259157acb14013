//! Virtual BLE peripheral for the RangeLink simulator.
//!
//! Models the GATT notify/write characteristic pair as chunked,
//! terminator-delimited JSON frames over an in-process link. The actual
//! radio is out of scope; the peripheral is driven by tests and by the
//! server's GATT bridge endpoint.

pub mod framing;
pub mod gatt;
pub mod lifecycle;

pub use framing::{
    split_into_chunks, Chunk, FragmentOutcome, ReassemblyBuffer, ReassemblyLimits, MAX_CHUNK_SIZE,
    MESSAGE_TERMINATOR,
};
pub use gatt::{
    ChunkedNotifier, GattCharacteristic, NotifyCharacteristic, NotifySender, VirtualPeripheral,
    WriteCharacteristic, NOTIFY_CHARACTERISTIC_UUID, SERVICE_UUID, WRITE_CHARACTERISTIC_UUID,
};
pub use lifecycle::{Advertiser, AdvertisingManager, LifecycleConfig, RadioState};
