//! Cross-transport message relay.
//!
//! Bridges the game client's WebSocket channel, the mobile app's BLE
//! characteristic pair, and the HTTP trigger path: classifies each
//! inbound message and routes it to the opposite transport, answering
//! device-list queries locally.

pub mod dispatch;
pub mod hub;

pub use dispatch::Relay;
pub use hub::{BroadcastHub, PeerId};
