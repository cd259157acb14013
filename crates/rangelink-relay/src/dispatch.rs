use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use rangelink_ble::ChunkedNotifier;
use rangelink_core::{
    classify, device_list_reply, forward_envelope, stamp_forward_envelope, ConfigStore,
    KnownDevice, RoutingIntent, Slot, TransportSource,
};

use crate::hub::{BroadcastHub, PeerId};

/// The relay context: everything the dispatcher reads or writes.
///
/// Holds no routing state of its own; the device config store is read
/// only to enrich HTTP-triggered forward envelopes. Transport write
/// failures are one-shot silent drops.
#[derive(Clone)]
pub struct Relay {
    hub: Arc<BroadcastHub>,
    game_slot: Arc<Slot<PeerId>>,
    notifier: ChunkedNotifier,
    device_config: Arc<ConfigStore>,
    known_devices: Arc<Vec<KnownDevice>>,
}

impl Relay {
    pub fn new(
        hub: Arc<BroadcastHub>,
        game_slot: Arc<Slot<PeerId>>,
        notifier: ChunkedNotifier,
        device_config: Arc<ConfigStore>,
        known_devices: Vec<KnownDevice>,
    ) -> Self {
        Self {
            hub,
            game_slot,
            notifier,
            device_config,
            known_devices: Arc::new(known_devices),
        }
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn game_slot(&self) -> &Slot<PeerId> {
        &self.game_slot
    }

    pub fn device_config(&self) -> &ConfigStore {
        &self.device_config
    }

    /// Routes one parsed message from `source` to the appropriate
    /// destination, in rule order: netlink forward, device-list query,
    /// then best-effort verbatim forward.
    pub fn dispatch(&self, source: TransportSource, message: Value) {
        match classify(source, &message) {
            RoutingIntent::Forward { content } => {
                let envelope = forward_envelope(content);
                match source {
                    TransportSource::Game => {
                        debug!("forwarding netlink payload to mobile app");
                        self.notifier.send(&envelope);
                    }
                    TransportSource::Mobile => {
                        debug!("forwarding netlink payload to game clients");
                        self.hub.broadcast(&envelope);
                    }
                }
            }
            RoutingIntent::QueryDeviceList => {
                info!("answering device-list query");
                let reply = device_list_reply(&self.known_devices);
                self.notifier.send(&reply);
            }
            RoutingIntent::Passthrough => match source {
                TransportSource::Game => {
                    self.notifier.send(&message);
                }
                TransportSource::Mobile => {
                    self.hub.broadcast(&message);
                }
            },
        }
    }

    /// HTTP-triggered forward path: stamps the envelope with the forward
    /// action, the netlink type, and the configured device name, then
    /// chunk-sends it to the mobile app.
    pub fn forward_from_http(&self, mut envelope: Value) {
        let device_name = self.device_config.device_name();
        stamp_forward_envelope(&mut envelope, &device_name);
        info!(device = %device_name, "forwarding HTTP payload to mobile app");
        self.notifier.send(&envelope);
    }

    /// Sends a locally generated message (shots, control directives) to
    /// every connected game client.
    pub fn broadcast_to_game(&self, message: &Value) -> usize {
        self.hub.broadcast(message)
    }
}
