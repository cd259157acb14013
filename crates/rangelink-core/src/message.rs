use serde_json::{json, Value};

use crate::device::KnownDevice;

/// Discriminant field naming the message family on the wire.
pub const FIELD_TYPE: &str = "type";
/// Verb field naming the requested operation.
pub const FIELD_ACTION: &str = "action";
/// Carried payload of a forward request.
pub const FIELD_CONTENT: &str = "content";

/// Which transport a message entered the relay through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSource {
    /// Game client, via the WebSocket channel.
    Game,
    /// Mobile app, via the BLE write characteristic.
    Mobile,
}

/// Routing decision for one inbound message, evaluated in rule order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingIntent {
    /// Netlink forward request: re-wrap `content` and emit to the
    /// opposite transport.
    Forward { content: Value },
    /// Device-list query: answered locally, never forwarded.
    QueryDeviceList,
    /// Anything else: best-effort verbatim forward.
    Passthrough,
}

/// Classifies an inbound message by source transport.
///
/// The two transports speak slightly different dialects: the game side
/// marks a forward with `type == "netlink" && action == "forward"`,
/// the mobile side with `action == "netlink_forward"`. The device-list
/// query is only recognized on the mobile side; a game-side message
/// with that action falls through to passthrough.
pub fn classify(source: TransportSource, msg: &Value) -> RoutingIntent {
    let action = msg.get(FIELD_ACTION).and_then(Value::as_str);
    match source {
        TransportSource::Game => {
            let is_netlink = msg.get(FIELD_TYPE).and_then(Value::as_str) == Some("netlink");
            if is_netlink && action == Some("forward") {
                if let Some(content) = msg.get(FIELD_CONTENT) {
                    return RoutingIntent::Forward {
                        content: content.clone(),
                    };
                }
            }
            RoutingIntent::Passthrough
        }
        TransportSource::Mobile => {
            if action == Some("netlink_forward") {
                if let Some(content) = msg.get(FIELD_CONTENT) {
                    return RoutingIntent::Forward {
                        content: content.clone(),
                    };
                }
            }
            if action == Some("netlink_query_device_list") {
                return RoutingIntent::QueryDeviceList;
            }
            RoutingIntent::Passthrough
        }
    }
}

/// Minimal envelope wrapped around a forwarded payload.
pub fn forward_envelope(content: Value) -> Value {
    json!({ "type": "netlink", "data": content })
}

/// Reply to a device-list query.
pub fn device_list_reply(devices: &[KnownDevice]) -> Value {
    json!({
        "type": "netlink",
        "action": "device_list",
        "data": devices,
    })
}

/// Stamps the HTTP-triggered forward envelope in place: forces the
/// netlink type, the forward action, and the relay's own device name.
/// Non-object payloads are left untouched.
pub fn stamp_forward_envelope(envelope: &mut Value, device_name: &str) {
    if let Some(map) = envelope.as_object_mut() {
        map.insert(FIELD_ACTION.into(), Value::from("forward"));
        map.insert(FIELD_TYPE.into(), Value::from("netlink"));
        map.insert("device".into(), Value::from(device_name));
    }
}
