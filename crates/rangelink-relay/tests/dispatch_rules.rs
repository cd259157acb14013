//! Routing-rule coverage: each inbound shape reaches exactly the
//! destinations the relay contract names, and no others.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use rangelink_ble::{
    ChunkedNotifier, NotifyCharacteristic, ReassemblyBuffer, VirtualPeripheral,
    WriteCharacteristic, MESSAGE_TERMINATOR,
};
use rangelink_core::{known_devices, ConfigStore, Slot, TransportSource};
use rangelink_relay::{BroadcastHub, Relay};

fn fixture() -> (Relay, VirtualPeripheral, mpsc::UnboundedReceiver<Value>) {
    let subscriber_slot = Arc::new(Slot::new());
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let peripheral = VirtualPeripheral::new(
        NotifyCharacteristic::new(Arc::clone(&subscriber_slot)),
        WriteCharacteristic::new(ReassemblyBuffer::default(), inbox_tx),
    );
    let relay = Relay::new(
        Arc::new(BroadcastHub::new()),
        Arc::new(Slot::new()),
        ChunkedNotifier::new(subscriber_slot, Duration::from_millis(50)),
        Arc::new(ConfigStore::default()),
        known_devices(),
    );
    (relay, peripheral, inbox_rx)
}

/// Drains one full chunked message off a notification stream.
async fn recv_notified(notifications: &mut mpsc::UnboundedReceiver<Vec<u8>>) -> Value {
    let mut wire = Vec::new();
    while !wire.ends_with(MESSAGE_TERMINATOR) {
        let chunk = notifications.recv().await.expect("notify chunk");
        wire.extend_from_slice(&chunk);
    }
    serde_json::from_slice(&wire[..wire.len() - MESSAGE_TERMINATOR.len()])
        .expect("reassembled json")
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test(start_paused = true)]
async fn game_forward_goes_only_to_the_mobile_transport() {
    let (relay, mut peripheral, _inbox) = fixture();
    let (_id, mut notifications) = peripheral.central_subscribe();
    let (_game, mut game_rx) = relay.hub().add_peer();

    relay.dispatch(
        TransportSource::Game,
        json!({"type": "netlink", "action": "forward", "content": {"x": 1}}),
    );

    let delivered = recv_notified(&mut notifications).await;
    assert_eq!(delivered, json!({"type": "netlink", "data": {"x": 1}}));

    // Exactly one chunked send to mobile, zero to the game side.
    settle().await;
    assert!(notifications.try_recv().is_err());
    assert!(game_rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn mobile_forward_broadcasts_to_game_clients() {
    let (relay, mut peripheral, _inbox) = fixture();
    let (_id, mut notifications) = peripheral.central_subscribe();
    let (_game, mut game_rx) = relay.hub().add_peer();

    relay.dispatch(
        TransportSource::Mobile,
        json!({"action": "netlink_forward", "content": {"ssid": "range"}}),
    );

    let frame = game_rx.try_recv().expect("broadcast frame");
    let delivered: Value = serde_json::from_str(&frame).expect("frame json");
    assert_eq!(delivered, json!({"type": "netlink", "data": {"ssid": "range"}}));

    settle().await;
    assert!(notifications.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn device_list_query_is_answered_to_the_origin_only() {
    let (relay, mut peripheral, _inbox) = fixture();
    let (_id, mut notifications) = peripheral.central_subscribe();
    let (_game, mut game_rx) = relay.hub().add_peer();

    relay.dispatch(
        TransportSource::Mobile,
        json!({"action": "netlink_query_device_list"}),
    );

    let reply = recv_notified(&mut notifications).await;
    assert_eq!(reply["type"], "netlink");
    assert_eq!(reply["action"], "device_list");
    assert_eq!(reply["data"][0], json!({"mode": "master", "name": "cjyw01"}));
    assert_eq!(reply["data"][1], json!({"mode": "slave", "name": "yang02"}));

    // Never broadcast, never forwarded as a generic message.
    settle().await;
    assert!(game_rx.try_recv().is_err());
    assert!(notifications.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn unrecognized_messages_pass_through_verbatim() {
    let (relay, mut peripheral, _inbox) = fixture();
    let (_id, mut notifications) = peripheral.central_subscribe();
    let (_game, mut game_rx) = relay.hub().add_peer();

    let game_message = json!({"type": "score", "value": 7});
    relay.dispatch(TransportSource::Game, game_message.clone());
    assert_eq!(recv_notified(&mut notifications).await, game_message);

    let mobile_message = json!({"battery": 81});
    relay.dispatch(TransportSource::Mobile, mobile_message.clone());
    let frame = game_rx.try_recv().expect("broadcast frame");
    assert_eq!(
        serde_json::from_str::<Value>(&frame).expect("frame json"),
        mobile_message
    );
}

#[tokio::test(start_paused = true)]
async fn http_forward_is_stamped_with_the_device_name() {
    let (relay, mut peripheral, _inbox) = fixture();
    let (_id, mut notifications) = peripheral.central_subscribe();

    relay.forward_from_http(json!({"content": "{\"ch\":3}", "extra": true}));

    let delivered = recv_notified(&mut notifications).await;
    assert_eq!(delivered["action"], "forward");
    assert_eq!(delivered["type"], "netlink");
    assert_eq!(delivered["device"], "cjyw01");
    assert_eq!(delivered["extra"], true);
}

#[tokio::test(start_paused = true)]
async fn forwarding_without_a_subscriber_is_a_quiet_no_op() {
    let (relay, _peripheral, _inbox) = fixture();
    let (_game, mut game_rx) = relay.hub().add_peer();

    relay.dispatch(
        TransportSource::Game,
        json!({"type": "netlink", "action": "forward", "content": {"x": 1}}),
    );

    settle().await;
    assert!(game_rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn fragmented_ble_write_flows_through_to_a_chunked_reply() {
    let (relay, mut peripheral, mut inbox) = fixture();
    let (_id, mut notifications) = peripheral.central_subscribe();

    // The mobile app writes the query split across three packets.
    peripheral.central_write(b"{\"action\":\"netlink_");
    peripheral.central_write(b"query_device_list\"}");
    peripheral.central_write(b"\r\n");

    let message = inbox.try_recv().expect("decoded inbound message");
    relay.dispatch(TransportSource::Mobile, message);

    let reply = recv_notified(&mut notifications).await;
    assert_eq!(reply["action"], "device_list");
}
