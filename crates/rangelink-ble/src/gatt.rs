use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use rangelink_core::Slot;

use crate::framing::{split_into_chunks, FragmentOutcome, ReassemblyBuffer, MAX_CHUNK_SIZE};

pub const SERVICE_UUID: &str = "0000ffc9-0000-1000-8000-00805f9b34fb";
pub const NOTIFY_CHARACTERISTIC_UUID: &str = "0000ffe1-0000-1000-8000-00805f9b34fb";
pub const WRITE_CHARACTERISTIC_UUID: &str = "0000ffe2-0000-1000-8000-00805f9b34fb";

/// Update callback of one subscribed central: notify values written here
/// arrive as characteristic notifications on that central.
#[derive(Debug, Clone)]
pub struct NotifySender {
    id: u64,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl NotifySender {
    pub fn new(id: u64, tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Best-effort notify write. Returns false when the central is gone;
    /// callers treat that as a drop, not an error.
    pub fn write(&self, value: Vec<u8>) -> bool {
        self.tx.send(value).is_ok()
    }
}

/// Capability set of one GATT characteristic role. Unsupported
/// operations default to no-ops, mirroring an optional-callback model.
pub trait GattCharacteristic {
    fn uuid(&self) -> &'static str;

    fn on_read(&mut self) -> Vec<u8> {
        Vec::new()
    }

    fn on_write(&mut self, _bytes: &[u8]) {}

    fn on_subscribe(&mut self, _subscriber: NotifySender) {}

    fn on_unsubscribe(&mut self, _subscriber_id: u64) {}
}

/// Notify characteristic: centrals subscribe here to receive relayed
/// messages. Holds the single-subscriber slot; a subscribe displaces
/// the previous central, an unsubscribe only clears its own claim.
pub struct NotifyCharacteristic {
    slot: Arc<Slot<NotifySender>>,
    ready_value: Vec<u8>,
}

impl NotifyCharacteristic {
    pub fn new(slot: Arc<Slot<NotifySender>>) -> Self {
        let ready_value =
            serde_json::to_vec(&json!({ "type": "ready" })).unwrap_or_default();
        Self { slot, ready_value }
    }

    pub fn subscriber_slot(&self) -> Arc<Slot<NotifySender>> {
        Arc::clone(&self.slot)
    }
}

impl GattCharacteristic for NotifyCharacteristic {
    fn uuid(&self) -> &'static str {
        NOTIFY_CHARACTERISTIC_UUID
    }

    fn on_read(&mut self) -> Vec<u8> {
        self.ready_value.clone()
    }

    fn on_subscribe(&mut self, subscriber: NotifySender) {
        debug!(subscriber = subscriber.id(), "central subscribed to notifications");
        self.slot.set(subscriber.id(), subscriber);
    }

    fn on_unsubscribe(&mut self, subscriber_id: u64) {
        if self.slot.clear_if(subscriber_id) {
            debug!(subscriber = subscriber_id, "central unsubscribed");
        }
    }
}

/// Write characteristic: centrals stream terminator-delimited JSON
/// fragments here. Complete decoded messages are handed to the relay
/// inbox; malformed or overflowing streams are dropped in the buffer.
pub struct WriteCharacteristic {
    buffer: ReassemblyBuffer,
    inbox: mpsc::UnboundedSender<Value>,
}

impl WriteCharacteristic {
    pub fn new(buffer: ReassemblyBuffer, inbox: mpsc::UnboundedSender<Value>) -> Self {
        Self { buffer, inbox }
    }
}

impl GattCharacteristic for WriteCharacteristic {
    fn uuid(&self) -> &'static str {
        WRITE_CHARACTERISTIC_UUID
    }

    fn on_write(&mut self, bytes: &[u8]) {
        match self.buffer.push(bytes) {
            FragmentOutcome::Complete(message) => {
                trace!("complete message received on write characteristic");
                let _ = self.inbox.send(message);
            }
            FragmentOutcome::Incomplete => {
                trace!(pending = self.buffer.len(), "awaiting more fragments");
            }
            // Already logged in the buffer; contained to this message.
            FragmentOutcome::ParseFailed | FragmentOutcome::Overflow => {}
        }
    }
}

/// Paced chunked sender over the current notify subscriber.
///
/// `send` serializes once, splits into chunks, and schedules delivery
/// with a fixed inter-chunk delay, returning immediately. Once
/// scheduled, every chunk is attempted even if the central unsubscribes
/// mid-sequence; writes to a gone central are dropped. Concurrent sends
/// are not serialized against each other — callers must not interleave.
#[derive(Debug, Clone)]
pub struct ChunkedNotifier {
    slot: Arc<Slot<NotifySender>>,
    chunk_delay: Duration,
}

impl ChunkedNotifier {
    pub fn new(slot: Arc<Slot<NotifySender>>, chunk_delay: Duration) -> Self {
        Self { slot, chunk_delay }
    }

    /// Schedules a chunked send to the current subscriber. Returns false
    /// (a logged no-op) when nobody is subscribed.
    pub fn send(&self, message: &Value) -> bool {
        let Some(subscriber) = self.slot.get() else {
            debug!("no subscribed central to notify");
            return false;
        };
        let payload = serde_json::to_vec(message).unwrap_or_default();
        let chunks = split_into_chunks(&payload, MAX_CHUNK_SIZE);
        let delay = self.chunk_delay;
        trace!(
            subscriber = subscriber.id(),
            chunks = chunks.len(),
            "scheduling chunked notify"
        );
        tokio::spawn(async move {
            for chunk in chunks {
                if chunk.index > 0 {
                    tokio::time::sleep(delay).await;
                }
                if !subscriber.write(chunk.bytes) {
                    trace!(index = chunk.index, "central gone, dropping chunk");
                }
            }
        });
        true
    }
}

/// In-process peripheral exposing the central-side operations of the
/// service: write bytes, subscribe to notifications, unsubscribe, read.
pub struct VirtualPeripheral {
    notify: NotifyCharacteristic,
    write: WriteCharacteristic,
    next_subscriber_id: u64,
}

impl VirtualPeripheral {
    pub fn new(notify: NotifyCharacteristic, write: WriteCharacteristic) -> Self {
        Self {
            notify,
            write,
            next_subscriber_id: 0,
        }
    }

    pub fn service_uuid(&self) -> &'static str {
        SERVICE_UUID
    }

    /// One write operation against the write characteristic.
    pub fn central_write(&mut self, bytes: &[u8]) {
        self.write.on_write(bytes);
    }

    /// Subscribes a central to the notify characteristic, displacing any
    /// previous subscriber. Returns the subscription id and the
    /// notification stream.
    pub fn central_subscribe(&mut self) -> (u64, mpsc::UnboundedReceiver<Vec<u8>>) {
        self.next_subscriber_id += 1;
        let id = self.next_subscriber_id;
        let (tx, rx) = mpsc::unbounded_channel();
        self.notify.on_subscribe(NotifySender::new(id, tx));
        (id, rx)
    }

    pub fn central_unsubscribe(&mut self, subscriber_id: u64) {
        self.notify.on_unsubscribe(subscriber_id);
    }

    pub fn central_read(&mut self) -> Vec<u8> {
        self.notify.on_read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{ReassemblyLimits, MESSAGE_TERMINATOR};

    fn peripheral() -> (VirtualPeripheral, mpsc::UnboundedReceiver<Value>) {
        let slot = Arc::new(Slot::new());
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let peripheral = VirtualPeripheral::new(
            NotifyCharacteristic::new(slot),
            WriteCharacteristic::new(
                ReassemblyBuffer::new(ReassemblyLimits::default()),
                inbox_tx,
            ),
        );
        (peripheral, inbox_rx)
    }

    #[tokio::test]
    async fn fragmented_write_reaches_the_inbox_once_terminated() {
        let (mut peripheral, mut inbox) = peripheral();
        peripheral.central_write(b"{\"action\":\"netlink_qu");
        peripheral.central_write(b"ery_device_list\"}");
        assert!(inbox.try_recv().is_err());
        peripheral.central_write(MESSAGE_TERMINATOR);
        assert_eq!(
            inbox.try_recv().expect("complete message"),
            json!({"action": "netlink_query_device_list"})
        );
    }

    #[tokio::test]
    async fn read_serves_the_ready_value() {
        let (mut peripheral, _inbox) = peripheral();
        let value: Value =
            serde_json::from_slice(&peripheral.central_read()).expect("ready value json");
        assert_eq!(value, json!({"type": "ready"}));
    }

    #[tokio::test]
    async fn subscribe_takes_the_slot_and_unsubscribe_is_guarded() {
        let slot = Arc::new(Slot::new());
        let (inbox_tx, _inbox_rx) = mpsc::unbounded_channel();
        let mut peripheral = VirtualPeripheral::new(
            NotifyCharacteristic::new(Arc::clone(&slot)),
            WriteCharacteristic::new(ReassemblyBuffer::default(), inbox_tx),
        );

        let (first, _rx1) = peripheral.central_subscribe();
        let (second, _rx2) = peripheral.central_subscribe();
        assert_eq!(slot.owner(), Some(second));

        // The stale central's unsubscribe must not clear the newer one.
        peripheral.central_unsubscribe(first);
        assert_eq!(slot.owner(), Some(second));

        peripheral.central_unsubscribe(second);
        assert!(slot.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn chunked_notify_delivers_in_order_with_terminator() {
        let (mut peripheral, _inbox) = peripheral();
        let slot = peripheral.notify.subscriber_slot();
        let notifier = ChunkedNotifier::new(slot, Duration::from_millis(50));
        let (_id, mut notifications) = peripheral.central_subscribe();

        let message = json!({ "filler": "y".repeat(220) });
        assert!(notifier.send(&message));

        let mut wire = Vec::new();
        let expected_len = serde_json::to_vec(&message).expect("serialize").len();
        while !wire.ends_with(MESSAGE_TERMINATOR) {
            let chunk = notifications.recv().await.expect("chunk delivered");
            assert!(chunk.len() <= MAX_CHUNK_SIZE + MESSAGE_TERMINATOR.len());
            wire.extend_from_slice(&chunk);
        }
        assert_eq!(wire.len(), expected_len + MESSAGE_TERMINATOR.len());
        let decoded: Value =
            serde_json::from_slice(&wire[..expected_len]).expect("reassembled json");
        assert_eq!(decoded, message);
    }

    #[tokio::test]
    async fn notify_without_subscriber_is_a_reported_no_op() {
        let slot: Arc<Slot<NotifySender>> = Arc::new(Slot::new());
        let notifier = ChunkedNotifier::new(slot, Duration::from_millis(50));
        assert!(!notifier.send(&json!({"type": "control"})));
    }

    #[tokio::test(start_paused = true)]
    async fn chunks_keep_flowing_after_the_central_goes_away() {
        let slot = Arc::new(Slot::new());
        let notifier = ChunkedNotifier::new(Arc::clone(&slot), Duration::from_millis(50));
        let (tx, rx) = mpsc::unbounded_channel();
        slot.set(1, NotifySender::new(1, tx));

        let message = json!({ "filler": "z".repeat(300) });
        assert!(notifier.send(&message));
        drop(rx);

        // The in-flight send keeps attempting the remaining chunks;
        // nothing panics and a later send still reports the live slot.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(notifier.send(&json!({"type": "ping"})));
    }
}
