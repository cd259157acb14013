use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info};

use crate::gatt::SERVICE_UUID;

/// Platform advertising capability. The simulator backend just logs;
/// a hardware backend would drive the radio here.
pub trait Advertiser: Send + 'static {
    type Error: std::fmt::Display;

    fn start_advertising(
        &mut self,
        local_name: &str,
        service_uuids: &[String],
    ) -> Result<(), Self::Error>;

    fn stop_advertising(&mut self);
}

/// Radio/advertising state of the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    PoweredOff,
    /// Powered on and discoverable, no central connected.
    Advertising,
    /// A central is connected; advertising continues so the peripheral
    /// stays discoverable.
    Connected,
}

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub local_name: String,
    pub service_uuids: Vec<String>,
    /// Period of the re-advertise ticker countering advertisement expiry.
    pub advertise_interval: Duration,
    /// Pause before advertising restarts after a central disconnects.
    pub reconnect_delay: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            local_name: "RangeLink Proxy".to_string(),
            service_uuids: vec![SERVICE_UUID.to_string()],
            advertise_interval: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
enum LifecycleEvent {
    PowerOn,
    PowerOff,
    PeerConnected,
    PeerDisconnected,
    RestartAdvertising,
}

/// Handle over the advertising lifecycle task.
///
/// Liveness policy, not correctness-critical: advertise failures are
/// logged and the state machine carries on.
#[derive(Debug, Clone)]
pub struct AdvertisingManager {
    events: mpsc::UnboundedSender<LifecycleEvent>,
    state: watch::Receiver<RadioState>,
}

impl AdvertisingManager {
    pub fn spawn<A: Advertiser>(advertiser: A, config: LifecycleConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(RadioState::PoweredOff);
        tokio::spawn(run(advertiser, config, events_rx, events_tx.clone(), state_tx));
        Self {
            events: events_tx,
            state: state_rx,
        }
    }

    pub fn power_on(&self) {
        let _ = self.events.send(LifecycleEvent::PowerOn);
    }

    pub fn power_off(&self) {
        let _ = self.events.send(LifecycleEvent::PowerOff);
    }

    pub fn peer_connected(&self) {
        let _ = self.events.send(LifecycleEvent::PeerConnected);
    }

    pub fn peer_disconnected(&self) {
        let _ = self.events.send(LifecycleEvent::PeerDisconnected);
    }

    pub fn state(&self) -> RadioState {
        *self.state.borrow()
    }
}

fn advertise<A: Advertiser>(advertiser: &mut A, config: &LifecycleConfig) {
    if let Err(err) = advertiser.start_advertising(&config.local_name, &config.service_uuids) {
        error!(%err, "advertising failed");
    }
}

async fn run<A: Advertiser>(
    mut advertiser: A,
    config: LifecycleConfig,
    mut events: mpsc::UnboundedReceiver<LifecycleEvent>,
    events_tx: mpsc::UnboundedSender<LifecycleEvent>,
    state_tx: watch::Sender<RadioState>,
) {
    let mut state = RadioState::PoweredOff;
    let mut next_readvertise: Option<Instant> = None;

    loop {
        let readvertise_at = next_readvertise.unwrap_or_else(Instant::now);
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    LifecycleEvent::PowerOn => {
                        if state == RadioState::PoweredOff {
                            info!(service = %config.service_uuids.join(","), "powered on, advertising");
                            state = RadioState::Advertising;
                            advertise(&mut advertiser, &config);
                            next_readvertise = Some(Instant::now() + config.advertise_interval);
                        }
                    }
                    LifecycleEvent::PowerOff => {
                        if state != RadioState::PoweredOff {
                            info!("powered off, stopping advertising");
                        }
                        state = RadioState::PoweredOff;
                        next_readvertise = None;
                        advertiser.stop_advertising();
                    }
                    LifecycleEvent::PeerConnected => {
                        if state != RadioState::PoweredOff {
                            // Stay discoverable while connected.
                            debug!("central connected, advertising continues");
                            state = RadioState::Connected;
                        }
                    }
                    LifecycleEvent::PeerDisconnected => {
                        if state != RadioState::PoweredOff {
                            debug!(
                                delay_ms = config.reconnect_delay.as_millis() as u64,
                                "central disconnected, scheduling advertising restart"
                            );
                            state = RadioState::Advertising;
                            let tx = events_tx.clone();
                            let delay = config.reconnect_delay;
                            tokio::spawn(async move {
                                sleep(delay).await;
                                let _ = tx.send(LifecycleEvent::RestartAdvertising);
                            });
                        }
                    }
                    LifecycleEvent::RestartAdvertising => {
                        if state != RadioState::PoweredOff {
                            advertise(&mut advertiser, &config);
                            next_readvertise = Some(Instant::now() + config.advertise_interval);
                        }
                    }
                }
                let _ = state_tx.send(state);
            }
            _ = sleep_until(readvertise_at), if next_readvertise.is_some() => {
                debug!("periodic re-advertise");
                advertise(&mut advertiser, &config);
                next_readvertise = Some(Instant::now() + config.advertise_interval);
            }
        }
    }
}
