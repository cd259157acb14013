use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod http;
mod store;
mod triggers;
mod ws;

use rangelink_ble::{
    Advertiser, AdvertisingManager, ChunkedNotifier, LifecycleConfig, NotifyCharacteristic,
    ReassemblyBuffer, ReassemblyLimits, VirtualPeripheral, WriteCharacteristic, SERVICE_UUID,
};
use rangelink_core::{known_devices, ConfigStore, EmbeddedStatus, Slot, TransportSource};
use rangelink_relay::{BroadcastHub, Relay};

use crate::config::ServerConfig;
use crate::http::AppState;
use crate::store::FileStore;

/// Combined HTTP/WebSocket/BLE simulator for the RangeLink hardware stack.
#[derive(Debug, Parser)]
#[command(name = "rangelink-server", version)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Simulator advertising backend: there is no radio, so advertising is
/// observable through the log only.
struct LogAdvertiser;

impl Advertiser for LogAdvertiser {
    type Error = &'static str;

    fn start_advertising(
        &mut self,
        local_name: &str,
        service_uuids: &[String],
    ) -> Result<(), Self::Error> {
        info!(local_name, services = %service_uuids.join(","), "advertising");
        Ok(())
    }

    fn stop_advertising(&mut self) {
        info!("advertising stopped");
    }
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = match ServerConfig::new(cli.config) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid configuration");
            std::process::exit(1);
        }
    };

    let device_config = Arc::new(ConfigStore::default());
    let embedded = Arc::new(Mutex::new(EmbeddedStatus::new(http::now_unix_secs())));

    let subscriber_slot = Arc::new(Slot::new());
    let (inbox_tx, mut inbox_rx) = mpsc::unbounded_channel();
    let peripheral = Arc::new(Mutex::new(VirtualPeripheral::new(
        NotifyCharacteristic::new(Arc::clone(&subscriber_slot)),
        WriteCharacteristic::new(
            ReassemblyBuffer::new(ReassemblyLimits {
                max_buffer: config.reassembly_max_buffer,
                stall_timeout: config.reassembly_stall_timeout,
            }),
            inbox_tx,
        ),
    )));

    let relay = Relay::new(
        Arc::new(BroadcastHub::new()),
        Arc::new(Slot::new()),
        ChunkedNotifier::new(Arc::clone(&subscriber_slot), config.chunk_delay),
        Arc::clone(&device_config),
        known_devices(),
    );

    // Mobile-side inbox: complete BLE messages arrive here decoded and
    // enter the dispatcher serialized through this one task.
    let inbox_relay = relay.clone();
    tokio::spawn(async move {
        while let Some(message) = inbox_rx.recv().await {
            inbox_relay.dispatch(TransportSource::Mobile, message);
        }
    });

    let lifecycle = AdvertisingManager::spawn(
        LogAdvertiser,
        LifecycleConfig {
            local_name: config.ble_local_name.clone(),
            service_uuids: vec![SERVICE_UUID.to_string()],
            advertise_interval: config.advertise_interval,
            reconnect_delay: config.reconnect_delay,
        },
    );
    lifecycle.power_on();

    if std::io::stdin().is_terminal() {
        triggers::spawn(relay.clone());
    }

    let addr = format!("{}:{}", config.http_bind, config.http_port);
    let state = AppState {
        relay,
        peripheral,
        lifecycle,
        store: FileStore::new(config.data_dir.clone()),
        embedded,
        config: Arc::new(config),
    };

    info!(
        service = SERVICE_UUID,
        "starting combined HTTP/WebSocket/BLE simulation"
    );
    http::serve(&addr, state).await;
}
