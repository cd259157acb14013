use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::RangelinkError;

/// Valid netlink channel range, inclusive.
pub const CHANNEL_MIN: i64 = 1;
pub const CHANNEL_MAX: i64 = 254;

/// Valid sensor threshold range, inclusive.
pub const THRESHOLD_MIN: i64 = 700;
pub const THRESHOLD_MAX: i64 = 2000;

/// Radio role of a netlink device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkMode {
    Master,
    Slave,
}

impl WorkMode {
    pub fn parse(value: &str) -> Result<Self, RangelinkError> {
        match value {
            "master" => Ok(WorkMode::Master),
            "slave" => Ok(WorkMode::Slave),
            _ => Err(RangelinkError::InvalidInput(
                "Invalid work_mode: must be 'master' or 'slave'",
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkMode::Master => "master",
            WorkMode::Slave => "slave",
        }
    }
}

/// Last-applied radio/network configuration. Process lifetime; mutated
/// only through the configuration endpoints, read by status and by
/// outbound envelope stamping.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceConfig {
    pub wifi_ip: String,
    pub channel: i64,
    pub work_mode: WorkMode,
    pub device_name: String,
    pub bluetooth_name: String,
    pub started: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            wifi_ip: "192.168.1.100".to_string(),
            channel: 0,
            work_mode: WorkMode::Master,
            device_name: "cjyw01".to_string(),
            bluetooth_name: "cjyw01-bluetooth".to_string(),
            started: true,
        }
    }
}

/// Shared handle over the device configuration record.
#[derive(Debug, Default)]
pub struct ConfigStore {
    inner: Mutex<DeviceConfig>,
}

impl ConfigStore {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            inner: Mutex::new(config),
        }
    }

    pub fn get(&self) -> DeviceConfig {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn device_name(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .device_name
            .clone()
    }

    /// Applies a validated configuration. The bluetooth name mirrors the
    /// device name. Rejected configurations leave the record untouched.
    pub fn apply(
        &self,
        channel: i64,
        work_mode: WorkMode,
        device_name: &str,
    ) -> Result<(), RangelinkError> {
        if !(CHANNEL_MIN..=CHANNEL_MAX).contains(&channel) {
            return Err(RangelinkError::InvalidInput(
                "Invalid channel: must be integer between 1 and 254",
            ));
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.channel = channel;
        inner.work_mode = work_mode;
        inner.device_name = device_name.to_string();
        inner.bluetooth_name = device_name.to_string();
        Ok(())
    }

    pub fn set_started(&self, started: bool) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .started = started;
    }
}

/// One entry in the mocked peer-device listing.
#[derive(Debug, Clone, Serialize)]
pub struct KnownDevice {
    pub mode: WorkMode,
    pub name: String,
}

/// Static mock list answered to device-list queries.
pub fn known_devices() -> Vec<KnownDevice> {
    vec![
        KnownDevice {
            mode: WorkMode::Master,
            name: "cjyw01".to_string(),
        },
        KnownDevice {
            mode: WorkMode::Slave,
            name: "yang02".to_string(),
        },
    ]
}

/// Mocked embedded-system status record.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddedStatus {
    pub heartbeat: u64,
    pub threshold: i64,
    pub temperature: i64,
    pub version: String,
}

impl EmbeddedStatus {
    pub fn new(now_unix_secs: u64) -> Self {
        Self {
            heartbeat: now_unix_secs,
            threshold: 1000,
            temperature: 28,
            version: "v1.0.0".to_string(),
        }
    }

    /// Refreshes the heartbeat timestamp; called on every status read.
    pub fn touch(&mut self, now_unix_secs: u64) {
        self.heartbeat = now_unix_secs;
    }

    pub fn set_threshold(&mut self, value: i64) -> Result<(), RangelinkError> {
        if !(THRESHOLD_MIN..=THRESHOLD_MAX).contains(&value) {
            return Err(RangelinkError::InvalidInput(
                "Value must be between 700 and 2000",
            ));
        }
        self.threshold = value;
        Ok(())
    }
}
