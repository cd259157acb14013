use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_bind: String,
    pub http_port: u16,
    pub data_dir: PathBuf,
    pub ble_local_name: String,
    #[serde(with = "humantime_serde")]
    pub chunk_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub advertise_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub reconnect_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub wifi_scan_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub wifi_connect_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub config_apply_delay: Duration,
    pub reassembly_max_buffer: usize,
    #[serde(with = "humantime_serde")]
    pub reassembly_stall_timeout: Duration,
}

impl ServerConfig {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("http_bind", "0.0.0.0")?
            .set_default("http_port", 8080)?
            .set_default("data_dir", "data")?
            .set_default("ble_local_name", "RangeLink Proxy")?
            .set_default("chunk_delay", "50ms")?
            .set_default("advertise_interval", "10s")?
            .set_default("reconnect_delay", "1s")?
            .set_default("wifi_scan_delay", "10s")?
            .set_default("wifi_connect_delay", "10s")?
            .set_default("config_apply_delay", "10s")?
            .set_default("reassembly_max_buffer", 64 * 1024)?
            .set_default("reassembly_stall_timeout", "30s")?;

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(Environment::with_prefix("RANGELINK").try_parsing(true));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn with_env<F>(vars: &[(&str, &str)], test: F)
    where
        F: FnOnce(),
    {
        let mut old = Vec::new();
        for (k, v) in vars {
            old.push((k.to_string(), env::var(k).ok()));
            env::set_var(k, v);
        }

        test();

        for (k, maybe_old) in old {
            match maybe_old {
                Some(val) => env::set_var(k, val),
                None => env::remove_var(k),
            }
        }
    }

    #[test]
    fn defaults_are_applied() {
        let cfg = ServerConfig::new(None).expect("failed to build config");

        assert_eq!(cfg.http_bind, "0.0.0.0");
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.wifi_scan_delay, Duration::from_secs(10));
        assert_eq!(cfg.wifi_connect_delay, Duration::from_secs(10));
        assert_eq!(cfg.config_apply_delay, Duration::from_secs(10));
        assert_eq!(cfg.reconnect_delay, Duration::from_secs(1));
        assert_eq!(cfg.reassembly_stall_timeout, Duration::from_secs(30));
    }

    #[test]
    fn env_vars_override_defaults() {
        with_env(
            &[
                ("RANGELINK_BLE_LOCAL_NAME", "bench-rig"),
                ("RANGELINK_REASSEMBLY_MAX_BUFFER", "4096"),
            ],
            || {
                let cfg = ServerConfig::new(None).expect("failed to build config");
                assert_eq!(cfg.ble_local_name, "bench-rig");
                assert_eq!(cfg.reassembly_max_buffer, 4096);
            },
        );
    }

    #[test]
    fn human_readable_durations_are_parsed() {
        with_env(
            &[
                ("RANGELINK_CHUNK_DELAY", "5ms"),
                ("RANGELINK_ADVERTISE_INTERVAL", "2m30s"),
            ],
            || {
                let cfg = ServerConfig::new(None).expect("failed to build config");
                assert_eq!(cfg.chunk_delay, Duration::from_millis(5));
                assert_eq!(cfg.advertise_interval, Duration::from_secs(150));
            },
        );
    }

    #[test]
    fn file_source_overrides_defaults() {
        use std::io::Write;

        let mut tmp = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(
            tmp,
            r#"
http_bind = "127.0.0.1"
data_dir = "alt-data"
chunk_delay = "10ms"
"#
        )
        .expect("write to temp file");

        let cfg = ServerConfig::new(Some(PathBuf::from(tmp.path()))).expect("load config");
        assert_eq!(cfg.http_bind, "127.0.0.1");
        assert_eq!(cfg.data_dir, PathBuf::from("alt-data"));
        assert_eq!(cfg.chunk_delay, Duration::from_millis(10));
    }
}
