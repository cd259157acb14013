use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use rangelink_ble::{AdvertisingManager, VirtualPeripheral};
use rangelink_core::device::{CHANNEL_MAX, CHANNEL_MIN};
use rangelink_core::{EmbeddedStatus, WorkMode};
use rangelink_relay::Relay;

use crate::config::ServerConfig;
use crate::store::{FileStore, StoreError};
use crate::ws;

/// SSIDs repeated into the mocked scan result.
const WIFI_SSIDS: [&str; 3] = ["cjyw", "cjyw2", "cjyw5G"];
const WIFI_SCAN_RESULT_LEN: usize = 15;

#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    pub peripheral: Arc<Mutex<VirtualPeripheral>>,
    pub lifecycle: AdvertisingManager,
    pub store: FileStore,
    pub embedded: Arc<Mutex<EmbeddedStatus>>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/game/save", post(game_save))
        .route("/game/load", post(game_load))
        .route("/netlink/wifi/scan", post(wifi_scan))
        .route("/netlink/wifi/connect", post(wifi_connect))
        .route("/netlink/config", post(netlink_config))
        .route("/netlink/start", post(netlink_start))
        .route("/netlink/stop", post(netlink_stop))
        .route("/netlink/status", post(netlink_status))
        .route("/netlink/forward-data", post(forward_data))
        .route("/system/embedded/status", post(embedded_status))
        .route("/system/embedded/threshold", post(embedded_threshold))
        .route("/websocket", get(ws::game_channel))
        .route("/gatt", get(ws::gatt_bridge))
        .fallback(fallback)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(addr: &str, state: AppState) {
    let app = build_router(state);
    info!(%addr, "combined simulator listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind address");
    axum::serve(listener, app).await.expect("serve");
}

pub(crate) fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn ok() -> Response {
    Json(json!({"code": 0, "msg": ""})).into_response()
}

fn ok_with(data: Value) -> Response {
    Json(json!({"code": 0, "msg": "", "data": data})).into_response()
}

fn bad_request(msg: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"code": 1, "msg": msg})),
    )
        .into_response()
}

async fn game_save(State(state): State<AppState>, body: String) -> Response {
    let Ok(request) = serde_json::from_str::<Value>(&body) else {
        return bad_request("Invalid JSON");
    };
    let data_id = request.get("data_id").and_then(Value::as_str);
    let content = request.get("content").and_then(Value::as_str);
    let (Some(data_id), Some(content)) = (data_id, content) else {
        return bad_request("Missing data_id or content");
    };
    info!(data_id, "saving game data");
    match state.store.save(data_id, content).await {
        Ok(()) => ok(),
        Err(StoreError::InvalidId) => bad_request("Invalid data_id"),
        Err(err) => {
            error!(%err, data_id, "save failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"code": 1, "msg": "Failed to save file"})),
            )
                .into_response()
        }
    }
}

async fn game_load(State(state): State<AppState>, body: String) -> Response {
    let Ok(request) = serde_json::from_str::<Value>(&body) else {
        return bad_request("Invalid JSON");
    };
    let Some(data_id) = request.get("data_id").and_then(Value::as_str) else {
        return bad_request("Missing data_id");
    };
    info!(data_id, "loading game data");
    match state.store.load(data_id).await {
        Ok(content) => Json(json!({"code": 0, "data": content})).into_response(),
        Err(StoreError::InvalidId) => bad_request("Invalid data_id"),
        Err(err) => {
            error!(%err, data_id, "load failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"code": 1, "msg": "Failed to load file"})),
            )
                .into_response()
        }
    }
}

async fn wifi_scan(State(state): State<AppState>) -> Response {
    info!(delay = ?state.config.wifi_scan_delay, "simulating wifi scan");
    tokio::time::sleep(state.config.wifi_scan_delay).await;
    let ssid_list: Vec<&str> = WIFI_SSIDS
        .iter()
        .copied()
        .cycle()
        .take(WIFI_SCAN_RESULT_LEN)
        .collect();
    info!("wifi scan completed");
    ok_with(json!({ "ssid_list": ssid_list }))
}

/// Pulls WiFi credentials out of either the plain payload or the legacy
/// wrapped form, where they ride inside a forwarded netlink envelope as
/// a JSON-encoded string.
pub(crate) fn extract_wifi_credentials(request: &Value) -> Option<(String, String)> {
    let ssid = request.get("ssid").and_then(Value::as_str);
    let password = request.get("password").and_then(Value::as_str);
    if let (Some(ssid), Some(password)) = (ssid, password) {
        return Some((ssid.to_string(), password.to_string()));
    }

    if request.get("type").and_then(Value::as_str) == Some("netlink")
        && request.get("action").and_then(Value::as_str) == Some("forward")
    {
        let content = request.get("content").and_then(Value::as_str)?;
        let parsed: Value = serde_json::from_str(content).ok()?;
        let ssid = parsed.get("ssid")?.as_str()?;
        let password = parsed.get("password")?.as_str()?;
        return Some((ssid.to_string(), password.to_string()));
    }
    None
}

async fn wifi_connect(State(state): State<AppState>, body: String) -> Response {
    let Ok(request) = serde_json::from_str::<Value>(&body) else {
        return bad_request("Invalid JSON");
    };
    let Some((ssid, _password)) = extract_wifi_credentials(&request) else {
        return bad_request("Missing ssid or password");
    };
    info!(%ssid, delay = ?state.config.wifi_connect_delay, "simulating wifi connect");
    tokio::time::sleep(state.config.wifi_connect_delay).await;
    info!(%ssid, "wifi connect completed");
    ok_with(json!({}))
}

async fn netlink_config(State(state): State<AppState>, body: String) -> Response {
    let Ok(request) = serde_json::from_str::<Value>(&body) else {
        return bad_request("Invalid JSON");
    };
    let Some(channel) = request.get("channel").and_then(Value::as_i64) else {
        return bad_request("Invalid channel: must be integer between 1 and 254");
    };
    if !(CHANNEL_MIN..=CHANNEL_MAX).contains(&channel) {
        return bad_request("Invalid channel: must be integer between 1 and 254");
    }
    let work_mode = match request.get("work_mode").and_then(Value::as_str) {
        Some(raw) => match WorkMode::parse(raw) {
            Ok(mode) => mode,
            Err(err) => return bad_request(&err.to_string()),
        },
        None => return bad_request("Invalid work_mode: must be 'master' or 'slave'"),
    };
    let Some(device_name) = request.get("device_name").and_then(Value::as_str) else {
        return bad_request("Invalid device_name: must be string");
    };

    info!(
        channel,
        work_mode = work_mode.as_str(),
        device_name,
        delay = ?state.config.config_apply_delay,
        "applying netlink configuration"
    );
    tokio::time::sleep(state.config.config_apply_delay).await;
    match state
        .relay
        .device_config()
        .apply(channel, work_mode, device_name)
    {
        Ok(()) => {
            info!("netlink configuration completed");
            Json(json!({"code": 0, "msg": "Configuration successful"})).into_response()
        }
        Err(err) => bad_request(&err.to_string()),
    }
}

async fn netlink_start(State(state): State<AppState>) -> Response {
    state.relay.device_config().set_started(true);
    info!("netlink service started");
    ok()
}

async fn netlink_stop(State(state): State<AppState>) -> Response {
    state.relay.device_config().set_started(false);
    info!("netlink service stopped");
    ok()
}

async fn netlink_status(State(state): State<AppState>) -> Response {
    let config = state.relay.device_config().get();
    ok_with(serde_json::to_value(config).unwrap_or_default())
}

async fn forward_data(State(state): State<AppState>, body: String) -> Response {
    let Ok(envelope) = serde_json::from_str::<Value>(&body) else {
        return bad_request("Invalid JSON");
    };
    if !envelope.is_object() {
        return bad_request("Missing content");
    }
    state.relay.forward_from_http(envelope);
    ok()
}

async fn embedded_status(State(state): State<AppState>) -> Response {
    let mut embedded = state.embedded.lock().unwrap_or_else(|e| e.into_inner());
    embedded.touch(now_unix_secs());
    info!(threshold = embedded.threshold, "embedded status requested");
    let data = serde_json::to_value(&*embedded).unwrap_or_default();
    Json(json!({"code": 0, "msg": "Success", "data": data})).into_response()
}

/// Accepts either a JSON integer or a numeric string, like the original
/// endpoint did.
pub(crate) fn parse_threshold_value(raw: &Value) -> Option<i64> {
    raw.as_i64()
        .or_else(|| raw.as_str().and_then(|s| s.trim().parse().ok()))
}

async fn embedded_threshold(State(state): State<AppState>, body: String) -> Response {
    let Ok(request) = serde_json::from_str::<Value>(&body) else {
        return bad_request("Invalid JSON format");
    };
    let Some(raw) = request.get("value") else {
        return bad_request("Missing 'value' parameter");
    };
    let Some(value) = parse_threshold_value(raw) else {
        return bad_request("Invalid value type (must be integer)");
    };
    let mut embedded = state.embedded.lock().unwrap_or_else(|e| e.into_inner());
    match embedded.set_threshold(value) {
        Ok(()) => {
            info!(value, "sensor threshold updated");
            Json(json!({"code": 0, "msg": "Threshold set successfully"})).into_response()
        }
        Err(err) => bad_request(&err.to_string()),
    }
}

/// Unrecognized routes answer the generic ok shape; the simulated
/// device never 404s.
async fn fallback() -> Response {
    ok()
}
