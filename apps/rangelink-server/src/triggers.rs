use std::f64::consts::PI;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{info, warn};

use rangelink_relay::Relay;

/// Burst mode fires at 20 shots per second.
const BURST_RATE: Duration = Duration::from_millis(50);
/// Enter keys inside this window are treated as key repeat.
const ENTER_DEBOUNCE: Duration = Duration::from_millis(50);

const SHOT_VARIANCE_MAX_X: f64 = 10.0;
const SHOT_VARIANCE_MAX_Y: f64 = 10.0;

/// One impact report as the low-level sensor would deliver it.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ShotData {
    pub t: u32,
    pub x: f64,
    pub y: f64,
    pub a: u32,
}

/// Fixed impact patterns the manual triggers draw from.
pub const SHOT_PATTERNS: [ShotData; 8] = [
    ShotData { t: 630, x: 100.0, y: 200.0, a: 1069 },
    ShotData { t: 630, x: 40.0, y: 300.0, a: 1069 },
    ShotData { t: 630, x: 250.0, y: 300.0, a: 1069 },
    ShotData { t: 630, x: 200.0, y: 300.0, a: 1069 },
    ShotData { t: 630, x: 200.0, y: 200.0, a: 1069 },
    ShotData { t: 630, x: 200.0, y: 100.0, a: 1069 },
    ShotData { t: 630, x: 170.0, y: 200.0, a: 1069 },
    ShotData { t: 630, x: 134.0, y: 238.2, a: 1069 },
];

pub const CENTER_SHOT: ShotData = ShotData {
    t: 630,
    x: 134.0,
    y: 238.2,
    a: 1069,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCommand {
    RandomShot,
    CenterShot,
    ToggleBurst,
    Directive(&'static str),
    Quit,
}

/// Maps a key press to a trigger command.
pub fn command_for_key(key: &KeyEvent) -> Option<TriggerCommand> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char('c') = key.code {
            return Some(TriggerCommand::Quit);
        }
        return None;
    }
    match key.code {
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'b' => Some(TriggerCommand::RandomShot),
            'c' => Some(TriggerCommand::CenterShot),
            'f' => Some(TriggerCommand::ToggleBurst),
            'h' => Some(TriggerCommand::Directive("homepage")),
            'm' => Some(TriggerCommand::Directive("compose")),
            'v' => Some(TriggerCommand::Directive("volume_up")),
            'd' => Some(TriggerCommand::Directive("volume_down")),
            'p' => Some(TriggerCommand::Directive("power")),
            _ => None,
        },
        KeyCode::Up => Some(TriggerCommand::Directive("up")),
        KeyCode::Down => Some(TriggerCommand::Directive("down")),
        KeyCode::Right => Some(TriggerCommand::Directive("right")),
        KeyCode::Left => Some(TriggerCommand::Directive("left")),
        KeyCode::Enter => Some(TriggerCommand::Directive("enter")),
        _ => None,
    }
}

/// Adds Gaussian position jitter (Box–Muller) to an impact pattern,
/// rounded to one decimal.
pub fn with_variance(base: ShotData, rng: &mut impl Rng) -> ShotData {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    let z1 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).sin();

    ShotData {
        x: ((base.x + z0 * SHOT_VARIANCE_MAX_X * 0.33) * 10.0).round() / 10.0,
        y: ((base.y + z1 * SHOT_VARIANCE_MAX_Y * 0.33) * 10.0).round() / 10.0,
        ..base
    }
}

fn shot_message(shot: ShotData) -> Value {
    json!({ "type": "data", "data": [shot] })
}

fn random_varied_shot() -> ShotData {
    let mut rng = rand::thread_rng();
    let base = SHOT_PATTERNS[rng.gen_range(0..SHOT_PATTERNS.len())];
    with_variance(base, &mut rng)
}

/// Starts the keyboard trigger interface: a blocking reader thread in
/// raw mode feeding a command task. Call only when stdin is a TTY.
pub fn spawn(relay: Relay) {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || read_keys(tx));
    tokio::spawn(run_commands(relay, rx));
    info!("keyboard triggers armed: B shot, C center, F burst, arrows/enter/H/M/V/D/P directives");
}

fn read_keys(tx: mpsc::UnboundedSender<TriggerCommand>) {
    if let Err(err) = terminal::enable_raw_mode() {
        warn!(%err, "raw mode unavailable, keyboard triggers disabled");
        return;
    }
    let mut last_enter: Option<Instant> = None;
    loop {
        let key = match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
            Ok(_) => continue,
            Err(_) => break,
        };
        let Some(command) = command_for_key(&key) else {
            continue;
        };
        if command == TriggerCommand::Quit {
            let _ = terminal::disable_raw_mode();
            std::process::exit(0);
        }
        if command == TriggerCommand::Directive("enter") {
            let now = Instant::now();
            if last_enter.is_some_and(|t| now.duration_since(t) < ENTER_DEBOUNCE) {
                continue;
            }
            last_enter = Some(now);
        }
        if tx.send(command).is_err() {
            break;
        }
    }
    let _ = terminal::disable_raw_mode();
}

async fn run_commands(relay: Relay, mut rx: mpsc::UnboundedReceiver<TriggerCommand>) {
    let mut burst: Option<tokio::task::JoinHandle<()>> = None;

    while let Some(command) = rx.recv().await {
        match command {
            TriggerCommand::RandomShot => {
                if !relay.hub().is_empty() {
                    relay.broadcast_to_game(&shot_message(random_varied_shot()));
                    info!("manual shot sent");
                }
            }
            TriggerCommand::CenterShot => {
                if !relay.hub().is_empty() {
                    relay.broadcast_to_game(&shot_message(CENTER_SHOT));
                    info!("center shot sent");
                }
            }
            TriggerCommand::ToggleBurst => {
                if let Some(task) = burst.take() {
                    task.abort();
                    info!("burst mode stopped");
                } else {
                    let burst_relay = relay.clone();
                    burst = Some(tokio::spawn(async move {
                        let mut ticker = tokio::time::interval(BURST_RATE);
                        loop {
                            ticker.tick().await;
                            if burst_relay.hub().is_empty() {
                                continue;
                            }
                            burst_relay.broadcast_to_game(&shot_message(random_varied_shot()));
                        }
                    }));
                    info!(rate_ms = BURST_RATE.as_millis() as u64, "burst mode started");
                }
            }
            TriggerCommand::Directive(directive) => {
                relay.broadcast_to_game(&json!({ "type": "control", "directive": directive }));
                info!(directive, "control directive sent");
            }
            TriggerCommand::Quit => break,
        }
    }
}
