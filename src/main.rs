//! PetFeeder - host entry point
//!
//! Runs the feeder core against simulated hardware.  Commands arrive as one
//! JSON object per stdin line and each reply is printed as one JSON line.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Adapters (outer ring)                   │
//! │                                                          │
//! │  SimHardware        LogEventSink   FileStorage           │
//! │  (Sensor+Actuator)  (EventSink)    (Config+Storage)      │
//! │  SystemClock        stdin/stdout JSON commands           │
//! │  (ClockPort)                                             │
//! │                                                          │
//! │  ──────────────── Port Trait Boundary ────────────────   │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │            FeederService (pure logic)              │  │
//! │  │  Schedule · Scheduler · Dispense · Sensors · Log   │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │                                                          │
//! │  FeederRuntime (tick + sensor loops)                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Environment:
//! - `PETFEEDER_DATA_DIR` - storage root (default `./petfeeder-data`)
//! - `PETFEEDER_CONFIG` - optional JSON config file, saved over the stored one
//! - `RUST_LOG` - log filter (default `petfeeder=info`)

#![deny(unused_must_use)]

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use petfeeder::adapters::hardware::SimHardware;
use petfeeder::adapters::log_sink::LogEventSink;
use petfeeder::adapters::storage::FileStorage;
use petfeeder::adapters::time::SystemClock;
use petfeeder::app::commands::{FeederCommand, FeederReply};
use petfeeder::app::ports::{ConfigError, ConfigPort};
use petfeeder::app::service::FeederService;
use petfeeder::config::FeederConfig;
use petfeeder::runtime::FeederRuntime;

const DEFAULT_DATA_DIR: &str = "./petfeeder-data";
const SIM_HOPPER_GRAMS: u32 = 1_000;
const SIM_WATER_PERCENT: u8 = 80;

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "petfeeder=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    info!("PetFeeder v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Storage + config ───────────────────────────────────
    let data_dir =
        std::env::var("PETFEEDER_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
    let mut storage = FileStorage::open(&data_dir)
        .with_context(|| format!("opening data directory {}", data_dir))?;
    let config = load_config(&mut storage)?;

    // ── 3. Service wiring ─────────────────────────────────────
    let hw = SimHardware::new(SIM_HOPPER_GRAMS, SIM_WATER_PERCENT);
    let service = FeederService::new(
        config,
        Arc::new(SystemClock::new()),
        hw.actuator(),
        hw.sensors(),
    )
    .context("starting feeder service")?
    .with_storage(Box::new(storage));
    service.add_sink(Box::new(LogEventSink::new()));
    let service = Arc::new(service);

    // ── 4. Runtime ────────────────────────────────────────────
    let runtime = FeederRuntime::start(service.clone()).context("spawning runtime thread")?;

    // ── 5. Command loop ───────────────────────────────────────
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }
        let reply = match serde_json::from_str::<FeederCommand>(line) {
            Ok(cmd) => service.handle_command(cmd),
            Err(e) => {
                warn!("Command parse failed: {}", e);
                FeederReply::Rejected {
                    code: "bad_command",
                    message: e.to_string(),
                }
            }
        };
        serde_json::to_writer(&mut stdout, &reply)?;
        writeln!(stdout)?;
        stdout.flush()?;
    }

    runtime.shutdown();
    info!("PetFeeder stopped");
    Ok(())
}

/// Stored config, overridden by `PETFEEDER_CONFIG` when set.  A missing or
/// unreadable stored config falls back to defaults.
fn load_config(storage: &mut FileStorage) -> Result<FeederConfig> {
    if let Ok(path) = std::env::var("PETFEEDER_CONFIG") {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path))?;
        let config = FeederConfig::from_json(&text)
            .map_err(|e| anyhow::anyhow!("config file {}: {}", path, e))?;
        if let Err(e) = storage.save(&config) {
            warn!("Config not saved ({}), continuing", e);
        }
        info!("Config loaded from {}", path);
        return Ok(config);
    }

    match storage.load() {
        Ok(config) => {
            info!("Config loaded from storage");
            Ok(config)
        }
        Err(ConfigError::NotFound) => {
            info!("No stored config, using defaults");
            Ok(FeederConfig::default())
        }
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            Ok(FeederConfig::default())
        }
    }
}
