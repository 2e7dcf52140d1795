//! Subcommand bodies. Each takes an already validated `Config`.

use eyre::WrapErr;
use spc_config::{Config, TimeWindow};
use spc_core::error::SpcError;
use spc_core::util::{display_ts, window_start};
use spc_core::CsvStore;
use spc_traits::MeasurementStore;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::console::run_console;
use crate::station::Station;

const TICK: Duration = Duration::from_millis(50);
/// Log lines printed per sensor in the text summary.
const SUMMARY_LOG_LINES: usize = 5;

/// Run every device until the duration elapses or Ctrl-C arrives, then
/// print a per-sensor summary.
pub fn run(cfg: &Config, duration_s: Option<u64>, no_measure: bool, json: bool) -> eyre::Result<()> {
    let mut station = Station::build(cfg)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        // A second registration in the same process fails; the first handler still works.
        if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "could not install Ctrl-C handler");
        }
    }

    station.start_all(!no_measure);
    station.start_monitor();
    tracing::info!(devices = station.devices().len(), ?duration_s, "station running");

    let deadline = duration_s.map(|s| Instant::now() + Duration::from_secs(s));
    while !stop.load(Ordering::Relaxed) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        std::thread::sleep(TICK);
    }
    if stop.load(Ordering::Relaxed) {
        tracing::info!("interrupted");
    }

    station.shutdown();
    print_summary(&station, json)
}

fn print_summary(station: &Station, json: bool) -> eyre::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for d in station.devices() {
        let status = d.sensor.status();
        let logs = d.sensor.get_logs();
        let alert = d.sensor.latest_alert(station.alert_lookback());
        if json {
            let line = serde_json::json!({
                "sensor": status,
                "alert": alert,
                "logs": logs,
            });
            writeln!(out, "{line}")?;
        } else {
            let last = status
                .last_value
                .map_or_else(|| "-".to_owned(), |v| v.to_string());
            writeln!(
                out,
                "{}: {} last={} ucl={} lcl={}",
                status.name, status.state, last, status.ucl, status.lcl
            )?;
            if let Some(a) = alert {
                writeln!(out, "  {a}")?;
            }
            for l in logs.iter().rev().take(SUMMARY_LOG_LINES).rev() {
                writeln!(out, "  {l}")?;
            }
        }
    }
    Ok(())
}

/// Print the stored measurements of `sensor` inside the look-back window.
pub fn query(cfg: &Config, sensor: &str, window: &str, json: bool) -> eyre::Result<()> {
    let window: TimeWindow = window.parse()?;
    if cfg.device(sensor).is_none() {
        return Err(SpcError::UnknownSensor(sensor.to_owned()).into());
    }
    if cfg.storage.in_memory {
        eyre::bail!("query reads the CSV store; [storage] in_memory keeps nothing on disk");
    }
    let dir = cfg.storage.dir.as_str();
    let store = CsvStore::open(dir).wrap_err_with(|| format!("open storage dir {dir}"))?;
    let since = window_start(chrono::Utc::now(), window.as_duration());
    let rows = store
        .query_window(sensor, since)
        .map_err(|e| SpcError::Storage(e.to_string()))?;
    tracing::debug!(sensor, window = window.label(), rows = rows.len(), "query");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for m in &rows {
        if json {
            writeln!(out, "{}", serde_json::to_string(m)?)?;
        } else {
            writeln!(out, "{}\t{}", display_ts(m.measured_at), m.value)?;
        }
    }
    if !json {
        writeln!(out, "{} measurement(s) in the last {}", rows.len(), window.label())?;
    }
    Ok(())
}

/// Assemble the station without starting anything.
pub fn self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    let station = Station::build(cfg)?;
    let names: Vec<&str> = station.devices().iter().map(|d| d.sensor.name()).collect();
    if json {
        println!("{}", serde_json::json!({ "ok": true, "devices": names }));
    } else {
        println!("ok: {} device(s): {}", names.len(), names.join(", "));
    }
    Ok(())
}

/// Interactive session on stdin/stdout with the monitor running.
pub fn console(cfg: &Config) -> eyre::Result<()> {
    let mut station = Station::build(cfg)?;
    station.start_monitor();
    let stdin = std::io::stdin();
    let result = run_console(&station, stdin.lock(), std::io::stdout());
    station.shutdown();
    result
}
