#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod console;
mod error_fmt;
mod run;
mod station;

use clap::Parser;
use eyre::WrapErr;
use spc_config::{Config, Logging};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = color_eyre::install();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        tracing::debug!(error = ?e, "command failed");
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = match cli.config.as_deref() {
        Some(path) => spc_config::load_file(path).wrap_err("invalid configuration")?,
        None => Config::default(),
    };
    init_tracing(&cli, &cfg.logging)?;
    tracing::debug!(config = ?cli.config, devices = cfg.devices.len(), "config loaded");

    match &cli.cmd {
        Commands::Run {
            duration_s,
            no_measure,
        } => run::run(&cfg, *duration_s, *no_measure, cli.json),
        Commands::Console => run::console(&cfg),
        Commands::Query { sensor, window } => run::query(&cfg, sensor, window, cli.json),
        Commands::SelfCheck => run::self_check(&cfg, cli.json),
    }
}

fn level_filter(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::WARN,
    }
}

/// Console layer on stderr (pretty or JSON), plus an optional JSON-lines
/// file layer whose writer guard lives in `FILE_GUARD`. `RUST_LOG` wins over
/// the configured level.
fn init_tracing(cli: &Cli, logging: &Logging) -> eyre::Result<()> {
    // An explicit --log-level beats the config file.
    let level = if cli.log_level != "warn" {
        cli.log_level.as_str()
    } else {
        logging.level.as_deref().unwrap_or("warn")
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter(level).into())
        .from_env_lossy();

    let json_layer = cli.json.then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!cli.json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));

    let file_layer = match logging.file.as_deref() {
        Some(file) => {
            let path = std::path::Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file '{file}' has no file name"))?;
            std::fs::create_dir_all(dir)
                .wrap_err_with(|| format!("create log dir {}", dir.display()))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(writer),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| eyre::eyre!("install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("TRACE", LevelFilter::TRACE)]
    #[case("info", LevelFilter::INFO)]
    #[case("error", LevelFilter::ERROR)]
    #[case("loud", LevelFilter::WARN)]
    fn level_names_map_to_filters(#[case] name: &str, #[case] expected: LevelFilter) {
        assert_eq!(level_filter(name), expected);
    }
}
