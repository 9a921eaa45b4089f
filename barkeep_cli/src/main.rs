//! Operator front end for the dispensing rig.
//!
//! Loads the TOML config, wires logging and Ctrl-C, assembles the
//! peripherals (simulated by default, real behind the `hardware` feature),
//! and executes one subcommand.

mod cli;
mod error_fmt;
mod ops;

use std::path::Path;

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::{Cli, FILE_GUARD, JSON_MODE};

fn main() {
    std::process::exit(real_main());
}

fn real_main() -> i32 {
    let args = Cli::parse();
    let _ = JSON_MODE.set(args.json);

    if let Err(e) = color_eyre::install() {
        eprintln!("error report hook failed: {e}");
    }

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", error_fmt::format_error_json(&err));
            } else {
                eprintln!("{}", error_fmt::humanize(&err));
            }
            error_fmt::exit_code_for_error(&err)
        }
    }
}

fn run(args: &Cli) -> Result<i32> {
    let cfg = barkeep_config::load_file(&args.config)?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid config {}", args.config.display()))?;
    init_tracing(args.json, &args.log_level, &cfg.logging)?;
    ops::run(&args.cmd, &cfg, args.json)
}

/// Console logging on stderr (pretty or JSON), plus an optional JSON file
/// sink from `[logging]`. Command results stay on stdout.
fn init_tracing(json: bool, level: &str, logging: &barkeep_config::Logging) -> Result<()> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json {
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    } else {
        layers.push(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    }

    if let Some(file) = &logging.file {
        let path = Path::new(file);
        let dir = match path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        let name = match path.file_name() {
            Some(n) => n,
            None => eyre::bail!("logging.file must name a file, got {file:?}"),
        };
        let appender = match logging.rotation.as_deref() {
            None | Some("never") => tracing_appender::rolling::never(dir, name),
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            Some(other) => {
                eyre::bail!("logging.rotation must be never|daily|hourly, got {other:?}")
            }
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_filter = EnvFilter::new(logging.level.as_deref().unwrap_or("info"));
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}
