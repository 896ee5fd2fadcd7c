//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared configuration and logging primitives."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, Subscriber};
use tracing_appender::{non_blocking::WorkerGuard, rolling::daily};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "GRIDFAULT_LOG";

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Record format of the log file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

fn env_filter(default_directive: &str) -> EnvFilter {
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive))
}

// Stdout carries command results, so the console goes to stderr.
fn console_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fmt::layer().with_target(false).with_writer(std::io::stderr)
}

/// Daily-rolling log file under `config.directory`, plus warnings on stderr.
///
/// `GRIDFAULT_LOG` overrides the filter, then `RUST_LOG`, then `info`.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);
    let appender = daily(&config.directory, format!("{prefix}.log"));
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);

    let file_layer = match config.format {
        LogFormat::StructuredJson => fmt::layer().json().with_writer(file_writer).boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_ansi(false)
            .with_writer(file_writer)
            .boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(file_layer)
        .with(console_layer().with_filter(LevelFilter::WARN))
        .try_init()
        .is_ok();
    if !installed {
        debug!("global subscriber already set, log file not attached");
    }

    info!(service = %service_name, log_dir = %config.directory.display(), format = ?config.format, "tracing initialised");
    Ok(())
}

/// Stderr-only subscriber for interactive runs.
pub fn init_console() {
    let _ = tracing_subscriber::registry()
        .with(env_filter("warn"))
        .with(console_layer())
        .try_init();
}
