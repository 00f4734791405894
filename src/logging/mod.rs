//! Structured logging for the stitching engine
//!
//! The library only emits `tracing` events and spans; hosts that want output
//! call [`init_logging`] once at startup.

pub mod config;
pub mod metrics;
pub mod spans;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use config::LoggingConfig;
pub use metrics::{MetricsCollector, PerformanceMeasurement, PerformanceStats, Timer};
pub use spans::{AlgorithmSpan, FrameSpan};

/// Initialize the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured levels. The returned guard
/// flushes the file writer on drop and must be kept alive for as long as file
/// logging is wanted.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let mut layers = Vec::new();
    let mut guard = None;

    if config.console_output {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_line_number(config.include_file_location)
            .with_file(config.include_file_location);
        layers.push(console_layer.boxed());
    }

    if let Some(ref log_dir) = config.log_directory {
        let file_appender = tracing_appender::rolling::daily(log_dir, "longshot.log");
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .json();
        layers.push(file_layer.boxed());
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;

    tracing::info!(config = ?config, "Logging system initialized");
    Ok(guard)
}
