use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::{Error, Result};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `log_level`. When `log_dir` is given, a daily rolling
/// file named `<file_prefix>.log` is written next to the console output.
pub fn init_logging(log_dir: Option<&Path>, file_prefix: &str, log_level: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE);

    let file_layer = log_dir.map(|dir| {
        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, dir, format!("{}.log", file_prefix));
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_ansi(false)
            .with_writer(file_appender)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::internal(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}
