//! Structured logging setup: daily-rotated file output plus console output,
//! both filtered by `RUST_LOG` (falls back to `info`).

use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init(log_dir: &str, service_name: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, format!("{service_name}.log"));
    let (non_blocking_file, file_guard) = non_blocking(file_appender);
    let (non_blocking_stdout, stdout_guard) = non_blocking(std::io::stdout());

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let console_layer = fmt::layer()
        .with_writer(non_blocking_stdout)
        .with_ansi(true)
        .with_target(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    // Keep the non-blocking writer threads alive for the process lifetime.
    std::mem::forget(file_guard);
    std::mem::forget(stdout_guard);

    tracing::info!(log_dir, service_name, "logging initialized");
    Ok(())
}
