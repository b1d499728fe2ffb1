/// Logging configuration.
///
/// Logs are stored in the data directory under `logs/`.
/// Each run appends to the log file with a clear separator.
use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes file logging for the repeat tracker.
///
/// Logs are written to `{data_dir}/logs/repeater.log`.
/// Each session starts with a separator containing the timestamp.
pub fn init_logging(data_dir: &Path) -> Result<()> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    // Write session separator with timestamp before the appender opens the file
    let separator = format!(
        "\n{sep}\n[{ts}] New repeater session\n{sep}\n",
        sep = "=".repeat(80),
        ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
    );
    use std::io::Write;
    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("repeater.log"))
    {
        let _ = writeln!(file, "{}", separator);
    }

    let file_appender = tracing_appender::rolling::never(&log_dir, "repeater.log");

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false) // No ANSI codes in log files
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    // Default to INFO level, but allow override via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .ok(); // Ignore error if already initialized

    tracing::info!("Logging initialized in {}", log_dir.display());

    Ok(())
}
