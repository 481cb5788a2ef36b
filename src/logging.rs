use anyhow::Context;
use flexi_logger::{Logger, LoggerHandle};
use log::info;

const ACCEPTED_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Maps unknown level names to `info`.
pub fn normalize_level(level: &str) -> &'static str {
    let lowered = level.trim().to_ascii_lowercase();
    ACCEPTED_LEVELS
        .iter()
        .copied()
        .find(|candidate| *candidate == lowered)
        .unwrap_or("info")
}

/// `RUST_LOG` wins over `level`. Keep the handle alive for the whole run.
pub fn init_logging(level: &str) -> anyhow::Result<LoggerHandle> {
    let level = normalize_level(level);
    let handle = Logger::try_with_env_or_str(level)
        .with_context(|| format!("invalid log level `{level}`"))?
        .log_to_stderr()
        .format(flexi_logger::detailed_format)
        .start()
        .context("failed to start logger")?;

    info!(
        "event=app_start version={} platform={} level={}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        level
    );

    Ok(handle)
}
