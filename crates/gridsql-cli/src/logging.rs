//! Diagnostic logging to stderr

use tracing_subscriber::EnvFilter;

/// Filter used when neither the environment nor the config file set one
pub const DEFAULT_FILTER: &str = "warn";

/// Filter from `GRIDSQL_LOG`, then `RUST_LOG`, then `configured`
pub fn env_filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_env("GRIDSQL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or(DEFAULT_FILTER)))
}

/// Install the global subscriber.
///
/// Logs go to stderr so they never mix with result output or the spool.
pub fn init(configured: Option<&str>) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(configured))
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))?;
    tracing::debug!("logging initialized");
    Ok(())
}
