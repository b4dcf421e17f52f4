use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_ENV: &str = "MOBILE_STORE_LOG";
const DEFAULT_DIRECTIVE: &str = "mobile_store=info";
const LOG_FILE: &str = "mobile-store.log";

/// Default log directory: $XDG_DATA_HOME/mobile-store
pub fn default_log_dir() -> Option<PathBuf> {
  dirs::data_dir().map(|d| d.join("mobile-store"))
}

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber.
///
/// Logs go to `mobile-store.log` in `dir` so they stay out of command
/// output. If the directory can't be created, logs go to stderr instead.
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init(dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let dir = dir.map(Path::to_path_buf).or_else(default_log_dir);

  let writer = dir.and_then(|dir| match std::fs::create_dir_all(&dir) {
    Ok(()) => Some(tracing_appender::non_blocking(
      tracing_appender::rolling::never(&dir, LOG_FILE),
    )),
    Err(e) => {
      eprintln!("Could not create log directory {}: {}", dir.display(), e);
      None
    }
  });

  match writer {
    Some((writer, guard)) => {
      tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;
      Ok(None)
    }
  }
}
