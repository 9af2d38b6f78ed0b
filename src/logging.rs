use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

/// Initialise logging. The default level is `info`; `debug` raises it to
/// `debug` and lets `RUST_LOG` override it.
///
/// When `log_file` is set, output goes to that file through a background
/// writer. Keep the returned guard alive for as long as logs should be
/// flushed.
pub fn init(debug: bool, log_file: Option<PathBuf>) -> Option<WorkerGuard> {
    let filter = build_filter(debug);

    if let Some(path) = log_file {
        match file_appender(&path) {
            Ok(appender) => {
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(writer)
                    .try_init();
                return Some(guard);
            }
            Err(err) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .try_init();
                tracing::warn!(path = %path.display(), error = %err, "log file unavailable, logging to stdout");
                return None;
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
    None
}

fn build_filter(debug: bool) -> EnvFilter {
    // Without debug logging `RUST_LOG` is ignored so a stray variable in the
    // user's environment cannot make the overlay verbose.
    if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    }
}

fn file_appender(path: &Path) -> anyhow::Result<RollingFileAppender> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log path has no file name"))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy().into_owned())
        .build(dir)?;
    Ok(appender)
}
