use std::{
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

use tokio::sync::RwLock;
use tracing::Level;
use tracing::{debug, info, metadata::LevelFilter, trace};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::prelude::*;

/// Keeps the file writer's worker alive. Dropping it flushes the file.
static FILE_GUARD: Mutex<Option<WorkerGuard>> = Mutex::new(None);

fn file_guard() -> std::sync::MutexGuard<'static, Option<WorkerGuard>> {
    FILE_GUARD.lock().unwrap_or_else(PoisonError::into_inner)
}

fn do_init(stderr_level: Level, file_level: Option<(Level, PathBuf)>) {
    let mut message = String::from("Logging with:");

    // stderr, since stdout belongs to the shell
    message += " stderr";

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::from(stderr_level));

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let maybe_file_layer = if let Some((level, output_dir)) = file_level {
        message += &format!(", file (in dir {output_dir:?})");

        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, output_dir, "serial-shell.log");
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        *file_guard() = Some(guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(LevelFilter::from(level));
        Some(file_layer)
    } else {
        None
    };

    registry.with(maybe_file_layer).init();

    debug!(message);
}

/// Initialize tracing.
///
/// Will only initialize once, so tests may call this.
pub async fn init(stderr_level: Level, file_logging: Option<(Level, PathBuf)>) {
    static TRACING_IS_INITIALIZED: RwLock<bool> = RwLock::const_new(false);

    let initialized = { *TRACING_IS_INITIALIZED.read().await };

    if !initialized {
        let mut initialized = TRACING_IS_INITIALIZED.write().await;

        // To avoid race condition between the `.read()` and the
        // `.write()`.
        if *initialized {
            return;
        }

        do_init(stderr_level, file_logging);

        *initialized = true;
    }

    info!("Logging initialized");
}

/// Flush the log file, if logging to one.
/// Logs emitted to the file afterwards are lost.
///
/// Returns whether there was a file to flush.
pub fn shutdown() -> bool {
    trace!("Shutting down");

    // The worker writes out what is queued when its guard is dropped.
    let guard = file_guard().take();
    guard.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_logs_are_flushed_on_shutdown() {
        let dir = std::env::temp_dir().join(format!("serial-shell-logs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        init(Level::ERROR, Some((Level::INFO, dir.clone()))).await;
        info!("Written to file");

        assert!(shutdown());
        // Nothing left to flush
        assert!(!shutdown());

        let logged = std::fs::read_dir(&dir)
            .unwrap()
            .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
            .collect::<String>();

        assert!(logged.contains("Written to file"), "{logged}");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
