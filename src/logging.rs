//! Structured logging setup using tracing.

use crate::config::{FileLoggingConfig, LogFormat, LogRotation, LoggingConfig};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Guard that must be kept alive for the duration of the program.
/// When dropped, flushes and closes the file writer.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the logging system based on configuration.
/// Returns a guard that must be kept alive for file logging to work.
pub fn init_logging(config: &LoggingConfig) -> LogGuard {
    if !config.log_requests {
        return LogGuard { _file_guard: None };
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Exactly one stdout layer is Some
    let (text_layer, json_layer) = match config.format {
        LogFormat::Text => (Some(fmt::layer().with_writer(io::stdout)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_writer(io::stdout))),
    };

    // File output is always JSON
    let (file_layer, file_guard) = match &config.file {
        Some(file_config) => {
            let (writer, guard) = create_file_writer(file_config);
            (
                Some(fmt::layer().json().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Warning: logging already initialized: {}", e);
    }

    LogGuard {
        _file_guard: file_guard,
    }
}

fn create_file_writer(
    config: &FileLoggingConfig,
) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    fs::create_dir_all(&config.log_dir).ok();

    let rotation = match config.rotation {
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Never => Rotation::NEVER,
    };

    let file_appender = RollingFileAppender::new(rotation, &config.log_dir, &config.file_prefix);

    tracing_appender::non_blocking(file_appender)
}

/// Spawn a background task to compress rotated logs and clean up old files.
pub fn spawn_log_cleanup_task(config: &LoggingConfig) {
    let Some(file_config) = config.file.clone() else {
        return;
    };

    tokio::spawn(async move {
        // First pass after a minute, then hourly to catch rotated files promptly
        let mut delay = Duration::from_secs(60);
        loop {
            tokio::time::sleep(delay).await;
            run_log_maintenance(&file_config);
            delay = Duration::from_secs(3600);
        }
    });
}

fn run_log_maintenance(config: &FileLoggingConfig) {
    if config.compress {
        compress_rotated_logs(&config.log_dir, &config.file_prefix);
    }
    if config.max_age_days > 0 {
        cleanup_old_logs(&config.log_dir, &config.file_prefix, config.max_age_days);
    }
}

/// Compress rotated log files that haven't been compressed yet.
/// With tracing-appender DAILY rotation the active file is "<prefix>.<today>".
fn compress_rotated_logs(log_dir: &str, file_prefix: &str) {
    let today_suffix = chrono::Utc::now().format(".%Y-%m-%d").to_string();
    let today_filename = format!("{}{}", file_prefix, today_suffix);

    let entries = match fs::read_dir(log_dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read log directory for compression");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };

        let is_rotated = filename.starts_with(file_prefix)
            && filename != file_prefix
            && filename != today_filename
            && !filename.ends_with(".gz");
        // Hourly rotation shares today's date prefix
        if !is_rotated || filename.starts_with(&today_filename) {
            continue;
        }

        if let Err(e) = compress_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to compress log file");
        } else {
            tracing::info!(path = %path.display(), "Compressed rotated log file");
        }
    }
}

/// Compress a single file with gzip and remove the original.
fn compress_file(path: &Path) -> io::Result<()> {
    let gz_path = path.with_extension(
        path.extension()
            .map(|e| format!("{}.gz", e.to_string_lossy()))
            .unwrap_or_else(|| "gz".to_string()),
    );

    let mut reader = BufReader::new(File::open(path)?);
    let writer = BufWriter::new(File::create(&gz_path)?);
    let mut encoder = GzEncoder::new(writer, Compression::default());

    io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?;

    fs::remove_file(path)
}

fn cleanup_old_logs(log_dir: &str, file_prefix: &str, max_age_days: u64) {
    let max_age = Duration::from_secs(max_age_days * 24 * 60 * 60);

    let entries = match fs::read_dir(log_dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read log directory for cleanup");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();

        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) if name.starts_with(file_prefix) && name != file_prefix => {}
            _ => continue,
        }

        let age = match path
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        {
            Some(age) => age,
            None => continue,
        };

        if age > max_age {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to delete old log file");
            } else {
                tracing::info!(path = %path.display(), age_days = age.as_secs() / 86400, "Deleted old log file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_default() {
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn test_log_rotation_default() {
        assert_eq!(LogRotation::default(), LogRotation::Daily);
    }

    #[test]
    fn test_init_logging_disabled() {
        let config = LoggingConfig {
            log_requests: false,
            ..LoggingConfig::default()
        };
        let guard = init_logging(&config);
        assert!(guard._file_guard.is_none());
    }

    #[test]
    fn test_compress_rotated_logs() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().to_str().unwrap();
        fs::write(dir.path().join("xkcd-dns.log.2020-01-01"), "old entry\n").unwrap();
        fs::write(dir.path().join("xkcd-dns.log"), "active\n").unwrap();
        fs::write(dir.path().join("unrelated.txt"), "keep\n").unwrap();

        compress_rotated_logs(log_dir, "xkcd-dns.log");

        assert!(dir.path().join("xkcd-dns.log.2020-01-01.gz").exists());
        assert!(!dir.path().join("xkcd-dns.log.2020-01-01").exists());
        assert!(dir.path().join("xkcd-dns.log").exists());
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn test_compress_skips_todays_file() {
        let dir = tempfile::tempdir().unwrap();
        let today = chrono::Utc::now().format(".%Y-%m-%d").to_string();
        let name = format!("xkcd-dns.log{}", today);
        fs::write(dir.path().join(&name), "current\n").unwrap();

        compress_rotated_logs(dir.path().to_str().unwrap(), "xkcd-dns.log");

        assert!(dir.path().join(&name).exists());
    }

    #[test]
    fn test_cleanup_keeps_recent_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("xkcd-dns.log.2020-01-01.gz"), "x").unwrap();

        // Freshly written file is younger than a day
        cleanup_old_logs(dir.path().to_str().unwrap(), "xkcd-dns.log", 1);

        assert!(dir.path().join("xkcd-dns.log.2020-01-01.gz").exists());
    }

    #[test]
    fn test_compress_missing_dir_does_not_panic() {
        compress_rotated_logs("/nonexistent/log/dir", "xkcd-dns.log");
        cleanup_old_logs("/nonexistent/log/dir", "xkcd-dns.log", 7);
    }
}
