use beacon_platform::UpdatePaths;
#[cfg(debug_assertions)]
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use simplelog::{CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, WriteLogger};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub const DEFAULT_MAX_LOG_SIZE: u64 = 1024 * 1024;

/// Appends to the update log, reopening it if something deleted it.
struct UpdateLogWriter {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl UpdateLogWriter {
    fn open(path: PathBuf) -> io::Result<Self> {
        let file = Self::append_to(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    fn append_to(path: &Path) -> io::Result<File> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    }
}

impl Write for UpdateLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() || !self.path.exists() {
            *guard = Some(Self::append_to(&self.path)?);
        }
        match guard.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::other("update log is not available")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_mut().map_or(Ok(()), Write::flush)
    }
}

/// Keep the newest half of the log, cut at a line boundary.
fn trim_oversized_log(log_path: &Path, max_log_size: u64) {
    if let Ok(metadata) = std::fs::metadata(log_path)
        && metadata.len() > max_log_size
        && let Ok(contents) = std::fs::read(log_path)
    {
        let half = contents.len() / 2;
        let keep_from = contents[half..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(half, |pos| half + pos + 1);
        let _ = std::fs::write(log_path, &contents[keep_from..]);
    }
}

/// Install the process logger: the update log file and, in debug builds, the
/// terminal. Only `beacon` targets are recorded. Does nothing if a logger is
/// already installed.
pub fn init_logging(paths: &UpdatePaths, debug_enabled: bool, max_log_size: u64) {
    let _ = paths.ensure_dirs();
    let log_path = paths.log_file();
    trim_oversized_log(&log_path, max_log_size);

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("beacon")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    #[cfg(debug_assertions)]
    loggers.push(TermLogger::new(
        LevelFilter::Debug,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ));

    if let Ok(writer) = UpdateLogWriter::open(log_path.clone()) {
        loggers.push(WriteLogger::new(LevelFilter::Debug, config, writer));
    }

    if loggers.is_empty() || CombinedLogger::init(loggers).is_err() {
        return;
    }

    set_logging_enabled(debug_enabled);
    log::info!("Update log: {}", log_path.display());
}

/// Debug keeps per-provider detail; otherwise pass results, downloads and
/// failures are still recorded.
pub fn set_logging_enabled(debug_enabled: bool) {
    if debug_enabled {
        log::set_max_level(LevelFilter::Debug);
    } else {
        log::set_max_level(LevelFilter::Info);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::{UpdateLogWriter, set_logging_enabled, trim_oversized_log};

    #[test]
    fn writer_recreates_deleted_log() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("Updater").join("updater.log");
        let mut writer =
            UpdateLogWriter::open(log_path.clone()).expect("writer should create the log");

        writer
            .write_all(b"first check\n")
            .expect("initial write should succeed");
        std::fs::remove_file(&log_path).expect("log file should be removable");
        writer
            .write_all(b"second check\n")
            .expect("writer should recreate the log after deletion");

        let contents = std::fs::read_to_string(&log_path).expect("log should be readable");
        assert_eq!(contents, "second check\n");
    }

    #[test]
    fn oversized_log_keeps_newest_lines() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("updater.log");
        std::fs::write(&log_path, "pass-1\npass-2\npass-3\npass-4\npass-5\n")
            .expect("log should be written");

        trim_oversized_log(&log_path, 10);

        let trimmed = std::fs::read_to_string(&log_path).expect("log should be readable");
        assert!(trimmed.ends_with("pass-5\n"));
        assert!(!trimmed.contains("pass-1"));
    }

    #[test]
    fn small_log_is_left_alone() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("updater.log");
        std::fs::write(&log_path, "pass-1\n").expect("log should be written");

        trim_oversized_log(&log_path, 1024);
        assert_eq!(
            std::fs::read_to_string(&log_path).expect("log should be readable"),
            "pass-1\n"
        );
    }

    #[test]
    fn logging_level_follows_debug_flag() {
        set_logging_enabled(true);
        assert_eq!(log::max_level(), log::LevelFilter::Debug);

        set_logging_enabled(false);
        assert_eq!(log::max_level(), log::LevelFilter::Info);
    }
}
