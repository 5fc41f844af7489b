use crate::error::SortError;
use chrono::{DateTime, Local, TimeZone};
use log::{info, warn};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Human-readable record of one sort. Every message also goes to the `log`
/// facade; the file itself is only written when the log was created with [`SortLog::create`].
pub struct SortLog {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl SortLog {
    #[must_use]
    pub fn disabled() -> Self {
        SortLog {
            writer: None,
            path: None,
        }
    }

    pub fn create(dir: &Path) -> Result<Self, SortError> {
        let path = dir.join(file_name(&Local::now()));
        let file = File::create(&path).map_err(|e| SortError::io("Cannot create sort log", &path, e))?;
        Ok(SortLog {
            writer: Some(BufWriter::new(file)),
            path: Some(path),
        })
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&mut self, message: &str) {
        info!("{message}");
        if let Some(writer) = self.writer.as_mut()
            && let Err(e) = writeln!(writer, "{}", format_line(&Local::now(), message))
        {
            warn!("Sort log write failed, further entries are dropped: {e}");
            self.writer = None;
        }
    }

    pub fn finish(mut self) {
        if let Some(writer) = self.writer.as_mut()
            && let Err(e) = writer.flush()
        {
            warn!("Sort log flush failed: {e}");
        }
    }
}

#[must_use]
pub fn file_name(now: &DateTime<Local>) -> String {
    format!("sort{}.log", now.format("%m_%d_%y_%H_%M_%S"))
}

#[must_use]
pub fn format_line<Tz: TimeZone>(at: &DateTime<Tz>, message: &str) -> String
where
    Tz::Offset: Display,
{
    format!("{} - {message}", at.format("%b-%d-%y %H:%M:%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_line_and_file_name_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(format_line(&at, "Sort started."), "Mar-04-24 05:06:07 - Sort started.");
        assert_eq!(file_name(&at), "sort03_04_24_05_06_07.log");
    }

    #[test]
    fn test_records_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SortLog::create(dir.path()).unwrap();
        let path = log.path().unwrap().to_path_buf();
        log.record("first");
        log.record("second");
        log.finish();

        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - first"));
        assert!(lines[1].ends_with(" - second"));
    }

    #[test]
    fn test_disabled_log_has_no_file() {
        let mut log = SortLog::disabled();
        log.record("nothing written");
        assert!(log.path().is_none());
        log.finish();
    }
}
