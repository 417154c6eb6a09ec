//! Append-only audit log
//!
//! The audit log is the only user-visible surface of the engine: one
//! UTF-8, LF-terminated line per update attempt, timestamped at append
//! time. Entries are only ever appended; the external front-end tails the
//! file. The engine holds the only writer and appends are serialised with
//! a process-wide mutex.
//!
//! `append` is best-effort: when the filesystem is unusable the line falls
//! through to the tracing subscriber instead of failing the tick.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::Result;

/// Lines the log reader consumes per tail request
pub const TAIL_WINDOW: usize = 100;

/// Timestamp format used in every audit line
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// File-backed append-only audit log
///
/// Created lazily on first append; truncated only by [`AuditLog::clear`].
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    writer: Mutex<()>,
}

impl AuditLog {
    /// Create a log handle at `path`; the file itself appears on first append
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: Mutex::new(()),
        }
    }

    /// Append one entry, prefixed with the current local timestamp
    ///
    /// Never fails the caller: filesystem errors are reported through
    /// tracing and the entry is dropped.
    pub async fn append(&self, body: &str) {
        let line = format!(
            "[{}] {}\n",
            chrono::Local::now().format(TIMESTAMP_FORMAT),
            body
        );

        let _guard = self.writer.lock().await;
        let result = async {
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = result {
            tracing::error!(
                "failed to append audit line to {}: {} (dropped: {})",
                self.path.display(),
                e,
                body
            );
        }
    }

    /// Read the last `n` lines
    ///
    /// A missing log file reads as empty.
    pub async fn tail(&self, n: usize) -> Result<Vec<String>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        let start = lines.len().saturating_sub(n);
        Ok(lines[start..].to_vec())
    }

    /// Truncate the log to zero length
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.writer.lock().await;
        match fs::File::create(&self.path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Leading marker written before any per-tick verdict
pub fn triggered_line() -> String {
    "AutoUpdate triggered by scheduler".to_string()
}

/// Terminal line for a tick that found no configuration
pub fn no_config_line() -> String {
    "AutoUpdate FAILED - No configuration found".to_string()
}

/// Terminal line for a tick whose quorum already agrees with the target IP
pub fn skipped_line(domains_csv: &str, target_ip: &str) -> String {
    format!(
        "AutoUpdate: {} - SKIPPED (DNS already up to date with IP: {})",
        domains_csv, target_ip
    )
}

/// Terminal line for an update attempt
///
/// `fixed_ip` adds the ` IP: <ip>` fragment when the operator pinned an
/// address. Transport failures carry their own `ERROR: ...` detail and are
/// emitted without the `FAILED (...)` wrapping.
pub fn verdict_line(domains_csv: &str, fixed_ip: Option<&str>, ok: bool, detail: &str) -> String {
    let ip_fragment = fixed_ip
        .map(|ip| format!(" IP: {}", ip))
        .unwrap_or_default();

    if detail.starts_with("ERROR:") {
        return format!("AutoUpdate: {}{} - {}", domains_csv, ip_fragment, detail);
    }

    format!(
        "AutoUpdate: {}{} - {} ({})",
        domains_csv,
        ip_fragment,
        if ok { "SUCCESS" } else { "FAILED" },
        detail
    )
}

/// Terminal line for an uncaught engine error
pub fn engine_error_line(message: &str) -> String {
    format!("AutoUpdate ERROR: {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn append_and_tail_preserve_order() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.log"));

        log.append("first").await;
        log.append("second").await;
        log.append("third").await;

        let lines = log.tail(2).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("second"));
        assert!(lines[1].ends_with("third"));
    }

    #[tokio::test]
    async fn entries_are_timestamped() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.log"));

        log.append("AutoUpdate triggered by scheduler").await;

        let lines = log.tail(1).await.unwrap();
        // "[YYYY-MM-DD HH:MM:SS] ..."
        assert!(lines[0].starts_with('['));
        assert_eq!(&lines[0][11..12], " ");
        assert_eq!(&lines[0][20..22], "] ");
    }

    #[tokio::test]
    async fn missing_file_tails_empty() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.log"));
        assert!(log.tail(TAIL_WINDOW).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_truncates() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.log"));

        log.append("entry").await;
        log.clear().await.unwrap();

        assert!(log.tail(TAIL_WINDOW).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tail_caps_at_window() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.log"));

        for i in 0..150 {
            log.append(&format!("entry {}", i)).await;
        }

        let lines = log.tail(TAIL_WINDOW).await.unwrap();
        assert_eq!(lines.len(), TAIL_WINDOW);
        assert!(lines[0].ends_with("entry 50"));
        assert!(lines[99].ends_with("entry 149"));
    }

    #[test]
    fn line_formats() {
        assert_eq!(
            skipped_line("home", "203.0.113.7"),
            "AutoUpdate: home - SKIPPED (DNS already up to date with IP: 203.0.113.7)"
        );
        assert_eq!(
            verdict_line("home", None, true, "OK"),
            "AutoUpdate: home - SUCCESS (OK)"
        );
        assert_eq!(
            verdict_line("home", Some("198.51.100.9"), false, "KO"),
            "AutoUpdate: home IP: 198.51.100.9 - FAILED (KO)"
        );
        assert_eq!(
            verdict_line("home", None, false, "ERROR: connection timed out"),
            "AutoUpdate: home - ERROR: connection timed out"
        );
        assert_eq!(
            no_config_line(),
            "AutoUpdate FAILED - No configuration found"
        );
    }
}
