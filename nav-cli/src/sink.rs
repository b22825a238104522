//! Append-only log sink.
//!
//! The session loop hands lines over an unbounded channel and never waits on
//! disk. A single writer task appends them, flushing after every line so a
//! killed process loses at most the line in flight.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use nav_core::record::format_record;
use nav_core::ResolvedPosition;

enum SinkMessage {
    Raw(String),
    Decoded(String),
}

/// Sender half of the log sink. Dropping every clone stops the writer task.
#[derive(Clone)]
pub struct LogSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
    raw_enabled: bool,
    stopped: Arc<AtomicBool>,
}

/// Counts reported by the writer task when it finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SinkReport {
    pub decoded_lines: u64,
    pub raw_lines: u64,
}

impl LogSink {
    /// Open both logs in append mode and start the writer task.
    pub async fn spawn(
        decoded_path: &Path,
        raw_path: Option<&Path>,
    ) -> io::Result<(LogSink, JoinHandle<io::Result<SinkReport>>)> {
        let decoded = open_append(decoded_path).await?;
        let raw = match raw_path {
            Some(p) => Some(open_append(p).await?),
            None => None,
        };

        let raw_enabled = raw.is_some();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_loop(rx, decoded, raw));
        debug!(decoded = %decoded_path.display(), raw_enabled, "log sink started");

        let sink = LogSink {
            tx,
            raw_enabled,
            stopped: Arc::new(AtomicBool::new(false)),
        };
        Ok((sink, handle))
    }

    /// Whether raw lines are kept at all.
    pub fn records_raw(&self) -> bool {
        self.raw_enabled
    }

    /// True once the writer task has gone away.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    pub fn record_position(&self, pos: &ResolvedPosition) {
        self.send(SinkMessage::Decoded(format_record(pos)));
    }

    pub fn record_raw(&self, line: &str) {
        if !self.raw_enabled {
            return;
        }
        self.send(SinkMessage::Raw(line.trim_end().to_string()));
    }

    /// Warns once when the writer is gone; later lines are dropped silently.
    fn send(&self, msg: SinkMessage) {
        if self.tx.send(msg).is_err() && !self.stopped.swap(true, Ordering::Relaxed) {
            warn!("log sink stopped, dropping further lines");
        }
    }
}

async fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| io::Error::new(e.kind(), format!("{}: {e}", path.display())))
}

async fn write_loop(
    mut rx: mpsc::UnboundedReceiver<SinkMessage>,
    mut decoded: File,
    mut raw: Option<File>,
) -> io::Result<SinkReport> {
    let mut report = SinkReport::default();

    while let Some(msg) = rx.recv().await {
        match msg {
            SinkMessage::Decoded(line) => {
                write_line(&mut decoded, &line).await?;
                report.decoded_lines += 1;
            }
            SinkMessage::Raw(line) => {
                if let Some(file) = raw.as_mut() {
                    write_line(file, &line).await?;
                    report.raw_lines += 1;
                }
            }
        }
    }

    Ok(report)
}

async fn write_line(file: &mut File, line: &str) -> io::Result<()> {
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    file.flush().await
}

/// Default decoded log path, relative to the working directory.
pub fn default_decoded_log() -> PathBuf {
    PathBuf::from("adsb_decoded.log")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use nav_core::LogRecord;

    fn position() -> ResolvedPosition {
        ResolvedPosition {
            icao: [0x78, 0x0A, 0x3B],
            latitude_deg: 39.912345,
            longitude_deg: 116.456789,
            altitude_ft: 32000,
            timestamp: 1709296496.0,
            ecef_x: -2182051.1,
            ecef_y: 4395713.5,
            ecef_z: 4075888.2,
            enu_east: 1.0,
            enu_north: 2.0,
            enu_up: 3.0,
        }
    }

    #[tokio::test]
    async fn test_writes_decoded_and_raw() {
        let dir = tempfile::tempdir().unwrap();
        let decoded = dir.path().join("decoded.log");
        let raw = dir.path().join("raw.log");

        let (sink, handle) = LogSink::spawn(&decoded, Some(&raw)).await.unwrap();
        sink.record_raw("*8D40621D58C382D690C8AC2863A7;\n");
        sink.record_position(&position());
        sink.record_raw("*8D40621D58C386435CC412692AD6;");
        drop(sink);

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report, SinkReport { decoded_lines: 1, raw_lines: 2 });

        let raw_text = std::fs::read_to_string(&raw).unwrap();
        assert_eq!(
            raw_text,
            "*8D40621D58C382D690C8AC2863A7;\n*8D40621D58C386435CC412692AD6;\n"
        );

        let decoded_text = std::fs::read_to_string(&decoded).unwrap();
        let rec = LogRecord::parse(decoded_text.trim_end()).unwrap();
        assert_eq!(decoded_text.split(',').count(), 11);
        assert_eq!(rec.altitude_ft, 32000);
        assert_eq!(rec.enu.unwrap().up, 3.0);
    }

    #[tokio::test]
    async fn test_appends_to_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let decoded = dir.path().join("decoded.log");
        std::fs::write(&decoded, "existing line\n").unwrap();

        let (sink, handle) = LogSink::spawn(&decoded, None).await.unwrap();
        let sink_records_raw = sink.records_raw();
        sink.record_position(&position());
        sink.record_raw("ignored without a raw log");
        drop(sink);

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.raw_lines, 0);
        assert!(!sink_records_raw);

        let text = std::fs::read_to_string(&decoded).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "existing line");
        assert!(lines[1].contains(",780A3B,39.912345,116.456789,32000,"));
    }

    #[tokio::test]
    async fn test_stopped_writer_marks_sink_once() {
        let dir = tempfile::tempdir().unwrap();
        let decoded = dir.path().join("decoded.log");

        let (sink, handle) = LogSink::spawn(&decoded, None).await.unwrap();
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(!sink.is_stopped());

        // Writer is gone: every send fails, the flag flips on the first one
        sink.record_position(&position());
        assert!(sink.is_stopped());
        sink.record_position(&position());
        assert!(sink.clone().is_stopped());

        assert_eq!(std::fs::read_to_string(&decoded).unwrap(), "");
    }

    #[tokio::test]
    async fn test_unwritable_path_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("missing").join("decoded.log");
        assert!(LogSink::spawn(&bad, None).await.is_err());
    }
}
