//! Write-lifecycle journal
//!
//! Appends one CSV line per write lifecycle event. Lines are handed to a
//! dedicated writer thread through a bounded channel so callers never block;
//! when the channel is full the line is dropped.

use alloy_primitives::B256;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::{
    borrow::Cow,
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::PathBuf,
    sync::{Arc, mpsc},
    thread,
    time::Instant,
};

/// Capacity of the channel between callers and the writer thread
const CHANNEL_CAPACITY: usize = 4_096;

/// Number of lines written before forcing a flush
const FLUSH_INTERVAL_WRITES: u64 = 100;

/// Time between flushes (in seconds)
const FLUSH_INTERVAL_SECONDS: u64 = 1;

/// Stage of a write call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Call handed to the wallet
    Submitted = 100,
    /// Wallet returned a transaction id
    Broadcast = 110,
    /// Receipt with success status
    Confirmed = 120,
    /// Rejected, reverted or timed out
    Failed = 130,
    /// Value re-read after the settling delay
    Refreshed = 140,
}

impl LifecycleEvent {
    /// Returns the string representation of the event
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "write_submitted",
            Self::Broadcast => "write_broadcast",
            Self::Confirmed => "write_confirmed",
            Self::Failed => "write_failed",
            Self::Refreshed => "value_refreshed",
        }
    }

    /// Returns the numeric id of the event
    pub const fn as_u64(&self) -> u64 {
        *self as u64
    }
}

enum WriterMessage {
    Line(String),
    Flush(mpsc::Sender<std::io::Result<()>>),
    SyncAll(mpsc::Sender<std::io::Result<()>>),
}

#[derive(Debug)]
struct JournalInner {
    enabled: bool,
    tx: Sender<WriterMessage>,
}

/// Handle to the journal; cheap to clone
#[derive(Debug, Clone)]
pub struct WriteJournal {
    inner: Arc<JournalInner>,
}

impl WriteJournal {
    /// Open a journal at `path`. A path ending in a separator, or one with no
    /// extension that does not exist yet, is treated as a directory.
    pub fn new(enabled: bool, path: PathBuf) -> Self {
        let file_path = if path.to_string_lossy().ends_with('/')
            || path.to_string_lossy().ends_with('\\')
            || (path.extension().is_none() && !path.exists())
        {
            path.join("counter-trace.log")
        } else {
            path
        };

        let (tx, rx) = bounded(CHANNEL_CAPACITY);
        if enabled {
            spawn_writer(rx, file_path);
        }

        Self { inner: Arc::new(JournalInner { enabled, tx }) }
    }

    /// Journal that records nothing
    pub fn disabled() -> Self {
        let (tx, _rx) = bounded(1);
        Self { inner: Arc::new(JournalInner { enabled: false, tx }) }
    }

    /// Check if the journal is enabled
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    /// Record `event` for a call to `function`
    pub fn record(
        &self,
        event: LifecycleEvent,
        function: &str,
        tx_id: Option<B256>,
        detail: &str,
    ) {
        if !self.inner.enabled {
            return;
        }
        let line = format_csv_line(current_timestamp_ms(), event, function, tx_id, detail);
        let _ = self.inner.tx.try_send(WriterMessage::Line(line));
    }

    /// Flush buffered lines to the OS
    pub fn flush(&self) -> std::io::Result<()> {
        self.request(WriterMessage::Flush)
    }

    /// Flush and sync to disk. Call before exit.
    pub fn sync_all(&self) -> std::io::Result<()> {
        self.request(WriterMessage::SyncAll)
    }

    fn request(
        &self,
        message: fn(mpsc::Sender<std::io::Result<()>>) -> WriterMessage,
    ) -> std::io::Result<()> {
        if !self.inner.enabled {
            return Ok(());
        }
        let (ack_tx, ack_rx) = mpsc::channel();
        self.inner
            .tx
            .send(message(ack_tx))
            .map_err(|_| std::io::Error::other("journal writer thread disconnected"))?;
        ack_rx
            .recv()
            .map_err(|_| std::io::Error::other("journal writer did not acknowledge"))?
    }
}

fn current_timestamp_ms() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// `timestamp_ms,event_id,event,function,tx_id,detail`
fn format_csv_line(
    timestamp_ms: u128,
    event: LifecycleEvent,
    function: &str,
    tx_id: Option<B256>,
    detail: &str,
) -> String {
    fn escape_csv(s: &str) -> Cow<'_, str> {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
        } else {
            Cow::Borrowed(s)
        }
    }

    let tx_str = tx_id.map(|h| format!("{h:#x}")).unwrap_or_default();
    format!(
        "{},{},{},{},{},{}",
        timestamp_ms,
        event.as_u64(),
        event.as_str(),
        escape_csv(function),
        tx_str,
        escape_csv(detail)
    )
}

fn spawn_writer(rx: Receiver<WriterMessage>, file_path: PathBuf) {
    thread::spawn(move || {
        if let Some(parent) = file_path.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            tracing::warn!(
                target: "counter::journal",
                ?parent,
                error = %e,
                "Failed to create journal directory"
            );
        }

        let mut writer: Option<BufWriter<File>> =
            match OpenOptions::new().create(true).append(true).open(&file_path) {
                Ok(file) => {
                    tracing::info!(target: "counter::journal", ?file_path, "Journal opened for appending");
                    Some(BufWriter::new(file))
                }
                Err(e) => {
                    tracing::warn!(
                        target: "counter::journal",
                        ?file_path,
                        error = %e,
                        "Failed to open journal"
                    );
                    None
                }
            };

        let mut write_count: u64 = 0;
        let mut last_flush_time = Instant::now();

        while let Ok(msg) = rx.recv() {
            match msg {
                WriterMessage::Line(line) => {
                    let Some(w) = writer.as_mut() else { continue };
                    if writeln!(w, "{line}").is_err() {
                        tracing::warn!(target: "counter::journal", "Failed to write journal line");
                        continue;
                    }
                    write_count += 1;
                    let now = Instant::now();
                    if write_count.is_multiple_of(FLUSH_INTERVAL_WRITES)
                        || now.duration_since(last_flush_time).as_secs() >= FLUSH_INTERVAL_SECONDS
                    {
                        if w.flush().is_err() {
                            tracing::warn!(target: "counter::journal", "Failed to flush journal");
                        }
                        last_flush_time = now;
                    }
                }
                WriterMessage::Flush(ack) => {
                    let result = writer.as_mut().map_or(Ok(()), |w| w.flush());
                    let _ = ack.send(result);
                }
                WriterMessage::SyncAll(ack) => {
                    let result = writer
                        .as_mut()
                        .map_or(Ok(()), |w| w.flush().and_then(|()| w.get_ref().sync_all()));
                    let _ = ack.send(result);
                }
            }
        }
    });
}
