//! Audit trail for access decisions.
//!
//! Every `record` call reaches the sink exactly once. Calls are serialized so
//! that concurrent events never interleave, and a failing sink never fails the
//! request that produced the event.
//!
//! The file sink never touches the disk on the caller's thread: events are
//! handed to a dedicated writer thread over a channel.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info};

use domain::{AuditData, AuditEvent, AuditEventType};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Failed to write audit event: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize audit event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Audit writer has stopped")]
    WriterStopped,
}

/// Destination for audit events.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait AuditSink: Send + Sync {
    /// Publish one event
    fn publish(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

// =============================================================================
// Sinks
// =============================================================================

enum WriterCommand {
    Write(Vec<u8>),
    /// Acknowledged once every earlier line has been written
    Flush(Sender<()>),
}

/// Appends one JSON document per line to a file.
///
/// `publish` only serializes and enqueues; a writer thread owns the file.
/// Dropping the sink writes out everything still queued.
pub struct JsonLinesAuditSink {
    path: PathBuf,
    sender: Mutex<Option<Sender<WriterCommand>>>,
    writer: Option<JoinHandle<()>>,
}

impl JsonLinesAuditSink {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let (sender, receiver) = mpsc::channel();
        let writer_path = path.clone();
        let writer = thread::Builder::new()
            .name("audit-writer".to_string())
            .spawn(move || write_lines(file, &writer_path, receiver))?;

        Ok(Self {
            path,
            sender: Mutex::new(Some(sender)),
            writer: Some(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until every event published so far is on disk.
    pub fn flush(&self) -> Result<(), AuditError> {
        let (ack, done) = mpsc::channel();
        self.send(WriterCommand::Flush(ack))?;
        done.recv().map_err(|_| AuditError::WriterStopped)
    }

    fn send(&self, command: WriterCommand) -> Result<(), AuditError> {
        self.sender
            .lock()
            .as_ref()
            .ok_or(AuditError::WriterStopped)?
            .send(command)
            .map_err(|_| AuditError::WriterStopped)
    }
}

impl AuditSink for JsonLinesAuditSink {
    fn publish(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.send(WriterCommand::Write(line))
    }
}

impl Drop for JsonLinesAuditSink {
    fn drop(&mut self) {
        // Closing the channel ends the writer loop after the queue drains.
        self.sender.get_mut().take();
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                error!(path = %self.path.display(), "Audit writer thread panicked");
            }
        }
    }
}

fn write_lines(mut file: File, path: &Path, commands: Receiver<WriterCommand>) {
    for command in commands {
        match command {
            WriterCommand::Write(line) => {
                if let Err(e) = file.write_all(&line).and_then(|_| file.flush()) {
                    error!(path = %path.display(), error = %e, "Failed to write audit event");
                }
            }
            WriterCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

/// Emits events as structured log records on the `audit` target.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn publish(&self, event: &AuditEvent) -> Result<(), AuditError> {
        info!(
            target: "audit",
            id = %event.id,
            principal = %event.principal,
            event_type = %event.event_type,
            method = %event.data.request_method,
            path = %event.data.request_path,
            status = event.data.response_status,
            remote_address = %event.data.remote_address,
            "audit"
        );
        Ok(())
    }
}

// =============================================================================
// Trail
// =============================================================================

/// Serializing front for an [`AuditSink`].
#[derive(Clone)]
pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
    lock: Arc<Mutex<()>>,
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Record an event. Sink failures are logged and swallowed.
    pub fn record(&self, event: AuditEvent) {
        let _guard = self.lock.lock();
        if let Err(e) = self.sink.publish(&event) {
            error!(
                id = %event.id,
                event_type = %event.event_type,
                error = %e,
                "Failed to record audit event"
            );
        }
    }

    /// Build and record an event in one step.
    pub fn emit(&self, principal: &str, event_type: AuditEventType, data: AuditData) {
        self.record(AuditEvent::new(principal, event_type, data));
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail").finish_non_exhaustive()
    }
}
