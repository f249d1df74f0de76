//! Lifecycle events and notifiers.
//!
//! Every repository operation that changes a record produces a short, ordered list of
//! [`FileEvent`]s. The repository hands each event to its [`EventNotifier`] and also returns
//! the list to the caller; how events travel further (logs, queues, webhooks) is up to the
//! notifier.

use crate::File;
use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "file", rename_all = "snake_case")]
pub enum FileEvent {
    /// Bytes were written and a new record persisted
    Created(File),
    /// The file now lives at a different path and/or disk
    Moved(File),
    /// The move also changed the file name
    Renamed(File),
}

impl FileEvent {
    pub fn file(&self) -> &File {
        match self {
            FileEvent::Created(file) | FileEvent::Moved(file) | FileEvent::Renamed(file) => file,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FileEvent::Created(_) => "created",
            FileEvent::Moved(_) => "moved",
            FileEvent::Renamed(_) => "renamed",
        }
    }
}

/// Fire-and-forget sink for lifecycle events.
pub trait EventNotifier: Send + Sync {
    fn notify(&self, event: &FileEvent);
}

/// Logs every event at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl EventNotifier for TracingNotifier {
    fn notify(&self, event: &FileEvent) {
        let file = event.file();
        tracing::info!(
            event = event.kind(),
            file_id = %file.id(),
            disk = %file.disk(),
            fullname = %file.fullname(),
            "file event"
        );
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl EventNotifier for NullNotifier {
    fn notify(&self, _event: &FileEvent) {}
}

/// Keeps every event in memory, in delivery order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<FileEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    pub fn events(&self) -> Vec<FileEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Removes and returns the events received so far.
    pub fn take(&self) -> Vec<FileEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventNotifier for RecordingNotifier {
    fn notify(&self, event: &FileEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
