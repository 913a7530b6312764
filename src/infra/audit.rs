use crate::domain::{EventSink, Notification};
use crate::error::Result;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

/// Publishes notifications as structured `tracing` events
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, notification: &Notification) -> Result<()> {
        if notification.is_failure() {
            warn!(
                actor = %notification.actor,
                application = %notification.application,
                container = %notification.container,
                kind = %notification.kind,
                "{}",
                notification
            );
        } else {
            info!(
                actor = %notification.actor,
                application = %notification.application,
                container = %notification.container,
                kind = %notification.kind,
                "{}",
                notification
            );
        }
        Ok(())
    }
}

/// Appends one JSON document per notification to a file
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonLinesSink {
    fn publish(&self, notification: &Notification) -> Result<()> {
        let line = serde_json::to_string(notification)?;

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

/// Fans a notification out to several sinks; every sink is tried even if an
/// earlier one fails, and the first error is returned.
#[derive(Debug, Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn publish(&self, notification: &Notification) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.publish(notification) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
