use crate::domain::{
    Container, ContainerState, ContainerStore, EventSink, ExecutionEngine, Image, Notification,
};
use crate::error::{Error, Result};
use crate::infra::MemoryStore;
use crate::services::OperationContext;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

/// Engine that records what it was asked to do.
///
/// Commands are recorded as `start:<name>` / `stop:<name>`; the same strings
/// select which calls fail.
#[derive(Debug, Default)]
pub struct MockEngine {
    commands: RwLock<Vec<String>>,
    fail_on: RwLock<HashSet<String>>,
    observed: RwLock<HashMap<String, ContainerState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on(&self, command: &str) {
        self.fail_on.write().unwrap().insert(command.to_string());
    }

    pub fn clear_fail_on(&self) {
        self.fail_on.write().unwrap().clear();
    }

    pub fn get_commands(&self) -> Vec<String> {
        self.commands.read().unwrap().clone()
    }

    /// State the container was in the last time the engine saw it
    pub fn observed_state(&self, name: &str) -> Option<ContainerState> {
        self.observed.read().unwrap().get(name).copied()
    }

    fn record(&self, verb: &str, container: &Container) -> Result<()> {
        let cmd = format!("{}:{}", verb, container.name());
        self.commands.write().unwrap().push(cmd.clone());
        self.observed
            .write()
            .unwrap()
            .insert(container.name().to_string(), container.state());

        if self.fail_on.read().unwrap().contains(&cmd) {
            return Err(Error::Engine {
                name: container.name().to_string(),
                message: format!("Mock failure on: {}", cmd),
            });
        }
        Ok(())
    }
}

impl ExecutionEngine for MockEngine {
    fn start(&self, container: &Container) -> Result<()> {
        self.record("start", container)
    }

    fn stop(&self, container: &Container) -> Result<()> {
        self.record("stop", container)
    }
}

/// Sink that keeps every notification in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    /// When set, `publish` records nothing and returns an error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, notification: &Notification) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("sink unavailable")));
        }
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// In-memory store that can simulate a concurrent writer.
///
/// Each injected conflict re-saves the stored copy of the container right
/// before the caller's write, so the caller's version is stale.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    pending: AtomicUsize,
    injected: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject_conflicts(&self, count: usize) {
        self.pending.store(count, Ordering::SeqCst);
    }

    /// Number of conflicts actually caused so far
    pub fn injected(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    fn interfere(&self, name: &str) -> Result<()> {
        let Some(mut stored) = self.inner.find(name)? else {
            return Ok(());
        };
        let took = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took {
            self.inner.save(&mut stored)?;
            self.injected.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl ContainerStore for FlakyStore {
    fn find(&self, name: &str) -> Result<Option<Container>> {
        self.inner.find(name)
    }

    fn list(&self) -> Result<Vec<Container>> {
        self.inner.list()
    }

    fn save(&self, container: &mut Container) -> Result<()> {
        self.interfere(container.name())?;
        self.inner.save(container)
    }

    fn delete(&self, container: &Container) -> Result<()> {
        self.interfere(container.name())?;
        self.inner.delete(container)
    }
}

pub fn postgres_image() -> Image {
    Image::new("postgres", "16")
        .with_variable("POSTGRES_USER", "app")
        .with_variable("POSTGRES_DB", "app")
        .with_variable("POSTGRES_PORT", "5432")
}

pub fn web_image() -> Image {
    Image::new("shop/web", "1.0").with_variable("MODE", "dev")
}

pub fn test_context() -> OperationContext {
    OperationContext::new("alice", "shop")
}
