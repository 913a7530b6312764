use crate::domain::{Container, ContainerStore};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use tracing::debug;

/// Stored records plus the id sequence, shared by every store backend
#[derive(Debug, Default, Serialize, Deserialize)]
struct Ledger {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    containers: BTreeMap<String, Container>,
}

impl Ledger {
    fn stored_version(&self, name: &str) -> u64 {
        self.containers.get(name).map(Container::version).unwrap_or(0)
    }

    fn save(&mut self, container: &mut Container) -> Result<()> {
        let found = self.stored_version(container.name());
        if found != container.version() {
            return Err(Error::Conflict {
                name: container.name().to_string(),
                expected: container.version(),
                found,
            });
        }

        let id = match container.id() {
            Some(id) => id.to_string(),
            None => {
                self.next_id += 1;
                format!("ctr-{:06}", self.next_id)
            }
        };
        container.record_write(id, found + 1);
        self.containers
            .insert(container.name().to_string(), container.clone());
        Ok(())
    }

    fn delete(&mut self, container: &Container) -> Result<()> {
        let found = self.stored_version(container.name());
        if found == 0 {
            return Err(Error::ContainerNotFound(container.name().to_string()));
        }
        if found != container.version() {
            return Err(Error::Conflict {
                name: container.name().to_string(),
                expected: container.version(),
                found,
            });
        }
        self.containers.remove(container.name());
        Ok(())
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: RwLock<Ledger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContainerStore for MemoryStore {
    fn find(&self, name: &str) -> Result<Option<Container>> {
        let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
        Ok(ledger.containers.get(name).cloned())
    }

    fn list(&self) -> Result<Vec<Container>> {
        let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
        Ok(ledger.containers.values().cloned().collect())
    }

    fn save(&self, container: &mut Container) -> Result<()> {
        let mut ledger = self.ledger.write().unwrap_or_else(PoisonError::into_inner);
        ledger.save(container)
    }

    fn delete(&self, container: &Container) -> Result<()> {
        let mut ledger = self.ledger.write().unwrap_or_else(PoisonError::into_inner);
        ledger.delete(container)
    }
}

/// Store persisted as a single YAML document.
///
/// Every call re-reads the file, so separate instances over the same path
/// observe each other's writes. Writes go through a temporary file and a
/// rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_ledger(&self) -> Result<Ledger> {
        if !self.path.exists() {
            return Ok(Ledger::default());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Ledger::default());
        }

        Ok(serde_yml::from_str(&content)?)
    }

    fn write_ledger(&self, ledger: &Ledger) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_yml::to_string(ledger)?;
        let tmp = self.path.with_extension("yml.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        debug!(
            "store {:?} written ({} containers)",
            self.path,
            ledger.containers.len()
        );
        Ok(())
    }

    fn modify<T>(&self, apply: impl FnOnce(&mut Ledger) -> Result<T>) -> Result<T> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ledger = self.read_ledger()?;
        let out = apply(&mut ledger)?;
        self.write_ledger(&ledger)?;
        Ok(out)
    }
}

impl ContainerStore for FileStore {
    fn find(&self, name: &str) -> Result<Option<Container>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_ledger()?.containers.remove(name))
    }

    fn list(&self) -> Result<Vec<Container>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_ledger()?.containers.into_values().collect())
    }

    fn save(&self, container: &mut Container) -> Result<()> {
        self.modify(|ledger| ledger.save(container))
    }

    fn delete(&self, container: &Container) -> Result<()> {
        self.modify(|ledger| ledger.delete(container))
    }
}
