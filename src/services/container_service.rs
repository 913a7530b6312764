use super::transition::{LifecyclePolicy, TransitionPolicy};
use crate::domain::{
    Container, ContainerState, ContainerStore, EventSink, Image, Mount, Notification,
    OperationKind, Outcome, Subject, Volume,
};
use crate::error::{Error, Result};
use crate::infra::config::DEFAULT_MAX_CONFLICT_RETRIES;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Who is acting, and on behalf of which application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationContext {
    pub actor: String,
    pub application: String,
}

impl OperationContext {
    pub fn new(actor: impl Into<String>, application: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            application: application.into(),
        }
    }
}

/// Applies every change to stored containers.
///
/// Mutations on one container name are serialized. Each one re-reads the
/// record, applies the change and saves it; a version conflict leads to a
/// fresh read and another attempt, up to the configured retry budget.
/// Graph checks the aggregate cannot make (self references, cycles, unknown
/// names, transition legality) happen here.
///
/// Adding an edge and removing a container hold the graph lock from the graph
/// read until the write, so two such calls never judge a stale graph. The lock
/// covers this instance only.
pub struct ContainerService {
    store: Arc<dyn ContainerStore>,
    sink: Arc<dyn EventSink>,
    policy: Arc<dyn TransitionPolicy>,
    max_conflict_retries: u32,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    // Taken before any per-name lock
    graph: Mutex<()>,
}

impl ContainerService {
    pub fn new(store: Arc<dyn ContainerStore>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            sink,
            policy: Arc::new(LifecyclePolicy),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            locks: Mutex::new(HashMap::new()),
            graph: Mutex::new(()),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn TransitionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    // --- queries ---

    pub fn get(&self, name: &str) -> Result<Container> {
        self.store
            .find(name)?
            .ok_or_else(|| Error::ContainerNotFound(name.to_string()))
    }

    pub fn list(&self) -> Result<Vec<Container>> {
        self.store.list()
    }

    /// Names of containers that declare `name` as a dependency
    pub fn dependents(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|c| c.has_dependency(name))
            .map(|c| c.name().to_string())
            .collect())
    }

    // --- lifecycle of the record ---

    pub fn create(&self, ctx: &OperationContext, name: &str, image: &Image) -> Result<Container> {
        self.audited(ctx, name, OperationKind::Create, Subject::Container, || {
            validate_container_name(name)?;

            let lock = self.lock_for(name);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

            if self.store.find(name)?.is_some() {
                return Err(Error::ContainerExists(name.to_string()));
            }

            let mut container = Container::new(name, image);
            self.store.save(&mut container).map_err(|e| {
                if e.is_conflict() {
                    Error::ContainerExists(name.to_string())
                } else {
                    e
                }
            })?;

            info!("Created container {} from {}", name, container.image_name());
            Ok(container)
        })
    }

    /// Deletes a container nothing depends on anymore
    pub fn remove(&self, ctx: &OperationContext, name: &str) -> Result<()> {
        self.audited(ctx, name, OperationKind::Remove, Subject::Container, || {
            let _graph = self.graph.lock().unwrap_or_else(PoisonError::into_inner);
            let lock = self.lock_for(name);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

            let mut attempt = 0;
            loop {
                let container = self.get(name)?;
                let dependents = self.dependents(name)?;
                if !dependents.is_empty() {
                    return Err(Error::InvalidArgument(format!(
                        "container '{}' is still required by: {}",
                        name,
                        dependents.join(", ")
                    )));
                }

                match self.store.delete(&container) {
                    Ok(()) => {
                        info!("Removed container {}", name);
                        return Ok(());
                    }
                    Err(e) if e.is_conflict() && attempt < self.max_conflict_retries => {
                        attempt += 1;
                        warn!(
                            "Conflict removing {} ({}), retrying {}/{}",
                            name, e, attempt, self.max_conflict_retries
                        );
                    }
                    Err(e) => return Err(e),
                }
            }
        })
    }

    // --- state ---

    pub fn set_pending(&self, ctx: &OperationContext, name: &str) -> Result<ContainerState> {
        self.audited(ctx, name, OperationKind::StateChange, Subject::Container, || {
            let (container, from) = self.update(name, |c| {
                let from = c.state();
                c.set_pending();
                Ok(from)
            })?;
            info!("{}: {} -> {}", name, from, container.state());
            Ok(container.state())
        })
    }

    pub fn set_state(
        &self,
        ctx: &OperationContext,
        name: &str,
        state: ContainerState,
    ) -> Result<ContainerState> {
        self.audited(ctx, name, OperationKind::StateChange, Subject::Container, || {
            let (container, from) = self.update(name, |c| {
                let from = c.state();
                if !self.policy.allows(from, state) {
                    return Err(Error::IllegalTransition {
                        name: name.to_string(),
                        from,
                        to: state,
                    });
                }
                c.set_state(state);
                Ok(from)
            })?;
            info!("{}: {} -> {}", name, from, container.state());
            Ok(container.state())
        })
    }

    // --- variables ---

    pub fn add_variable(
        &self,
        ctx: &OperationContext,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let subject = Subject::Variable(key.to_string());
        self.audited(ctx, name, OperationKind::Create, subject, || {
            if key.trim().is_empty() || key.contains('=') {
                return Err(Error::InvalidArgument(format!(
                    "invalid variable key '{}'",
                    key
                )));
            }
            self.update(name, |c| {
                c.add_variable(key, value);
                Ok(())
            })?;
            debug!("{}: set {}", name, key);
            Ok(())
        })
    }

    pub fn remove_variable(&self, ctx: &OperationContext, name: &str, key: &str) -> Result<bool> {
        let subject = Subject::Variable(key.to_string());
        self.audited(ctx, name, OperationKind::Remove, subject, || {
            let (_, removed) = self.update(name, |c| Ok(c.remove_variable(key).is_some()))?;
            Ok(removed)
        })
    }

    // --- dependencies ---

    /// Declares that `name` depends on `dependency` and imports its variables
    pub fn add_dependency(
        &self,
        ctx: &OperationContext,
        name: &str,
        dependency: &str,
    ) -> Result<()> {
        let subject = Subject::Dependency(dependency.to_string());
        self.audited(ctx, name, OperationKind::Create, subject, || {
            if name == dependency {
                return Err(Error::InvalidArgument(format!(
                    "container '{}' cannot depend on itself",
                    name
                )));
            }

            let _graph = self.graph.lock().unwrap_or_else(PoisonError::into_inner);
            let upstream = self.get(dependency)?;
            self.check_no_cycle(name, dependency)?;

            self.update(name, |c| {
                c.add_dependency(&upstream);
                Ok(())
            })?;
            info!("{} now depends on {}", name, dependency);
            Ok(())
        })
    }

    /// Re-imports variables from every current dependency
    pub fn refresh_imports(&self, name: &str) -> Result<Container> {
        let (container, missing) = self.update(name, |c| {
            let mut missing = Vec::new();
            let names: Vec<String> = c.dependencies().iter().cloned().collect();
            for dep_name in names {
                match self.store.find(&dep_name)? {
                    Some(dep) => c.import_variables(&dep),
                    None => missing.push(dep_name),
                }
            }
            Ok(missing)
        })?;

        for dep_name in missing {
            warn!("{}: dependency {} no longer exists", name, dep_name);
        }
        info!("{}: imports refreshed", name);
        Ok(container)
    }

    /// Imported variables are kept
    pub fn remove_dependency(
        &self,
        ctx: &OperationContext,
        name: &str,
        dependency: &str,
    ) -> Result<bool> {
        let subject = Subject::Dependency(dependency.to_string());
        self.audited(ctx, name, OperationKind::Remove, subject, || {
            let (_, removed) = self.update(name, |c| Ok(c.remove_dependency(dependency)))?;
            Ok(removed)
        })
    }

    // --- mounts ---

    pub fn add_mount(
        &self,
        ctx: &OperationContext,
        name: &str,
        volume: &Volume,
        mount_point: &str,
    ) -> Result<Mount> {
        let subject = Subject::Mount(volume.name().to_string());
        self.audited(ctx, name, OperationKind::Create, subject, || {
            if !mount_point.starts_with('/') {
                return Err(Error::InvalidArgument(format!(
                    "mount point '{}' must be an absolute path",
                    mount_point
                )));
            }
            let (_, mount) = self.update(name, |c| c.add_mount(volume, mount_point).cloned())?;
            info!("{}: mounted {}", name, mount.to_spec());
            Ok(mount)
        })
    }

    pub fn remove_mount(
        &self,
        ctx: &OperationContext,
        name: &str,
        volume_name: &str,
    ) -> Result<bool> {
        let subject = Subject::Mount(volume_name.to_string());
        self.audited(ctx, name, OperationKind::Remove, subject, || {
            let (_, removed) = self.update(name, |c| Ok(c.remove_mount(volume_name).is_some()))?;
            Ok(removed)
        })
    }

    // --- plumbing ---

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Read, apply, save under the per-name lock, retrying on version conflicts
    fn update<T>(
        &self,
        name: &str,
        mut apply: impl FnMut(&mut Container) -> Result<T>,
    ) -> Result<(Container, T)> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut attempt = 0;
        loop {
            let mut container = self.get(name)?;
            let out = apply(&mut container)?;

            match self.store.save(&mut container) {
                Ok(()) => return Ok((container, out)),
                Err(e) if e.is_conflict() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    warn!(
                        "Conflict saving {} ({}), retrying {}/{}",
                        name, e, attempt, self.max_conflict_retries
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fails if `dependency` already reaches `name` through its own dependencies
    fn check_no_cycle(&self, name: &str, dependency: &str) -> Result<()> {
        let graph: BTreeMap<String, Vec<String>> = self
            .store
            .list()?
            .into_iter()
            .map(|c| {
                let deps = c.dependencies().iter().cloned().collect();
                (c.name().to_string(), deps)
            })
            .collect();

        let mut path = vec![dependency.to_string()];
        if reaches(&graph, dependency, name, &mut path, &mut Vec::new()) {
            let mut cycle = vec![name.to_string()];
            cycle.extend(path);
            return Err(Error::CircularDependency(cycle.join(" -> ")));
        }
        Ok(())
    }

    fn audited<T>(
        &self,
        ctx: &OperationContext,
        container: &str,
        kind: OperationKind,
        subject: Subject,
        op: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let result = op();
        let outcome = match &result {
            Ok(_) => Outcome::Success,
            Err(e) => Outcome::Failure {
                detail: e.to_string(),
            },
        };
        let notification = Notification {
            actor: ctx.actor.clone(),
            application: ctx.application.clone(),
            container: container.to_string(),
            kind,
            subject,
            outcome,
        };
        if let Err(e) = self.sink.publish(&notification) {
            warn!("Failed to publish notification ({}): {}", notification, e);
        }
        result
    }
}

/// Depth-first search from `from` to `to`; on success `path` holds the route
fn reaches(
    graph: &BTreeMap<String, Vec<String>>,
    from: &str,
    to: &str,
    path: &mut Vec<String>,
    visited: &mut Vec<String>,
) -> bool {
    if from == to {
        return true;
    }
    if visited.iter().any(|v| v == from) {
        return false;
    }
    visited.push(from.to_string());

    for next in graph.get(from).into_iter().flatten() {
        path.push(next.clone());
        if reaches(graph, next, to, path, visited) {
            return true;
        }
        path.pop();
    }
    false
}

fn validate_container_name(name: &str) -> Result<()> {
    let Some(first_char) = name.chars().next() else {
        return Err(Error::InvalidArgument("empty container name".into()));
    };
    if !first_char.is_alphanumeric() {
        return Err(Error::InvalidArgument(format!(
            "container name '{}' must start with a letter or digit",
            name
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !c.is_alphanumeric() && *c != '_' && *c != '.' && *c != '-')
    {
        return Err(Error::InvalidArgument(format!(
            "container name '{}' contains invalid character '{}'",
            name, c
        )));
    }
    Ok(())
}
