use super::container_service::{ContainerService, OperationContext};
use crate::domain::{ContainerState, ExecutionEngine};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Drives groups of containers through the execution engine, dependencies first
pub struct Orchestrator {
    container_service: Arc<ContainerService>,
    engine: Arc<dyn ExecutionEngine>,
}

/// Outcome of one start or stop pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl Orchestrator {
    pub fn new(container_service: Arc<ContainerService>, engine: Arc<dyn ExecutionEngine>) -> Self {
        Self {
            container_service,
            engine,
        }
    }

    /// Startup order of `names` and everything they depend on, dependencies
    /// first, ties broken by name. An empty slice means every container.
    pub fn startup_order(&self, names: &[String]) -> Result<Vec<String>> {
        let graph: BTreeMap<String, BTreeSet<String>> = self
            .container_service
            .list()?
            .into_iter()
            .map(|c| (c.name().to_string(), c.dependencies().clone()))
            .collect();

        let roots: BTreeSet<String> = if names.is_empty() {
            graph.keys().cloned().collect()
        } else {
            names.iter().cloned().collect()
        };

        let mut marks = BTreeMap::new();
        let mut stack = Vec::new();
        let mut order = Vec::with_capacity(graph.len());
        for root in &roots {
            visit(&graph, root, &mut marks, &mut stack, &mut order)?;
        }
        Ok(order)
    }

    /// Starts the given containers, continuing even if individual starts fail.
    /// A container whose dependency failed is marked FAILED without being started.
    pub fn start_all(&self, ctx: &OperationContext, names: &[String]) -> Result<SweepReport> {
        let order = self.startup_order(names)?;
        let mut report = SweepReport::default();
        if order.is_empty() {
            return Ok(report);
        }

        info!("Starting {} container(s)...", order.len());
        let mut failed: HashSet<String> = HashSet::new();

        for name in order {
            let container = self.container_service.get(&name)?;

            if container.state() == ContainerState::Running {
                debug!("{} already running", name);
                report.skipped.push(name);
                continue;
            }

            if let Some(dep) = container.dependencies().iter().find(|d| failed.contains(*d)) {
                error!("Not starting {}: dependency {} failed", name, dep);
                mark_failed(&self.container_service, ctx, &name);
                failed.insert(name.clone());
                report.failed.push(name);
                continue;
            }

            match self.start_one(ctx, &name) {
                Ok(()) => {
                    debug!("{} started", name);
                    report.succeeded.push(name);
                }
                Err(e) => {
                    error!("Failed to start {}: {}", name, e);
                    failed.insert(name.clone());
                    report.failed.push(name);
                }
            }
        }

        info!(
            "Start finished: {} started, {} failed, {} skipped",
            report.succeeded.len(),
            report.failed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Stops the given containers (every container if empty), dependents
    /// first, continuing even if individual stops fail. Containers that
    /// transitively depend on a named one are stopped as well.
    pub fn stop_all(&self, ctx: &OperationContext, names: &[String]) -> Result<SweepReport> {
        let wanted = self.with_dependents(names)?;
        let roots: Vec<String> = wanted.iter().cloned().collect();
        let mut order = self.startup_order(&roots)?;
        order.retain(|name| names.is_empty() || wanted.contains(name));
        order.reverse();

        let mut report = SweepReport::default();
        if order.is_empty() {
            return Ok(report);
        }

        info!("Stopping {} container(s)...", order.len());

        for name in order {
            let container = self.container_service.get(&name)?;
            if container.state() != ContainerState::Running {
                debug!("{} is {}, nothing to stop", name, container.state());
                report.skipped.push(name);
                continue;
            }

            match self.stop_one(ctx, &name) {
                Ok(()) => {
                    debug!("{} stopped", name);
                    report.succeeded.push(name);
                }
                Err(e) => {
                    error!("Failed to stop {}: {}", name, e);
                    report.failed.push(name);
                }
            }
        }

        info!(
            "Stop finished: {} stopped, {} failed, {} skipped",
            report.succeeded.len(),
            report.failed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// `names` plus everything that transitively depends on them
    fn with_dependents(&self, names: &[String]) -> Result<BTreeSet<String>> {
        let mut wanted: BTreeSet<String> = names.iter().cloned().collect();
        if wanted.is_empty() {
            return Ok(wanted);
        }

        let containers = self.container_service.list()?;
        loop {
            let before = wanted.len();
            for container in &containers {
                if container.dependencies().iter().any(|d| wanted.contains(d)) {
                    wanted.insert(container.name().to_string());
                }
            }
            if wanted.len() == before {
                return Ok(wanted);
            }
        }
    }

    fn start_one(&self, ctx: &OperationContext, name: &str) -> Result<()> {
        let service = &self.container_service;
        let mut state = service.get(name)?.state();

        if state == ContainerState::Failed {
            state = service.set_pending(ctx, name)?;
        }
        // Settle leftovers of an interrupted stop or recovery
        if state.is_pending() && state != ContainerState::Starting {
            state = service.set_state(ctx, name, state.target())?;
        }
        if state == ContainerState::Stopped {
            service.set_pending(ctx, name)?;
        }

        let container = service.get(name)?;
        match self.engine.start(&container) {
            Ok(()) => {
                service.set_state(ctx, name, ContainerState::Running)?;
                Ok(())
            }
            Err(e) => {
                mark_failed(service, ctx, name);
                Err(e)
            }
        }
    }

    fn stop_one(&self, ctx: &OperationContext, name: &str) -> Result<()> {
        let service = &self.container_service;
        service.set_pending(ctx, name)?;

        let container = service.get(name)?;
        match self.engine.stop(&container) {
            Ok(()) => {
                service.set_state(ctx, name, ContainerState::Stopped)?;
                Ok(())
            }
            Err(e) => {
                mark_failed(service, ctx, name);
                Err(e)
            }
        }
    }
}

/// Records an engine failure; the engine error stays the one reported
fn mark_failed(service: &ContainerService, ctx: &OperationContext, name: &str) {
    if let Err(e) = service.set_state(ctx, name, ContainerState::Failed) {
        warn!("Could not mark {} as failed: {}", name, e);
    }
}

fn visit(
    graph: &BTreeMap<String, BTreeSet<String>>,
    name: &str,
    marks: &mut BTreeMap<String, Mark>,
    stack: &mut Vec<String>,
    order: &mut Vec<String>,
) -> Result<()> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = stack.iter().position(|n| n == name).unwrap_or(0);
            let mut cycle = stack[start..].to_vec();
            cycle.push(name.to_string());
            return Err(Error::CircularDependency(cycle.join(" -> ")));
        }
        None => {}
    }

    let deps = graph
        .get(name)
        .ok_or_else(|| Error::ContainerNotFound(name.to_string()))?;

    marks.insert(name.to_string(), Mark::Visiting);
    stack.push(name.to_string());
    for dep in deps {
        visit(graph, dep, marks, stack, order)?;
    }
    stack.pop();
    marks.insert(name.to_string(), Mark::Done);
    order.push(name.to_string());
    Ok(())
}
