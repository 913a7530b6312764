use orchbox::domain::{Container, ExecutionEngine};
use orchbox::infra::config::AppConfig;
use orchbox::infra::{FanoutSink, FileStore, JsonLinesSink, TracingSink};
use orchbox::services::{ContainerService, OperationContext, Orchestrator, policy_for};
use std::sync::Arc;
use tracing::debug;

/// Everything a command needs: merged config, the service over the file store,
/// and the identity mutations are recorded under
pub struct AppContext {
    pub config: AppConfig,
    pub container_service: Arc<ContainerService>,
    pub op: OperationContext,
}

impl AppContext {
    pub fn from_config(config: AppConfig, actor: &str, application: &str) -> Self {
        let store_path = config.store_path();
        debug!("Using store {:?}", store_path);
        let store = Arc::new(FileStore::new(store_path));

        let mut sink = FanoutSink::new().with(TracingSink);
        if let Some(log) = config.audit_log_path() {
            debug!("Auditing to {:?}", log);
            sink = sink.with(JsonLinesSink::new(log));
        }

        let container_service = Arc::new(
            ContainerService::new(store, Arc::new(sink))
                .with_policy(policy_for(config.strict_transitions()))
                .with_max_conflict_retries(config.max_conflict_retries()),
        );

        Self {
            config,
            container_service,
            op: OperationContext::new(actor, application),
        }
    }

    /// Orchestrator for ordering queries. No engine is attached, so sweeps fail.
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.container_service.clone(), Arc::new(DetachedEngine))
    }
}

#[derive(Debug)]
struct DetachedEngine;

impl ExecutionEngine for DetachedEngine {
    fn start(&self, container: &Container) -> orchbox::Result<()> {
        Err(detached(container))
    }

    fn stop(&self, container: &Container) -> orchbox::Result<()> {
        Err(detached(container))
    }
}

fn detached(container: &Container) -> orchbox::Error {
    orchbox::Error::Engine {
        name: container.name().to_string(),
        message: "no execution engine attached".to_string(),
    }
}
