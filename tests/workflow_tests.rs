use anyhow::Result;
use orchbox::domain::{ContainerState, ContainerStore, VariableRole};
use orchbox::infra::config::{install_default_config, load_app_config_from};
use orchbox::infra::{AppConfig, FanoutSink, FileStore, JsonLinesSink, TracingSink};
use orchbox::services::{ContainerService, OperationContext, Orchestrator, policy_for};
use orchbox::test_support::MockEngine;
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn service_for(config_dir: &Path) -> Result<(ContainerService, AppConfig)> {
    let config = load_app_config_from(config_dir, None)?;
    let mut sink = FanoutSink::new().with(TracingSink);
    if let Some(log) = config.audit_log_path() {
        sink = sink.with(JsonLinesSink::new(log));
    }
    let store = Arc::new(FileStore::new(config.store_path()));
    let service = ContainerService::new(store, Arc::new(sink))
        .with_policy(policy_for(config.strict_transitions()))
        .with_max_conflict_retries(config.max_conflict_retries());
    Ok((service, config))
}

#[test]
fn test_workflow_from_default_config() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let config_dir = temp_dir.path();
    assert!(install_default_config(config_dir)?);
    assert!(!install_default_config(config_dir)?);

    let (service, config) = service_for(config_dir)?;
    let ctx = OperationContext::new("alice", "shop");

    service.create(&ctx, "pg", &config.image("postgres")?)?;
    service.create(&ctx, "cache", &config.image("redis")?)?;
    service.create(&ctx, "api", &config.image("redis")?)?;
    service.add_dependency(&ctx, "api", "pg")?;
    service.add_dependency(&ctx, "api", "cache")?;
    let data = config.volume("data")?;
    service.add_mount(&ctx, "pg", &data, "/var/lib/postgresql/data")?;

    // A fresh store over the same file sees everything
    let reopened = FileStore::new(config.store_path());
    let api = reopened.find("api")?.expect("api persisted");
    assert!(api.has_dependency("pg"));
    assert!(api.has_dependency("cache"));
    assert_eq!(
        api.variable("POSTGRES_PORT").unwrap().role(),
        VariableRole::Import
    );
    assert_eq!(
        api.variable("REDIS_PORT").unwrap().role(),
        VariableRole::Own
    );
    assert!(api.id().is_some());

    let pg = reopened.find("pg")?.expect("pg persisted");
    assert_eq!(pg.image_name(), "docker.io/library/postgres:16");
    assert_eq!(
        pg.mount("data").unwrap().mount_point(),
        "/var/lib/postgresql/data"
    );
    Ok(())
}

#[test]
fn test_workflow_with_local_override_and_audit_log() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let config_dir = temp_dir.path().join("global");
    let project_dir = temp_dir.path().join("project");
    fs::create_dir_all(&project_dir)?;
    install_default_config(&config_dir)?;

    let audit_log = temp_dir.path().join("audit.jsonl");
    fs::write(
        project_dir.join("orchbox.toml"),
        format!(
            r#"
volumes = ["uploads"]

[audit]
log = "{}"

[images.web]
repository = "shop/web"
tag = "2.1"
variables = {{ MODE = "prod" }}
"#,
            audit_log.display()
        ),
    )?;

    let config = load_app_config_from(&config_dir, Some(project_dir.as_path()))?;
    assert!(config.image("postgres").is_ok());
    assert!(config.volume("data").is_ok());
    assert!(config.volume("uploads").is_ok());
    assert_eq!(config.audit_log_path(), Some(audit_log.clone()));

    let store = Arc::new(FileStore::new(config.store_path()));
    let sink = FanoutSink::new().with(JsonLinesSink::new(&audit_log));
    let service = ContainerService::new(store, Arc::new(sink));
    let ctx = OperationContext::new("bob", "shop");

    service.create(&ctx, "web", &config.image("web")?)?;
    service.add_variable(&ctx, "web", "WORKERS", "4")?;
    assert!(service.create(&ctx, "web", &config.image("web")?).is_err());

    let lines: Vec<serde_json::Value> = fs::read_to_string(&audit_log)?
        .lines()
        .map(serde_json::from_str::<serde_json::Value>)
        .collect::<Result<_, _>>()?;
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["actor"], "bob");
    assert_eq!(lines[0]["container"], "web");
    assert_eq!(lines[1]["subject"]["name"], "WORKERS");
    assert_eq!(lines[2]["outcome"]["status"], "failure");
    Ok(())
}

#[test]
fn test_workflow_up_and_down() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    install_default_config(temp_dir.path())?;
    let (service, config) = service_for(temp_dir.path())?;
    let service = Arc::new(service);
    let ctx = OperationContext::new("alice", "shop");

    service.create(&ctx, "pg", &config.image("postgres")?)?;
    service.create(&ctx, "api", &config.image("redis")?)?;
    service.add_dependency(&ctx, "api", "pg")?;

    let engine = Arc::new(MockEngine::new());
    let orchestrator = Orchestrator::new(service.clone(), engine.clone());

    let up = orchestrator.start_all(&ctx, &[])?;
    assert_eq!(up.succeeded, vec!["pg", "api"]);

    let reopened = FileStore::new(config.store_path());
    assert_eq!(reopened.find("api")?.unwrap().state(), ContainerState::Running);

    let down = orchestrator.stop_all(&ctx, &[])?;
    assert_eq!(down.succeeded, vec!["api", "pg"]);
    assert_eq!(
        engine.get_commands(),
        vec!["start:pg", "start:api", "stop:api", "stop:pg"]
    );
    assert_eq!(reopened.find("pg")?.unwrap().state(), ContainerState::Stopped);
    Ok(())
}
