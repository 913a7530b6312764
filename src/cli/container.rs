use super::context::AppContext;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use orchbox::domain::{Container, ContainerResource, ContainerState};

#[derive(Args)]
pub struct StateCommand {
    #[command(subcommand)]
    pub action: StateAction,
}

#[derive(Subcommand)]
pub enum StateAction {
    /// Moves a container to the pending counterpart of its state
    Pending { name: String },
    /// Commits a state reported by the engine
    Set {
        name: String,
        /// STOPPED, STARTING, RUNNING, STOPPING, FAILED or RECOVERING
        state: ContainerState,
    },
}

pub fn create(app: &AppContext, name: &str, image: &str) -> Result<()> {
    let image = app.config.image(image).with_context(|| {
        format!(
            "unknown image (known: {})",
            app.config.image_names().join(", ")
        )
    })?;
    let container = app.container_service.create(&app.op, name, &image)?;
    println!("✅ {} created from {}", container.name(), container.image_name());
    Ok(())
}

pub fn remove(app: &AppContext, name: &str) -> Result<()> {
    app.container_service.remove(&app.op, name)?;
    println!("🗑️  {} removed", name);
    Ok(())
}

pub fn list(app: &AppContext, json: bool) -> Result<()> {
    let containers = app.container_service.list()?;

    if json {
        let resources: Vec<ContainerResource> =
            containers.iter().map(ContainerResource::from).collect();
        println!("{}", serde_json::to_string_pretty(&resources)?);
        return Ok(());
    }

    if containers.is_empty() {
        println!("No containers");
        return Ok(());
    }

    println!("{:<20} {:<12} {:<32} DEPENDS ON", "NAME", "STATE", "IMAGE");
    for container in &containers {
        let deps: Vec<&str> = container.dependencies().iter().map(String::as_str).collect();
        println!(
            "{:<20} {:<12} {:<32} {}",
            container.name(),
            container.state(),
            container.image_name(),
            deps.join(",")
        );
    }
    Ok(())
}

pub fn show(app: &AppContext, name: &str, json: bool) -> Result<()> {
    let container = app.container_service.get(name)?;

    if json {
        let resource = ContainerResource::from(&container);
        println!("{}", serde_json::to_string_pretty(&resource)?);
    } else {
        print_container(&container);
    }
    Ok(())
}

fn print_container(container: &Container) {
    println!("📦 {}", container.name());
    println!("   id:      {}", container.id().unwrap_or("-"));
    println!("   image:   {}", container.image_name());
    println!("   state:   {}", container.state());
    println!("   version: {}", container.version());

    if !container.dependencies().is_empty() {
        println!("   depends on:");
        for dep in container.dependencies() {
            println!("     - {}", dep);
        }
    }

    if container.variables().next().is_some() {
        println!("   variables:");
        for variable in container.variables() {
            println!(
                "     {}={} ({})",
                variable.key(),
                variable.value(),
                variable.role()
            );
        }
    }

    if container.mounts().next().is_some() {
        println!("   mounts:");
        for mount in container.mounts() {
            println!("     {}", mount.to_spec());
        }
    }
}

pub fn state(app: &AppContext, command: StateCommand) -> Result<()> {
    let (name, state) = match command.action {
        StateAction::Pending { name } => {
            let state = app.container_service.set_pending(&app.op, &name)?;
            (name, state)
        }
        StateAction::Set { name, state } => {
            let state = app.container_service.set_state(&app.op, &name, state)?;
            (name, state)
        }
    };
    println!("{} is now {}", name, state);
    Ok(())
}

pub fn order(app: &AppContext, names: &[String]) -> Result<()> {
    let order = app.orchestrator().startup_order(names)?;
    for (position, name) in order.iter().enumerate() {
        println!("{:>3}. {}", position + 1, name);
    }
    Ok(())
}

pub fn images(app: &AppContext) -> Result<()> {
    for name in app.config.image_names() {
        let image = app.config.image(&name)?;
        println!("{:<16} {}", name, image.repository_tag());
    }
    Ok(())
}
