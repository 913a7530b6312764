use super::context::AppContext;
use anyhow::{Result, bail};
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct VarCommand {
    #[command(subcommand)]
    pub action: VarAction,
}

#[derive(Subcommand)]
pub enum VarAction {
    /// Sets an own variable, replacing any variable with the same key
    Set {
        name: String,
        key: String,
        value: String,
    },
    /// Removes a variable
    Unset { name: String, key: String },
}

#[derive(Args)]
pub struct DepCommand {
    #[command(subcommand)]
    pub action: DepAction,
}

#[derive(Subcommand)]
pub enum DepAction {
    /// Makes NAME depend on DEPENDENCY and imports its variables
    Add { name: String, dependency: String },
    /// Drops a dependency; imported variables stay
    Rm { name: String, dependency: String },
    /// Re-imports variables from every dependency of NAME
    Refresh { name: String },
}

#[derive(Args)]
pub struct MountCommand {
    #[command(subcommand)]
    pub action: MountAction,
}

#[derive(Subcommand)]
pub enum MountAction {
    /// Mounts a configured volume at an absolute path
    Add {
        name: String,
        volume: String,
        mount_point: String,
    },
    /// Unmounts a volume
    Rm { name: String, volume: String },
}

pub fn var(app: &AppContext, command: VarCommand) -> Result<()> {
    let service = &app.container_service;
    match command.action {
        VarAction::Set { name, key, value } => {
            service.add_variable(&app.op, &name, &key, &value)?;
            println!("{}: {}={}", name, key, value);
        }
        VarAction::Unset { name, key } => {
            if !service.remove_variable(&app.op, &name, &key)? {
                bail!("{} has no variable '{}'", name, key);
            }
            println!("{}: unset {}", name, key);
        }
    }
    Ok(())
}

pub fn dep(app: &AppContext, command: DepCommand) -> Result<()> {
    let service = &app.container_service;
    match command.action {
        DepAction::Add { name, dependency } => {
            service.add_dependency(&app.op, &name, &dependency)?;
            println!("🔗 {} -> {}", name, dependency);
        }
        DepAction::Rm { name, dependency } => {
            if !service.remove_dependency(&app.op, &name, &dependency)? {
                bail!("{} does not depend on {}", name, dependency);
            }
            println!("{} no longer depends on {}", name, dependency);
        }
        DepAction::Refresh { name } => {
            let container = service.refresh_imports(&name)?;
            let imported = container.variables().filter(|v| v.is_imported()).count();
            println!("🔄 {}: {} imported variable(s)", name, imported);
        }
    }
    Ok(())
}

pub fn mount(app: &AppContext, command: MountCommand) -> Result<()> {
    let service = &app.container_service;
    match command.action {
        MountAction::Add {
            name,
            volume,
            mount_point,
        } => {
            let volume = app.config.volume(&volume)?;
            let mount = service.add_mount(&app.op, &name, &volume, &mount_point)?;
            println!("💾 {}: {}", name, mount.to_spec());
        }
        MountAction::Rm { name, volume } => {
            if !service.remove_mount(&app.op, &name, &volume)? {
                bail!("{} has no mount for volume '{}'", name, volume);
            }
            println!("{}: unmounted {}", name, volume);
        }
    }
    Ok(())
}
