use crate::domain::{Image, Volume};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_ORCHBOX_TOML_NAME: &str = "orchbox.toml";
pub const DEFAULT_ORCHBOX_TOML: &str = include_str!("../../config/default_orchbox.toml");
pub const DEFAULT_STORE_FILE: &str = "containers.yml";
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub fn default_config_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".config/orchbox")
}

pub fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    fs::create_dir_all(config_dir).with_context(|| format!("creating {:?}", config_dir))
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct StoreConfig {
    pub path: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AuditConfig {
    /// JSON-lines file receiving every notification
    pub log: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ServiceConfig {
    pub max_conflict_retries: Option<u32>,
    pub strict_transitions: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct LogConfig {
    pub level: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    pub repository: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl ImageConfig {
    pub fn to_image(&self) -> Image {
        let tag = self.tag.clone().unwrap_or_default();
        self.variables
            .iter()
            .fold(Image::new(self.repository.clone(), tag), |image, (k, v)| {
                image.with_variable(k.clone(), v.clone())
            })
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Image catalog defined as [images.NAME]
    #[serde(default)]
    pub images: Option<HashMap<String, ImageConfig>>,
    /// Volumes containers may mount
    #[serde(default)]
    pub volumes: Option<Vec<String>>,
}

impl AppConfig {
    /// Merges another AppConfig into self.
    /// Values from `other` overwrite values in `self` if present.
    pub fn merge(&mut self, other: AppConfig) {
        if let Some(path) = other.store.path {
            self.store.path = Some(path);
        }
        if let Some(log) = other.audit.log {
            self.audit.log = Some(log);
        }
        if let Some(retries) = other.service.max_conflict_retries {
            self.service.max_conflict_retries = Some(retries);
        }
        if let Some(strict) = other.service.strict_transitions {
            self.service.strict_transitions = Some(strict);
        }
        if let Some(level) = other.log.level {
            self.log.level = Some(level);
        }

        // Images with the same name in 'other' replace existing ones
        if let Some(other_images) = other.images {
            match &mut self.images {
                Some(existing) => existing.extend(other_images),
                None => self.images = Some(other_images),
            }
        }

        if let Some(volumes) = other.volumes {
            let mut current = self.volumes.take().unwrap_or_default();
            for volume in volumes {
                if !current.contains(&volume) {
                    current.push(volume);
                }
            }
            self.volumes = Some(current);
        }
    }

    pub fn store_path(&self) -> PathBuf {
        expand(self.store.path.as_deref().unwrap_or(DEFAULT_STORE_FILE))
    }

    pub fn audit_log_path(&self) -> Option<PathBuf> {
        self.audit.log.as_deref().map(expand)
    }

    pub fn max_conflict_retries(&self) -> u32 {
        self.service
            .max_conflict_retries
            .unwrap_or(DEFAULT_MAX_CONFLICT_RETRIES)
    }

    pub fn strict_transitions(&self) -> bool {
        self.service.strict_transitions.unwrap_or(true)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn image(&self, name: &str) -> crate::Result<Image> {
        self.images
            .as_ref()
            .and_then(|images| images.get(name))
            .map(ImageConfig::to_image)
            .ok_or_else(|| crate::Error::ImageNotFound(name.to_string()))
    }

    pub fn volume(&self, name: &str) -> crate::Result<Volume> {
        self.volumes
            .as_ref()
            .filter(|volumes| volumes.iter().any(|v| v == name))
            .map(|_| Volume::new(name))
            .ok_or_else(|| crate::Error::VolumeNotFound(name.to_string()))
    }

    /// Image names, sorted
    pub fn image_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .images
            .as_ref()
            .map(|images| images.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Rejects catalogs that would produce unusable images or volumes
    pub fn validate(&self) -> Result<()> {
        if let Some(images) = &self.images {
            for (name, image) in images {
                validate_name("image", name)?;
                if image.repository.trim().is_empty() {
                    bail!("Image '{}' has no 'repository'", name);
                }
                for key in image.variables.keys() {
                    if key.trim().is_empty() || key.contains('=') {
                        bail!("Image '{}' declares invalid variable key '{}'", name, key);
                    }
                }
            }
        }

        if let Some(volumes) = &self.volumes {
            let mut seen = HashSet::new();
            for volume in volumes {
                validate_name("volume", volume)?;
                if !seen.insert(volume.as_str()) {
                    bail!("Volume '{}' declared twice", volume);
                }
            }
        }

        if self.max_conflict_retries() > 100 {
            bail!(
                "service.max_conflict_retries = {} is too high",
                self.max_conflict_retries()
            );
        }

        Ok(())
    }
}

fn validate_name(what: &str, name: &str) -> Result<()> {
    let Some(first_char) = name.chars().next() else {
        bail!("Empty {} name", what);
    };
    if !first_char.is_alphanumeric() {
        bail!("{} name '{}' must start with a letter or digit", what, name);
    }
    if let Some(c) = name
        .chars()
        .find(|c| !c.is_alphanumeric() && *c != '_' && *c != '.' && *c != '-')
    {
        bail!("{} name '{}' contains invalid character '{}'", what, name, c);
    }
    Ok(())
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

pub fn install_default_config(target_dir: &Path) -> Result<bool> {
    ensure_config_dir(target_dir)?;

    let target = target_dir.join(DEFAULT_ORCHBOX_TOML_NAME);
    if target.exists() {
        return Ok(false);
    }

    fs::write(&target, DEFAULT_ORCHBOX_TOML)
        .with_context(|| format!("writing template to {:?}", target))?;
    Ok(true)
}

fn read_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    toml::from_str(&content).with_context(|| format!("parsing {:?}", path))
}

/// Loads `<config_dir>/orchbox.toml`, then merges `./orchbox.toml` on top
pub fn load_app_config(config_dir: &Path) -> Result<AppConfig> {
    load_app_config_from(config_dir, Some(Path::new(".")))
}

pub fn load_app_config_from(config_dir: &Path, local_dir: Option<&Path>) -> Result<AppConfig> {
    let global_config_path = config_dir.join(DEFAULT_ORCHBOX_TOML_NAME);
    let mut app_config = AppConfig::default();

    if global_config_path.exists() {
        debug!("Loading global config {:?}", global_config_path);
        app_config = read_config(&global_config_path)?;
    }

    if let Some(local_dir) = local_dir {
        let local_config_path = local_dir.join(DEFAULT_ORCHBOX_TOML_NAME);
        if local_config_path.exists() && local_config_path != global_config_path {
            info!("Merging local config {:?}", local_config_path);
            app_config.merge(read_config(&local_config_path)?);
        }
    }

    // The store lives next to the global config unless configured otherwise
    if app_config.store.path.is_none() {
        app_config.store.path = Some(
            config_dir
                .join(DEFAULT_STORE_FILE)
                .to_string_lossy()
                .into_owned(),
        );
    }

    app_config.validate()?;
    Ok(app_config)
}
