use super::{ContainerState, Image, Mount, Variable, VariableRole, Volume};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Record of one runtime unit of an application: what it runs, how it is
/// configured, what it depends on and where it is in its lifecycle.
///
/// Identity is the `name`. `id` and `version` belong to the store and play no
/// part in equality. Dependencies are kept as names and resolved by the
/// caller, so aggregates never hold each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    #[serde(default)]
    id: Option<String>,
    name: String,
    image_name: String,
    state: ContainerState,
    #[serde(default)]
    variables: BTreeMap<String, Variable>,
    #[serde(default)]
    dependencies: BTreeSet<String>,
    /// Keyed by volume name: a volume is mounted at most once per container,
    /// but two volumes may share a mount point.
    #[serde(default)]
    mounts: BTreeMap<String, Mount>,
    #[serde(default)]
    version: u64,
}

impl Container {
    pub fn new(name: impl Into<String>, image: &Image) -> Self {
        let variables = image
            .variables()
            .iter()
            .map(Variable::from_template)
            .map(|v| (v.key().to_string(), v))
            .collect();

        Self {
            id: None,
            name: name.into(),
            image_name: image.repository_tag(),
            state: ContainerState::INITIAL,
            variables,
            dependencies: BTreeSet::new(),
            mounts: BTreeMap::new(),
            version: 0,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    /// Hostname other containers of the application use to reach this one
    pub fn local_dns_name(&self) -> &str {
        &self.name
    }

    /// Optimistic-concurrency counter; 0 until the first successful save
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    pub(crate) fn record_write(&mut self, id: String, version: u64) {
        self.id = Some(id);
        self.version = version;
    }

    // --- state ---

    pub fn state(&self) -> ContainerState {
        self.state
    }

    pub fn set_pending(&mut self) {
        debug!("set pending {} ({})", self.name, self.state);
        self.state = self.state.pending_state();
    }

    /// Unconditional; transition legality is checked by the caller.
    pub fn set_state(&mut self, state: ContainerState) {
        self.state = state;
    }

    // --- variables ---

    pub fn has_variable(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    pub fn variable(&self, key: &str) -> Option<&Variable> {
        self.variables.get(key)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    /// `KEY=value` entries, ordered by key
    pub fn variables_as_list(&self) -> Vec<String> {
        self.variables
            .iter()
            .map(|(key, var)| format!("{}={}", key, var.value()))
            .collect()
    }

    pub fn add_variable(&mut self, key: impl Into<String>, value: impl Into<String>) -> &Variable {
        self.insert_variable(Variable::new(key, value))
    }

    fn insert_variable(&mut self, variable: Variable) -> &Variable {
        match self.variables.entry(variable.key().to_string()) {
            Entry::Occupied(mut slot) => {
                slot.insert(variable);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(variable),
        }
    }

    /// Import variables from another container.
    ///
    /// Keys missing locally are copied in with role IMPORT. Keys already
    /// present are overwritten only when the local variable was itself
    /// imported; OWN variables are never replaced. Local keys the other
    /// container lacks are left alone.
    pub fn import_variables(&mut self, other: &Container) {
        for variable in other.variables() {
            match self.variables.get_mut(variable.key()) {
                Some(local) if local.role() == VariableRole::Import => {
                    local.set_value(variable.value());
                }
                Some(_) => {}
                None => {
                    self.insert_variable(variable.to_imported());
                }
            }
        }
    }

    pub fn remove_variable(&mut self, key: &str) -> Option<Variable> {
        self.variables.remove(key)
    }

    // --- dependencies ---

    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    /// Records the edge and takes a one-shot snapshot of the dependency's
    /// variables. Later changes upstream need another call to propagate.
    pub fn add_dependency(&mut self, dependency: &Container) {
        self.dependencies.insert(dependency.name().to_string());
        self.import_variables(dependency);
    }

    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependencies.contains(name)
    }

    /// Variables imported through this dependency stay in place.
    pub fn remove_dependency(&mut self, name: &str) -> bool {
        self.dependencies.remove(name)
    }

    // --- mounts ---

    pub fn mounts(&self) -> impl Iterator<Item = &Mount> {
        self.mounts.values()
    }

    pub fn is_mounted(&self, volume_name: &str) -> bool {
        self.mounts.contains_key(volume_name)
    }

    pub fn is_volume_mounted(&self, volume: &Volume) -> bool {
        self.is_mounted(volume.name())
    }

    pub fn mount(&self, volume_name: &str) -> Option<&Mount> {
        self.mounts.get(volume_name)
    }

    pub fn volume_mount(&self, volume: &Volume) -> Option<&Mount> {
        self.mount(volume.name())
    }

    /// Mounts `volume` at `mount_point`.
    ///
    /// Fails with [`Error::AlreadyMounted`] when the volume is already mounted
    /// on this container; the existing mount is left untouched.
    pub fn add_mount(&mut self, volume: &Volume, mount_point: impl Into<String>) -> Result<&Mount> {
        match self.mounts.entry(volume.name().to_string()) {
            Entry::Occupied(_) => Err(Error::AlreadyMounted {
                container: self.name.clone(),
                volume: volume.name().to_string(),
            }),
            Entry::Vacant(slot) => Ok(slot.insert(Mount::new(volume.name(), mount_point))),
        }
    }

    pub fn remove_mount(&mut self, volume_name: &str) -> Option<Mount> {
        self.mounts.remove(volume_name)
    }

    pub fn unmount(&mut self, volume: &Volume) -> Option<Mount> {
        self.remove_mount(volume.name())
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Container {}

impl Hash for Container {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Container[id={}, name={}, image={}, state={}, variables={:?}, dependencies={:?}, mounts={:?}, version={}]",
            self.id.as_deref().unwrap_or("-"),
            self.name,
            self.image_name,
            self.state,
            self.variables_as_list(),
            self.dependencies,
            self.mounts.values().map(Mount::to_spec).collect::<Vec<_>>(),
            self.version,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn postgres_image() -> Image {
        Image::new("postgres", "15")
            .with_variable("POSTGRES_USER", "app")
            .with_variable("POSTGRES_PORT", "5432")
    }

    #[test]
    fn test_new_container_seeds_from_image() {
        let container = Container::new("pg", &postgres_image());

        assert_eq!(container.name(), "pg");
        assert_eq!(container.image_name(), "postgres:15");
        assert_eq!(container.state(), ContainerState::Stopped);
        assert_eq!(container.id(), None);
        assert_eq!(container.version(), 0);
        assert!(container.dependencies().is_empty());
        assert_eq!(container.mounts().count(), 0);

        let keys: Vec<_> = container.variables().map(|v| v.key()).collect();
        assert_eq!(keys, vec!["POSTGRES_PORT", "POSTGRES_USER"]);
        assert!(container.variables().all(|v| v.role() == VariableRole::Own));
    }

    #[test]
    fn test_set_pending_touches_state_only() {
        let mut container = Container::new("pg", &postgres_image());
        container.add_variable("A", "1");
        container.set_pending();

        assert_eq!(container.state(), ContainerState::Starting);
        assert!(container.has_variable("A"));

        container.set_pending();
        assert_eq!(container.state(), ContainerState::Starting);
    }

    #[test]
    fn test_set_state_is_unconditional() {
        let mut container = Container::new("pg", &postgres_image());
        container.set_state(ContainerState::Recovering);
        assert_eq!(container.state(), ContainerState::Recovering);
        container.set_state(ContainerState::Running);
        assert_eq!(container.state(), ContainerState::Running);
    }

    #[test]
    fn test_add_variable_overwrites_and_returns_variable() {
        let mut container = Container::new("app", &Image::new("app", "1"));
        container.add_variable("MODE", "dev");
        let var = container.add_variable("MODE", "prod");
        assert_eq!(var.value(), "prod");
        assert_eq!(var.role(), VariableRole::Own);
        assert_eq!(container.variables().count(), 1);
    }

    #[test]
    fn test_add_variable_replaces_imported_with_own() {
        let mut db = Container::new("db", &Image::new("db", "1"));
        db.add_variable("HOST", "db");
        let mut app = Container::new("app", &Image::new("app", "1"));
        app.import_variables(&db);
        assert!(app.variable("HOST").unwrap().is_imported());

        app.add_variable("HOST", "localhost");
        assert_eq!(app.variable("HOST").unwrap().role(), VariableRole::Own);
    }

    #[test]
    fn test_import_never_overwrites_own() {
        let mut a = Container::new("a", &Image::new("a", "1"));
        a.add_variable("X", "1");
        let mut b = Container::new("b", &Image::new("b", "1"));
        b.add_variable("X", "2");

        a.import_variables(&b);

        let x = a.variable("X").unwrap();
        assert_eq!(x.value(), "1");
        assert_eq!(x.role(), VariableRole::Own);
    }

    #[test]
    fn test_import_updates_imported_value() {
        let mut a = Container::new("a", &Image::new("a", "1"));
        let mut b = Container::new("b", &Image::new("b", "1"));
        b.add_variable("W", "old");
        a.import_variables(&b);

        b.add_variable("W", "new");
        a.import_variables(&b);

        let w = a.variable("W").unwrap();
        assert_eq!(w.value(), "new");
        assert!(w.is_imported());
    }

    #[test]
    fn test_import_is_additive() {
        let mut a = Container::new("a", &Image::new("a", "1"));
        a.add_variable("Y", "1");
        let mut b = Container::new("b", &Image::new("b", "1"));
        b.add_variable("Z", "2");

        a.import_variables(&b);

        assert_eq!(a.variables_as_list(), vec!["Y=1", "Z=2"]);
        assert_eq!(a.variable("Y").unwrap().role(), VariableRole::Own);
        assert_eq!(a.variable("Z").unwrap().role(), VariableRole::Import);
        assert!(!b.has_variable("Y"));
    }

    #[test]
    fn test_remove_variable() {
        let mut container = Container::new("pg", &postgres_image());
        assert!(container.remove_variable("POSTGRES_USER").is_some());
        assert!(!container.has_variable("POSTGRES_USER"));
        assert!(container.remove_variable("POSTGRES_USER").is_none());
    }

    #[test]
    fn test_add_dependency_records_name_and_imports() {
        let db = Container::new("pg", &postgres_image());
        let mut app = Container::new("web", &Image::new("web", "1"));

        app.add_dependency(&db);

        assert!(app.has_dependency("pg"));
        assert_eq!(
            app.variable("POSTGRES_PORT").map(|v| v.role()),
            Some(VariableRole::Import)
        );
    }

    #[test]
    fn test_remove_dependency_keeps_imported_variables() {
        let db = Container::new("pg", &postgres_image());
        let mut app = Container::new("web", &Image::new("web", "1"));
        app.add_dependency(&db);

        assert!(app.remove_dependency("pg"));
        assert!(!app.has_dependency("pg"));
        assert!(app.has_variable("POSTGRES_USER"));
        assert!(!app.remove_dependency("pg"));
    }

    #[test]
    fn test_add_mount_twice_fails_and_keeps_first() {
        let mut container = Container::new("pg", &postgres_image());
        let volume = Volume::new("pgdata");

        container.add_mount(&volume, "/data").unwrap();
        let err = container.add_mount(&volume, "/other").unwrap_err();

        assert!(matches!(err, Error::AlreadyMounted { .. }));
        assert_eq!(container.mounts().count(), 1);
        assert_eq!(container.mount("pgdata").unwrap().mount_point(), "/data");
    }

    #[test]
    fn test_two_volumes_can_share_a_mount_point() {
        let mut container = Container::new("pg", &postgres_image());
        let a = Volume::new("a");
        let b = Volume::new("b");

        container.add_mount(&a, "/shared").unwrap();
        container.add_mount(&b, "/shared").unwrap();

        assert!(container.is_volume_mounted(&a));
        assert!(container.is_volume_mounted(&b));
        assert_eq!(container.volume_mount(&b).unwrap().mount_point(), "/shared");
    }

    #[test]
    fn test_remove_mount_is_noop_when_absent() {
        let mut container = Container::new("pg", &postgres_image());
        let volume = Volume::new("pgdata");
        assert!(container.unmount(&volume).is_none());

        container.add_mount(&volume, "/data").unwrap();
        assert!(container.remove_mount("pgdata").is_some());
        assert!(!container.is_mounted("pgdata"));
    }

    #[test]
    fn test_equality_uses_name_only() {
        let mut a = Container::new("same", &postgres_image());
        let b = Container::new("same", &Image::new("other", "2"));
        a.set_state(ContainerState::Running);
        a.record_write("c-1".into(), 4);

        assert_eq!(a, b);
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);

        let c = Container::new("different", &postgres_image());
        assert_ne!(Container::new("same", &postgres_image()), c);
    }

    #[test]
    fn test_display_lists_fields() {
        let mut container = Container::new("pg", &postgres_image());
        container.add_mount(&Volume::new("pgdata"), "/data").unwrap();
        let text = container.to_string();
        assert!(text.contains("name=pg"));
        assert!(text.contains("image=postgres:15"));
        assert!(text.contains("state=STOPPED"));
        assert!(text.contains("pgdata:/data"));
    }

    #[test]
    fn test_local_dns_name_is_name() {
        let container = Container::new("pg", &postgres_image());
        assert_eq!(container.local_dns_name(), "pg");
    }
}
