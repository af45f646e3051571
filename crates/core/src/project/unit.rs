use super::container::NamedContainer;
use super::instance::ResourceEntry;
use super::keyed::{Keyed, KeyedMap};

/// One output file's worth of resources, grouped by namespace.
#[derive(Debug, Clone)]
pub struct Unit {
    path: String,
    containers: KeyedMap<NamedContainer>,
}

impl Keyed for Unit {
    fn key(&self) -> &str {
        &self.path
    }
}

impl Unit {
    pub fn new(path: impl Into<String>) -> Self {
        Unit {
            path: path.into(),
            containers: KeyedMap::default(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Namespace `name`; `""` is the global namespace.
    pub fn container(&mut self, name: &str, allow_creation: bool) -> Option<&mut NamedContainer> {
        self.containers
            .get_or_create(name, allow_creation, || NamedContainer::new(name))
    }

    pub fn get(&self, name: &str) -> Option<&NamedContainer> {
        self.containers.get(name)
    }

    pub fn containers(&self) -> impl Iterator<Item = &NamedContainer> {
        self.containers.iter()
    }

    pub fn containers_mut(&mut self) -> impl Iterator<Item = &mut NamedContainer> {
        self.containers.iter_mut()
    }

    /// Every resource of the unit: namespaces in declaration order, then
    /// types in first-use order, then ids ascending.
    pub fn entries(&self) -> Vec<ResourceEntry> {
        self.containers
            .iter()
            .flat_map(|ns| ns.resource_containers())
            .flat_map(|rc| rc.instances())
            .map(ResourceEntry::from)
            .collect()
    }

    pub fn resource_count(&self) -> usize {
        self.containers
            .iter()
            .flat_map(|ns| ns.resource_containers())
            .map(|rc| rc.len())
            .sum()
    }
}
