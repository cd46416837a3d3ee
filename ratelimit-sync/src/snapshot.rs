//! Versioned, typed resource snapshots and the cache they are published to.

use crate::errors::SnapshotError;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// Logical role the rate-limit server subscribes with.
pub const RATE_LIMIT_ROLE: &str = "ratelimit";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceReference {
    pub type_url: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub payload: prost_types::Any,
    pub references: Vec<ResourceReference>,
}

impl Resource {
    pub fn new(name: impl Into<String>, payload: prost_types::Any) -> Self {
        Self {
            name: name.into(),
            payload,
            references: Vec::new(),
        }
    }

    pub fn with_references(mut self, references: Vec<ResourceReference>) -> Self {
        self.references = references;
        self
    }
}

/// Resources of one type, indexed by name, sharing one version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resources {
    pub version: String,
    pub items: BTreeMap<String, Resource>,
}

impl Resources {
    pub fn new(version: impl Into<String>, items: impl IntoIterator<Item = Resource>) -> Self {
        Self {
            version: version.into(),
            items: items
                .into_iter()
                .map(|resource| (resource.name.clone(), resource))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericSnapshot {
    resources: BTreeMap<String, Resources>,
}

impl GenericSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resources(mut self, type_url: impl Into<String>, resources: Resources) -> Self {
        self.resources.insert(type_url.into(), resources);
        self
    }

    pub fn get_resources(&self, type_url: &str) -> Option<&Resources> {
        self.resources.get(type_url)
    }

    pub fn version(&self, type_url: &str) -> Option<&str> {
        self.resources
            .get(type_url)
            .map(|resources| resources.version.as_str())
    }

    pub fn type_urls(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Union of two snapshots holding different resource types.
    pub fn combine(&self, other: &GenericSnapshot) -> Result<GenericSnapshot, SnapshotError> {
        if other
            .resources
            .keys()
            .any(|type_url| self.resources.contains_key(type_url))
        {
            return Err(SnapshotError::OverlappingTypes);
        }
        Ok(self.merge(other))
    }

    /// Union of two snapshots; `other` wins for types present in both.
    pub fn merge(&self, other: &GenericSnapshot) -> GenericSnapshot {
        let mut resources = self.resources.clone();
        resources.extend(
            other
                .resources
                .iter()
                .map(|(type_url, group)| (type_url.clone(), group.clone())),
        );
        GenericSnapshot { resources }
    }

    /// Checks the references declared by every resource.
    ///
    /// Fails when a referenced resource IS in the snapshot and passes when it
    /// is missing, matching the behavior of the control plane this replaces.
    /// See DESIGN.md before changing it.
    pub fn consistent(&self) -> Result<(), SnapshotError> {
        for group in self.resources.values() {
            for resource in group.items.values() {
                for reference in &resource.references {
                    let present = self
                        .resources
                        .get(&reference.type_url)
                        .map_or(false, |referenced| referenced.items.contains_key(&reference.name));
                    if present {
                        return Err(SnapshotError::MissingReference {
                            type_url: reference.type_url.clone(),
                            name: reference.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Where snapshots get published, one per role.
pub trait SnapshotCache: Send + Sync {
    fn set_snapshot(&self, role: &str, snapshot: GenericSnapshot) -> Result<(), SnapshotError>;

    fn get_snapshot(&self, role: &str) -> Option<GenericSnapshot>;
}

#[derive(Default)]
pub struct InMemorySnapshotCache {
    snapshots: RwLock<HashMap<String, GenericSnapshot>>,
}

impl InMemorySnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotCache for InMemorySnapshotCache {
    fn set_snapshot(&self, role: &str, snapshot: GenericSnapshot) -> Result<(), SnapshotError> {
        self.snapshots
            .write()
            .unwrap()
            .insert(role.to_string(), snapshot);
        Ok(())
    }

    fn get_snapshot(&self, role: &str) -> Option<GenericSnapshot> {
        self.snapshots.read().unwrap().get(role).cloned()
    }
}
