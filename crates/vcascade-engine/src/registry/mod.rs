//! Registry Model
//!
//! All versioned entities live in one arena keyed by id. Parent links are
//! plain id strings resolved through the arena, so graph walks never chase
//! live references and the registry serializes as-is.

mod store;
mod types;

use std::collections::HashMap;

pub use store::{RegistryDocument, RegistryFormat, RegistryStore, REGISTRY_SCHEMA_VERSION};
pub use types::{
    CascadeRule, EntityType, PatternKind, TargetFile, UpdateStrategy, VersionedEntity,
};

use crate::error::{EngineError, Result};
use crate::graph::GraphIssue;

/// In-memory registry of versioned entities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    entities: Vec<VersionedEntity>,
    index: HashMap<String, usize>,
    /// parent id -> child positions, in registry order
    children: HashMap<String, Vec<usize>>,
}

impl Registry {
    /// Build a registry, rejecting duplicate ids
    pub fn new(entities: Vec<VersionedEntity>) -> Result<Self> {
        let mut index = HashMap::with_capacity(entities.len());
        let mut duplicates = Vec::new();

        for (pos, entity) in entities.iter().enumerate() {
            if index.insert(entity.id.clone(), pos).is_some() {
                duplicates.push(GraphIssue::DuplicateId {
                    entity_id: entity.id.clone(),
                });
            }
        }
        if !duplicates.is_empty() {
            return Err(EngineError::RegistryIntegrity { issues: duplicates });
        }

        let mut children: HashMap<String, Vec<usize>> = HashMap::new();
        for (pos, entity) in entities.iter().enumerate() {
            if let Some(parent) = &entity.parent_id {
                children.entry(parent.clone()).or_default().push(pos);
            }
        }

        Ok(Self {
            entities,
            index,
            children,
        })
    }

    /// Look up an entity, failing with `UnknownEntity`
    pub fn get(&self, id: &str) -> Result<&VersionedEntity> {
        self.find(id)
            .ok_or_else(|| EngineError::UnknownEntity(id.to_string()))
    }

    pub fn find(&self, id: &str) -> Option<&VersionedEntity> {
        self.index.get(id).map(|&pos| &self.entities[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Arena position of `id`
    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Entities whose `parentId` is `id`, in registry order
    ///
    /// The update strategy of the children is not filtered here.
    pub fn children(&self, id: &str) -> Vec<&VersionedEntity> {
        self.children
            .get(id)
            .map(|positions| positions.iter().map(|&pos| &self.entities[pos]).collect())
            .unwrap_or_default()
    }

    pub fn roots(&self) -> impl Iterator<Item = &VersionedEntity> {
        self.entities.iter().filter(|e| e.is_root())
    }

    pub fn entities(&self) -> &[VersionedEntity] {
        &self.entities
    }

    pub fn iter(&self) -> impl Iterator<Item = &VersionedEntity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Copy of this registry with the given `(id, new_version)` pairs applied
    pub fn with_versions<'a, I>(&self, updates: I) -> Result<Registry>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut next = self.clone();
        for (id, version) in updates {
            let pos = *next
                .index
                .get(id)
                .ok_or_else(|| EngineError::UnknownEntity(id.to_string()))?;
            next.entities[pos].current_version = version.to_string();
        }
        Ok(next)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> Registry {
        Registry::new(vec![
            VersionedEntity::root("global:main", EntityType::Global, "1.0.0"),
            VersionedEntity::linked("component:foo", EntityType::Component, "1.0.0", "global:main"),
            VersionedEntity::linked("component:bar", EntityType::Component, "0.4.0", "global:main"),
            VersionedEntity::linked("docs:foo", EntityType::Documentation, "1.0.0", "component:foo"),
        ])
        .unwrap()
    }

    #[test]
    fn test_get_and_children() {
        let registry = sample();
        assert_eq!(registry.get("component:bar").unwrap().current_version, "0.4.0");

        let children: Vec<_> = registry.children("global:main").iter().map(|e| e.id.as_str()).collect();
        assert_eq!(children, vec!["component:foo", "component:bar"]);
        assert!(registry.children("docs:foo").is_empty());
        assert_eq!(registry.roots().count(), 1);
    }

    #[test]
    fn test_unknown_entity() {
        let err = sample().get("component:nope").unwrap_err();
        assert!(matches!(err, EngineError::UnknownEntity(id) if id == "component:nope"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Registry::new(vec![
            VersionedEntity::root("global:main", EntityType::Global, "1.0.0"),
            VersionedEntity::root("global:main", EntityType::Global, "2.0.0"),
        ])
        .unwrap_err();
        assert!(err.is_integrity_error());
    }

    #[test]
    fn test_with_versions_leaves_original_untouched() {
        let registry = sample();
        let next = registry
            .with_versions([("global:main", "1.0.1"), ("component:foo", "1.0.1")])
            .unwrap();

        assert_eq!(next.get("global:main").unwrap().current_version, "1.0.1");
        assert_eq!(registry.get("global:main").unwrap().current_version, "1.0.0");
        assert!(registry.with_versions([("missing", "1.0.0")]).is_err());
    }
}
