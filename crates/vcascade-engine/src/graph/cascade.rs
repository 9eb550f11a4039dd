//! Affected-set computation
//!
//! Breadth-first from the directly bumped entities along child links. Each
//! cascaded entity derives its new version from its own `cascadeRule`.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, instrument};

use crate::error::{EngineError, Result};
use crate::manifest::{AffectedEntity, BumpScope};
use crate::registry::{Registry, UpdateStrategy};
use crate::semver::{calculate_next_version, BumpKind};

/// Input to [`plan_cascade`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeRequest {
    pub scope: BumpScope,
    /// Required for major/minor/patch, rejected for global
    pub target_entity_id: Option<String>,
    /// Increment applied to every root by a global bump
    pub global_increment: BumpKind,
}

impl CascadeRequest {
    pub fn global(increment: BumpKind) -> Self {
        Self {
            scope: BumpScope::Global,
            target_entity_id: None,
            global_increment: increment,
        }
    }

    pub fn targeted(scope: BumpScope, entity_id: impl Into<String>) -> Self {
        Self {
            scope,
            target_entity_id: Some(entity_id.into()),
            global_increment: BumpKind::Patch,
        }
    }

    /// Increment applied to the directly bumped entities
    pub fn trigger(&self) -> BumpKind {
        self.scope.increment().unwrap_or(self.global_increment)
    }
}

/// Compute every entity a bump changes, in breadth-first order
///
/// Assumes a registry that passed validation; the visited set still keeps
/// each entity to a single entry.
#[instrument(skip(registry), fields(scope = %request.scope, target = ?request.target_entity_id))]
pub fn plan_cascade(registry: &Registry, request: &CascadeRequest) -> Result<Vec<AffectedEntity>> {
    let trigger = request.trigger();
    let mut affected: Vec<AffectedEntity> = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<usize> = VecDeque::new();

    let seeds: Vec<_> = match (request.scope, request.target_entity_id.as_deref()) {
        (BumpScope::Global, None) => registry.roots().collect(),
        (BumpScope::Global, Some(id)) => {
            return Err(EngineError::InvalidRequest(format!(
                "global scope bumps every root and does not take a target (got '{id}')"
            )));
        },
        (_, Some(id)) => vec![registry.get(id)?],
        (scope, None) => {
            return Err(EngineError::InvalidRequest(format!(
                "scope '{scope}' requires a target entity"
            )));
        },
    };

    for seed in seeds {
        if visited.insert(seed.id.as_str()) {
            affected.push(AffectedEntity {
                entity_id: seed.id.clone(),
                old_version: seed.current_version.clone(),
                new_version: calculate_next_version(&seed.current_version, trigger)?,
            });
            queue.push_back(affected.len() - 1);
        }
    }

    while let Some(parent_idx) = queue.pop_front() {
        let parent_id = affected[parent_idx].entity_id.clone();
        let parent_new = affected[parent_idx].new_version.clone();

        for child in registry.children(&parent_id) {
            if child.update_strategy != UpdateStrategy::LinkedToParent {
                continue;
            }
            if !visited.insert(child.id.as_str()) {
                continue;
            }
            let new_version = child
                .cascade_rule
                .next_version(&child.current_version, &parent_new, trigger)?;
            debug!(
                entity_id = %child.id,
                parent_id = %parent_id,
                rule = ?child.cascade_rule,
                new_version = %new_version,
                "Cascading bump"
            );
            affected.push(AffectedEntity {
                entity_id: child.id.clone(),
                old_version: child.current_version.clone(),
                new_version,
            });
            queue.push_back(affected.len() - 1);
        }
    }

    debug!(affected = affected.len(), "Cascade planned");
    Ok(affected)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::registry::{CascadeRule, EntityType, VersionedEntity};
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn versions(affected: &[AffectedEntity]) -> Vec<(&str, &str, &str)> {
        affected
            .iter()
            .map(|a| (a.entity_id.as_str(), a.old_version.as_str(), a.new_version.as_str()))
            .collect()
    }

    #[test]
    fn test_global_patch_scenario() {
        let registry = Registry::new(vec![
            VersionedEntity::root("global:main", EntityType::Global, "1.0.0"),
            VersionedEntity::linked("component:foo", EntityType::Component, "1.0.0", "global:main"),
        ])
        .unwrap();

        let affected = plan_cascade(&registry, &CascadeRequest::global(BumpKind::Patch)).unwrap();
        assert_eq!(
            versions(&affected),
            vec![("global:main", "1.0.0", "1.0.1"), ("component:foo", "1.0.0", "1.0.1")]
        );
    }

    #[test]
    fn test_overflowing_root_is_refused() {
        let registry = Registry::new(vec![
            VersionedEntity::root("global:main", EntityType::Global, "18446744073709551615.0.0"),
            VersionedEntity::linked("component:foo", EntityType::Component, "1.0.0", "global:main"),
        ])
        .unwrap();

        let err = plan_cascade(&registry, &CascadeRequest::global(BumpKind::Major)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidVersion(_)));
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_targeted_bump_only_touches_subtree() {
        let registry = Registry::new(vec![
            VersionedEntity::root("global:main", EntityType::Global, "3.1.0"),
            VersionedEntity::linked("component:foo", EntityType::Component, "2.4.1", "global:main"),
            VersionedEntity::linked("component:bar", EntityType::Component, "0.9.0", "global:main"),
            VersionedEntity::linked("docs:foo", EntityType::Documentation, "2.4.1", "component:foo"),
            VersionedEntity::linked("cli:foo", EntityType::CliTool, "0.2.7", "component:foo")
                .with_cascade_rule(CascadeRule::Patch),
        ])
        .unwrap();

        let affected =
            plan_cascade(&registry, &CascadeRequest::targeted(BumpScope::Minor, "component:foo")).unwrap();
        assert_eq!(
            versions(&affected),
            vec![
                ("component:foo", "2.4.1", "2.5.0"),
                ("docs:foo", "2.4.1", "2.5.0"),
                ("cli:foo", "0.2.7", "0.2.8"),
            ]
        );
    }

    #[test]
    fn test_inherit_rule_applies_trigger_increment() {
        let registry = Registry::new(vec![
            VersionedEntity::root("global:main", EntityType::Global, "1.0.0"),
            VersionedEntity::linked("api-scope:v2", EntityType::ApiScope, "2.3.4", "global:main")
                .with_cascade_rule(CascadeRule::Inherit),
        ])
        .unwrap();

        let affected = plan_cascade(&registry, &CascadeRequest::global(BumpKind::Major)).unwrap();
        assert_eq!(affected[1].new_version, "3.0.0");
    }

    #[test]
    fn test_request_errors() {
        let registry =
            Registry::new(vec![VersionedEntity::root("global:main", EntityType::Global, "1.0.0")]).unwrap();

        let err = plan_cascade(&registry, &CascadeRequest::targeted(BumpScope::Patch, "component:nope")).unwrap_err();
        assert!(matches!(err, EngineError::UnknownEntity(_)));

        let mut missing_target = CascadeRequest::targeted(BumpScope::Major, "x");
        missing_target.target_entity_id = None;
        assert!(matches!(
            plan_cascade(&registry, &missing_target).unwrap_err(),
            EngineError::InvalidRequest(_)
        ));

        let mut global_with_target = CascadeRequest::global(BumpKind::Patch);
        global_with_target.target_entity_id = Some("global:main".into());
        assert!(plan_cascade(&registry, &global_with_target).is_err());
    }

    fn arb_forest() -> impl Strategy<Value = Vec<VersionedEntity>> {
        prop::collection::vec(proptest::option::of(any::<prop::sample::Index>()), 1..40).prop_map(|slots| {
            slots
                .iter()
                .enumerate()
                .map(|(i, slot)| match slot {
                    Some(idx) if i > 0 => VersionedEntity::linked(
                        format!("e:{i}"),
                        EntityType::Component,
                        "1.0.0",
                        format!("e:{}", idx.index(i)),
                    ),
                    _ => VersionedEntity::root(format!("e:{i}"), EntityType::Global, "1.0.0"),
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn global_bump_reaches_exactly_the_rooted_entities(entities in arb_forest()) {
            let registry = Registry::new(entities.clone()).unwrap();
            let affected = plan_cascade(&registry, &CascadeRequest::global(BumpKind::Minor)).unwrap();

            // independent reachability: walk each entity up to a root
            let parents: HashMap<&str, Option<&str>> = entities
                .iter()
                .map(|e| (e.id.as_str(), e.parent_id.as_deref()))
                .collect();
            let reaches_root = |id: &str| {
                let mut current = id;
                for _ in 0..=entities.len() {
                    match parents.get(current).copied().flatten() {
                        None => return parents.contains_key(current),
                        Some(parent) => current = parent,
                    }
                }
                false
            };
            let expected: std::collections::BTreeSet<&str> =
                entities.iter().map(|e| e.id.as_str()).filter(|id| reaches_root(id)).collect();

            let ids: Vec<&str> = affected.iter().map(|a| a.entity_id.as_str()).collect();
            let unique: std::collections::BTreeSet<&str> = ids.iter().copied().collect();
            prop_assert_eq!(ids.len(), unique.len());
            prop_assert_eq!(unique, expected);
            prop_assert!(affected.iter().all(|a| a.new_version == "1.1.0"));
        }
    }
}
