//! Graph Validator
//!
//! Traces every entity to its root along `parentId` links. A chain is only a
//! problem when it cycles, dangles, or runs too deep. Fan-in (many children on
//! one parent) and multi-hop chains of `linked-to-parent` entities are normal.
//!
//! Every entity is resolved at most once: outcomes are memoized, so a chain
//! shared by many descendants is walked a single time. Each defect is reported
//! exactly once as an error on the entity that causes it. Entities that merely
//! hang below a defect get a `BrokenUpstream` warning instead.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::{EngineError, Result};
use crate::registry::{Registry, UpdateStrategy, VersionedEntity};
use crate::semver::SemanticVersion;

/// Default bound on parent hops from any entity to its root
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// A single validator finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum GraphIssue {
    DuplicateId { entity_id: String },
    /// Members in walk order (child to parent), rotated to start at the smallest id
    Cycle { members: Vec<String> },
    DanglingParent { entity_id: String, parent_id: String },
    /// `linked-to-parent` without a `parentId`
    MissingParent { entity_id: String },
    /// `independent` with a `parentId`
    ForbiddenParent { entity_id: String, parent_id: String },
    DepthExceeded { entity_id: String, max_depth: usize },
    InvalidVersion { entity_id: String, version: String },
    BrokenUpstream { entity_id: String, culprit: String },
    NoTargetFiles { entity_id: String },
}

impl GraphIssue {
    /// Ids of every entity this finding names
    pub fn entity_ids(&self) -> Vec<&str> {
        match self {
            GraphIssue::Cycle { members } => members.iter().map(String::as_str).collect(),
            GraphIssue::DuplicateId { entity_id }
            | GraphIssue::DanglingParent { entity_id, .. }
            | GraphIssue::MissingParent { entity_id }
            | GraphIssue::ForbiddenParent { entity_id, .. }
            | GraphIssue::DepthExceeded { entity_id, .. }
            | GraphIssue::InvalidVersion { entity_id, .. }
            | GraphIssue::BrokenUpstream { entity_id, .. }
            | GraphIssue::NoTargetFiles { entity_id } => vec![entity_id.as_str()],
        }
    }
}

impl fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphIssue::DuplicateId { entity_id } => write!(f, "duplicate entity id '{entity_id}'"),
            GraphIssue::Cycle { members } => {
                let first = members.first().map(String::as_str).unwrap_or_default();
                write!(f, "cycle via parentId: {} -> {first}", members.join(" -> "))
            },
            GraphIssue::DanglingParent {
                entity_id,
                parent_id,
            } => write!(f, "'{entity_id}' points at unknown parent '{parent_id}'"),
            GraphIssue::MissingParent { entity_id } => {
                write!(f, "'{entity_id}' is linked-to-parent but has no parentId")
            },
            GraphIssue::ForbiddenParent {
                entity_id,
                parent_id,
            } => write!(f, "'{entity_id}' is independent but declares parent '{parent_id}'"),
            GraphIssue::DepthExceeded {
                entity_id,
                max_depth,
            } => write!(f, "'{entity_id}' is more than {max_depth} hops from any root"),
            GraphIssue::InvalidVersion { entity_id, version } => {
                write!(f, "'{entity_id}' has invalid version '{version}'")
            },
            GraphIssue::BrokenUpstream { entity_id, culprit } => {
                write!(f, "'{entity_id}' cannot reach a root because of '{culprit}'")
            },
            GraphIssue::NoTargetFiles { entity_id } => {
                write!(f, "'{entity_id}' has no target files")
            },
        }
    }
}

/// A chain that terminates at a root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub entity_id: String,
    pub root_id: String,
    /// Hops to the root; roots have depth 0
    pub depth: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<GraphIssue>,
    pub warnings: Vec<GraphIssue>,
    pub info: Vec<ChainInfo>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fail with `RegistryIntegrity` when any error was found
    pub fn ensure_valid(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(EngineError::RegistryIntegrity {
                issues: self.errors.clone(),
            })
        }
    }

    pub fn chain(&self, entity_id: &str) -> Option<&ChainInfo> {
        self.info.iter().find(|c| c.entity_id == entity_id)
    }
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Valid { root: usize, depth: usize },
    /// Cannot reach a root; `culprit` carries the error
    Broken { culprit: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct GraphValidator {
    max_depth: usize,
}

impl Default for GraphValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl GraphValidator {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    #[instrument(skip_all, fields(entities = registry.len(), max_depth = self.max_depth))]
    pub fn validate(&self, registry: &Registry) -> ValidationReport {
        let entities = registry.entities();
        let mut outcomes: Vec<Option<Outcome>> = vec![None; entities.len()];
        let mut report = ValidationReport::default();

        for entity in entities {
            if SemanticVersion::parse(&entity.current_version).is_err() {
                report.errors.push(GraphIssue::InvalidVersion {
                    entity_id: entity.id.clone(),
                    version: entity.current_version.clone(),
                });
            }
        }

        for start in 0..entities.len() {
            if outcomes[start].is_none() {
                self.walk(registry, start, &mut outcomes, &mut report.errors);
            }
        }

        for (pos, entity) in entities.iter().enumerate() {
            match outcomes[pos] {
                Some(Outcome::Valid { root, depth }) => report.info.push(ChainInfo {
                    entity_id: entity.id.clone(),
                    root_id: entities[root].id.clone(),
                    depth,
                }),
                Some(Outcome::Broken { culprit }) if culprit != pos => {
                    report.warnings.push(GraphIssue::BrokenUpstream {
                        entity_id: entity.id.clone(),
                        culprit: entities[culprit].id.clone(),
                    });
                },
                _ => {},
            }
            if entity.target_files.is_empty() {
                report.warnings.push(GraphIssue::NoTargetFiles {
                    entity_id: entity.id.clone(),
                });
            }
        }

        if report.is_valid() {
            debug!(chains = report.info.len(), warnings = report.warnings.len(), "Registry is valid");
        } else {
            warn!(errors = report.errors.len(), "Registry failed validation");
        }
        report
    }

    /// Follow parents from `start` until a resolved entity, a root, a defect
    /// or a repeat, then resolve every entity on the path.
    fn walk(
        &self,
        registry: &Registry,
        start: usize,
        outcomes: &mut [Option<Outcome>],
        errors: &mut Vec<GraphIssue>,
    ) {
        let entities = registry.entities();
        let mut path: Vec<usize> = Vec::new();
        let mut on_path: HashMap<usize, usize> = HashMap::new();
        let mut current = start;

        // `pending` is how many leading path entries still need an outcome
        let (mut next, pending) = loop {
            if let Some(resolved) = outcomes[current] {
                break (resolved, path.len());
            }

            if let Some(&idx) = on_path.get(&current) {
                let members = &path[idx..];
                errors.push(GraphIssue::Cycle {
                    members: canonical_cycle(entities, members),
                });
                for &member in members {
                    outcomes[member] = Some(Outcome::Broken { culprit: member });
                }
                break (Outcome::Broken { culprit: current }, idx);
            }

            let entity = &entities[current];
            on_path.insert(current, path.len());
            path.push(current);

            let terminal = match (entity.update_strategy, &entity.parent_id) {
                (UpdateStrategy::Independent, parent) => {
                    if let Some(parent_id) = parent {
                        errors.push(GraphIssue::ForbiddenParent {
                            entity_id: entity.id.clone(),
                            parent_id: parent_id.clone(),
                        });
                    }
                    Some(Outcome::Valid {
                        root: current,
                        depth: 0,
                    })
                },
                (UpdateStrategy::LinkedToParent, None) => {
                    errors.push(GraphIssue::MissingParent {
                        entity_id: entity.id.clone(),
                    });
                    Some(Outcome::Broken { culprit: current })
                },
                (UpdateStrategy::LinkedToParent, Some(parent_id)) => {
                    match registry.position(parent_id) {
                        Some(parent) => {
                            current = parent;
                            None
                        },
                        None => {
                            errors.push(GraphIssue::DanglingParent {
                                entity_id: entity.id.clone(),
                                parent_id: parent_id.clone(),
                            });
                            Some(Outcome::Broken { culprit: current })
                        },
                    }
                },
            };

            if let Some(outcome) = terminal {
                outcomes[current] = Some(outcome);
                break (outcome, path.len() - 1);
            }
        };

        for &pos in path[..pending].iter().rev() {
            next = self.derive(entities, pos, next, errors);
            outcomes[pos] = Some(next);
        }
    }

    /// Outcome of an entity whose parent resolved to `parent`
    fn derive(
        &self,
        entities: &[VersionedEntity],
        pos: usize,
        parent: Outcome,
        errors: &mut Vec<GraphIssue>,
    ) -> Outcome {
        match parent {
            Outcome::Valid { depth, .. } if depth + 1 > self.max_depth => {
                errors.push(GraphIssue::DepthExceeded {
                    entity_id: entities[pos].id.clone(),
                    max_depth: self.max_depth,
                });
                Outcome::Broken { culprit: pos }
            },
            Outcome::Valid { root, depth } => Outcome::Valid {
                root,
                depth: depth + 1,
            },
            broken @ Outcome::Broken { .. } => broken,
        }
    }
}

/// Validate with an explicit depth bound
pub fn validate(registry: &Registry, max_depth: usize) -> ValidationReport {
    GraphValidator::new(max_depth).validate(registry)
}

fn canonical_cycle(entities: &[VersionedEntity], members: &[usize]) -> Vec<String> {
    let mut ids: Vec<String> = members.iter().map(|&m| entities[m].id.clone()).collect();
    let smallest = ids
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    ids.rotate_left(smallest);
    ids
}
