//! Core types for the versioned-entity registry

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::semver::{calculate_next_version, BumpKind};

/// What kind of artifact an entity versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    Global,
    Component,
    ApiScope,
    CliTool,
    Documentation,
    File,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityType::Global => "global",
            EntityType::Component => "component",
            EntityType::ApiScope => "api-scope",
            EntityType::CliTool => "cli-tool",
            EntityType::Documentation => "documentation",
            EntityType::File => "file",
        };
        f.write_str(s)
    }
}

/// How an entity's version moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStrategy {
    /// A root: bumped only directly, never through a parent
    Independent,
    /// Follows its parent through a cascade; `parentId` is required
    LinkedToParent,
}

impl std::fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateStrategy::Independent => f.write_str("independent"),
            UpdateStrategy::LinkedToParent => f.write_str("linked-to-parent"),
        }
    }
}

/// Per-entity rule for the new version when a bump cascades into it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CascadeRule {
    /// Copy the parent's new version string verbatim
    #[default]
    MirrorParent,
    /// Apply the same increment that started the cascade to the entity's own version
    Inherit,
    Major,
    Minor,
    Patch,
}

impl std::fmt::Display for CascadeRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CascadeRule::MirrorParent => "mirror-parent",
            CascadeRule::Inherit => "inherit",
            CascadeRule::Major => "major",
            CascadeRule::Minor => "minor",
            CascadeRule::Patch => "patch",
        };
        f.write_str(s)
    }
}

impl CascadeRule {
    /// New version for a cascaded entity
    ///
    /// `trigger` is the increment applied to the entity that started the
    /// cascade.
    pub fn next_version(&self, current: &str, parent_new: &str, trigger: BumpKind) -> Result<String> {
        match self {
            CascadeRule::MirrorParent => Ok(parent_new.to_string()),
            CascadeRule::Inherit => calculate_next_version(current, trigger),
            CascadeRule::Major => calculate_next_version(current, BumpKind::Major),
            CascadeRule::Minor => calculate_next_version(current, BumpKind::Minor),
            CascadeRule::Patch => calculate_next_version(current, BumpKind::Patch),
        }
    }
}

/// How a target file's pattern is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// Template text with a `{version}` placeholder
    #[default]
    Literal,
    /// Regular expression with a `version` capture group
    Regex,
}

/// A file that carries an entity's version string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetFile {
    /// Path relative to the workspace root (absolute paths are used as-is)
    pub path: PathBuf,

    pub pattern: String,

    #[serde(default)]
    pub kind: PatternKind,

    /// Zero matches in a required target fails the whole transaction
    #[serde(default)]
    pub required: bool,
}

impl TargetFile {
    pub fn literal(path: impl Into<PathBuf>, template: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            pattern: template.into(),
            kind: PatternKind::Literal,
            required: false,
        }
    }

    pub fn regex(path: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            pattern: pattern.into(),
            kind: PatternKind::Regex,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// One node of the version graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedEntity {
    /// Namespaced key, e.g. "component:foo"
    pub id: String,

    pub entity_type: EntityType,

    pub current_version: String,

    pub update_strategy: UpdateStrategy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub cascade_rule: CascadeRule,

    #[serde(default)]
    pub target_files: Vec<TargetFile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VersionedEntity {
    /// An independent (root) entity
    pub fn root(id: impl Into<String>, entity_type: EntityType, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type,
            current_version: version.into(),
            update_strategy: UpdateStrategy::Independent,
            parent_id: None,
            cascade_rule: CascadeRule::default(),
            target_files: Vec::new(),
            description: None,
        }
    }

    /// An entity linked to `parent`
    pub fn linked(
        id: impl Into<String>,
        entity_type: EntityType,
        version: impl Into<String>,
        parent: impl Into<String>,
    ) -> Self {
        Self {
            update_strategy: UpdateStrategy::LinkedToParent,
            parent_id: Some(parent.into()),
            ..Self::root(id, entity_type, version)
        }
    }

    pub fn with_target(mut self, target: TargetFile) -> Self {
        self.target_files.push(target);
        self
    }

    pub fn with_cascade_rule(mut self, rule: CascadeRule) -> Self {
        self.cascade_rule = rule;
        self
    }

    pub fn is_root(&self) -> bool {
        self.update_strategy == UpdateStrategy::Independent
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_wire_format() {
        let entity = VersionedEntity::linked("api-scope:v1", EntityType::ApiScope, "1.2.0", "global:main")
            .with_target(TargetFile::regex("api/VERSION", r"(?P<version>\d+\.\d+\.\d+)").required());

        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["entityType"], "api-scope");
        assert_eq!(json["updateStrategy"], "linked-to-parent");
        assert_eq!(json["parentId"], "global:main");
        assert_eq!(json["cascadeRule"], "mirror-parent");
        assert_eq!(json["targetFiles"][0]["kind"], "regex");
        assert_eq!(json["targetFiles"][0]["required"], true);
    }

    #[test]
    fn test_defaults_when_fields_omitted() {
        let entity: VersionedEntity = serde_json::from_str(
            r#"{"id":"global:main","entityType":"global","currentVersion":"1.0.0","updateStrategy":"independent"}"#,
        )
        .unwrap();
        assert!(entity.is_root());
        assert_eq!(entity.cascade_rule, CascadeRule::MirrorParent);
        assert!(entity.target_files.is_empty());
    }

    #[test]
    fn test_cascade_rules() {
        assert_eq!(CascadeRule::MirrorParent.next_version("0.3.0", "2.0.0", BumpKind::Major).unwrap(), "2.0.0");
        assert_eq!(CascadeRule::Inherit.next_version("0.3.0", "2.0.0", BumpKind::Major).unwrap(), "1.0.0");
        assert_eq!(CascadeRule::Patch.next_version("0.3.0", "2.0.0", BumpKind::Major).unwrap(), "0.3.1");
        assert!(CascadeRule::Minor.next_version("garbage", "2.0.0", BumpKind::Patch).is_err());
    }
}
