//! `vcascade graph` command implementation

use std::collections::{HashSet, VecDeque};

use colored::Colorize;
use vcascade_engine::{Registry, RegistryStore, VersionedEntity};

use super::{load_config, GlobalOptions};
use crate::error::Result;

pub async fn run(opts: GlobalOptions<'_>) -> Result<()> {
    let config = load_config(opts)?;
    let registry = RegistryStore::new(config.registry_file()).load()?;
    print!("{}", render(&registry, config.max_graph_depth));
    Ok(())
}

/// A line still to print: entity, indentation, last sibling, depth
type Pending<'a> = (&'a VersionedEntity, String, bool, usize);

/// The forest as an indented tree, one entity per line
///
/// Branches stop at `max_depth` levels below their root. Entities no root
/// reaches (cycles, dangling parents) are listed after the trees.
pub fn render(registry: &Registry, max_depth: usize) -> String {
    let mut out = String::new();
    let mut seen = HashSet::new();

    for root in registry.roots() {
        out.push_str(&format!("{}\n", label(root).bold()));
        seen.insert(root.id.as_str());

        let mut stack = Vec::new();
        push_children(registry, root, String::new(), 1, &mut stack);
        while let Some((entity, prefix, last, depth)) = stack.pop() {
            if !seen.insert(entity.id.as_str()) {
                continue;
            }
            let branch = if last { "└── " } else { "├── " };
            out.push_str(&format!("{prefix}{branch}{}\n", label(entity)));

            let next = format!("{prefix}{}", if last { "    " } else { "│   " });
            if depth < max_depth {
                push_children(registry, entity, next, depth + 1, &mut stack);
            } else if !registry.children(&entity.id).is_empty() {
                out.push_str(&format!("{next}└── {}\n", format!("… (depth limit {max_depth})").dimmed()));
            }
        }
    }

    let reachable = reachable_from_roots(registry);
    let detached: Vec<_> = registry
        .iter()
        .filter(|e| !reachable.contains(e.id.as_str()))
        .collect();
    if !detached.is_empty() {
        out.push_str(&format!("{}\n", "unreachable from any root:".red()));
        for entity in detached {
            out.push_str(&format!("  {}\n", label(entity)));
        }
    }
    out
}

/// Queue the children of `parent` so the first one is popped first
fn push_children<'a>(
    registry: &'a Registry,
    parent: &VersionedEntity,
    prefix: String,
    depth: usize,
    stack: &mut Vec<Pending<'a>>,
) {
    let children = registry.children(&parent.id);
    let count = children.len();
    for (i, child) in children.into_iter().enumerate().rev() {
        stack.push((child, prefix.clone(), i + 1 == count, depth));
    }
}

fn reachable_from_roots(registry: &Registry) -> HashSet<&str> {
    let mut reachable: HashSet<&str> = registry.roots().map(|r| r.id.as_str()).collect();
    let mut queue: VecDeque<&str> = reachable.iter().copied().collect();
    while let Some(id) = queue.pop_front() {
        for child in registry.children(id) {
            if reachable.insert(child.id.as_str()) {
                queue.push_back(child.id.as_str());
            }
        }
    }
    reachable
}

fn label(entity: &VersionedEntity) -> String {
    if entity.is_root() {
        format!("{} {} ({})", entity.id, entity.current_version, entity.entity_type)
    } else {
        format!(
            "{} {} ({}, {})",
            entity.id, entity.current_version, entity.entity_type, entity.cascade_rule
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use vcascade_engine::registry::EntityType;

    #[test]
    fn test_render_tree_and_detached() {
        colored::control::set_override(false);
        let registry = Registry::new(vec![
            VersionedEntity::root("global:main", EntityType::Global, "1.0.0"),
            VersionedEntity::linked("component:a", EntityType::Component, "1.0.0", "global:main"),
            VersionedEntity::linked("component:b", EntityType::Component, "1.0.0", "global:main"),
            VersionedEntity::linked("file:a.txt", EntityType::File, "1.0.0", "component:a"),
            VersionedEntity::linked("component:lost", EntityType::Component, "1.0.0", "global:gone"),
        ])
        .unwrap();

        let out = render(&registry, 32);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "global:main 1.0.0 (global)");
        assert!(lines[1].starts_with("├── component:a"));
        assert!(lines[2].starts_with("│   └── file:a.txt"));
        assert!(lines[3].starts_with("└── component:b"));
        assert!(lines[4].contains("unreachable"));
        assert!(lines[5].contains("component:lost"));
    }

    #[test]
    fn test_depth_limit_truncates_without_detaching() {
        colored::control::set_override(false);
        let registry = Registry::new(vec![
            VersionedEntity::root("global:main", EntityType::Global, "1.0.0"),
            VersionedEntity::linked("component:a", EntityType::Component, "1.0.0", "global:main"),
            VersionedEntity::linked("file:a.txt", EntityType::File, "1.0.0", "component:a"),
        ])
        .unwrap();

        let out = render(&registry, 1);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("└── component:a"));
        assert_eq!(lines[2], "    └── … (depth limit 1)");
        assert!(!out.contains("unreachable"));
    }

    #[test]
    fn test_long_chain_renders_iteratively() {
        colored::control::set_override(false);
        let mut entities = vec![VersionedEntity::root("n:0", EntityType::Component, "1.0.0")];
        for i in 1..2_000 {
            entities.push(VersionedEntity::linked(
                format!("n:{i}"),
                EntityType::Component,
                "1.0.0",
                format!("n:{}", i - 1),
            ));
        }
        let registry = Registry::new(entities).unwrap();

        let out = render(&registry, 5_000);
        assert_eq!(out.lines().count(), 2_000);
        assert!(out.lines().last().unwrap().ends_with("└── n:1999 1.0.0 (component, mirror-parent)"));
    }
}
