//! File Mutator
//!
//! Locates version strings in target files and rewrites them in memory.
//! Nothing reaches disk here: the transaction manager collects
//! [`FileMutator::pending_writes`] once every target has been computed.
//!
//! Patterns are always matched against a file's original content, never
//! against text another target already rewrote. Two targets claiming the
//! same span of one file is a `Mutation` error.

use std::collections::HashMap;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::file_store::FileStore;
use crate::manifest::FileChange;
use crate::registry::{PatternKind, TargetFile};

/// Placeholder bound to the version inside literal templates
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// A compiled version locator
#[derive(Debug, Clone)]
pub enum VersionPattern {
    /// `find` is the template expanded with the current version
    Literal { template: String, find: String },
    Regex { regex: Regex, group: CaptureGroup },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureGroup {
    Named,
    First,
}

impl VersionPattern {
    /// Compile `pattern` for an entity currently at `current_version`
    pub fn compile(kind: PatternKind, pattern: &str, current_version: &str) -> std::result::Result<Self, String> {
        match kind {
            PatternKind::Literal => {
                if !pattern.contains(VERSION_PLACEHOLDER) {
                    return Err(format!("literal pattern '{pattern}' has no {VERSION_PLACEHOLDER} placeholder"));
                }
                Ok(VersionPattern::Literal {
                    template: pattern.to_string(),
                    find: pattern.replace(VERSION_PLACEHOLDER, current_version),
                })
            },
            PatternKind::Regex => {
                let regex = Regex::new(pattern).map_err(|e| format!("invalid regex '{pattern}': {e}"))?;
                let group = if regex.capture_names().any(|name| name == Some("version")) {
                    CaptureGroup::Named
                } else if regex.captures_len() > 1 {
                    CaptureGroup::First
                } else {
                    return Err(format!(
                        "regex '{pattern}' needs a capture group (preferably (?P<version>...))"
                    ));
                };
                Ok(VersionPattern::Regex { regex, group })
            },
        }
    }

    /// Every located version in `content`, as non-overlapping edits that
    /// would set it to `new_version`
    pub fn locate(&self, content: &str, new_version: &str) -> Vec<Edit> {
        match self {
            VersionPattern::Literal { template, find } => {
                let replacement = template.replace(VERSION_PLACEHOLDER, new_version);
                content
                    .match_indices(find.as_str())
                    .map(|(start, found)| Edit {
                        range: start..start + found.len(),
                        replacement: replacement.clone(),
                    })
                    .collect()
            },
            VersionPattern::Regex { regex, group } => regex
                .captures_iter(content)
                .filter_map(|caps| match group {
                    CaptureGroup::Named => caps.name("version"),
                    CaptureGroup::First => caps.get(1),
                })
                .map(|span| Edit {
                    range: span.range(),
                    replacement: new_version.to_string(),
                })
                .collect(),
        }
    }
}

/// One replacement, positioned in the original file content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
}

impl Edit {
    fn overlaps(&self, other: &Edit) -> bool {
        self.range.start == other.range.start
            || (self.range.start < other.range.end && other.range.start < self.range.end)
    }
}

/// Apply non-overlapping `edits` to `original` in a single pass
fn apply_edits(original: &str, edits: &[Edit]) -> String {
    let mut ordered: Vec<&Edit> = edits.iter().collect();
    ordered.sort_by_key(|e| e.range.start);

    let mut out = String::with_capacity(original.len());
    let mut last = 0;
    for edit in ordered {
        out.push_str(&original[last..edit.range.start]);
        out.push_str(&edit.replacement);
        last = edit.range.end;
    }
    out.push_str(&original[last..]);
    out
}

#[derive(Debug)]
struct BufferedFile {
    path: PathBuf,
    /// As written in the registry, used in manifests and messages
    display: String,
    original: String,
    /// Pattern that produced each edit, parallel to `edits`
    owners: Vec<String>,
    edits: Vec<Edit>,
}

impl BufferedFile {
    fn content(&self) -> String {
        apply_edits(&self.original, &self.edits)
    }
}

/// Buffered rewrites for one transaction
#[derive(Debug)]
pub struct FileMutator<'a> {
    store: &'a dyn FileStore,
    workspace_root: PathBuf,
    files: Vec<BufferedFile>,
    by_path: HashMap<PathBuf, usize>,
    warnings: Vec<String>,
}

impl<'a> FileMutator<'a> {
    pub fn new(store: &'a dyn FileStore, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            workspace_root: workspace_root.into(),
            files: Vec::new(),
            by_path: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Absolute location of a registry-relative path
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve_target(&self.workspace_root, path)
    }

    /// Rewrite one target entry in the buffered content of its file
    ///
    /// Returns the match count. A missing file counts as zero matches. A
    /// required target with zero matches is a `Mutation` error.
    pub fn rewrite_version(&mut self, target: &TargetFile, current_version: &str, new_version: &str) -> Result<usize> {
        let path = self.resolve(&target.path);
        let display = target.path.display().to_string();

        let pattern = VersionPattern::compile(target.kind, &target.pattern, current_version)
            .map_err(|reason| EngineError::mutation(&path, reason))?;

        let Some(idx) = self.buffer(&path, &display)? else {
            if target.required {
                return Err(EngineError::mutation(&path, "required target file does not exist"));
            }
            let message = format!("target file '{display}' does not exist");
            warn!(path = %path.display(), "Target file missing");
            self.warnings.push(message);
            return Ok(0);
        };

        let file = &mut self.files[idx];
        let edits = pattern.locate(&file.original, new_version);
        if let Some((owner, _)) = file
            .owners
            .iter()
            .zip(&file.edits)
            .find(|(_, existing)| edits.iter().any(|e| e.overlaps(existing)))
        {
            return Err(EngineError::mutation(
                &path,
                format!("pattern '{}' overlaps a match of pattern '{owner}'", target.pattern),
            ));
        }
        let count = edits.len();
        file.owners.extend(std::iter::repeat(target.pattern.clone()).take(count));
        file.edits.extend(edits);

        if count == 0 {
            if target.required {
                return Err(EngineError::mutation(
                    &path,
                    format!("required pattern '{}' matched nothing", target.pattern),
                ));
            }
            warn!(path = %path.display(), pattern = %target.pattern, "Pattern matched nothing");
            self.warnings
                .push(format!("pattern '{}' matched nothing in '{display}'", target.pattern));
        } else {
            debug!(path = %path.display(), matches = count, new_version, "Rewrote version");
        }
        Ok(count)
    }

    /// Load `path` into the buffer set; `None` when it does not exist
    fn buffer(&mut self, path: &Path, display: &str) -> Result<Option<usize>> {
        if let Some(&idx) = self.by_path.get(path) {
            return Ok(Some(idx));
        }

        let bytes = match self.store.read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EngineError::mutation(path, format!("cannot read: {e}"))),
        };
        let original = String::from_utf8(bytes)
            .map_err(|_| EngineError::mutation(path, "file is not valid UTF-8"))?;

        self.files.push(BufferedFile {
            path: path.to_path_buf(),
            display: display.to_string(),
            original,
            owners: Vec::new(),
            edits: Vec::new(),
        });
        let idx = self.files.len() - 1;
        self.by_path.insert(path.to_path_buf(), idx);
        Ok(Some(idx))
    }

    /// Per-file match totals, in first-touched order
    pub fn file_changes(&self) -> Vec<FileChange> {
        self.files
            .iter()
            .map(|f| FileChange {
                file_path: f.display.clone(),
                match_count: f.edits.len(),
            })
            .collect()
    }

    /// Files whose content actually changed
    pub fn pending_writes(&self) -> Vec<(PathBuf, Vec<u8>)> {
        self.files
            .iter()
            .filter_map(|f| {
                let content = f.content();
                (content != f.original).then(|| (f.path.clone(), content.into_bytes()))
            })
            .collect()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

/// Join `path` onto `root` unless it is already absolute
pub fn resolve_target(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
