//! Patch engine
//!
//! Applies RFC-6902-style `add` / `replace` / `remove` operations to a deep copy of a
//! spec and re-validates the result. The caller's spec is only ever borrowed, so a
//! failed patch list leaves it untouched.
//!
//! A read-only guard runs before anything is applied: a patch whose path equals, is
//! nested under, or is an ancestor of a protected prefix is rejected outright. The
//! guard is enforced here regardless of what any prompt asked a model to respect.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::PatchError;
use crate::schema::validate_spec;
use crate::spec::ChartSpec;

/// Paths the AI-edit path may never modify
pub const DEFAULT_READONLY_PATHS: [&str; 2] = ["/data", "/version"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

impl PatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOp::Add => "add",
            PatchOp::Replace => "replace",
            PatchOp::Remove => "remove",
        }
    }
}

/// One operation addressed by a slash-delimited path into a spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Patch {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Patch {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
        }
    }
}

/// Split a pointer into unescaped segments
pub fn parse_pointer(path: &str) -> Result<Vec<String>, PatchError> {
    let rest = path.strip_prefix('/').ok_or_else(|| PatchError::InvalidPath {
        path: path.to_string(),
        reason: "must start with '/'".to_string(),
    })?;
    rest.split('/')
        .map(|segment| unescape_segment(path, segment))
        .collect()
}

fn unescape_segment(path: &str, segment: &str) -> Result<String, PatchError> {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => {
                    return Err(PatchError::InvalidPath {
                        path: path.to_string(),
                        reason: "'~' must be followed by '0' or '1'".to_string(),
                    })
                }
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Whether `path` touches a protected `prefix`
pub fn touches_prefix(path: &str, prefix: &str) -> bool {
    let path = path.trim_end_matches('/');
    let prefix = prefix.trim_end_matches('/');
    if path.is_empty() {
        // Root replacement would overwrite every subtree.
        return true;
    }
    path == prefix
        || path.starts_with(&format!("{}/", prefix))
        || prefix.starts_with(&format!("{}/", path))
}

/// Stateless patch applier carrying the read-only prefix set
#[derive(Debug, Clone)]
pub struct PatchEngine {
    readonly_paths: Vec<String>,
}

impl Default for PatchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_READONLY_PATHS.iter().map(|p| p.to_string()).collect())
    }
}

impl PatchEngine {
    pub fn new(readonly_paths: Vec<String>) -> Self {
        Self { readonly_paths }
    }

    pub fn readonly_paths(&self) -> &[String] {
        &self.readonly_paths
    }

    /// First patch path that touches a read-only prefix
    pub fn find_readonly_violation<'a>(&self, patches: &'a [Patch]) -> Option<&'a str> {
        patches
            .iter()
            .map(|p| p.path.as_str())
            .find(|path| self.readonly_paths.iter().any(|prefix| touches_prefix(path, prefix)))
    }

    /// Reject any patch touching a read-only path before anything is applied
    pub fn check_readonly(&self, patches: &[Patch]) -> Result<(), PatchError> {
        match self.find_readonly_violation(patches) {
            Some(path) => {
                warn!(path, "rejected patch targeting read-only path");
                Err(PatchError::ReadonlyPath {
                    path: path.to_string(),
                })
            }
            None => Ok(()),
        }
    }

    /// Apply patches to a deep copy of `spec` without validating the result
    pub fn apply(&self, spec: &ChartSpec, patches: &[Patch]) -> Result<Value, PatchError> {
        self.check_readonly(patches)?;
        apply_patches(&spec.to_value(), patches)
    }

    /// Apply patches and re-validate; the caller keeps `spec` on any failure
    pub fn apply_and_validate(
        &self,
        spec: &ChartSpec,
        patches: &[Patch],
    ) -> Result<ChartSpec, PatchError> {
        let patched = self.apply(spec, patches)?;
        let next = validate_spec(&patched)?;
        debug!(patches = patches.len(), chart_type = %next.chart_type, "applied patches");
        Ok(next)
    }
}

/// Apply patches in order to a copy of `document`
pub fn apply_patches(document: &Value, patches: &[Patch]) -> Result<Value, PatchError> {
    let mut working = document.clone();
    for patch in patches {
        apply_one(&mut working, patch)?;
    }
    Ok(working)
}

fn apply_one(document: &mut Value, patch: &Patch) -> Result<(), PatchError> {
    let segments = parse_pointer(&patch.path)?;
    let Some((last, parents)) = segments.split_last() else {
        return Err(PatchError::InvalidPath {
            path: patch.path.clone(),
            reason: "empty path".to_string(),
        });
    };

    match patch.op {
        PatchOp::Remove => {
            if let Some(parent) = walk_existing(document, parents) {
                remove_key(parent, last);
            }
            Ok(())
        }
        PatchOp::Add | PatchOp::Replace => {
            let value = patch.value.clone().ok_or_else(|| PatchError::MissingValue {
                op: patch.op.as_str().to_string(),
                path: patch.path.clone(),
            })?;
            let parent = walk_creating(document, parents, &patch.path)?;
            set_key(parent, last, value, patch.op, &patch.path)
        }
    }
}

/// Walk to an existing container; `None` when any step is absent
fn walk_existing<'a>(document: &'a mut Value, segments: &[String]) -> Option<&'a mut Value> {
    let mut current = document;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => {
                let index = segment.parse::<usize>().ok()?;
                items.get_mut(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Walk to a container, creating empty objects where steps are absent
fn walk_creating<'a>(
    document: &'a mut Value,
    segments: &[String],
    path: &str,
) -> Result<&'a mut Value, PatchError> {
    let mut current = document;
    for segment in segments {
        current = match current {
            Value::Object(map) => {
                let slot = map
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if slot.is_null() {
                    *slot = Value::Object(Map::new());
                }
                slot
            }
            Value::Array(items) => {
                let index = array_index(segment, path)?;
                items
                    .get_mut(index)
                    .ok_or_else(|| PatchError::IndexOutOfRange {
                        path: path.to_string(),
                    })?
            }
            _ => {
                return Err(PatchError::NotAContainer {
                    path: path.to_string(),
                })
            }
        };
    }
    Ok(current)
}

fn array_index(segment: &str, path: &str) -> Result<usize, PatchError> {
    segment.parse::<usize>().map_err(|_| PatchError::InvalidPath {
        path: path.to_string(),
        reason: format!("'{}' is not an array index", segment),
    })
}

fn set_key(
    parent: &mut Value,
    key: &str,
    value: Value,
    op: PatchOp,
    path: &str,
) -> Result<(), PatchError> {
    match parent {
        Value::Object(map) => {
            map.insert(key.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            if op == PatchOp::Add && key == "-" {
                items.push(value);
                return Ok(());
            }
            let index = array_index(key, path)?;
            match op {
                PatchOp::Add if index <= items.len() => {
                    items.insert(index, value);
                    Ok(())
                }
                PatchOp::Replace if index < items.len() => {
                    items[index] = value;
                    Ok(())
                }
                _ => Err(PatchError::IndexOutOfRange {
                    path: path.to_string(),
                }),
            }
        }
        _ => Err(PatchError::NotAContainer {
            path: path.to_string(),
        }),
    }
}

fn remove_key(parent: &mut Value, key: &str) {
    match parent {
        Value::Object(map) => {
            map.remove(key);
        }
        Value::Array(items) => {
            if let Ok(index) = key.parse::<usize>() {
                if index < items.len() {
                    items.remove(index);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_pointer_unescapes() {
        assert_eq!(parse_pointer("/a~1b/c~0d").unwrap(), vec!["a/b", "c~d"]);
        assert_eq!(parse_pointer("/").unwrap(), vec![""]);
        assert!(parse_pointer("title").is_err());
        assert!(parse_pointer("/a~2").is_err());
    }

    #[test]
    fn test_touches_prefix() {
        assert!(touches_prefix("/data", "/data"));
        assert!(touches_prefix("/data/columns/0/name", "/data"));
        assert!(touches_prefix("/", "/data"));
        assert!(!touches_prefix("/dataset", "/data"));
        assert!(!touches_prefix("/encoding/x/field", "/data"));
    }

    #[test]
    fn test_add_creates_intermediate_containers() {
        let doc = json!({ "encoding": { "x": { "field": "a" } } });
        let out = apply_patches(
            &doc,
            &[Patch::add("/encoding/color/field", json!("g"))],
        )
        .unwrap();
        assert_eq!(out["encoding"]["color"]["field"], "g");
        assert!(doc["encoding"].get("color").is_none());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let doc = json!({ "title": "t" });
        let out = apply_patches(&doc, &[Patch::remove("/errorBar/value")]).unwrap();
        assert_eq!(out, doc);
    }

    #[test]
    fn test_array_operations() {
        let doc = json!({ "annotations": [1, 2] });
        let out = apply_patches(
            &doc,
            &[
                Patch::add("/annotations/-", json!(3)),
                Patch::add("/annotations/0", json!(0)),
                Patch::replace("/annotations/1", json!(10)),
                Patch::remove("/annotations/3"),
                Patch::remove("/annotations/99"),
            ],
        )
        .unwrap();
        assert_eq!(out["annotations"], json!([0, 10, 2]));
    }

    #[test]
    fn test_traversing_scalar_fails() {
        let doc = json!({ "title": "t" });
        let err = apply_patches(&doc, &[Patch::add("/title/x", json!(1))]).unwrap_err();
        assert!(matches!(err, PatchError::NotAContainer { .. }));
    }

    #[test]
    fn test_replace_requires_value() {
        let doc = json!({});
        let patch = Patch {
            op: PatchOp::Replace,
            path: "/title".into(),
            value: None,
        };
        let err = apply_patches(&doc, &[patch]).unwrap_err();
        assert!(matches!(err, PatchError::MissingValue { .. }));
    }
}
