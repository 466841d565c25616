// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dotted-path field patches over JSON record trees.
//!
//! Patches replace the value at a path entirely, never deep-merging. Array
//! fields are replaced wholesale, never indexed into. A sentinel value
//! requests deletion. All operations are pure functions producing a new
//! tree, which makes before/after snapshotting for the journal trivial.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sentinel string requesting deletion of the field at a path.
pub const DELETE_SENTINEL: &str = "__delete__";

/// Error applying or parsing a patch path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("empty patch path")]
    EmptyPath,
    #[error("path segment '{0}' is an array index; arrays are replaced wholesale")]
    IndexSegment(String),
    #[error("path '{0}' traverses a non-object value")]
    NotAnObject(String),
}

/// A dotted field path, pre-split into segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path. Rejects empty paths, empty segments, and
    /// all-digit segments (which would be array-element indexing).
    pub fn parse(path: &str) -> Result<Self, PatchError> {
        if path.is_empty() {
            return Err(PatchError::EmptyPath);
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        for seg in &segments {
            if seg.is_empty() {
                return Err(PatchError::EmptyPath);
            }
            if seg.chars().all(|c| c.is_ascii_digit()) {
                return Err(PatchError::IndexSegment(seg.clone()));
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First segment of the path (the top-level field).
    pub fn head(&self) -> &str {
        &self.segments[0]
    }

    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Value side of a patch entry: either a replacement value or the delete
/// sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    Set(serde_json::Value),
    Delete,
}

impl PatchValue {
    pub fn from_value(value: serde_json::Value) -> Self {
        match &value {
            serde_json::Value::String(s) if s == DELETE_SENTINEL => PatchValue::Delete,
            _ => PatchValue::Set(value),
        }
    }
}

impl Serialize for PatchValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PatchValue::Set(v) => v.serialize(serializer),
            PatchValue::Delete => serializer.serialize_str(DELETE_SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for PatchValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(PatchValue::from_value(value))
    }
}

/// Read the value at a dotted path, if present.
pub fn get_path<'a>(root: &'a serde_json::Value, path: &FieldPath) -> Option<&'a serde_json::Value> {
    let mut current = root;
    for seg in path.segments() {
        current = current.as_object()?.get(seg)?;
    }
    Some(current)
}

/// Apply one patch entry to a record tree, returning the new tree.
///
/// Intermediate objects are created as needed on set; delete of a missing
/// field is a no-op. The input is never mutated.
pub fn apply_patch(
    root: &serde_json::Value,
    path: &FieldPath,
    value: &PatchValue,
) -> Result<serde_json::Value, PatchError> {
    apply_segments(root, path.segments(), value, &path.dotted())
}

fn apply_segments(
    node: &serde_json::Value,
    segments: &[String],
    value: &PatchValue,
    full_path: &str,
) -> Result<serde_json::Value, PatchError> {
    let Some((head, rest)) = segments.split_first() else {
        return Err(PatchError::EmptyPath);
    };

    let mut map = match node {
        serde_json::Value::Object(m) => m.clone(),
        serde_json::Value::Null => serde_json::Map::new(),
        _ => return Err(PatchError::NotAnObject(full_path.to_string())),
    };

    if rest.is_empty() {
        match value {
            PatchValue::Set(v) => {
                map.insert(head.clone(), v.clone());
            }
            PatchValue::Delete => {
                map.remove(head);
            }
        }
    } else {
        let child = map.get(head).cloned().unwrap_or(serde_json::Value::Null);
        // Deleting under a missing subtree is a no-op
        if child.is_null() && matches!(value, PatchValue::Delete) {
            return Ok(serde_json::Value::Object(map));
        }
        let new_child = apply_segments(&child, rest, value, full_path)?;
        map.insert(head.clone(), new_child);
    }

    Ok(serde_json::Value::Object(map))
}

/// Explicit allowlist of patchable paths.
///
/// `flat` entries match exactly (including whole-array fields);
/// `deep_prefixes` admit any path beneath the prefix, e.g. `attributes`
/// admits `attributes.finish.color`. Array-element indexing is rejected at
/// [`FieldPath::parse`] before the allowlist is consulted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathAllowlist {
    #[serde(default)]
    pub flat: BTreeSet<String>,
    #[serde(default)]
    pub deep_prefixes: BTreeSet<String>,
}

impl PathAllowlist {
    pub fn allows(&self, path: &FieldPath) -> bool {
        let dotted = path.dotted();
        if self.flat.contains(&dotted) {
            return true;
        }
        self.deep_prefixes
            .iter()
            .any(|prefix| dotted == *prefix || dotted.starts_with(&format!("{prefix}.")))
    }

    /// Default allowlist for catalog records.
    pub fn catalog_default() -> Self {
        let flat: BTreeSet<String> = [
            "name",
            "display_name",
            "description",
            "brand",
            "family_key",
            "category",
            "status",
            "tags",
            "aliases",
            "image_urls",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();
        let deep_prefixes: BTreeSet<String> =
            ["attributes", "dimensions"].into_iter().map(str::to_string).collect();
        Self { flat, deep_prefixes }
    }
}

#[cfg(test)]
#[path = "patch_tests.rs"]
mod tests;
