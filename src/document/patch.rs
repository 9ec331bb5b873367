//! Structural patch operations and their application
//!
//! Operations follow RFC 6902 semantics (a `move` is a remove followed by an
//! add evaluated against the post-removal document), but paths are tree
//! paths: on a sequence node the collection name is implied, see
//! [`to_pointer`](super::addressing::to_pointer).

use super::addressing::{step_into, to_pointer, value_at};
use super::path::{FieldPath, Path, Segment};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single structural edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: Path, value: Value },
    Remove { path: Path },
    Replace { path: Path, value: Value },
    Move { from: Path, path: Path },
}

impl PatchOp {
    pub fn moving(from: Path, path: Path) -> Self {
        PatchOp::Move { from, path }
    }

    /// Target path of the operation
    pub fn path(&self) -> &Path {
        match self {
            PatchOp::Add { path, .. }
            | PatchOp::Remove { path }
            | PatchOp::Replace { path, .. }
            | PatchOp::Move { path, .. } => path,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PatchOp::Add { .. } => "add",
            PatchOp::Remove { .. } => "remove",
            PatchOp::Replace { .. } => "replace",
            PatchOp::Move { .. } => "move",
        }
    }

    /// Operation that undoes this one, given the document right after it was
    /// applied. Only moves are invertible without the removed value.
    pub fn inverse(&self, after: &Value, collection: &FieldPath) -> Option<PatchOp> {
        match self {
            PatchOp::Move { from, path } => Some(PatchOp::Move {
                from: resolve_append(after, path, collection, 1)?,
                path: from.clone(),
            }),
            PatchOp::Add { path, .. } => Some(PatchOp::Remove {
                path: resolve_append(after, path, collection, 1)?,
            }),
            _ => None,
        }
    }
}

/// Outcome of applying a patch list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub applied: usize,
    pub skipped: usize,
}

impl PatchReport {
    pub fn is_clean(&self) -> bool {
        self.skipped == 0
    }
}

/// Parse a JSON patch list, dropping operations this engine does not know
pub fn parse_patch(text: &str) -> Result<Vec<PatchOp>, String> {
    let raw: Vec<Value> = serde_json::from_str(text)
        .map_err(|e| format!("Failed to parse patch: {}", e))?;
    Ok(raw
        .into_iter()
        .filter_map(|op| match serde_json::from_value::<PatchOp>(op.clone()) {
            Ok(op) => Some(op),
            Err(e) => {
                warn!("Ignoring unsupported patch operation {}: {}", op, e);
                None
            }
        })
        .collect())
}

/// Apply operations in order. Operations that do not resolve are skipped.
pub fn apply_patch(doc: &mut Value, ops: &[PatchOp], collection: &FieldPath) -> PatchReport {
    let mut untracked = None;
    apply_patch_tracking(doc, ops, collection, &mut untracked)
}

/// Apply operations in order, rebasing `tracked` through each applied one.
///
/// `tracked` follows its node: sibling insertions and removals shift it,
/// moves carry it along with the moved subtree. It becomes `None` when its
/// node is removed.
pub fn apply_patch_tracking(
    doc: &mut Value,
    ops: &[PatchOp],
    collection: &FieldPath,
    tracked: &mut Option<Path>,
) -> PatchReport {
    let mut report = PatchReport::default();
    for op in ops {
        if apply_one(doc, op, collection) {
            report.applied += 1;
            if let Some(path) = tracked.take() {
                *tracked = rebase(&path, op, doc, collection);
            }
        } else {
            debug!("Skipping unresolvable {} at {}", op.name(), op.path());
            report.skipped += 1;
        }
    }
    report
}

fn apply_one(doc: &mut Value, op: &PatchOp, collection: &FieldPath) -> bool {
    match op {
        PatchOp::Add { path, value } => {
            let pointer = to_pointer(doc, path, collection);
            insert(doc, &pointer, value.clone())
        }
        PatchOp::Remove { path } => {
            let pointer = to_pointer(doc, path, collection);
            !pointer.is_empty() && remove(doc, &pointer).is_some()
        }
        PatchOp::Replace { path, value } => {
            let pointer = to_pointer(doc, path, collection);
            match lookup_mut(doc, &pointer) {
                Some(slot) => {
                    *slot = value.clone();
                    true
                }
                None => false,
            }
        }
        PatchOp::Move { from, path } => {
            if from == path {
                return value_at(doc, from, collection).is_some();
            }
            let source = to_pointer(doc, from, collection);
            if source.is_empty() {
                return false;
            }
            let Some(value) = remove(doc, &source) else {
                return false;
            };
            let target = to_pointer(doc, path, collection);
            if insert(doc, &target, value.clone()) {
                true
            } else {
                // Put the node back where it came from.
                insert(doc, &source, value);
                false
            }
        }
    }
}

fn lookup_mut<'a>(doc: &'a mut Value, pointer: &[Segment]) -> Option<&'a mut Value> {
    pointer.iter().try_fold(doc, |value, segment| match (value, segment) {
        (Value::Array(items), Segment::Index(index)) => items.get_mut(*index),
        (Value::Object(fields), Segment::Key(_) | Segment::Index(_)) => fields.get_mut(&segment.as_key()),
        _ => None,
    })
}

fn insert(doc: &mut Value, pointer: &[Segment], value: Value) -> bool {
    let Some((last, parent)) = pointer.split_last() else {
        *doc = value;
        return true;
    };
    match (lookup_mut(doc, parent), last) {
        (Some(Value::Array(items)), Segment::Index(index)) if *index <= items.len() => {
            items.insert(*index, value);
            true
        }
        (Some(Value::Array(items)), Segment::Append) => {
            items.push(value);
            true
        }
        (Some(Value::Object(fields)), Segment::Key(_) | Segment::Index(_)) => {
            fields.insert(last.as_key(), value);
            true
        }
        _ => false,
    }
}

fn remove(doc: &mut Value, pointer: &[Segment]) -> Option<Value> {
    let (last, parent) = pointer.split_last()?;
    match (lookup_mut(doc, parent)?, last) {
        (Value::Array(items), Segment::Index(index)) if *index < items.len() => Some(items.remove(*index)),
        (Value::Object(fields), Segment::Key(_) | Segment::Index(_)) => fields.remove(&last.as_key()),
        _ => None,
    }
}

/// Replace a trailing `-` with the index of the element it now denotes.
///
/// `from_end` is 1 after an insertion (the appended element is the last one).
fn resolve_append(after: &Value, path: &Path, collection: &FieldPath, from_end: usize) -> Option<Path> {
    if !path.ends_with_append() {
        return Some(path.clone());
    }
    let parent = path.parent()?;
    let pointer = to_pointer(after, &parent, collection);
    let container = pointer.iter().try_fold(after, |value, segment| step_into(value, segment))?;
    let len = match container {
        Value::Array(items) => items.len(),
        _ => return None,
    };
    let index = len.checked_sub(from_end)?;
    Some(path.with_segment(path.len() - 1, Segment::Index(index)))
}

/// Where `path` points after `op` was applied (`after` is the new document)
pub fn rebase(path: &Path, op: &PatchOp, after: &Value, collection: &FieldPath) -> Option<Path> {
    match op {
        PatchOp::Remove { path: removed } => shift_after_remove(path, removed),
        PatchOp::Add { path: added, .. } => {
            let added = resolve_append(after, added, collection, 1)?;
            Some(shift_after_insert(path, &added))
        }
        PatchOp::Replace { .. } => Some(path.clone()),
        PatchOp::Move { from, path: to } => {
            let to = resolve_append(after, to, collection, 1)?;
            if from.is_prefix_of(path) {
                let mut moved = to;
                for segment in &path.segments()[from.len()..] {
                    moved.push(segment.clone());
                }
                return Some(moved);
            }
            let intermediate = shift_after_remove(path, from)?;
            Some(shift_after_insert(&intermediate, &to))
        }
    }
}

fn shift_after_remove(path: &Path, removed: &Path) -> Option<Path> {
    if removed.is_prefix_of(path) {
        return None;
    }
    Some(shift_sibling(path, removed, |index, at| if index > at { index - 1 } else { index }))
}

fn shift_after_insert(path: &Path, inserted: &Path) -> Path {
    shift_sibling(path, inserted, |index, at| if index >= at { index + 1 } else { index })
}

/// Adjust the index `path` holds at `changed`'s depth when both share a collection
fn shift_sibling(path: &Path, changed: &Path, adjust: impl Fn(usize, usize) -> usize) -> Path {
    let (Some(parent), Some(at)) = (changed.parent(), changed.last_index()) else {
        return path.clone();
    };
    let depth = parent.len();
    if path.len() <= depth || !parent.is_prefix_of(path) {
        return path.clone();
    }
    match path.segments()[depth] {
        Segment::Index(index) => path.with_segment(depth, Segment::Index(adjust(index, at))),
        _ => path.clone(),
    }
}
