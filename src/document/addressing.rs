//! Path addressing across the three tree representations
//!
//! The document (`serde_json::Value`), the tree widget's element model and
//! the scene mirror's node graph share one addressing scheme. Each of them
//! implements [`Hierarchy`], and the functions here map paths to node
//! references (and back) for any of them.

use super::path::{FieldPath, Path, Segment};
use serde_json::{Map, Value};

/// How a document value holds its children
#[derive(Debug, Clone, Copy)]
pub enum NodeShape<'a> {
    /// An array is its own child collection
    Sequence(&'a [Value]),
    /// An object finds its children through the collection path
    Keyed(&'a Map<String, Value>),
    /// Scalars have no children
    Leaf,
}

impl<'a> NodeShape<'a> {
    pub fn of(value: &'a Value) -> Self {
        match value {
            Value::Array(items) => NodeShape::Sequence(items),
            Value::Object(fields) => NodeShape::Keyed(fields),
            _ => NodeShape::Leaf,
        }
    }

    /// Child collection of this node, if it has one
    pub fn children(self, collection: &FieldPath) -> Option<&'a [Value]> {
        match self {
            NodeShape::Sequence(items) => Some(items),
            NodeShape::Keyed(fields) => {
                let (first, rest) = collection.keys().split_first()?;
                let mut value = fields.get(first)?;
                for key in rest {
                    value = value.as_object()?.get(key)?;
                }
                value.as_array().map(Vec::as_slice)
            }
            NodeShape::Leaf => None,
        }
    }
}

/// Children of a document node (see [`NodeShape`])
pub fn children_of<'a>(value: &'a Value, collection: &FieldPath) -> Option<&'a [Value]> {
    NodeShape::of(value).children(collection)
}

/// Follow a relative key path (e.g. `args/position`) from a value
pub fn field<'a>(value: &'a Value, fields: &FieldPath) -> Option<&'a Value> {
    fields
        .keys()
        .iter()
        .try_fold(value, |current, key| current.as_object()?.get(key))
}

/// A tree whose nodes can be addressed by [`Path`]
pub trait Hierarchy: Sized {
    fn child_nodes(&self, collection: &FieldPath) -> Option<&[Self]>;
}

impl Hierarchy for Value {
    fn child_nodes(&self, collection: &FieldPath) -> Option<&[Value]> {
        children_of(self, collection)
    }
}

/// One descent step of a tree path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Child(usize),
    End,
}

/// Split a tree path into collection descents.
///
/// Returns `None` when the path does not follow the collection convention
/// (e.g. an attribute pointer such as `/args/position`).
pub fn steps(path: &Path, collection: &FieldPath) -> Option<Vec<Step>> {
    let mut remaining = path.segments();
    let mut steps = Vec::new();
    while !remaining.is_empty() {
        if !collection.matches_prefix(remaining) {
            return None;
        }
        remaining = &remaining[collection.keys().len()..];
        let (step, rest) = remaining.split_first()?;
        steps.push(match step {
            Segment::Index(index) => Step::Child(*index),
            Segment::Append => Step::End,
            Segment::Key(_) => return None,
        });
        remaining = rest;
    }
    Some(steps)
}

/// Node at `path`, or `None` for insertion points and unresolvable paths
pub fn node_from_path<'a, T: Hierarchy>(root: &'a T, path: &Path, collection: &FieldPath) -> Option<&'a T> {
    steps(path, collection)?
        .into_iter()
        .try_fold(root, |node, step| match step {
            Step::Child(index) => node.child_nodes(collection)?.get(index),
            Step::End => None,
        })
}

/// Path of `target` within `root`, found by identity
pub fn path_from_node<T: Hierarchy>(root: &T, target: &T, collection: &FieldPath) -> Option<Path> {
    if std::ptr::eq(root, target) {
        return Some(Path::root());
    }
    let children = root.child_nodes(collection)?;
    children.iter().enumerate().find_map(|(index, child)| {
        let below = path_from_node(child, target, collection)?;
        let mut path = Path::root().child(collection, index);
        for segment in below.segments() {
            path.push(segment.clone());
        }
        Some(path)
    })
}

/// Every node path in depth-first order, root first
pub fn all_paths<T: Hierarchy>(root: &T, collection: &FieldPath) -> Vec<Path> {
    let mut out = Vec::new();
    collect(root, Path::root(), collection, &mut out);
    out
}

fn collect<T: Hierarchy>(node: &T, path: Path, collection: &FieldPath, out: &mut Vec<Path>) {
    out.push(path.clone());
    if let Some(children) = node.child_nodes(collection) {
        for (index, child) in children.iter().enumerate() {
            collect(child, path.child(collection, index), collection, out);
        }
    }
}

/// Rewrite a tree path into a plain JSON pointer.
///
/// Collection segments are dropped wherever the node being walked is a
/// sequence, because an array is its own child collection. Everything else
/// passes through, so attribute pointers are returned unchanged. The walk
/// may run past existing nodes (insertion points); later segments are then
/// copied verbatim.
pub fn to_pointer(root: &Value, path: &Path, collection: &FieldPath) -> Vec<Segment> {
    let segments = path.segments();
    let mut pointer = Vec::with_capacity(segments.len());
    let mut node = Some(root);
    let mut i = 0;
    while i < segments.len() {
        if let Some(Value::Array(_)) = node {
            if !collection.is_empty() && collection.matches_prefix(&segments[i..]) {
                i += collection.keys().len();
                continue;
            }
        }
        let segment = &segments[i];
        node = node.and_then(|value| step_into(value, segment));
        pointer.push(segment.clone());
        i += 1;
    }
    pointer
}

/// Follow one pointer segment
pub fn step_into<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Array(items), Segment::Index(index)) => items.get(*index),
        (Value::Object(fields), Segment::Key(_) | Segment::Index(_)) => fields.get(&segment.as_key()),
        _ => None,
    }
}

/// Value at a (tree or attribute) path
pub fn value_at<'a>(root: &'a Value, path: &Path, collection: &FieldPath) -> Option<&'a Value> {
    to_pointer(root, path, collection)
        .iter()
        .try_fold(root, |value, segment| step_into(value, segment))
}
