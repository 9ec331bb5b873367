//! Slash-delimited node addresses
//!
//! A [`Path`] routes from the document root to a node or to an insertion
//! point. Tree paths alternate child-collection names with indices, e.g.
//! `/args/children/1/args/children/0`, and may end in the `-` sentinel
//! meaning "after the last element".

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One step of a [`Path`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object field (or child-collection name)
    Key(String),
    /// Position in an ordered collection
    Index(usize),
    /// Insertion point past the last element (`-`)
    Append,
}

impl Segment {
    fn parse(token: &str) -> Self {
        if token == "-" {
            return Segment::Append;
        }
        let canonical = !token.is_empty()
            && token.bytes().all(|b| b.is_ascii_digit())
            && (token.len() == 1 || !token.starts_with('0'));
        if canonical {
            if let Ok(index) = token.parse::<usize>() {
                return Segment::Index(index);
            }
        }
        Segment::Key(token.replace("~1", "/").replace("~0", "~"))
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(index) => Some(*index),
            _ => None,
        }
    }

    /// Object key this segment selects. Indices double as string keys on objects.
    pub fn as_key(&self) -> String {
        match self {
            Segment::Key(key) => key.clone(),
            Segment::Index(index) => index.to_string(),
            Segment::Append => "-".to_string(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "{}", key.replace('~', "~0").replace('/', "~1")),
            Segment::Index(index) => write!(f, "{}", index),
            Segment::Append => write!(f, "-"),
        }
    }
}

/// Address of a node or insertion point
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The document root (zero segments)
    pub fn root() -> Self {
        Self { segments: Vec::new() }
    }

    /// Parse a path. `""` and `"/"` both denote the root.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.strip_prefix('/').unwrap_or(text);
        if trimmed.is_empty() {
            return Self::root();
        }
        Self {
            segments: trimmed.split('/').map(Segment::parse).collect(),
        }
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Index of the final segment, if it is numeric
    pub fn last_index(&self) -> Option<usize> {
        self.last().and_then(Segment::as_index)
    }

    pub fn ends_with_append(&self) -> bool {
        matches!(self.last(), Some(Segment::Append))
    }

    /// Path without its final segment (`None` for the root)
    pub fn parent(&self) -> Option<Path> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn join(&self, segment: Segment) -> Path {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    /// Address of child `index` in the collection reached by `collection`
    pub fn child(&self, collection: &FieldPath, index: usize) -> Path {
        self.collection(collection).join(Segment::Index(index))
    }

    /// Insertion point after the last child of this node
    pub fn append_child(&self, collection: &FieldPath) -> Path {
        self.collection(collection).join(Segment::Append)
    }

    fn collection(&self, collection: &FieldPath) -> Path {
        let mut path = self.clone();
        for key in collection.keys() {
            path.push(Segment::Key(key.clone()));
        }
        path
    }

    /// Slot directly after the node at this path.
    ///
    /// Increments the final index. An append point stays an append point,
    /// since nothing can follow the end of a collection. Paths ending in a
    /// key (and the root) have no following sibling.
    pub fn after(&self) -> Option<Path> {
        match self.last()? {
            Segment::Index(index) => {
                let mut path = self.clone();
                let last = path.segments.len() - 1;
                path.segments[last] = Segment::Index(index + 1);
                Some(path)
            }
            Segment::Append => Some(self.clone()),
            Segment::Key(_) => None,
        }
    }

    /// True when `self` equals `other` or is one of its ancestors
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    pub fn with_segment(&self, position: usize, segment: Segment) -> Path {
        let mut path = self.clone();
        path.segments[position] = segment;
        path
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(text: &str) -> Self {
        Path::parse(text)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Path::parse(&text))
    }
}

/// Relative path of object keys, e.g. `args/children` or `args/position`.
///
/// Used for the child-collection name of a tree and for attribute lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    keys: Vec<String>,
}

impl FieldPath {
    pub fn parse(text: &str) -> Self {
        Self {
            keys: text
                .split('/')
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether `segments` begins with this field path
    pub fn matches_prefix(&self, segments: &[Segment]) -> bool {
        segments.len() >= self.keys.len()
            && self
                .keys
                .iter()
                .zip(segments)
                .all(|(key, segment)| matches!(segment, Segment::Key(k) if k == key))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keys.join("/"))
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(FieldPath::parse(&text))
    }
}
