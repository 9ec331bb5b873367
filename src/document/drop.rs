//! Drag-and-drop gestures turned into move patches

use super::patch::PatchOp;
use super::path::{Path, Segment};
use log::warn;
use serde::{Deserialize, Serialize};

/// Payload carried on the drag transfer channel: `{"op":"move","from":…}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragPayload {
    pub op: String,
    pub from: Path,
}

impl DragPayload {
    pub fn moving(from: Path) -> Self {
        Self {
            op: "move".to_string(),
            from,
        }
    }

    /// Encode for the transfer channel
    pub fn to_transfer(&self) -> TransferData {
        // A struct of two strings always serializes.
        TransferData(serde_json::to_string(self).unwrap_or_default())
    }

    /// Decode from the transfer channel. Anything but a move is rejected.
    pub fn from_transfer(data: &TransferData) -> Option<Self> {
        match serde_json::from_str::<DragPayload>(&data.0) {
            Ok(payload) if payload.op == "move" => Some(payload),
            Ok(payload) => {
                warn!("Ignoring drag payload with op {:?}", payload.op);
                None
            }
            Err(e) => {
                warn!("Ignoring malformed drag payload: {}", e);
                None
            }
        }
    }

    /// Move patch for dropping this payload on `target`
    pub fn into_patch(self, target: &Path) -> PatchOp {
        let path = normalize_drop(&self.from, target);
        PatchOp::moving(self.from, path)
    }
}

/// Serialized drag payload as it travels through the GUI's drag channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferData(pub String);

/// Correct a drop target for the removal of the dragged node.
///
/// A move removes the source before inserting, so a target computed
/// against the current tree points one slot too far when it sits after the
/// source in the same collection. The target is left alone when the source
/// is deeper than it, when it is an append point at the source's depth, or
/// when the source index is not before the target index at that depth.
pub fn normalize_drop(from: &Path, target: &Path) -> Path {
    let depth = from.len();
    if depth == 0 || depth > target.len() {
        return target.clone();
    }
    if depth == target.len() && target.ends_with_append() {
        return target.clone();
    }
    let (Some(source_index), Segment::Index(target_index)) = (from.last_index(), &target.segments()[depth - 1]) else {
        return target.clone();
    };
    if source_index >= *target_index {
        return target.clone();
    }
    // Only the source's own collection shifts when it is removed.
    if from.segments()[..depth - 1] != target.segments()[..depth - 1] {
        return target.clone();
    }
    target.with_segment(depth - 1, Segment::Index(target_index.saturating_sub(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized(from: &str, target: &str) -> String {
        normalize_drop(&Path::parse(from), &Path::parse(target)).to_string()
    }

    #[test]
    fn test_source_after_destination_is_unchanged() {
        assert_eq!(normalized("/children/2", "/children/0"), "/children/0");
    }

    #[test]
    fn test_source_before_destination_is_corrected() {
        assert_eq!(normalized("/children/0", "/children/2"), "/children/1");
    }

    #[test]
    fn test_append_at_same_depth_is_unchanged() {
        assert_eq!(normalized("/children/0", "/children/-"), "/children/-");
    }

    #[test]
    fn test_deeper_source_is_unchanged() {
        assert_eq!(normalized("/children/1/children/0", "/children/2"), "/children/2");
    }

    #[test]
    fn test_nested_destination_after_source() {
        // A dropped after C (which lives under B): B shifts down once A is gone.
        assert_eq!(normalized("/children/0", "/children/1/children/1"), "/children/0/children/1");
        assert_eq!(normalized("/children/0", "/children/2/children/-"), "/children/1/children/-");
    }

    #[test]
    fn test_other_collection_is_unchanged() {
        assert_eq!(normalized("/children/0/children/1", "/children/1/children/3"), "/children/1/children/3");
    }

    #[test]
    fn test_payload_transfer() {
        let payload = DragPayload::moving(Path::parse("/children/0"));
        let data = payload.to_transfer();
        assert_eq!(data.0, r#"{"op":"move","from":"/children/0"}"#);
        assert_eq!(DragPayload::from_transfer(&data), Some(payload));
        assert_eq!(DragPayload::from_transfer(&TransferData(r#"{"op":"copy","from":"/a"}"#.into())), None);
        assert_eq!(DragPayload::from_transfer(&TransferData("garbage".into())), None);
    }

    #[test]
    fn test_into_patch() {
        let op = DragPayload::moving(Path::parse("/children/0")).into_patch(&Path::parse("/children/2"));
        assert_eq!(op, PatchOp::moving(Path::parse("/children/0"), Path::parse("/children/1")));
    }
}
