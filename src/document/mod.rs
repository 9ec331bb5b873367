//! The edited document and the machinery that keeps its views in sync
//!
//! Path addressing, patch application, drop normalization and render
//! strategies. Nothing in here knows about the GUI.

pub mod addressing;
pub mod drop;
pub mod patch;
pub mod path;
pub mod render;

pub use addressing::{children_of, field, node_from_path, path_from_node, value_at, Hierarchy, NodeShape};
pub use drop::{normalize_drop, DragPayload, TransferData};
pub use patch::{apply_patch, apply_patch_tracking, parse_patch, PatchOp, PatchReport};
pub use path::{FieldPath, Path, Segment};
pub use render::{Change, FullRebuild, RenderStrategy};
