//! Commands handled by the editor session
//!
//! Everything the user can do (tree gestures, scene picks, toolbar buttons)
//! reaches the session as a [`Command`].

use crate::config::SceneStyle;
use crate::document::{Path, TransferData};
use crate::editor::panels::TreeGesture;
use crate::editor::tree_widget::ZoneKind;
use glam::Vec3;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Select a node (tree click or scene pick)
    Select(Path),
    DragStart(Path),
    DragEnter(Path, ZoneKind),
    DragLeave(Path, ZoneKind),
    /// Drop a payload on a zone of the row at `element`
    Drop {
        element: Path,
        zone: ZoneKind,
        data: TransferData,
    },
    DragEnd(Path),
    /// Append the new-child template to the selected node
    AddChild,
    DeleteSelected,
    ShowFootprint,
    CloseFootprint,
    /// Send the document now instead of waiting for the debounce window
    Send,
    Trace,
    /// Replace the whole document (file open, server fetch)
    LoadDocument(Value),
    FetchDocument,
    CenterView(Vec3),
    SetStyle(SceneStyle),
}

impl From<TreeGesture> for Command {
    fn from(gesture: TreeGesture) -> Self {
        match gesture {
            TreeGesture::Click(path) => Command::Select(path),
            TreeGesture::DragStart(path) => Command::DragStart(path),
            TreeGesture::DragEnter(path, zone) => Command::DragEnter(path, zone),
            TreeGesture::DragLeave(path, zone) => Command::DragLeave(path, zone),
            TreeGesture::Drop(element, zone, data) => Command::Drop { element, zone, data },
            TreeGesture::DragEnd(path) => Command::DragEnd(path),
        }
    }
}
