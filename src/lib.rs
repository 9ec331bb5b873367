//! Opticraft library
//!
//! A visual editor for hierarchical optical system descriptions: a tree view
//! and a 3D scene mirror kept in sync through JSON patches, validated and
//! ray traced by a remote server.

pub mod backend;
pub mod config;
pub mod constants;
pub mod document;
pub mod editor;
pub mod viewport;

// Re-export commonly used types
pub use config::{EditorConfig, SceneStyle};
pub use document::{Path, PatchOp};
pub use editor::{EditorApp, EditorSession};
