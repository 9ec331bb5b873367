//! Render strategies shared by the tree widget and the scene mirror
//!
//! Both views keep a retained mirror of the document. How that mirror is
//! brought up to date after a change is decided by a [`RenderStrategy`], so
//! an incremental strategy can replace [`FullRebuild`] without touching the
//! addressing or patch code.

use super::patch::PatchOp;
use serde_json::Value;

/// What happened to the document since the mirror was last synced
#[derive(Debug, Clone, Copy)]
pub enum Change<'a> {
    /// The document was replaced wholesale
    Replaced,
    /// These operations were applied to the previous document
    Patched(&'a [PatchOp]),
}

pub trait RenderStrategy<M> {
    /// Bring `mirror` up to date with `data`. `build` produces a fresh mirror.
    fn sync(&mut self, build: &dyn Fn(&Value) -> M, data: &Value, mirror: &mut M, change: Change<'_>);
}

/// Throw the mirror away and build it again from the data
#[derive(Debug, Default, Clone, Copy)]
pub struct FullRebuild;

impl<M> RenderStrategy<M> for FullRebuild {
    fn sync(&mut self, build: &dyn Fn(&Value) -> M, data: &Value, mirror: &mut M, _change: Change<'_>) {
        *mirror = build(data);
    }
}
