//! Scene mirror
//!
//! A 3D node tree kept structurally identical to the document. Each
//! [`SceneNode`] carries the transform read from its source node, a mesh slot
//! filled asynchronously through the shared [`MeshCache`], and the outline
//! and axis flags used to show the selection.

use super::mesh_cache::{Lookup, MeshCache, MeshFetch};
use super::trace::TraceGeometry;
use crate::backend::{MeshData, TraceSet};
use crate::config::{EditorConfig, SceneStyle};
use crate::document::addressing::{steps, Step};
use crate::document::{
    apply_patch_tracking, children_of, field, node_from_path, Change, FieldPath, FullRebuild, Hierarchy, Path, PatchOp,
    PatchReport, RenderStrategy,
};
use glam::{EulerRot, Mat4, Vec3};
use log::debug;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

/// Mesh state of a scene node
#[derive(Debug, Clone, PartialEq)]
pub enum MeshSlot {
    /// No geometry, or the server has no mesh for it
    None,
    /// Waiting for the mesh with this key
    Pending(String),
    Ready(Arc<MeshData>),
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Path of the source node
    pub path: Path,
    /// Class of the source node
    pub name: String,
    pub position: Vec3,
    /// Euler angles in degrees
    pub rotation: Vec3,
    pub mesh: MeshSlot,
    pub outline: bool,
    pub axis: bool,
    pub children: Option<Vec<SceneNode>>,
}

impl SceneNode {
    pub fn local_transform(&self) -> Mat4 {
        let rotation = self.rotation * (std::f32::consts::PI / 180.0);
        Mat4::from_translation(self.position) * Mat4::from_euler(EulerRot::XYZ, rotation.x, rotation.y, rotation.z)
    }

    /// Visit this node and its descendants with their world transforms
    pub fn walk<'a>(&'a self, parent: Mat4, visit: &mut dyn FnMut(&'a SceneNode, Mat4)) {
        let world = parent * self.local_transform();
        visit(self, world);
        for child in self.children.iter().flatten() {
            child.walk(world, visit);
        }
    }

    fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut SceneNode)) {
        visit(self);
        for child in self.children.iter_mut().flatten() {
            child.walk_mut(visit);
        }
    }
}

impl Hierarchy for SceneNode {
    fn child_nodes(&self, _collection: &FieldPath) -> Option<&[SceneNode]> {
        self.children.as_deref()
    }
}

/// Where the scene reads things from in a document node
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    pub child_path: FieldPath,
    pub position_path: FieldPath,
    pub rotation_path: FieldPath,
    pub geometry_path: FieldPath,
    pub style: SceneStyle,
}

impl SceneConfig {
    pub fn from_editor(config: &EditorConfig) -> Self {
        Self {
            child_path: config.child_path.clone(),
            position_path: config.position_path.clone(),
            rotation_path: config.rotation_path.clone(),
            geometry_path: config.geometry_path.clone(),
            style: config.scene_style.clone(),
        }
    }
}

/// `{x, y, z}` (missing components are zero)
fn vector(value: Option<&Value>) -> Vec3 {
    let component = |name: &str| {
        value
            .and_then(|v| v.get(name))
            .and_then(Value::as_f64)
            .unwrap_or(0.0) as f32
    };
    Vec3::new(component("x"), component("y"), component("z"))
}

struct MeshSource {
    cache: Rc<RefCell<MeshCache>>,
    fetch: RefCell<Box<dyn MeshFetch>>,
}

impl MeshSource {
    fn slot(&self, geometry: Option<&Value>) -> MeshSlot {
        let Some(spec) = geometry.filter(|spec| spec.get("class").is_some()) else {
            return MeshSlot::None;
        };
        let mut fetch = self.fetch.borrow_mut();
        let (key, lookup) = self.cache.borrow_mut().request(spec, &mut **fetch);
        match lookup {
            Lookup::Ready(Some(mesh)) => MeshSlot::Ready(mesh),
            Lookup::Ready(None) => MeshSlot::None,
            Lookup::Pending => MeshSlot::Pending(key),
        }
    }
}

fn build_node(config: &SceneConfig, meshes: &MeshSource, data: &Value, path: Path) -> SceneNode {
    let children = children_of(data, &config.child_path).map(|items| {
        items
            .iter()
            .enumerate()
            .map(|(index, child)| build_node(config, meshes, child, path.child(&config.child_path, index)))
            .collect()
    });
    SceneNode {
        name: data.get("class").and_then(Value::as_str).unwrap_or_default().to_string(),
        position: vector(field(data, &config.position_path)),
        rotation: vector(field(data, &config.rotation_path)),
        mesh: meshes.slot(field(data, &config.geometry_path)),
        outline: false,
        axis: false,
        children,
        path,
    }
}

pub struct SceneMirror {
    config: SceneConfig,
    data: Value,
    root: SceneNode,
    meshes: MeshSource,
    strategy: Box<dyn RenderStrategy<SceneNode>>,
    selection: Option<Path>,
    trace_set: Option<TraceSet>,
    trace: Option<TraceGeometry>,
    center: Vec3,
    dirty: bool,
}

impl SceneMirror {
    pub fn new(data: Value, config: SceneConfig, cache: Rc<RefCell<MeshCache>>, fetch: Box<dyn MeshFetch>) -> Self {
        let meshes = MeshSource {
            cache,
            fetch: RefCell::new(fetch),
        };
        let root = build_node(&config, &meshes, &data, Path::root());
        Self {
            config,
            data,
            root,
            meshes,
            strategy: Box::new(FullRebuild),
            selection: None,
            trace_set: None,
            trace: None,
            center: Vec3::ZERO,
            dirty: true,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn root(&self) -> &SceneNode {
        &self.root
    }

    fn sync(&mut self, change: Change<'_>) {
        let started = Instant::now();
        let config = &self.config;
        let meshes = &self.meshes;
        let build = |data: &Value| build_node(config, meshes, data, Path::root());
        self.strategy.sync(&build, &self.data, &mut self.root, change);
        self.dirty = true;
        debug!("Scene redraw took {} ms", started.elapsed().as_millis());
    }

    /// Tear down and rebuild from `data`, keeping the selection if its path still resolves
    pub fn set_data(&mut self, data: Value) {
        self.data = data;
        self.sync(Change::Replaced);
        if let Some(path) = self.selection.take() {
            self.select_path(&path);
        }
    }

    /// Apply patches to the mirrored data and redraw
    pub fn update_data(&mut self, patches: &[PatchOp]) -> PatchReport {
        let mut tracked = self.selection.take();
        let report = apply_patch_tracking(&mut self.data, patches, &self.config.child_path, &mut tracked);
        self.sync(Change::Patched(patches));
        if let Some(path) = tracked {
            self.select_path(&path);
        }
        report
    }

    pub fn node(&self, path: &Path) -> Option<&SceneNode> {
        node_from_path(&self.root, path, &self.config.child_path)
    }

    fn node_mut(&mut self, path: &Path) -> Option<&mut SceneNode> {
        steps(path, &self.config.child_path)?
            .into_iter()
            .try_fold(&mut self.root, |node, step| match step {
                Step::Child(index) => node.children.as_mut()?.get_mut(index),
                Step::End => None,
            })
    }

    pub fn selected_path(&self) -> Option<&Path> {
        self.selection.as_ref()
    }

    /// Highlight the node at `path`. Does nothing if the path does not resolve.
    pub fn select_path(&mut self, path: &Path) -> bool {
        if self.node(path).is_none() {
            debug!("Scene has no node at {}", path);
            return false;
        }
        self.clear_selection();
        if let Some(node) = self.node_mut(path) {
            node.outline = true;
            node.axis = true;
        }
        self.selection = Some(path.clone());
        self.dirty = true;
        true
    }

    pub fn clear_selection(&mut self) {
        if let Some(previous) = self.selection.take() {
            if let Some(node) = self.node_mut(&previous) {
                node.outline = false;
                node.axis = false;
            }
            self.dirty = true;
        }
    }

    /// Attach a mesh reply to every node still waiting on `key`
    pub fn resolve_mesh(&mut self, key: &str, mesh: Option<MeshData>) -> usize {
        let entry = self.meshes.cache.borrow_mut().resolve(key, mesh);
        let mut attached = 0;
        self.root.walk_mut(&mut |node| {
            if matches!(&node.mesh, MeshSlot::Pending(pending) if pending == key) {
                node.mesh = match &entry {
                    Some(mesh) => MeshSlot::Ready(Arc::clone(mesh)),
                    None => MeshSlot::None,
                };
                attached += 1;
            }
        });
        if attached > 0 {
            self.dirty = true;
        }
        debug!("Mesh {} attached to {} nodes", key, attached);
        attached
    }

    /// A mesh request failed: stop waiting, allow a later retry
    pub fn abandon_mesh(&mut self, key: &str) {
        self.meshes.cache.borrow_mut().abandon(key);
        self.root.walk_mut(&mut |node| {
            if matches!(&node.mesh, MeshSlot::Pending(pending) if pending == key) {
                node.mesh = MeshSlot::None;
            }
        });
    }

    /// Replace the ray-trace geometry. The scene tree is left alone.
    pub fn draw_trace(&mut self, traces: TraceSet) {
        self.trace = Some(TraceGeometry::from_set(&traces));
        self.trace_set = Some(traces);
        self.dirty = true;
    }

    pub fn trace(&self) -> Option<&TraceGeometry> {
        self.trace.as_ref()
    }

    pub fn trace_set(&self) -> Option<&TraceSet> {
        self.trace_set.as_ref()
    }

    pub fn center(&mut self, position: Vec3) {
        self.center = position;
        self.dirty = true;
    }

    pub fn center_point(&self) -> Vec3 {
        self.center
    }

    pub fn style(&self) -> &SceneStyle {
        &self.config.style
    }

    pub fn set_style(&mut self, style: SceneStyle) {
        if style != self.config.style {
            self.config.style = style;
            self.dirty = true;
        }
    }

    /// Whether something changed since the last call
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// World position of every node, in depth-first order
    pub fn node_origins(&self) -> Vec<(&SceneNode, Vec3)> {
        let mut origins = Vec::new();
        self.root.walk(Mat4::IDENTITY, &mut |node, world| {
            origins.push((node, world.transform_point3(Vec3::ZERO)));
        });
        origins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::mesh_cache::EvictionPolicy;
    use glam::Vec3;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "class": "Optical system",
            "args": {
                "position": {"x": 0, "y": 0, "z": 0},
                "children": [
                    {"class": "Mirror", "args": {
                        "position": {"x": 1, "y": 2, "z": 3},
                        "rotation": {"x": 0, "y": 0, "z": 90},
                        "geometry": {"class": "Plane", "args": {"size": 1}},
                        "children": []
                    }},
                    {"class": "Group", "args": {
                        "position": {"x": 10, "y": 0, "z": 0},
                        "children": [
                            {"class": "Detector", "args": {
                                "position": {"x": 0, "y": 1, "z": 0},
                                "geometry": {"class": "Plane", "args": {"size": 1}}
                            }}
                        ]
                    }}
                ]
            }
        })
    }

    fn scene() -> (SceneMirror, Rc<RefCell<Vec<String>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let recorded = Rc::clone(&calls);
        let fetch = move |key: &str, _: &Value| recorded.borrow_mut().push(key.to_string());
        let cache = Rc::new(RefCell::new(MeshCache::new(EvictionPolicy::Unbounded)));
        let config = SceneConfig::from_editor(&EditorConfig::default());
        (SceneMirror::new(document(), config, cache, Box::new(fetch)), calls)
    }

    fn p(text: &str) -> Path {
        Path::parse(text)
    }

    fn triangle() -> MeshData {
        MeshData {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            faces: vec![[0, 1, 2]],
        }
    }

    #[test]
    fn test_mirror_matches_document() {
        let (scene, _) = scene();
        let mirror = scene.node(&p("/args/children/0")).unwrap();
        assert_eq!(mirror.name, "Mirror");
        assert_eq!(mirror.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(mirror.rotation, Vec3::new(0.0, 0.0, 90.0));
        assert_eq!(mirror.path, p("/args/children/0"));
        let detector = scene.node(&p("/args/children/1/args/children/0")).unwrap();
        assert!(detector.children.is_none());
    }

    #[test]
    fn test_world_origins_compose_transforms() {
        let (scene, _) = scene();
        let origins = scene.node_origins();
        let detector = origins.iter().find(|(node, _)| node.name == "Detector").unwrap();
        assert!((detector.1 - Vec3::new(10.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_identical_geometry_fetched_once() {
        let (mut scene, calls) = scene();
        assert_eq!(calls.borrow().len(), 1);
        let key = calls.borrow()[0].clone();
        assert!(matches!(scene.node(&p("/args/children/0")).unwrap().mesh, MeshSlot::Pending(_)));

        assert_eq!(scene.resolve_mesh(&key, Some(triangle())), 2);
        assert!(matches!(scene.node(&p("/args/children/0")).unwrap().mesh, MeshSlot::Ready(_)));

        // Rebuilding hits the cache.
        scene.set_data(document());
        assert_eq!(calls.borrow().len(), 1);
        assert!(matches!(
            scene.node(&p("/args/children/1/args/children/0")).unwrap().mesh,
            MeshSlot::Ready(_)
        ));
    }

    #[test]
    fn test_stale_mesh_reply_only_touches_waiting_nodes() {
        let (mut scene, calls) = scene();
        let key = calls.borrow()[0].clone();
        scene.set_data(json!({"class": "Empty", "args": {"children": []}}));
        assert_eq!(scene.resolve_mesh(&key, Some(triangle())), 0);
        assert!(scene.meshes.cache.borrow().contains(&key));
    }

    #[test]
    fn test_selection_flags() {
        let (mut scene, _) = scene();
        assert!(scene.select_path(&p("/args/children/0")));
        assert!(scene.node(&p("/args/children/0")).unwrap().outline);
        assert!(scene.select_path(&p("/args/children/1")));
        let previous = scene.node(&p("/args/children/0")).unwrap();
        assert!(!previous.outline && !previous.axis);
        assert!(scene.node(&p("/args/children/1")).unwrap().axis);

        assert!(!scene.select_path(&p("/args/children/7")));
        assert_eq!(scene.selected_path(), Some(&p("/args/children/1")));
        assert!(scene.node(&p("/args/children/1")).unwrap().outline);
    }

    #[test]
    fn test_update_data_follows_selected_node() {
        let (mut scene, _) = scene();
        scene.select_path(&p("/args/children/1"));
        scene.update_data(&[PatchOp::moving(p("/args/children/0"), p("/args/children/0/args/children/-"))]);
        assert_eq!(scene.selected_path(), Some(&p("/args/children/0")));
        let group = scene.node(&p("/args/children/0")).unwrap();
        assert_eq!(group.name, "Group");
        assert!(group.outline);
        assert_eq!(group.children.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_trace_does_not_rebuild_scene() {
        let (mut scene, calls) = scene();
        scene.take_dirty();
        let mut set = TraceSet::default();
        set.sources.insert(
            "s".into(),
            crate::backend::SourceTraces {
                succeeded: vec![vec![Vec3::ZERO, Vec3::X]],
                failed: Vec::new(),
            },
        );
        scene.draw_trace(set);
        assert!(scene.take_dirty());
        assert_eq!(scene.trace().unwrap().segment_count(), 1);
        assert_eq!(calls.borrow().len(), 1);
    }
}
