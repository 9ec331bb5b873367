//! Drag-and-drop tree widget model
//!
//! The widget keeps a retained element tree built from the document. Every
//! element carries its path, the content produced by a caller-supplied
//! [`NodeRenderer`], three drop zones (before / middle / after) and its
//! drag and selection flags. Painting is done by
//! [`TreePanel`](crate::editor::panels::TreePanel); this module only holds
//! state and turns gestures into patches.

use crate::document::addressing::{node_from_path, steps, Step};
use crate::document::{
    apply_patch_tracking, children_of, Change, DragPayload, FieldPath, FullRebuild, Hierarchy, Path, PatchOp,
    PatchReport, RenderStrategy, TransferData,
};
use log::{debug, info};
use serde_json::Value;
use std::time::Instant;

/// Content shown for a node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeContent {
    pub title: String,
    pub detail: Option<String>,
}

/// Produces the content of a tree row
pub trait NodeRenderer {
    fn render(&self, config: &TreeConfig, node: &Value, path: &Path) -> NodeContent;
}

impl<F> NodeRenderer for F
where
    F: Fn(&TreeConfig, &Value, &Path) -> NodeContent,
{
    fn render(&self, config: &TreeConfig, node: &Value, path: &Path) -> NodeContent {
        self(config, node, path)
    }
}

/// Shows a node's `class` (or `name`) as its title
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassRenderer;

impl NodeRenderer for ClassRenderer {
    fn render(&self, _config: &TreeConfig, node: &Value, _path: &Path) -> NodeContent {
        let title = node
            .get("class")
            .or_else(|| node.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string();
        NodeContent { title, detail: None }
    }
}

#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Where nodes keep their children
    pub child_path: FieldPath,
    /// Send drop patches to the owner (`TreeEvent::Changed`) instead of applying them
    pub external_changes: bool,
}

impl TreeConfig {
    pub fn new(child_path: FieldPath) -> Self {
        Self {
            child_path,
            external_changes: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneKind {
    Before,
    Middle,
    After,
}

impl ZoneKind {
    fn slot(self) -> usize {
        match self {
            ZoneKind::Before => 0,
            ZoneKind::Middle => 1,
            ZoneKind::After => 2,
        }
    }
}

/// Region of a row that accepts drops
#[derive(Debug, Clone, PartialEq)]
pub struct DropZone {
    pub kind: ZoneKind,
    /// Where a dropped node goes; `None` if this zone takes no drops
    pub target: Option<Path>,
    /// A drag is hovering this zone
    pub over: bool,
}

/// One row of the tree and its nested rows
#[derive(Debug, Clone)]
pub struct TreeElement {
    pub path: Path,
    pub level: usize,
    pub content: NodeContent,
    pub zones: [DropZone; 3],
    pub dragging: bool,
    pub selected: bool,
    /// `None` when the node has no child collection
    pub children: Option<Vec<TreeElement>>,
}

impl TreeElement {
    pub fn zone(&self, kind: ZoneKind) -> &DropZone {
        &self.zones[kind.slot()]
    }

    fn zone_mut(&mut self, kind: ZoneKind) -> &mut DropZone {
        &mut self.zones[kind.slot()]
    }
}

impl Hierarchy for TreeElement {
    fn child_nodes(&self, _collection: &FieldPath) -> Option<&[TreeElement]> {
        self.children.as_deref()
    }
}

fn build_element(
    config: &TreeConfig,
    renderer: &dyn NodeRenderer,
    data: &Value,
    path: Path,
    level: usize,
) -> TreeElement {
    let collection = &config.child_path;
    let child_data = children_of(data, collection);
    let zones = [
        DropZone {
            kind: ZoneKind::Before,
            target: (!path.is_root()).then(|| path.clone()),
            over: false,
        },
        DropZone {
            kind: ZoneKind::Middle,
            target: child_data.map(|_| path.append_child(collection)),
            over: false,
        },
        DropZone {
            kind: ZoneKind::After,
            target: path.after(),
            over: false,
        },
    ];
    let children = child_data.map(|items| {
        items
            .iter()
            .enumerate()
            .map(|(index, child)| build_element(config, renderer, child, path.child(collection, index), level + 1))
            .collect()
    });
    TreeElement {
        content: renderer.render(config, data, &path),
        path,
        level,
        zones,
        dragging: false,
        selected: false,
        children,
    }
}

/// Notifications for whoever owns the widget
#[derive(Debug, Clone, PartialEq)]
pub enum TreeEvent {
    /// A node was selected by the user
    Selected(Path),
    /// A drop produced a patch for the document owner
    Changed(Vec<PatchOp>),
}

/// What a drop did
#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// The patch went out as `TreeEvent::Changed`
    Emitted(PatchOp),
    /// The patch was applied to the widget's own data
    Applied(PatchOp),
    /// Not a valid target (no target path, or onto the dragged subtree)
    Rejected,
}

pub struct TreeWidget {
    config: TreeConfig,
    data: Value,
    renderer: Box<dyn NodeRenderer>,
    strategy: Box<dyn RenderStrategy<TreeElement>>,
    root: TreeElement,
    selection: Option<Path>,
    events: Vec<TreeEvent>,
}

impl TreeWidget {
    pub fn new(data: Value, config: TreeConfig, renderer: Box<dyn NodeRenderer>) -> Self {
        let root = build_element(&config, renderer.as_ref(), &data, Path::root(), 0);
        Self {
            config,
            data,
            renderer,
            strategy: Box::new(FullRebuild),
            root,
            selection: None,
            events: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn RenderStrategy<TreeElement>>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn root(&self) -> &TreeElement {
        &self.root
    }

    /// Rebuild the element tree from the data
    pub fn create(&mut self) {
        self.sync(Change::Replaced);
    }

    fn sync(&mut self, change: Change<'_>) {
        let started = Instant::now();
        let config = &self.config;
        let renderer = self.renderer.as_ref();
        let build = |data: &Value| build_element(config, renderer, data, Path::root(), 0);
        self.strategy.sync(&build, &self.data, &mut self.root, change);
        debug!("Tree redraw took {} ms", started.elapsed().as_millis());
    }

    /// Replace the data and re-select the previously selected path if it still resolves
    pub fn set_data(&mut self, data: Value) {
        let previous = self.selection.take();
        self.data = data;
        self.sync(Change::Replaced);
        if let Some(path) = previous {
            debug!("Restoring tree selection {}", path);
            self.select(&path, true);
        }
    }

    /// Apply patches to the data, rebuild, and re-select the previous selection
    pub fn update(&mut self, patches: &[PatchOp]) -> PatchReport {
        let mut tracked = self.selection.take();
        let report = apply_patch_tracking(&mut self.data, patches, &self.config.child_path, &mut tracked);
        self.sync(Change::Patched(patches));
        if let Some(path) = tracked {
            self.select(&path, true);
        }
        report
    }

    pub fn selected_path(&self) -> Option<&Path> {
        self.selection.as_ref()
    }

    pub fn selected_node(&self) -> Option<&Value> {
        node_from_path(&self.data, self.selection.as_ref()?, &self.config.child_path)
    }

    /// Select `path` and notify the owner
    pub fn select_path(&mut self, path: &Path) -> bool {
        self.select(path, false)
    }

    /// Select `path` without notifying anyone
    pub fn select_path_silently(&mut self, path: &Path) -> bool {
        self.select(path, true)
    }

    pub fn clear_selection(&mut self) {
        if let Some(old) = self.selection.take() {
            if let Some(element) = self.element_mut(&old) {
                element.selected = false;
            }
        }
    }

    fn select(&mut self, path: &Path, silent: bool) -> bool {
        self.clear_selection();
        if node_from_path(&self.data, path, &self.config.child_path).is_none() {
            debug!("Selection path {} does not resolve", path);
            return false;
        }
        let Some(element) = self.element_mut(path) else {
            return false;
        };
        element.selected = true;
        self.selection = Some(path.clone());
        if !silent {
            self.events.push(TreeEvent::Selected(path.clone()));
        }
        true
    }

    pub fn element(&self, path: &Path) -> Option<&TreeElement> {
        node_from_path(&self.root, path, &self.config.child_path)
    }

    fn element_mut(&mut self, path: &Path) -> Option<&mut TreeElement> {
        steps(path, &self.config.child_path)?
            .into_iter()
            .try_fold(&mut self.root, |element, step| match step {
                Step::Child(index) => element.children.as_mut()?.get_mut(index),
                Step::End => None,
            })
    }

    /// Whether the element at `path`, or any of its ancestors, is being dragged
    pub fn is_dragged(&self, path: &Path) -> bool {
        let Some(steps) = steps(path, &self.config.child_path) else {
            return false;
        };
        let mut element = &self.root;
        if element.dragging {
            return true;
        }
        for step in steps {
            let Step::Child(index) = step else {
                return false;
            };
            match element.children.as_ref().and_then(|children| children.get(index)) {
                Some(child) if child.dragging => return true,
                Some(child) => element = child,
                None => return false,
            }
        }
        false
    }

    /// Start dragging the node at `path`. The root cannot be dragged.
    pub fn drag_start(&mut self, path: &Path) -> Option<TransferData> {
        if path.is_root() {
            return None;
        }
        let element = self.element_mut(path)?;
        element.dragging = true;
        debug!("Drag start {}", path);
        Some(DragPayload::moving(path.clone()).to_transfer())
    }

    pub fn drag_enter(&mut self, element: &Path, kind: ZoneKind) {
        if self.is_dragged(element) {
            return;
        }
        if let Some(zone) = self.element_mut(element).map(|e| e.zone_mut(kind)) {
            if zone.target.is_some() {
                zone.over = true;
            }
        }
    }

    pub fn drag_leave(&mut self, element: &Path, kind: ZoneKind) {
        if self.is_dragged(element) {
            return;
        }
        if let Some(element) = self.element_mut(element) {
            element.zone_mut(kind).over = false;
        }
    }

    /// Drop `data` on a zone of the element at `element`
    pub fn drop(&mut self, element: &Path, kind: ZoneKind, data: &TransferData) -> DropOutcome {
        let dragged = self.is_dragged(element);
        let Some(target_element) = self.element_mut(element) else {
            return DropOutcome::Rejected;
        };
        let zone = target_element.zone_mut(kind);
        zone.over = false;
        let target = zone.target.clone();

        let (Some(target), false, Some(payload)) = (target, dragged, DragPayload::from_transfer(data)) else {
            target_element.dragging = false;
            debug!("Rejected drop on {:?} zone of {}", kind, element);
            return DropOutcome::Rejected;
        };

        let op = payload.into_patch(&target);
        info!("Drop produced {:?}", op);
        if self.config.external_changes {
            self.events.push(TreeEvent::Changed(vec![op.clone()]));
            DropOutcome::Emitted(op)
        } else {
            self.update(std::slice::from_ref(&op));
            DropOutcome::Applied(op)
        }
    }

    /// The drag of the node at `path` finished, dropped or not
    pub fn drag_end(&mut self, path: &Path) {
        if let Some(element) = self.element_mut(path) {
            element.dragging = false;
            for zone in element.zones.iter_mut() {
                zone.over = false;
            }
        }
    }

    /// Take the pending notifications
    pub fn drain_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!([
            {"name": "A", "children": []},
            {"name": "B", "children": [
                {"name": "C", "children": [{"name": "D", "children": []}]}
            ]},
            {"name": "E", "children": []}
        ])
    }

    fn widget(external: bool) -> TreeWidget {
        let mut config = TreeConfig::new(FieldPath::parse("children"));
        config.external_changes = external;
        TreeWidget::new(sample(), config, Box::new(ClassRenderer))
    }

    fn p(text: &str) -> Path {
        Path::parse(text)
    }

    #[test]
    fn test_elements_mirror_data() {
        let tree = widget(false);
        let c = tree.element(&p("/children/1/children/0")).unwrap();
        assert_eq!(c.content.title, "C");
        assert_eq!(c.level, 2);
        assert_eq!(c.zone(ZoneKind::Before).target, Some(p("/children/1/children/0")));
        assert_eq!(c.zone(ZoneKind::Middle).target, Some(p("/children/1/children/0/children/-")));
        assert_eq!(c.zone(ZoneKind::After).target, Some(p("/children/1/children/1")));

        let root = tree.root();
        assert!(root.zone(ZoneKind::Before).target.is_none());
        assert!(root.zone(ZoneKind::After).target.is_none());
        assert_eq!(root.zone(ZoneKind::Middle).target, Some(p("/children/-")));
    }

    #[test]
    fn test_leaf_without_collection_has_no_middle_zone() {
        let config = TreeConfig::new(FieldPath::parse("children"));
        let tree = TreeWidget::new(json!({"name": "root", "children": [{"name": "leaf"}]}), config, Box::new(ClassRenderer));
        let leaf = tree.element(&p("/children/0")).unwrap();
        assert!(leaf.children.is_none());
        assert!(leaf.zone(ZoneKind::Middle).target.is_none());
    }

    #[test]
    fn test_select_path_emits_and_marks() {
        let mut tree = widget(false);
        assert!(tree.select_path(&p("/children/2")));
        assert!(tree.element(&p("/children/2")).unwrap().selected);
        assert!(tree.select_path(&p("/children/0")));
        assert!(!tree.element(&p("/children/2")).unwrap().selected);
        assert_eq!(tree.selected_node().unwrap()["name"], "A");
        assert_eq!(
            tree.drain_events(),
            vec![TreeEvent::Selected(p("/children/2")), TreeEvent::Selected(p("/children/0"))]
        );

        assert!(tree.select_path_silently(&p("/children/1")));
        assert!(tree.drain_events().is_empty());
    }

    #[test]
    fn test_unresolvable_selection_clears() {
        let mut tree = widget(false);
        tree.select_path(&p("/children/1"));
        assert!(!tree.select_path(&p("/children/9")));
        assert!(tree.selected_path().is_none());
        assert!(!tree.element(&p("/children/1")).unwrap().selected);
    }

    #[test]
    fn test_set_data_reselects_by_path() {
        let mut tree = widget(false);
        tree.select_path(&p("/children/0"));
        // Same nodes, different order: A now lives at index 2.
        tree.set_data(json!([
            {"name": "E", "children": []},
            {"name": "B", "children": []},
            {"name": "A", "children": []}
        ]));
        assert_eq!(tree.selected_path(), Some(&p("/children/0")));
        assert_eq!(tree.selected_node().unwrap()["name"], "E");
        assert!(tree.element(&p("/children/0")).unwrap().selected);

        tree.set_data(json!([]));
        assert!(tree.selected_path().is_none());
    }

    #[test]
    fn test_drag_and_drop_after_nested_node() {
        let mut tree = widget(true);
        tree.select_path(&p("/children/1/children/0"));
        tree.drain_events();

        let data = tree.drag_start(&p("/children/0")).unwrap();
        let c = p("/children/1/children/0");
        tree.drag_enter(&c, ZoneKind::After);
        assert!(tree.element(&c).unwrap().zone(ZoneKind::After).over);

        let outcome = tree.drop(&c, ZoneKind::After, &data);
        let expected = PatchOp::moving(p("/children/0"), p("/children/0/children/1"));
        assert_eq!(outcome, DropOutcome::Emitted(expected.clone()));
        assert_eq!(tree.drain_events(), vec![TreeEvent::Changed(vec![expected.clone()])]);
        tree.drag_end(&p("/children/0"));

        tree.update(&[expected]);
        assert_eq!(tree.selected_node().unwrap()["name"], "C");
        assert_eq!(tree.selected_path(), Some(&p("/children/0/children/0")));
        assert_eq!(tree.element(&p("/children/0/children/1")).unwrap().content.title, "A");
    }

    #[test]
    fn test_drop_applies_locally_without_owner() {
        let mut tree = widget(false);
        let data = tree.drag_start(&p("/children/2")).unwrap();
        let outcome = tree.drop(&p("/children/0"), ZoneKind::Before, &data);
        assert_eq!(outcome, DropOutcome::Applied(PatchOp::moving(p("/children/2"), p("/children/0"))));
        assert_eq!(tree.data()[0]["name"], "E");
        assert!(tree.drain_events().is_empty());
    }

    #[test]
    fn test_drop_onto_dragged_subtree_is_rejected() {
        let mut tree = widget(true);
        let data = tree.drag_start(&p("/children/1")).unwrap();
        let d = p("/children/1/children/0/children/0");
        assert!(tree.is_dragged(&d));

        tree.drag_enter(&d, ZoneKind::Middle);
        assert!(!tree.element(&d).unwrap().zone(ZoneKind::Middle).over);
        assert_eq!(tree.drop(&d, ZoneKind::Middle, &data), DropOutcome::Rejected);
        assert_eq!(tree.drop(&p("/children/1"), ZoneKind::After, &data), DropOutcome::Rejected);
        assert!(tree.drain_events().is_empty());
    }

    #[test]
    fn test_root_is_not_draggable() {
        let mut tree = widget(false);
        assert!(tree.drag_start(&Path::root()).is_none());
    }

    #[test]
    fn test_custom_renderer_sees_path() {
        let config = TreeConfig::new(FieldPath::parse("children"));
        let renderer = |_: &TreeConfig, node: &Value, path: &Path| NodeContent {
            title: format!("{}@{}", node["name"].as_str().unwrap_or(""), path),
            detail: None,
        };
        let tree = TreeWidget::new(sample(), config, Box::new(renderer));
        assert_eq!(tree.element(&p("/children/2")).unwrap().content.title, "E@/children/2");
    }
}
