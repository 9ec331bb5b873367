//! Editor session
//!
//! Owns the document and everything that shows or validates it: the tree
//! widget, the scene mirror, the change debouncer and the backend transport.
//! User actions arrive as [`Command`]s, server answers as [`Reply`]s.
//!
//! Every document change bumps the revision. Validation and trace replies
//! carry the revision they were requested at and are dropped once the
//! document has moved on. Mesh replies are content-addressed and always
//! cached; they only attach to nodes that still wait for them.

use crate::backend::{Reply, Request, Transport};
use crate::config::EditorConfig;
use crate::document::{apply_patch, Path, PatchOp};
use crate::editor::commands::Command;
use crate::editor::debounce::ChangeDebouncer;
use crate::editor::panels::FootprintPanel;
use crate::editor::tree_widget::{ClassRenderer, DropOutcome, TreeConfig, TreeEvent, TreeWidget};
use crate::viewport::{MeshCache, SceneConfig, SceneMirror};
use log::{debug, info, warn};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub struct EditorSession {
    config: EditorConfig,
    document: Value,
    revision: u64,
    tree: TreeWidget,
    scene: SceneMirror,
    debouncer: ChangeDebouncer,
    transport: Rc<dyn Transport>,
    footprint: Option<FootprintPanel>,
    /// Last revision the server accepted
    accepted: Option<u64>,
    status: String,
    modified: bool,
}

impl EditorSession {
    pub fn new(
        config: EditorConfig,
        document: Value,
        transport: Rc<dyn Transport>,
        cache: Rc<RefCell<MeshCache>>,
    ) -> Self {
        let mut tree_config = TreeConfig::new(config.child_path.clone());
        tree_config.external_changes = true;
        let tree = TreeWidget::new(document.clone(), tree_config, Box::new(ClassRenderer));

        let mesh_transport = Rc::clone(&transport);
        let fetch = move |key: &str, spec: &Value| {
            mesh_transport.send(Request::Mesh {
                key: key.to_string(),
                spec: spec.clone(),
            })
        };
        let scene = SceneMirror::new(document.clone(), SceneConfig::from_editor(&config), cache, Box::new(fetch));

        Self {
            debouncer: ChangeDebouncer::new(config.debounce_window()),
            config,
            document,
            revision: 0,
            tree,
            scene,
            transport,
            footprint: None,
            accepted: None,
            status: String::new(),
            modified: false,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether the server accepted the current revision
    pub fn is_accepted(&self) -> bool {
        self.accepted == Some(self.revision)
    }

    pub fn tree(&self) -> &TreeWidget {
        &self.tree
    }

    pub fn scene(&self) -> &SceneMirror {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneMirror {
        &mut self.scene
    }

    pub fn footprint(&self) -> Option<&FootprintPanel> {
        self.footprint.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Document changed since the last call (for the file manager)
    pub fn take_modified(&mut self) -> bool {
        std::mem::take(&mut self.modified)
    }

    /// How long until the debouncer wants another tick
    pub fn next_wakeup(&self, now: Instant) -> Option<Duration> {
        self.debouncer.time_until_release(now)
    }

    pub fn dispatch(&mut self, command: Command, now: Instant) {
        debug!("Command {:?}", command);
        match command {
            Command::Select(path) => {
                // An unresolved path clears the tree selection without an event.
                if !self.tree.select_path(&path) {
                    self.sync_scene_selection();
                }
            }
            Command::DragStart(path) => {
                self.tree.drag_start(&path);
            }
            Command::DragEnter(path, zone) => self.tree.drag_enter(&path, zone),
            Command::DragLeave(path, zone) => self.tree.drag_leave(&path, zone),
            Command::Drop { element, zone, data } => {
                if self.tree.drop(&element, zone, &data) == DropOutcome::Rejected {
                    self.status = "Cannot drop there".to_string();
                }
            }
            Command::DragEnd(path) => self.tree.drag_end(&path),
            Command::AddChild => {
                if let Some(path) = self.tree.selected_path() {
                    let op = PatchOp::Add {
                        path: path.append_child(&self.config.child_path),
                        value: self.config.new_child.clone(),
                    };
                    self.apply_change(vec![op], now);
                }
            }
            Command::DeleteSelected => match self.tree.selected_path() {
                Some(path) if !path.is_root() => {
                    let op = PatchOp::Remove { path: path.clone() };
                    self.apply_change(vec![op], now);
                }
                _ => {}
            },
            Command::ShowFootprint => {
                if let Some(path) = self.tree.selected_path() {
                    info!("Requesting footprint of {}", path);
                    self.transport.send(Request::Footprint { path: path.clone() });
                }
            }
            Command::CloseFootprint => self.footprint = None,
            Command::Send => {
                self.debouncer.flush();
                self.send_document();
            }
            Command::Trace => self.request_trace(),
            Command::LoadDocument(document) => self.load_document(document, now),
            Command::FetchDocument => self.transport.send(Request::FetchDocument),
            Command::CenterView(position) => self.scene.center(position),
            Command::SetStyle(style) => self.scene.set_style(style),
        }
        self.process_tree_events(now);
    }

    /// Drain server replies and release debounced changes
    pub fn tick(&mut self, now: Instant) {
        for reply in self.transport.poll() {
            self.handle_reply(reply, now);
        }
        if let Some(patches) = self.debouncer.poll(now) {
            debug!("Releasing {} batched operations", patches.len());
            self.send_document();
        }
        self.process_tree_events(now);
    }

    fn process_tree_events(&mut self, now: Instant) {
        for event in self.tree.drain_events() {
            match event {
                TreeEvent::Selected(path) => {
                    self.scene.select_path(&path);
                }
                TreeEvent::Changed(patches) => self.apply_change(patches, now),
            }
        }
    }

    /// Apply a change to the document and both views, then schedule a send
    fn apply_change(&mut self, patches: Vec<PatchOp>, now: Instant) {
        let report = apply_patch(&mut self.document, &patches, &self.config.child_path);
        if report.applied == 0 {
            debug!("Change had no effect ({} operations skipped)", report.skipped);
            return;
        }
        self.tree.update(&patches);
        self.scene.update_data(&patches);
        self.sync_scene_selection();
        self.revision += 1;
        self.modified = true;
        self.debouncer.push(&patches, now);
    }

    fn sync_scene_selection(&mut self) {
        match self.tree.selected_path() {
            Some(path) => {
                let path = path.clone();
                self.scene.select_path(&path);
            }
            None => self.scene.clear_selection(),
        }
    }

    fn load_document(&mut self, document: Value, now: Instant) {
        info!("Loading new document");
        self.document = document;
        self.revision += 1;
        self.tree.set_data(self.document.clone());
        self.scene.set_data(self.document.clone());
        self.sync_scene_selection();
        self.debouncer.push(&[], now);
    }

    fn send_document(&mut self) {
        info!("Sending document revision {}", self.revision);
        self.transport.send(Request::Document {
            revision: self.revision,
            document: self.document.clone(),
        });
    }

    fn request_trace(&mut self) {
        self.transport.send(Request::Trace {
            revision: self.revision,
            rays: self.config.ray_count,
        });
    }

    fn handle_reply(&mut self, reply: Reply, now: Instant) {
        match reply {
            Reply::Document { revision, .. } | Reply::Trace { revision, .. } if revision != self.revision => {
                debug!("Discarding reply for stale revision {} (now {})", revision, self.revision);
            }
            Reply::Document { result: Ok(patches), .. } if patches.is_empty() => {
                info!("Document revision {} accepted", self.revision);
                self.accepted = Some(self.revision);
                self.status = "Accepted".to_string();
                self.tree.set_data(self.document.clone());
                self.scene.set_data(self.document.clone());
                self.sync_scene_selection();
                self.request_trace();
            }
            Reply::Document { result: Ok(patches), .. } => {
                info!("Server corrected the document with {} operations", patches.len());
                self.status = format!("Corrected ({} operations)", patches.len());
                self.apply_change(patches, now);
            }
            Reply::FetchedDocument(Ok(document)) => self.load_document(document, now),
            Reply::Mesh { key, result: Ok(mesh) } => {
                self.scene.resolve_mesh(&key, mesh);
            }
            Reply::Mesh { key, result: Err(e) } => {
                warn!("Mesh request failed: {}", e);
                self.scene.abandon_mesh(&key);
            }
            Reply::Trace { result: Ok(traces), .. } => {
                if let Some(time) = traces.time {
                    info!("Trace took {:.3} s on the server", time);
                }
                self.scene.draw_trace(traces);
            }
            Reply::Footprint { path, result: Ok(footprint) } => {
                self.footprint = Some(FootprintPanel::new(path, footprint));
            }
            Reply::Document { result: Err(e), .. }
            | Reply::FetchedDocument(Err(e))
            | Reply::Trace { result: Err(e), .. }
            | Reply::Footprint { result: Err(e), .. } => {
                warn!("{}", e);
                self.status = e;
            }
        }
    }

    /// Path of the selected tree node, if any
    pub fn selected_path(&self) -> Option<&Path> {
        self.tree.selected_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MeshData;
    use crate::document::DragPayload;
    use crate::editor::tree_widget::ZoneKind;
    use crate::viewport::{EvictionPolicy, MeshSlot};
    use glam::Vec3;
    use serde_json::json;

    /// Records requests and hands out queued replies
    #[derive(Default)]
    struct RecordingTransport {
        sent: RefCell<Vec<Request>>,
        replies: RefCell<Vec<Reply>>,
    }

    impl RecordingTransport {
        fn reply(&self, reply: Reply) {
            self.replies.borrow_mut().push(reply);
        }

        fn take_sent(&self) -> Vec<Request> {
            std::mem::take(&mut *self.sent.borrow_mut())
        }

        fn documents_sent(&self) -> Vec<u64> {
            self.take_sent()
                .into_iter()
                .filter_map(|request| match request {
                    Request::Document { revision, .. } => Some(revision),
                    _ => None,
                })
                .collect()
        }
    }

    impl Transport for RecordingTransport {
        fn send(&self, request: Request) {
            self.sent.borrow_mut().push(request);
        }

        fn poll(&self) -> Vec<Reply> {
            std::mem::take(&mut *self.replies.borrow_mut())
        }
    }

    fn document() -> Value {
        json!({
            "class": "System",
            "args": {"children": [
                {"class": "Group", "name": "A", "args": {"children": []}},
                {"class": "Group", "name": "B", "args": {"children": [
                    {"class": "Lens", "name": "C", "args": {}}
                ]}}
            ]}
        })
    }

    fn session_with(document: Value) -> (EditorSession, Rc<RecordingTransport>) {
        let transport = Rc::new(RecordingTransport::default());
        let cache = Rc::new(RefCell::new(MeshCache::new(EvictionPolicy::Unbounded)));
        let session = EditorSession::new(
            EditorConfig::default(),
            document,
            Rc::clone(&transport) as Rc<dyn Transport>,
            cache,
        );
        (session, transport)
    }

    fn p(text: &str) -> Path {
        Path::parse(text)
    }

    fn after_window(session: &EditorSession, now: Instant) -> Instant {
        now + session.config().debounce_window() + Duration::from_millis(1)
    }

    #[test]
    fn test_drop_after_nested_node_moves_and_keeps_selection() {
        let (mut session, transport) = session_with(document());
        let now = Instant::now();
        let c = p("/args/children/1/args/children/0");
        session.dispatch(Command::Select(c.clone()), now);
        assert_eq!(session.scene().selected_path(), Some(&c));

        let a = p("/args/children/0");
        session.dispatch(Command::DragStart(a.clone()), now);
        session.dispatch(Command::DragEnter(c.clone(), ZoneKind::After), now);
        let data = DragPayload::moving(a.clone()).to_transfer();
        session.dispatch(
            Command::Drop {
                element: c,
                zone: ZoneKind::After,
                data,
            },
            now,
        );
        session.dispatch(Command::DragEnd(a), now);

        let group = &session.document()["args"]["children"][0];
        assert_eq!(group["name"], "B");
        assert_eq!(group["args"]["children"][0]["name"], "C");
        assert_eq!(group["args"]["children"][1]["name"], "A");
        assert_eq!(session.revision(), 1);

        let moved_c = p("/args/children/0/args/children/0");
        assert_eq!(session.selected_path(), Some(&moved_c));
        assert_eq!(session.scene().selected_path(), Some(&moved_c));
        assert!(session.scene().node(&moved_c).unwrap().outline);

        assert!(transport.documents_sent().is_empty());
        session.tick(after_window(&session, now));
        assert_eq!(transport.documents_sent(), vec![1]);
    }

    #[test]
    fn test_changes_within_window_are_sent_once() {
        let (mut session, transport) = session_with(document());
        let start = Instant::now();
        session.dispatch(Command::Select(p("/args/children/0")), start);
        session.dispatch(Command::AddChild, start);
        let second = start + Duration::from_millis(5);
        session.dispatch(Command::AddChild, second);
        assert_eq!(session.document()["args"]["children"][0]["args"]["children"].as_array().unwrap().len(), 2);

        session.tick(start + session.config().debounce_window() + Duration::from_millis(2));
        assert!(transport.documents_sent().is_empty());

        session.tick(after_window(&session, second));
        assert_eq!(transport.documents_sent(), vec![2]);
        assert!(session.take_modified());
    }

    #[test]
    fn test_accepted_document_triggers_trace() {
        let (mut session, transport) = session_with(document());
        let now = Instant::now();
        session.dispatch(Command::Send, now);
        assert_eq!(transport.documents_sent(), vec![0]);

        transport.reply(Reply::Document {
            revision: 0,
            result: Ok(Vec::new()),
        });
        session.tick(now);
        assert!(session.is_accepted());
        assert_eq!(
            transport.take_sent(),
            vec![Request::Trace {
                revision: 0,
                rays: session.config().ray_count
            }]
        );
    }

    #[test]
    fn test_corrective_patch_is_applied_and_resent() {
        let (mut session, transport) = session_with(document());
        let now = Instant::now();
        session.dispatch(Command::Send, now);
        transport.take_sent();

        transport.reply(Reply::Document {
            revision: 0,
            result: Ok(vec![PatchOp::Replace {
                path: p("/args/children/1/args/children/0/class"),
                value: json!("Mirror"),
            }]),
        });
        session.tick(now);
        assert!(!session.is_accepted());
        assert_eq!(session.revision(), 1);
        assert_eq!(session.document()["args"]["children"][1]["args"]["children"][0]["class"], "Mirror");
        assert_eq!(session.tree().data(), session.document());
        assert_eq!(session.scene().data(), session.document());

        session.tick(after_window(&session, now));
        assert_eq!(transport.documents_sent(), vec![1]);
    }

    #[test]
    fn test_stale_replies_are_discarded() {
        let (mut session, transport) = session_with(document());
        let now = Instant::now();
        session.dispatch(Command::Send, now);
        session.dispatch(Command::Trace, now);
        session.dispatch(Command::Select(p("/args/children/0")), now);
        session.dispatch(Command::DeleteSelected, now);
        assert_eq!(session.revision(), 1);
        transport.take_sent();

        transport.reply(Reply::Document {
            revision: 0,
            result: Ok(Vec::new()),
        });
        transport.reply(Reply::Trace {
            revision: 0,
            result: Ok(Default::default()),
        });
        session.tick(now);
        assert!(!session.is_accepted());
        assert!(session.scene().trace().is_none());
        assert!(transport.take_sent().is_empty());
    }

    #[test]
    fn test_identical_geometry_is_fetched_once() {
        let geometry = json!({"class": "Plane", "args": {"size": 2}});
        let (mut session, transport) = session_with(json!({
            "class": "System",
            "args": {"children": [
                {"class": "Mirror", "args": {"geometry": geometry.clone()}},
                {"class": "Mirror", "args": {"geometry": geometry.clone()}}
            ]}
        }));
        let sent = transport.take_sent();
        assert_eq!(sent.len(), 1);
        let Request::Mesh { key, .. } = &sent[0] else {
            panic!("expected a mesh request, got {:?}", sent[0]);
        };

        transport.reply(Reply::Mesh {
            key: key.clone(),
            result: Ok(Some(MeshData {
                vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                faces: vec![[0, 1, 2]],
            })),
        });
        session.tick(Instant::now());
        for path in ["/args/children/0", "/args/children/1"] {
            assert!(matches!(session.scene().node(&p(path)).unwrap().mesh, MeshSlot::Ready(_)));
        }
        assert!(transport.take_sent().is_empty());
    }

    #[test]
    fn test_unresolved_select_clears_both_views() {
        let (mut session, _) = session_with(document());
        let now = Instant::now();
        let b = p("/args/children/1");
        session.dispatch(Command::Select(b.clone()), now);
        assert!(session.scene().node(&b).unwrap().outline);

        session.dispatch(Command::Select(p("/args/children/7")), now);
        assert_eq!(session.selected_path(), None);
        assert_eq!(session.scene().selected_path(), None);
        assert!(!session.scene().node(&b).unwrap().outline);
    }

    #[test]
    fn test_delete_root_is_ignored() {
        let (mut session, _) = session_with(document());
        let now = Instant::now();
        session.dispatch(Command::Select(Path::root()), now);
        session.dispatch(Command::DeleteSelected, now);
        assert_eq!(session.document(), &document());
        assert_eq!(session.revision(), 0);
    }

    #[test]
    fn test_loaded_document_reselects_by_path() {
        let (mut session, _) = session_with(document());
        let now = Instant::now();
        let b = p("/args/children/1");
        session.dispatch(Command::Select(b.clone()), now);

        let mut replacement = document();
        replacement["args"]["children"][1]["name"] = json!("B2");
        session.dispatch(Command::LoadDocument(replacement), now);
        assert_eq!(session.selected_path(), Some(&b));
        assert_eq!(session.tree().selected_node().unwrap()["name"], "B2");
        assert_eq!(session.scene().selected_path(), Some(&b));
    }
}
