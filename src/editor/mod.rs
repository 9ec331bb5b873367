//! Editor application
//!
//! [`EditorApp`] lays out the toolbar, the tree sidebar, the 3D viewport and
//! the footprint window, and feeds everything the user does to the
//! [`EditorSession`] as commands.

pub mod commands;
pub mod debounce;
pub mod file_manager;
pub mod panels;
pub mod session;
pub mod tree_widget;

pub use commands::Command;
pub use debounce::ChangeDebouncer;
pub use file_manager::FileManager;
pub use panels::{FootprintPanel, TreeGesture, TreePanel, ViewportPanel};
pub use session::EditorSession;
pub use tree_widget::{TreeConfig, TreeElement, TreeEvent, TreeWidget, ZoneKind};

use crate::config::SceneStyle;
use crate::constants;
use eframe::egui;
use glam::Vec3;
use log::error;
use std::time::{Duration, Instant};

/// How often to look for server replies while idle
const REPLY_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn rgb_bytes(rgb: u32) -> [u8; 3] {
    [(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8]
}

fn rgb_value(bytes: [u8; 3]) -> u32 {
    (bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32
}

/// Main application state
pub struct EditorApp {
    session: EditorSession,
    tree_panel: TreePanel,
    viewport_panel: ViewportPanel,
    file_manager: FileManager,
    title: String,
}

impl EditorApp {
    pub fn new(session: EditorSession, file_manager: FileManager) -> Self {
        Self {
            session,
            tree_panel: TreePanel::new(),
            viewport_panel: ViewportPanel::new(),
            file_manager,
            title: String::new(),
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui, commands: &mut Vec<Command>) {
        ui.horizontal(|ui| {
            if ui.button("Open...").clicked() {
                match self.file_manager.open_file_dialog() {
                    Ok(Some(document)) => commands.push(Command::LoadDocument(document)),
                    Ok(None) => {}
                    Err(e) => error!("{}", e),
                }
            }
            if ui.button("Save").clicked() {
                let result = if self.file_manager.current_file_path().is_some() {
                    self.file_manager.save_file(self.session.document())
                } else {
                    self.file_manager.save_as_file_dialog(self.session.document()).map(|_| ())
                };
                if let Err(e) = result {
                    error!("{}", e);
                }
            }
            if ui.button("Save As...").clicked() {
                if let Err(e) = self.file_manager.save_as_file_dialog(self.session.document()) {
                    error!("{}", e);
                }
            }
            if ui.button("Reload from server").clicked() {
                commands.push(Command::FetchDocument);
            }
            ui.separator();

            let selected = self.session.selected_path().cloned();
            if ui.button("Send").clicked() {
                commands.push(Command::Send);
            }
            if ui.add_enabled(selected.is_some(), egui::Button::new("Add child")).clicked() {
                commands.push(Command::AddChild);
            }
            let deletable = selected.as_ref().is_some_and(|path| !path.is_root());
            if ui.add_enabled(deletable, egui::Button::new("Delete")).clicked() {
                commands.push(Command::DeleteSelected);
            }
            if ui.add_enabled(selected.is_some(), egui::Button::new("Footprint")).clicked() {
                commands.push(Command::ShowFootprint);
            }
            if ui.add_enabled(selected.is_some(), egui::Button::new("Center")).clicked() {
                let origin = selected.as_ref().and_then(|path| {
                    self.session
                        .scene()
                        .node_origins()
                        .into_iter()
                        .find(|(node, _)| &node.path == path)
                        .map(|(_, origin)| origin)
                });
                commands.push(Command::CenterView(origin.unwrap_or(Vec3::ZERO)));
            }
            if ui.button("Trace").clicked() {
                commands.push(Command::Trace);
            }
            ui.separator();

            let mut style: SceneStyle = self.session.scene().style().clone();
            let mut changed = ui.checkbox(&mut style.fancy_trace, "Fancy trace").changed();
            let mut front = rgb_bytes(style.mesh_front_color);
            let mut back = rgb_bytes(style.mesh_back_color);
            changed |= ui.color_edit_button_srgb(&mut front).changed();
            changed |= ui.color_edit_button_srgb(&mut back).changed();
            if changed {
                style.mesh_front_color = rgb_value(front);
                style.mesh_back_color = rgb_value(back);
                commands.push(Command::SetStyle(style));
            }
            ui.separator();

            ui.label(format!("rev {}", self.session.revision()));
            ui.label(self.session.status());
        });
    }

    fn update_title(&mut self, ctx: &egui::Context) {
        let title = format!("{} - {}", constants::window::TITLE, self.file_manager.get_file_display_name());
        if title != self.title {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title.clone()));
            self.title = title;
        }
    }
}

impl eframe::App for EditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.session.tick(now);

        let mut commands = Vec::new();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui, &mut commands));

        egui::SidePanel::left("tree_sidebar")
            .default_width(constants::ui::SIDEBAR_WIDTH)
            .resizable(true)
            .show(ctx, |ui| {
                let gestures = self.tree_panel.render(ui, self.session.tree());
                commands.extend(gestures.into_iter().map(Command::from));
            });

        egui::CentralPanel::default().frame(egui::Frame::NONE).show(ctx, |ui| {
            if let Some(path) = self.viewport_panel.render(ui, self.session.scene()) {
                commands.push(Command::Select(path));
            }
        });

        if let Some(footprint) = self.session.footprint() {
            if !footprint.render(ctx) {
                commands.push(Command::CloseFootprint);
            }
        }

        for command in commands {
            self.session.dispatch(command, now);
        }
        if self.session.take_modified() {
            self.file_manager.mark_modified();
        }
        self.update_title(ctx);

        if self.session.scene_mut().take_dirty() {
            ctx.request_repaint();
        }
        let wait = self
            .session
            .next_wakeup(now)
            .map_or(REPLY_POLL_INTERVAL, |wait| wait.min(REPLY_POLL_INTERVAL));
        ctx.request_repaint_after(wait);
    }
}
