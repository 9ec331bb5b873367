//! Tree panel implementation
//!
//! Paints a [`TreeWidget`] into the sidebar and reports the user's gestures
//! (clicks, drag start/end, zone enter/leave, drops). egui is immediate
//! mode, so enter/leave are derived by comparing the hovered drop zone with
//! the one from the previous frame.

use crate::constants;
use crate::document::{Path, TransferData};
use crate::editor::tree_widget::{TreeElement, TreeWidget, ZoneKind};
use egui::{Color32, RichText, ScrollArea, Sense, Ui};
use log::debug;

/// Something the user did in the tree panel
#[derive(Debug, Clone, PartialEq)]
pub enum TreeGesture {
    Click(Path),
    DragStart(Path),
    DragEnter(Path, ZoneKind),
    DragLeave(Path, ZoneKind),
    Drop(Path, ZoneKind, TransferData),
    DragEnd(Path),
}

/// Tree panel renderer for the document hierarchy
pub struct TreePanel {
    /// Zone hovered by a drag in the previous frame
    hovered: Option<(Path, ZoneKind)>,
    /// Row currently being dragged
    dragging: Option<Path>,
}

impl TreePanel {
    pub fn new() -> Self {
        Self {
            hovered: None,
            dragging: None,
        }
    }

    /// Paint the widget and collect this frame's gestures
    pub fn render(&mut self, ui: &mut Ui, widget: &TreeWidget) -> Vec<TreeGesture> {
        let mut gestures = Vec::new();
        let mut hovered = None;

        ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
            self.render_element(ui, widget, widget.root(), &mut gestures, &mut hovered);
        });

        if hovered != self.hovered {
            if let Some((path, kind)) = self.hovered.take() {
                gestures.push(TreeGesture::DragLeave(path, kind));
            }
            if let Some((path, kind)) = hovered.clone() {
                gestures.push(TreeGesture::DragEnter(path, kind));
            }
            self.hovered = hovered;
        }

        // The payload is cleared once the pointer is released, dropped or not.
        if !egui::DragAndDrop::has_any_payload(ui.ctx()) {
            if let Some(path) = self.dragging.take() {
                debug!("Drag of {} ended", path);
                gestures.push(TreeGesture::DragEnd(path));
            }
        }

        gestures
    }

    fn render_element(
        &mut self,
        ui: &mut Ui,
        widget: &TreeWidget,
        element: &TreeElement,
        gestures: &mut Vec<TreeGesture>,
        hovered: &mut Option<(Path, ZoneKind)>,
    ) {
        if !element.path.is_root() {
            Self::render_zone(ui, element, ZoneKind::Before, gestures, hovered);
        }

        let row = if element.path.is_root() {
            ui.scope(|ui| Self::render_row(ui, element))
        } else {
            let id = ui.make_persistent_id(("tree_row", element.path.to_string()));
            let payload = crate::document::DragPayload::moving(element.path.clone()).to_transfer();
            ui.dnd_drag_source(id, payload, |ui| Self::render_row(ui, element))
        };

        if row.inner.clicked() {
            gestures.push(TreeGesture::Click(element.path.clone()));
        }
        if row.response.drag_started() && !element.path.is_root() {
            self.dragging = Some(element.path.clone());
            gestures.push(TreeGesture::DragStart(element.path.clone()));
        }
        // The middle zone is the row itself.
        if row.response.dnd_hover_payload::<TransferData>().is_some() {
            *hovered = Some((element.path.clone(), ZoneKind::Middle));
            if element.zone(ZoneKind::Middle).over {
                ui.painter().rect_stroke(
                    row.response.rect,
                    2.0,
                    egui::Stroke::new(1.0, drop_color(ui)),
                    egui::StrokeKind::Inside,
                );
            }
        }
        if let Some(payload) = row.response.dnd_release_payload::<TransferData>() {
            gestures.push(TreeGesture::Drop(element.path.clone(), ZoneKind::Middle, (*payload).clone()));
        }

        if let Some(children) = &element.children {
            for child in children {
                self.render_element(ui, widget, child, gestures, hovered);
            }
        }

        // Between siblings the next row's before strip takes the same target.
        if element.zone(ZoneKind::After).target.is_some() && is_last_sibling(widget, element) {
            Self::render_zone(ui, element, ZoneKind::After, gestures, hovered);
        }
    }

    fn render_row(ui: &mut Ui, element: &TreeElement) -> egui::Response {
        ui.horizontal(|ui| {
            ui.add_space(element.level as f32 * constants::ui::INDENT);
            let mut text = RichText::new(&element.content.title);
            if element.dragging {
                text = text.weak();
            }
            let response = ui.selectable_label(element.selected, text);
            if let Some(detail) = &element.content.detail {
                ui.label(RichText::new(detail).small().weak());
            }
            response
        })
        .inner
    }

    fn render_zone(
        ui: &mut Ui,
        element: &TreeElement,
        kind: ZoneKind,
        gestures: &mut Vec<TreeGesture>,
        hovered: &mut Option<(Path, ZoneKind)>,
    ) {
        let size = egui::vec2(ui.available_width(), constants::ui::DROP_ZONE_HEIGHT);
        let (rect, response) = ui.allocate_exact_size(size, Sense::hover());

        if response.dnd_hover_payload::<TransferData>().is_some() {
            *hovered = Some((element.path.clone(), kind));
        }
        if element.zone(kind).over {
            let indent = element.level as f32 * constants::ui::INDENT;
            let line = egui::Rect::from_min_max(rect.min + egui::vec2(indent, 0.0), rect.max);
            ui.painter().rect_filled(line, 1.0, drop_color(ui));
        }
        if let Some(payload) = response.dnd_release_payload::<TransferData>() {
            gestures.push(TreeGesture::Drop(element.path.clone(), kind, (*payload).clone()));
        }
    }
}

impl Default for TreePanel {
    fn default() -> Self {
        Self::new()
    }
}

fn drop_color(ui: &Ui) -> Color32 {
    ui.visuals().selection.bg_fill
}

/// Whether nothing follows `element` in its parent's collection
fn is_last_sibling(widget: &TreeWidget, element: &TreeElement) -> bool {
    match element.path.after() {
        Some(next) => widget.element(&next).is_none(),
        None => false,
    }
}
