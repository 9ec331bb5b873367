//! Viewport panel implementation
//!
//! Paints the scene mirror with the egui painter: ground grid, element
//! meshes, selection outline and axes, and the ray trace. Dragging orbits
//! the camera, right-dragging pans, scrolling zooms, and a click picks the
//! element whose origin is closest to the pointer.

use crate::backend::MeshData;
use crate::constants;
use crate::document::Path;
use crate::viewport::{MeshSlot, OrbitCamera, SceneMirror, SceneNode};
use egui::{Color32, PointerButton, Pos2, Rect, Sense, Shape, Stroke, Ui};
use glam::{Mat4, Vec2, Vec3};

/// `0xRRGGBB` to a color
pub fn hex_color(rgb: u32) -> Color32 {
    Color32::from_rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
}

/// Viewport panel renderer
pub struct ViewportPanel {
    camera: OrbitCamera,
    /// Scene center the camera was last moved to; panning keeps its own target until it changes
    centered_on: Option<Vec3>,
}

/// Screen-space projection for one frame
struct Projector<'a> {
    camera: &'a OrbitCamera,
    rect: Rect,
}

impl Projector<'_> {
    fn project(&self, point: Vec3) -> Option<Pos2> {
        let size = Vec2::new(self.rect.width(), self.rect.height());
        self.camera
            .project(point, size)
            .map(|p| self.rect.min + egui::vec2(p.x, p.y))
    }

    fn line(&self, shapes: &mut Vec<Shape>, from: Vec3, to: Vec3, stroke: Stroke) {
        if let (Some(a), Some(b)) = (self.project(from), self.project(to)) {
            shapes.push(Shape::line_segment([a, b], stroke));
        }
    }
}

impl ViewportPanel {
    pub fn new() -> Self {
        Self {
            camera: OrbitCamera::new(),
            centered_on: None,
        }
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    /// Paint the scene into the remaining space. Returns the path of a picked element.
    pub fn render(&mut self, ui: &mut Ui, scene: &SceneMirror) -> Option<Path> {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());

        let delta = response.drag_delta();
        if response.dragged_by(PointerButton::Primary) {
            self.camera.orbit(Vec2::new(delta.x, delta.y));
        } else if response.dragged_by(PointerButton::Secondary) {
            self.camera.pan(Vec2::new(delta.x, delta.y));
        }
        if response.hovered() {
            let scroll = ui.input(|i| i.smooth_scroll_delta.y);
            if scroll != 0.0 {
                self.camera.zoom(scroll);
            }
        }
        let center = scene.center_point();
        if self.centered_on != Some(center) {
            self.camera.center(center);
            self.centered_on = Some(center);
        }

        let projector = Projector {
            camera: &self.camera,
            rect,
        };
        let mut shapes = vec![Shape::rect_filled(rect, 0.0, hex_color(constants::scene::BACKGROUND_COLOR))];
        grid(&projector, &mut shapes);

        let style = scene.style();
        let front = hex_color(style.mesh_front_color);
        let back = hex_color(style.mesh_back_color);
        scene.root().walk(Mat4::IDENTITY, &mut |node, world| {
            if let MeshSlot::Ready(mesh) = &node.mesh {
                paint_mesh(&projector, &mut shapes, mesh, world, front, back, node.outline);
            } else if let Some(origin) = projector.project(world.transform_point3(Vec3::ZERO)) {
                shapes.push(Shape::circle_filled(origin, 2.0, front));
            }
            if node.axis {
                paint_axis(&projector, &mut shapes, world);
            }
        });

        if let Some(trace) = scene.trace() {
            for lines in &trace.sources {
                let succeeded = Color32::WHITE.gamma_multiply(lines.opacity(style.fancy_trace));
                for [from, to] in &lines.succeeded {
                    projector.line(&mut shapes, *from, *to, Stroke::new(1.0, succeeded));
                }
                for [from, to] in &lines.failed {
                    projector.line(&mut shapes, *from, *to, Stroke::new(1.0, Color32::RED));
                }
            }
        }

        ui.painter_at(rect).extend(shapes);

        if response.clicked() {
            let pointer = response.interact_pointer_pos()?;
            return pick(&projector, scene, pointer);
        }
        None
    }
}

impl Default for ViewportPanel {
    fn default() -> Self {
        Self::new()
    }
}

fn grid(projector: &Projector<'_>, shapes: &mut Vec<Shape>) {
    let size = constants::scene::GRID_SIZE;
    let stroke = Stroke::new(1.0, Color32::from_gray(90));
    let extent = size as f32;
    for i in (-size..=size).step_by(constants::scene::GRID_STEP as usize) {
        let offset = i as f32;
        projector.line(shapes, Vec3::new(offset, -extent, 0.0), Vec3::new(offset, extent, 0.0), stroke);
        projector.line(shapes, Vec3::new(-extent, offset, 0.0), Vec3::new(extent, offset, 0.0), stroke);
    }
}

fn paint_mesh(
    projector: &Projector<'_>,
    shapes: &mut Vec<Shape>,
    mesh: &MeshData,
    world: Mat4,
    front: Color32,
    back: Color32,
    outline: bool,
) {
    let outline_stroke = Stroke::new(1.5, hex_color(constants::scene::OUTLINE_COLOR));
    for triangle in mesh.triangles() {
        let corners: Option<Vec<Pos2>> = triangle
            .iter()
            .map(|corner| projector.project(world.transform_point3(*corner)))
            .collect();
        let Some(corners) = corners else {
            continue;
        };
        // Screen y points down, so counter-clockwise faces have negative area here.
        let area = (corners[1] - corners[0]).x * (corners[2] - corners[0]).y
            - (corners[1] - corners[0]).y * (corners[2] - corners[0]).x;
        let fill = if area < 0.0 { front } else { back };
        let stroke = if outline { outline_stroke } else { Stroke::NONE };
        shapes.push(Shape::convex_polygon(corners, fill, stroke));
    }
}

fn paint_axis(projector: &Projector<'_>, shapes: &mut Vec<Shape>, world: Mat4) {
    let origin = world.transform_point3(Vec3::ZERO);
    let length = constants::scene::AXIS_LENGTH;
    for (axis, color) in [(Vec3::X, Color32::RED), (Vec3::Y, Color32::GREEN), (Vec3::Z, Color32::BLUE)] {
        projector.line(shapes, origin, world.transform_point3(axis * length), Stroke::new(2.0, color));
    }
}

/// Non-root node whose projected origin is closest to `pointer`, within the pick radius
fn pick(projector: &Projector<'_>, scene: &SceneMirror, pointer: Pos2) -> Option<Path> {
    scene
        .node_origins()
        .into_iter()
        .filter(|(node, _)| !node.path.is_root())
        .filter_map(|(node, origin): (&SceneNode, Vec3)| {
            let distance = projector.project(origin)?.distance(pointer);
            (distance <= constants::camera::PICK_RADIUS).then_some((node, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(node, _)| node.path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color(0x447744), Color32::from_rgb(0x44, 0x77, 0x44));
        assert_eq!(hex_color(0xFFFF88), Color32::from_rgb(0xFF, 0xFF, 0x88));
    }
}
