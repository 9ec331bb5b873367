//! Footprint plot window
//!
//! Scatter plot of where rays hit an element, colored by wavelength.

use crate::backend::{Footprint, FootprintPoint};
use crate::constants;
use crate::document::Path;
use egui::{Color32, Context, Pos2, Rect, Sense, Stroke};

/// Data range shown by the plot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotBounds {
    pub x: (f64, f64),
    pub y: (f64, f64),
    /// Wavelength range, if any sample has one
    pub wavelength: Option<(f64, f64)>,
}

fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None::<(f64, f64)>, |range, v| match range {
        None => Some((v, v)),
        Some((min, max)) => Some((min.min(v), max.max(v))),
    })
}

/// Extend a range by 10% of its width on both sides; a zero width counts as 1
fn padded((min, max): (f64, f64)) -> (f64, f64) {
    let width = if max - min == 0.0 { 1.0 } else { max - min };
    (min - 0.1 * width, max + 0.1 * width)
}

impl PlotBounds {
    /// `None` when there are no samples
    pub fn from_footprint(footprint: &Footprint) -> Option<Self> {
        let points = || footprint.series.iter().flatten();
        let x = range(points().map(|p| p.x))?;
        let y = range(points().map(|p| p.y))?;
        Some(Self {
            x: padded(x),
            y: padded(y),
            wavelength: range(points().filter_map(|p| p.wavelength)),
        })
    }

    /// Position inside `rect`, using its central 90% with y pointing up
    pub fn to_screen(&self, point: &FootprintPoint, rect: Rect) -> Pos2 {
        let fx = ((point.x - self.x.0) / (self.x.1 - self.x.0)) as f32;
        let fy = ((point.y - self.y.0) / (self.y.1 - self.y.0)) as f32;
        let inner = rect.shrink2(rect.size() * 0.05);
        Pos2::new(inner.left() + fx * inner.width(), inner.bottom() - fy * inner.height())
    }

    /// Red through violet to blue across the wavelength range
    pub fn color(&self, point: &FootprintPoint) -> Color32 {
        const STOPS: [Color32; 3] = [Color32::RED, Color32::from_rgb(238, 130, 238), Color32::BLUE];
        let (Some(wavelength), Some((min, max))) = (point.wavelength, self.wavelength) else {
            return STOPS[0];
        };
        let t = if max > min { ((wavelength - min) / (max - min)).clamp(0.0, 1.0) as f32 } else { 0.0 };
        let scaled = t * (STOPS.len() - 1) as f32;
        let index = (scaled.floor() as usize).min(STOPS.len() - 2);
        STOPS[index].lerp_to_gamma(STOPS[index + 1], scaled - index as f32)
    }
}

/// An open footprint window
pub struct FootprintPanel {
    pub path: Path,
    footprint: Footprint,
    bounds: Option<PlotBounds>,
}

impl FootprintPanel {
    pub fn new(path: Path, footprint: Footprint) -> Self {
        let bounds = PlotBounds::from_footprint(&footprint);
        Self { path, footprint, bounds }
    }

    pub fn bounds(&self) -> Option<&PlotBounds> {
        self.bounds.as_ref()
    }

    /// Show the window. Returns false once the user closed it.
    pub fn render(&self, ctx: &Context) -> bool {
        let mut open = true;
        egui::Window::new("Footprint")
            .id(egui::Id::new("footprint_panel"))
            .open(&mut open)
            .default_size(constants::ui::FOOTPRINT_SIZE)
            .resizable(true)
            .collapsible(false)
            .show(ctx, |ui| {
                ui.label(self.path.to_string());
                let size = ui.available_size();
                let (rect, _) = ui.allocate_exact_size(size, Sense::hover());
                let painter = ui.painter_at(rect);
                let frame = Stroke::new(1.0, ui.visuals().weak_text_color());
                painter.rect_stroke(rect, 0.0, frame, egui::StrokeKind::Inside);
                let Some(bounds) = &self.bounds else {
                    painter.text(
                        rect.center(),
                        egui::Align2::CENTER_CENTER,
                        "No samples",
                        egui::FontId::default(),
                        ui.visuals().text_color(),
                    );
                    return;
                };
                for point in self.footprint.series.iter().flatten() {
                    painter.circle_filled(bounds.to_screen(point, rect), 1.0, bounds.color(point));
                }
            });
        open
    }
}
