//! Ray-trace line geometry
//!
//! Built from a [`TraceSet`] and kept apart from the scene tree, so a new
//! trace never forces a scene rebuild.

use crate::backend::TraceSet;
use glam::Vec3;

/// Line segments of one source
#[derive(Debug, Clone, PartialEq)]
pub struct TraceLines {
    pub source: String,
    pub succeeded: Vec<[Vec3; 2]>,
    pub failed: Vec<[Vec3; 2]>,
    /// Number of succeeded rays, used to weight translucent drawing
    pub ray_count: usize,
}

impl TraceLines {
    /// Opacity of succeeded rays; fancy mode fades them by ray count
    pub fn opacity(&self, fancy: bool) -> f32 {
        if fancy && self.ray_count > 0 {
            1.0 / (self.ray_count as f32).sqrt()
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceGeometry {
    pub sources: Vec<TraceLines>,
}

/// Points of a ray up to (not including) the first one with a NaN x coordinate
pub fn valid_prefix(points: &[Vec3]) -> &[Vec3] {
    let end = points.iter().position(|point| point.x.is_nan()).unwrap_or(points.len());
    &points[..end]
}

fn segments(rays: &[Vec<Vec3>]) -> Vec<[Vec3; 2]> {
    rays.iter()
        .flat_map(|ray| valid_prefix(ray).windows(2).map(|pair| [pair[0], pair[1]]))
        .collect()
}

impl TraceGeometry {
    pub fn from_set(set: &TraceSet) -> Self {
        let sources = set
            .sources
            .iter()
            .map(|(name, traces)| TraceLines {
                source: name.clone(),
                succeeded: segments(&traces.succeeded),
                failed: segments(&traces.failed),
                ray_count: traces.succeeded.len(),
            })
            .collect();
        Self { sources }
    }

    pub fn segment_count(&self) -> usize {
        self.sources
            .iter()
            .map(|lines| lines.succeeded.len() + lines.failed.len())
            .sum()
    }
}
