//! Editor panels
//!
//! Each panel paints one part of the editor and reports what the user did;
//! none of them changes the document directly.

mod footprint;
mod tree;
mod viewport;

pub use footprint::{FootprintPanel, PlotBounds};
pub use tree::{TreeGesture, TreePanel};
pub use viewport::{hex_color, ViewportPanel};
