//! Application-wide constants and default values
//!
//! Centralized location for all hard-coded values to improve maintainability

/// Document layout defaults (paths are relative to a node)
pub mod document {
    /// Where a node keeps its child elements
    pub const CHILD_PATH: &str = "args/children";

    /// Position vector of a node (`{x, y, z}`)
    pub const POSITION_PATH: &str = "args/position";

    /// Rotation vector of a node, in degrees
    pub const ROTATION_PATH: &str = "args/rotation";

    /// Geometry specification handed to the mesh service
    pub const GEOMETRY_PATH: &str = "args/geometry";
}

/// Backend service defaults
pub mod backend {
    /// Base URL of the validation and tracing server
    pub const SERVER_URL: &str = "http://localhost:8080";

    /// Number of rays traced after every accepted document
    pub const RAY_COUNT: usize = 1000;

    /// Per-request timeout (seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
}

/// Change batching
pub mod sync {
    /// Window in which document changes are merged into one send (milliseconds)
    pub const DEBOUNCE_MS: u64 = 10;
}

/// Scene styling defaults
pub mod scene {
    /// Front face color of element meshes
    pub const MESH_FRONT_COLOR: u32 = 0x447744;

    /// Back face color of element meshes
    pub const MESH_BACK_COLOR: u32 = 0xAA7744;

    /// Color of the selection outline
    pub const OUTLINE_COLOR: u32 = 0xFFFF88;

    /// Viewport clear color
    pub const BACKGROUND_COLOR: u32 = 0x3F3F3F;

    /// Length of the axis arrows drawn on the selected element
    pub const AXIS_LENGTH: f32 = 1.0;

    /// Half extent and spacing of the ground grid
    pub const GRID_SIZE: i32 = 10;
    pub const GRID_STEP: i32 = 1;
}

/// Camera defaults
pub mod camera {
    /// Distance of the orbit camera from its target
    pub const DISTANCE: f32 = 50.0;

    /// Vertical field of view (degrees)
    pub const FOV_DEGREES: f32 = 20.0;

    /// Initial azimuth and elevation (radians)
    pub const START_THETA: f32 = -std::f32::consts::FRAC_PI_4;
    pub const START_PHI: f32 = std::f32::consts::FRAC_PI_6;

    /// Orbit sensitivity per dragged point
    pub const DRAG_SENSITIVITY: f32 = 0.01;

    /// Pan distance per dragged point, as a fraction of the camera distance
    pub const PAN_SENSITIVITY: f32 = 0.002;

    /// Zoom sensitivity per scrolled point
    pub const SCROLL_SENSITIVITY: f32 = 0.001;

    /// Maximum distance (points) between a click and a node origin for picking
    pub const PICK_RADIUS: f32 = 12.0;
}

/// UI spacing and sizing constants
pub mod ui {
    /// Default width of the tree sidebar
    pub const SIDEBAR_WIDTH: f32 = 300.0;

    /// Height of the before/after drop strips around a tree row
    pub const DROP_ZONE_HEIGHT: f32 = 4.0;

    /// Indentation per tree level
    pub const INDENT: f32 = 14.0;

    /// Default footprint dialog size
    pub const FOOTPRINT_SIZE: [f32; 2] = [300.0, 300.0];
}

/// Main window constants
pub mod window {
    pub const TITLE: &str = "Opticraft";

    pub const INITIAL_SIZE: [f32; 2] = [1280.0, 800.0];
}
