//! Editor configuration
//!
//! Loaded from a JSON file (explicit path, or `<config dir>/opticraft/config.json`).
//! Every field has a default, so a partial file only overrides what it names.

use crate::constants;
use crate::document::FieldPath;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Scene appearance settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneStyle {
    /// Draw rays translucent, weighted by ray count
    pub fancy_trace: bool,
    pub mesh_front_color: u32,
    pub mesh_back_color: u32,
}

impl Default for SceneStyle {
    fn default() -> Self {
        Self {
            fancy_trace: false,
            mesh_front_color: constants::scene::MESH_FRONT_COLOR,
            mesh_back_color: constants::scene::MESH_BACK_COLOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub server_url: String,
    pub child_path: FieldPath,
    pub position_path: FieldPath,
    pub rotation_path: FieldPath,
    pub geometry_path: FieldPath,
    pub ray_count: usize,
    pub debounce_ms: u64,
    /// Maximum number of cached meshes; `None` keeps every mesh
    pub mesh_cache_capacity: Option<usize>,
    pub request_timeout_secs: u64,
    pub scene_style: SceneStyle,
    /// Value inserted by "add child"
    pub new_child: Value,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            server_url: constants::backend::SERVER_URL.to_string(),
            child_path: FieldPath::parse(constants::document::CHILD_PATH),
            position_path: FieldPath::parse(constants::document::POSITION_PATH),
            rotation_path: FieldPath::parse(constants::document::ROTATION_PATH),
            geometry_path: FieldPath::parse(constants::document::GEOMETRY_PATH),
            ray_count: constants::backend::RAY_COUNT,
            debounce_ms: constants::sync::DEBOUNCE_MS,
            mesh_cache_capacity: None,
            request_timeout_secs: constants::backend::REQUEST_TIMEOUT_SECS,
            scene_style: SceneStyle::default(),
            new_child: json!({
                "class": "Group",
                "args": {
                    "position": {"x": 0, "y": 0, "z": 0},
                    "rotation": {"x": 0, "y": 0, "z": 0},
                    "children": []
                }
            }),
        }
    }
}

impl EditorConfig {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("opticraft").join("config.json"))
    }

    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config {}: {}", path.display(), e))
    }

    /// Load from `path`, or from the default location if it exists, or fall back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        if let Some(path) = path {
            info!("Loading config from {}", path.display());
            return Self::load_from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                Self::load_from_file(&path)
            }
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
