//! 3D side of the editor
//!
//! The scene mirror, its mesh cache, the ray-trace geometry and the orbit
//! camera. Painting lives in the viewport panel.

pub mod camera;
pub mod mesh_cache;
pub mod scene;
pub mod trace;

pub use camera::OrbitCamera;
pub use mesh_cache::{mesh_key, CacheStatistics, EvictionPolicy, Lookup, MeshCache, MeshFetch};
pub use scene::{MeshSlot, SceneConfig, SceneMirror, SceneNode};
pub use trace::{TraceGeometry, TraceLines};
