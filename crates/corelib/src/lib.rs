//! Core types: math re-exports, Transform, Camera, engine errors and the
//! handshake event shared by the producer and render threads.

pub use glam::{EulerRot, Mat4, Quat, Vec3, vec3};

pub mod camera;
pub mod error;
pub mod event;
pub mod transform;

pub use camera::Camera;
pub use error::{EngineError, EngineResult, SyncError};
pub use event::{Event, EventState};
pub use transform::Transform;
