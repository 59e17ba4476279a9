//! Renderer-independent core of the geoxr viewers.
//!
//! This crate holds the pieces of the viewers that carry real logic and can be
//! tested without a GPU or an XR device:
//!
//! - [`manipulation`]: two-handed controller navigation of a user anchor
//! - [`geojson`] and [`projection`]: GeoJSON decoding and conversion to 3D
//!   primitives, with [`extrude`] building polygon meshes
//! - [`model`] and [`bounds`]: model upload, replacement and camera fitting
//! - [`notice`]: messages surfaced to the user
//!
//! # Design principles
//!
//! - **Engine-agnostic**: only `glam` types cross the API; the Bevy client
//!   adapts them to entities and assets
//! - **Synchronous**: every routine is a plain function without I/O, callable
//!   from the frame loop or a background task and from tests with synthetic
//!   inputs
//! - **Tolerant**: malformed features and degenerate controller input are
//!   skipped, never fatal
//!
//! # Example
//!
//! ```
//! use geoxr_core::geojson::parse_document;
//! use geoxr_core::projection::{Primitive, project_collection};
//!
//! let doc = r#"{"features":[{"geometry":{"type":"Point","coordinates":[2,3]}}]}"#;
//! let collection = parse_document(doc).unwrap();
//! let primitives = project_collection(&collection, &mut rand::rng());
//! assert!(matches!(primitives[0], Primitive::Sphere(_)));
//! ```

pub mod bounds;
mod error;
pub mod extrude;
pub mod geojson;
pub mod manipulation;
pub mod model;
pub mod notice;
pub mod projection;

pub use bounds::{Aabb3, CameraFit, FitSettings, Placement};
pub use error::{GeoJsonError, LoadError};
pub use manipulation::{
    ControllerSample, ControllerState, Gesture, Hand, TwoHandedManipulator, UserAnchor,
};
pub use model::{
    ModelFormat, ModelPayload, ModelViewerState, PendingUpload, SceneBackend, TextureSlot,
};
pub use notice::{Notice, Notifications, Severity};
pub use projection::Primitive;
