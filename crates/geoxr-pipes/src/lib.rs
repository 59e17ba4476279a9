//! Pipe network to GLB conversion.
//!
//! Reads pipe segments and manholes from CSV files, builds a coloured
//! triangle mesh for each, and writes the whole network as one binary glTF
//! that the model viewer can open.
//!
//! - [`network`]: CSV rows, validation and per-object meshes
//! - [`mesh`]: cylinder and tube generation in survey coordinates
//! - [`color`]: hex colour parsing
//! - [`glb`]: the binary glTF writer
//!
//! Survey coordinates are z-up and can be far from the origin, so geometry is
//! built in `f64` and only narrowed to `f32` relative to the network's own
//! minimum corner when written.

pub mod color;
mod error;
pub mod glb;
pub mod mesh;
pub mod network;

pub use color::Rgba8;
pub use error::PipeError;
pub use mesh::ColoredMesh;
pub use network::{Manhole, Network, Pipe};
