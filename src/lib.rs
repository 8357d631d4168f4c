// SPDX-License-Identifier: MPL-2.0

//! A small real-time 3D rendering library: a free-fly camera, shader programs with named
//! uniforms, and a model loader.
//!
//! # Coordinate Spaces
//!
//! There are four coordinate spaces: **mesh** space, **world** space, **camera** space, and
//! **clip** space.
//!
//! ## Mesh Space
//!
//! Each mesh has an associated mesh space where the origin is considered the 'center' of the mesh.
//! Meshes are scaled and rotated about this origin.
//!
//! ## World Space
//!
//! Objects are placed in world space by their [`Transform`], whose [model
//! matrix](Transform::model_matrix) scales, rotates and then translates each vertex.
//!
//! ## Camera Space
//!
//! The [`Camera`] may be positioned arbitrarily in world space, but the viewport is fixed. To
//! render the scene as seen through the camera, the [view matrix](Camera::view_matrix) moves the
//! world itself so that the camera sits at the origin looking down -Z.
//!
//! ## Clip Space
//!
//! The [projection matrix](Camera::projection_matrix) maps camera space onto clip space, where
//! everything visible lies within `[-1, 1]` in X and Y and `[0, 1]` in Z. During rasterization,
//! clip space is compressed into a 2D viewport.
//!
//! All spaces are right-handed with +Y up.

pub mod camera;
pub mod config;
pub mod input;
pub mod model;
pub mod renderer;
pub mod shader;
pub mod texture;
pub mod transform;

pub use camera::{Camera, CameraMovement};
pub use config::ViewerConfig;
pub use input::InputState;
pub use model::{Model, Vertex};
pub use renderer::Renderer;
pub use shader::{ShaderProgram, ShaderSource};
pub use texture::GpuTexture;
pub use transform::Transform;
