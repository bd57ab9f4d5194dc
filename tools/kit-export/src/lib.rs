//! kit-export library
//!
//! Converts source art assets (glTF scenes, images, fonts, GLSL shaders)
//! into Kit `.asset` containers. The binary in `main.rs` is a thin command
//! dispatcher over the modules here.

pub mod bake;
pub mod commands;
pub mod convert;
pub mod document;
pub mod font;
pub mod importer;
pub mod material;
pub mod mesh;
pub mod shader;
pub mod spec;
pub mod texture;

pub use document::{Document, IndexFlags, VertexFlags};
pub use importer::{ImportStats, normalize};
pub use spec::{ImportSpec, SpecKind};
