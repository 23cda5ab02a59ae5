//! GPU rendering module using wgpu
//!
//! Shadow-mapped forward rendering of the ground plane and the visible
//! model instances.

pub mod context;
pub mod mesh;
pub mod pipelines;
pub mod renderer;

pub use context::GpuContext;
pub use renderer::Renderer;
