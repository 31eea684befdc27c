//! Headless wgpu implementation of the pipeline's GPU backend.

mod backend;
mod context;
mod mesh;
mod pipeline_builder;
mod texture;
mod vertex;

pub use backend::{WgpuBackend, WgpuRenderTarget, WgpuShader};
pub use context::GpuContext;
pub use mesh::{MeshData, ObjectUniform, WgpuMesh};
pub use pipeline_builder::PipelineBuilder;
pub use texture::WgpuTexture;
pub use vertex::Vertex;
