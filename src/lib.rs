//! A stylized (non-photorealistic) render pipeline.
//!
//! [`NprPipeline`] sequences shadow maps, an opaque layer, depth peeled
//! transparency, line compositing, temporal supersampling and depth
//! compositing over any [`GpuBackend`]. [`renderer::gpu::WgpuBackend`] runs
//! it on wgpu.

pub mod error;
pub mod renderer;
pub mod scene;
pub mod settings;

pub use error::{PipelineError, Result};
pub use renderer::{GpuBackend, NprPipeline, RenderOutput, Resolution};
pub use scene::{Batch, Camera, Light, LightKind, Material, MaterialKind, Scene, Transform};
pub use settings::{FrameSettings, PipelineSettings};
