//! Frame orchestration of the stylized render pipeline and the GPU seam it
//! drives.

pub mod accumulation;
pub mod backend;
pub mod batches;
pub mod depth;
pub mod gpu;
pub mod layer;
pub mod light_shading;
pub mod lights;
pub mod line;
pub mod pipeline;
pub mod sampling;
pub mod shadows;
pub mod targets;
pub mod transparency;
pub mod uniforms;

pub use accumulation::TemporalAccumulator;
pub use backend::{
    GpuBackend, Resolution, ScenePass, ScreenPass, ShaderBinder, ShaderBindings, ShaderSource,
    TextureFormat, TextureSlot, UniformBlocks,
};
pub use batches::{classify, ClassifiedBatches};
pub use depth::{DepthCompositor, LinearDepthCompositor};
pub use layer::{LayerOutput, LayerRenderer, LayerSource};
pub use light_shading::{CustomLightShading, LightShading};
pub use lights::{LightsBuffer, LightsUniform};
pub use line::{LineInputs, LineRenderer, ScreenLineRenderer};
pub use pipeline::{Collaborators, NprPipeline, RenderOutput};
pub use sampling::Sampler;
pub use shadows::{LightFamily, ShadowCasters, ShadowMapSet, ShadowPassDriver};
pub use targets::RenderTargets;
pub use transparency::TransparencyCompositor;
pub use uniforms::{CommonBuffer, CommonUniforms, MaterialUniform, PassParams};
