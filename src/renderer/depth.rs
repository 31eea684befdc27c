use crate::error::Result;
use crate::renderer::backend::{
    GpuBackend, ScreenPass, ShaderBindings, ShaderSource, TextureFormat, TextureSlot, UniformBlocks,
};
use crate::renderer::targets::ScreenOutput;

/// Converts the pipeline's hardware depth into the depth a host composites
/// render layers with. Only runs for final renders.
pub trait DepthCompositor<B: GpuBackend> {
    fn composite_depth(
        &mut self,
        gpu: &mut B,
        uniforms: UniformBlocks<'_>,
        depth: &B::Texture,
    ) -> Result<B::Texture>;
}

pub const COMPOSITE_DEPTH_LABEL: &str = "composite_depth";

/// Writes positive linear view depth into an `R32Float` texture. Pixels
/// without geometry keep the far plane distance.
pub struct LinearDepthCompositor<B: GpuBackend> {
    shader: B::Shader,
    output: ScreenOutput<B>,
}

impl<B: GpuBackend> LinearDepthCompositor<B> {
    pub fn new(gpu: &mut B) -> Result<Self> {
        let source = ShaderSource::new(
            COMPOSITE_DEPTH_LABEL,
            include_str!("../shader/composite_depth.wgsl"),
        );
        Ok(Self {
            shader: gpu.compile_shader(&source, &["IS_SCREEN_SHADER"])?,
            output: ScreenOutput::new("composite_depth", TextureFormat::R32Float),
        })
    }
}

impl<B: GpuBackend> DepthCompositor<B> for LinearDepthCompositor<B> {
    fn composite_depth(
        &mut self,
        gpu: &mut B,
        uniforms: UniformBlocks<'_>,
        depth: &B::Texture,
    ) -> Result<B::Texture> {
        let resolution = uniforms.common.target_resolution();
        let (texture, target) = self.output.ensure(gpu, resolution)?;
        let textures = ShaderBindings::new().with(TextureSlot::InDepth, depth.clone());

        gpu.draw_screen_pass(&ScreenPass {
            label: COMPOSITE_DEPTH_LABEL,
            shader: &self.shader,
            target,
            uniforms,
            textures: &textures,
        })?;
        Ok(texture.clone())
    }
}
