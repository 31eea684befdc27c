use crate::error::Result;
use crate::renderer::backend::{
    GpuBackend, ScreenPass, ShaderBindings, ShaderSource, TextureFormat, TextureSlot, UniformBlocks,
};
use crate::renderer::targets::ScreenOutput;
use crate::renderer::uniforms::PassParams;

/// Main pass buffers an outline compositor reads.
pub struct LineInputs<'a, B: GpuBackend> {
    pub color: &'a B::Texture,
    pub depth: &'a B::Texture,
    pub id: &'a B::Texture,
    pub line_color: &'a B::Texture,
    pub line_data: &'a B::Texture,
}

/// Draws stylized lines over a shaded layer.
pub trait LineRenderer<B: GpuBackend> {
    /// Returns the layer color with lines up to `line_width_max` pixels wide
    /// composited over it.
    fn composite_line(
        &mut self,
        gpu: &mut B,
        line_width_max: u32,
        uniforms: UniformBlocks<'_>,
        inputs: &LineInputs<'_, B>,
    ) -> Result<B::Texture>;
}

pub const LINE_COMPOSITE_LABEL: &str = "line_composite";

/// Screen pass compositor: a pixel takes the line color of the nearest
/// neighbour (within its line width) whose surface ID differs.
pub struct ScreenLineRenderer<B: GpuBackend> {
    shader: B::Shader,
    output: ScreenOutput<B>,
}

impl<B: GpuBackend> ScreenLineRenderer<B> {
    pub fn new(gpu: &mut B) -> Result<Self> {
        let source = ShaderSource::new(
            LINE_COMPOSITE_LABEL,
            include_str!("../shader/line_composite.wgsl"),
        );
        Ok(Self {
            shader: gpu.compile_shader(&source, &["IS_SCREEN_SHADER"])?,
            output: ScreenOutput::new("line_composite", TextureFormat::Rgba32Float),
        })
    }
}

impl<B: GpuBackend> LineRenderer<B> for ScreenLineRenderer<B> {
    fn composite_line(
        &mut self,
        gpu: &mut B,
        line_width_max: u32,
        uniforms: UniformBlocks<'_>,
        inputs: &LineInputs<'_, B>,
    ) -> Result<B::Texture> {
        let resolution = uniforms.common.target_resolution();
        let (texture, target) = self.output.ensure(gpu, resolution)?;

        let textures = ShaderBindings::new()
            .with(TextureSlot::InColor, inputs.color.clone())
            .with(TextureSlot::InDepth, inputs.depth.clone())
            .with(TextureSlot::InId, inputs.id.clone())
            .with(TextureSlot::InLineColor, inputs.line_color.clone())
            .with(TextureSlot::InLineData, inputs.line_data.clone());

        gpu.draw_screen_pass(&ScreenPass {
            label: LINE_COMPOSITE_LABEL,
            shader: &self.shader,
            target,
            uniforms: UniformBlocks {
                params: PassParams::scalar(line_width_max as f32),
                ..uniforms
            },
            textures: &textures,
        })?;

        Ok(texture.clone())
    }
}
