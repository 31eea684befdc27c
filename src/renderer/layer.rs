//! One shaded layer of the scene: pre-pass, light shading, main pass and
//! line compositing.

use crate::error::{PipelineError, Result};
use crate::renderer::backend::{
    GpuBackend, ScenePass, ShaderBinder, ShaderBindings, TextureSlot, UniformBlocks,
};
use crate::renderer::light_shading::LightShading;
use crate::renderer::line::{LineInputs, LineRenderer};
use crate::renderer::shadows::ShadowMapSet;
use crate::renderer::targets::RenderTargets;
use crate::scene::{Batch, MaterialShaders, PassName, Scene};

/// Pre-pass clear of the normal/depth buffer: facing the camera at the far
/// plane.
pub const PREPASS_NORMAL_DEPTH_CLEAR: [f32; 4] = [0.0, 0.0, 1.0, 1.0];
/// Line data value meaning "no line here".
pub const LINE_DATA_CLEAR: [f32; 4] = [-1.0, -1.0, -1.0, -1.0];

/// Textures produced by one layer.
pub struct LayerOutput<B: GpuBackend> {
    /// Shaded color with lines composited.
    pub color: B::Texture,
    /// Per-pixel surface IDs of the layer.
    pub id: B::Texture,
    /// Hardware depth of the layer.
    pub depth: B::Texture,
}

/// Anything able to render a layer of `batches` over `background`.
pub trait LayerSource<B: GpuBackend> {
    fn draw_layer(
        &mut self,
        gpu: &mut B,
        batches: &[&Batch<B>],
        scene: &Scene<B>,
        background: [f32; 4],
    ) -> Result<LayerOutput<B>>;
}

pub struct LayerRenderer<'a, B: GpuBackend> {
    pub targets: &'a RenderTargets<B>,
    pub uniforms: UniformBlocks<'a>,
    pub default_shader: &'a MaterialShaders<B>,
    pub shadow_maps: [&'a ShadowMapSet<B>; 2],
    pub light_shading: &'a mut dyn LightShading<B>,
    pub line_renderer: &'a mut dyn LineRenderer<B>,
    pub line_width_max: u32,
}

impl<'a, B: GpuBackend> LayerRenderer<'a, B> {
    fn default_variant(&self, pass: PassName) -> Result<&'a B::Shader> {
        let shaders: &'a MaterialShaders<B> = self.default_shader;
        shaders
            .handle(pass)
            .ok_or_else(|| PipelineError::MissingShaderVariant {
                material: "default".to_owned(),
                pass,
            })
    }
}

impl<'a, B: GpuBackend> LayerSource<B> for LayerRenderer<'a, B> {
    fn draw_layer(
        &mut self,
        gpu: &mut B,
        batches: &[&Batch<B>],
        scene: &Scene<B>,
        background: [f32; 4],
    ) -> Result<LayerOutput<B>> {
        let targets = self.targets;

        // Pre-pass
        let prepass_textures = ShaderBindings::new()
            .with(TextureSlot::InOpaqueDepth, targets.opaque_depth.clone())
            .with(TextureSlot::InTransparentDepth, targets.transparent_depth.clone())
            .with(TextureSlot::InLastId, targets.last_layer_id.clone());
        gpu.clear(
            &targets.prepass,
            &[PREPASS_NORMAL_DEPTH_CLEAR, [0.0; 4]],
            Some(1.0),
            Some(0),
        )?;
        let shadow_binders: [&dyn ShaderBinder<B>; 2] = [self.shadow_maps[0], self.shadow_maps[1]];
        gpu.draw_pass(&ScenePass {
            label: "pre_pass",
            target: &targets.prepass,
            batches,
            pass: PassName::PrePass,
            default_shader: self.default_variant(PassName::PrePass)?,
            uniforms: self.uniforms,
            textures: &prepass_textures,
            binders: &shadow_binders,
        })?;

        // Custom light shading
        self.light_shading.load(gpu, &targets.depth, scene, self.uniforms)?;

        // Main pass
        let main_textures = prepass_textures
            .with(TextureSlot::InNormalDepth, targets.prepass_normal_depth.clone())
            .with(TextureSlot::InId, targets.prepass_id.clone());
        gpu.clear(
            &targets.main,
            &[background, [0.0, 0.0, 0.0, 1.0], LINE_DATA_CLEAR],
            None,
            None,
        )?;
        let main_binders: [&dyn ShaderBinder<B>; 3] = [
            self.shadow_maps[0],
            self.shadow_maps[1],
            self.light_shading.as_binder(),
        ];
        gpu.draw_pass(&ScenePass {
            label: "main_pass",
            target: &targets.main,
            batches,
            pass: PassName::MainPass,
            default_shader: self.default_variant(PassName::MainPass)?,
            uniforms: self.uniforms,
            textures: &main_textures,
            binders: &main_binders,
        })?;

        // Line composite
        let color = self.line_renderer.composite_line(
            gpu,
            self.line_width_max,
            self.uniforms,
            &LineInputs {
                color: &targets.main_color,
                depth: &targets.depth,
                id: &targets.prepass_id,
                line_color: &targets.line_color,
                line_data: &targets.line_data,
            },
        )?;

        log::trace!("Drew layer of {} batches", batches.len());

        Ok(LayerOutput {
            color,
            id: targets.prepass_id.clone(),
            depth: targets.depth.clone(),
        })
    }
}
