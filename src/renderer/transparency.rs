//! Order independent transparency through depth peeling.
//!
//! Each iteration draws the transparent batches again. The pre-pass of a
//! transparent material discards what earlier iterations already peeled
//! (anything nearer than `IN_TRANSPARENT_DEPTH`, or the surface listed in
//! `IN_LAST_ID`), so every iteration yields the next surface away from the
//! camera. Layers are composited under the running result, which is then
//! composited over the opaque layer.

use crate::error::Result;
use crate::renderer::backend::{
    GpuBackend, ScreenPass, ShaderBindings, ShaderSource, TextureSlot, UniformBlocks,
};
use crate::renderer::layer::LayerSource;
use crate::renderer::targets::RenderTargets;
use crate::scene::{Batch, Scene};

pub const BLEND_TRANSPARENCY_LABEL: &str = "blend_transparency";

/// Transparent depth clear. Nothing is peeled yet, so no surface is
/// discarded by the first iteration.
pub const TRANSPARENT_DEPTH_CLEAR: f32 = 0.0;

pub fn blend_transparency_source() -> ShaderSource {
    ShaderSource::new(
        BLEND_TRANSPARENCY_LABEL,
        include_str!("../shader/blend_transparency.wgsl"),
    )
}

pub struct TransparencyCompositor<'a, B: GpuBackend> {
    pub targets: &'a RenderTargets<B>,
    pub blend_shader: &'a B::Shader,
    pub uniforms: UniformBlocks<'a>,
}

impl<'a, B: GpuBackend> TransparencyCompositor<'a, B> {
    /// Peels `layer_count` transparent layers and composites them over the
    /// opaque color already in `targets.opaque_color`. Returns the frame
    /// color before accumulation.
    pub fn composite_transparency(
        &self,
        gpu: &mut B,
        layers: &mut dyn LayerSource<B>,
        batches: &[&Batch<B>],
        scene: &Scene<B>,
        layer_count: u32,
    ) -> Result<B::Texture> {
        let targets = self.targets;
        gpu.clear(
            &targets.transparent,
            &[[0.0; 4]],
            Some(TRANSPARENT_DEPTH_CLEAR),
            None,
        )?;
        gpu.clear(&targets.last_layer, &[[0.0; 4]], None, None)?;

        for layer_index in 0..layer_count {
            let layer = layers.draw_layer(gpu, batches, scene, [0.0; 4])?;
            gpu.copy_textures(&targets.last_layer, &[&layer.id], None)?;

            // The running result holds the nearer layers.
            self.blend(gpu, &layer.color, &targets.transparent_color)?;
            gpu.copy_textures(&targets.transparent, &[&targets.color], Some(&layer.depth))?;

            log::trace!("Peeled transparent layer {}", layer_index);
        }

        self.blend(gpu, &targets.opaque_color, &targets.transparent_color)?;
        Ok(targets.color.clone())
    }

    /// `color = front over back`.
    fn blend(&self, gpu: &mut B, back: &B::Texture, front: &B::Texture) -> Result<()> {
        let textures = ShaderBindings::new()
            .with(TextureSlot::InBack, back.clone())
            .with(TextureSlot::InFront, front.clone());
        gpu.draw_screen_pass(&ScreenPass {
            label: BLEND_TRANSPARENCY_LABEL,
            shader: self.blend_shader,
            target: &self.targets.color_target,
            uniforms: self.uniforms,
            textures: &textures,
        })
    }
}
