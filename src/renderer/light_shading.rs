use crate::error::Result;
use crate::renderer::backend::{
    GpuBackend, Resolution, ScreenPass, ShaderBinder, ShaderBindings, TextureFormat, TextureSlot,
    UniformBlocks,
};
use crate::renderer::lights::MAX_LIGHTS;
use crate::renderer::uniforms::PassParams;
use crate::scene::{PassName, Scene};

/// Per-light shading evaluated before the main pass and exposed to
/// `MAIN_PASS` shaders through [`ShaderBinder::apply`].
pub trait LightShading<B: GpuBackend>: ShaderBinder<B> {
    /// Precomputes shading for the layer whose hardware depth is `depth`.
    fn load(
        &mut self,
        gpu: &mut B,
        depth: &B::Texture,
        scene: &Scene<B>,
        uniforms: UniformBlocks<'_>,
    ) -> Result<()>;

    fn as_binder(&self) -> &dyn ShaderBinder<B>;
}

struct ShadingLayers<B: GpuBackend> {
    resolution: Resolution,
    array: B::Texture,
    targets: Vec<B::RenderTarget>,
}

/// Runs each light's custom `SHADER` as a screen pass into its own layer of
/// a texture array bound to [`TextureSlot::InLightShading`]. Layers of
/// lights without a custom shader stay transparent black.
pub struct CustomLightShading<B: GpuBackend> {
    layers: Option<ShadingLayers<B>>,
}

impl<B: GpuBackend> Default for CustomLightShading<B> {
    fn default() -> Self {
        Self { layers: None }
    }
}

impl<B: GpuBackend> CustomLightShading<B> {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_layers(
        &mut self,
        gpu: &mut B,
        resolution: Resolution,
        count: usize,
    ) -> Result<&ShadingLayers<B>> {
        let stale = self.layers.as_ref().map_or(true, |layers| {
            layers.resolution != resolution || layers.targets.len() != count
        });
        if stale {
            let (array, layer_textures) = gpu.create_texture_array(
                "light_shading",
                resolution,
                TextureFormat::Rgba32Float,
                count as u32,
            )?;
            let mut targets = Vec::with_capacity(count);
            for (index, layer) in layer_textures.iter().enumerate() {
                targets.push(gpu.create_render_target(
                    &format!("light_shading{index}"),
                    &[layer],
                    None,
                )?);
            }
            log::debug!("Allocated {} light shading layers at {}", count, resolution);
            self.layers = Some(ShadingLayers {
                resolution,
                array,
                targets,
            });
        }
        match &self.layers {
            Some(layers) => Ok(layers),
            None => Err(crate::error::PipelineError::InvalidResolution(resolution)),
        }
    }
}

impl<B: GpuBackend> ShaderBinder<B> for CustomLightShading<B> {
    fn apply(&self, _shader: &B::Shader, bindings: &mut ShaderBindings<B::Texture>) {
        if let Some(layers) = &self.layers {
            bindings.bind(TextureSlot::InLightShading, layers.array.clone());
        }
    }
}

impl<B: GpuBackend> LightShading<B> for CustomLightShading<B> {
    fn load(
        &mut self,
        gpu: &mut B,
        depth: &B::Texture,
        scene: &Scene<B>,
        uniforms: UniformBlocks<'_>,
    ) -> Result<()> {
        let resolution = uniforms.common.target_resolution();
        let count = scene.lights.len().clamp(1, MAX_LIGHTS);
        let layers = self.ensure_layers(gpu, resolution, count)?;

        let textures = ShaderBindings::new().with(TextureSlot::InDepth, depth.clone());
        for (index, (light, target)) in scene.lights.iter().zip(&layers.targets).enumerate() {
            gpu.clear(target, &[[0.0; 4]], None, None)?;

            let Some(material) = light.shader.as_deref() else {
                continue;
            };
            let shader = material.require_variant(PassName::Shader)?;
            gpu.draw_screen_pass(&ScreenPass {
                label: "light_shading",
                shader,
                target,
                uniforms: UniformBlocks {
                    params: PassParams::scalar(index as f32),
                    ..uniforms
                },
                textures: &textures,
            })?;
        }
        Ok(())
    }

    fn as_binder(&self) -> &dyn ShaderBinder<B> {
        self
    }
}
