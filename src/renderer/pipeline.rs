//! Frame orchestration: shadows, the opaque layer, transparency peeling,
//! temporal accumulation and depth compositing.

use crate::error::{PipelineError, Result};
use crate::renderer::accumulation::TemporalAccumulator;
use crate::renderer::backend::{GpuBackend, Resolution, ShaderSource, UniformBlocks};
use crate::renderer::batches::classify;
use crate::renderer::depth::{DepthCompositor, LinearDepthCompositor};
use crate::renderer::layer::{LayerRenderer, LayerSource};
use crate::renderer::light_shading::{CustomLightShading, LightShading};
use crate::renderer::lights::{LightsBuffer, SUN_CASCADES};
use crate::renderer::line::{LineRenderer, ScreenLineRenderer};
use crate::renderer::sampling::Sampler;
use crate::renderer::shadows::{ShadowCasters, ShadowMapSet, ShadowPassDriver};
use crate::renderer::targets::RenderTargets;
use crate::renderer::transparency::{blend_transparency_source, TransparencyCompositor};
use crate::renderer::uniforms::{CommonBuffer, PassParams};
use crate::scene::{compile_material, MaterialKind, MaterialShaders, PassName, Scene};
use crate::settings::{FrameSettings, PipelineSettings};

pub const DEFAULT_MESH_LABEL: &str = "default.mesh";

/// Mesh material used by batches whose material lacks a pass variant.
pub fn default_mesh_source() -> ShaderSource {
    ShaderSource::new(DEFAULT_MESH_LABEL, include_str!("../shader/default.mesh.wgsl"))
}

/// The replaceable stages of a frame.
pub struct Collaborators<B: GpuBackend> {
    pub line_renderer: Box<dyn LineRenderer<B>>,
    pub light_shading: Box<dyn LightShading<B>>,
    pub depth_compositor: Box<dyn DepthCompositor<B>>,
}

impl<B: GpuBackend + 'static> Collaborators<B> {
    pub fn builtin(gpu: &mut B) -> Result<Self> {
        Ok(Self {
            line_renderer: Box::new(ScreenLineRenderer::new(gpu)?),
            light_shading: Box::new(CustomLightShading::new()),
            depth_compositor: Box::new(LinearDepthCompositor::new(gpu)?),
        })
    }
}

pub struct RenderOutput<B: GpuBackend> {
    /// Accumulated color of every sample rendered since the last reset.
    pub color: B::Texture,
    /// Composited depth, only produced for final renders.
    pub depth: Option<B::Texture>,
    /// Index of the sample this frame added.
    pub sample_index: u32,
    /// Number of distinct sample offsets of the current pattern.
    pub samples_total: u32,
}

impl<B: GpuBackend> RenderOutput<B> {
    pub fn is_converged(&self) -> bool {
        self.sample_index + 1 >= self.samples_total
    }
}

pub struct NprPipeline<B: GpuBackend> {
    settings: PipelineSettings,
    default_shader: MaterialShaders<B>,
    blend_transparency_shader: B::Shader,
    collaborators: Collaborators<B>,
    lights: LightsBuffer,
    shadowmaps_opaque: ShadowMapSet<B>,
    shadowmaps_transparent: ShadowMapSet<B>,
    sampler: Sampler,
    targets: Option<RenderTargets<B>>,
    sample_count: u32,
}

impl<B: GpuBackend + 'static> NprPipeline<B> {
    /// A pipeline with the built-in line, light shading and depth stages.
    pub fn with_builtin_collaborators(gpu: &mut B, settings: PipelineSettings) -> Result<Self> {
        let collaborators = Collaborators::builtin(gpu)?;
        Self::new(gpu, settings, collaborators)
    }
}

impl<B: GpuBackend> NprPipeline<B> {
    pub fn new(
        gpu: &mut B,
        settings: PipelineSettings,
        collaborators: Collaborators<B>,
    ) -> Result<Self> {
        let default_shader = compile_material(gpu, MaterialKind::Mesh, &default_mesh_source())?;
        let blend_transparency_shader = gpu.compile_shader(&blend_transparency_source(), &[])?;
        let sampler = Sampler::new(settings.samples_grid_size_preview, settings.samples_width);

        log::info!("Created NPR pipeline");

        Ok(Self {
            settings,
            default_shader,
            blend_transparency_shader,
            collaborators,
            lights: LightsBuffer::new(),
            shadowmaps_opaque: ShadowMapSet::new(ShadowCasters::Opaque),
            shadowmaps_transparent: ShadowMapSet::new(ShadowCasters::Transparent),
            sampler,
            targets: None,
            sample_count: 0,
        })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn lights(&self) -> &LightsBuffer {
        &self.lights
    }

    pub fn render_targets(&self) -> Option<&RenderTargets<B>> {
        self.targets.as_ref()
    }

    /// Renders one sample of `scene` and folds it into the accumulation
    /// buffer. `is_new_frame` signals that camera or scene content changed,
    /// which restarts accumulation; so does a resolution change.
    pub fn render(
        &mut self,
        gpu: &mut B,
        resolution: Resolution,
        scene: &Scene<B>,
        is_final_render: bool,
        is_new_frame: bool,
    ) -> Result<RenderOutput<B>> {
        if resolution.is_empty() {
            return Err(PipelineError::InvalidResolution(resolution));
        }
        let frame = FrameSettings::resolve(scene, &self.settings, is_final_render)?;

        let rebuilt = self
            .targets
            .as_ref()
            .map_or(true, |targets| targets.resolution() != resolution);
        if rebuilt {
            self.targets = Some(RenderTargets::new(gpu, resolution)?);
        }
        let Some(targets) = self.targets.as_ref() else {
            return Err(PipelineError::InvalidResolution(resolution));
        };
        if rebuilt || is_new_frame {
            self.sample_count = 0;
            TemporalAccumulator::<B>::new(&targets.accumulate).clear(gpu)?;
        }

        // Sampling
        self.sampler.configure(frame.sampling_grid_size, frame.samples_width);
        let sample_offset = self.sampler.offset(self.sample_count);

        // Batches
        let batches = classify(&scene.batches);

        // Uniform blocks and shadow maps
        let common = CommonBuffer::load(scene, sample_offset, self.sample_count);
        self.lights.load(scene, SUN_CASCADES, frame.shadow_cascades_distribution_exponent);
        for shadowmaps in [&mut self.shadowmaps_opaque, &mut self.shadowmaps_transparent] {
            shadowmaps.load(
                gpu,
                &self.lights,
                frame.shadowmaps_spot_resolution,
                frame.shadowmaps_sun_resolution,
                frame.shadowmaps_point_resolution,
            )?;
        }

        let default_shadow = self
            .default_shader
            .handle(PassName::ShadowPass)
            .ok_or_else(|| PipelineError::MissingShaderVariant {
                material: DEFAULT_MESH_LABEL.to_owned(),
                pass: PassName::ShadowPass,
            })?;
        ShadowPassDriver {
            common: &common,
            lights: self.lights.uniform(),
            opaque: &batches.opaque,
            transparent: &batches.transparent,
            default_shader: default_shadow,
        }
        .render_all(
            gpu,
            &self.lights,
            &self.shadowmaps_opaque,
            &self.shadowmaps_transparent,
        )?;

        // Scene camera from here on
        let scene_common = common.scene_view(resolution);
        let uniforms = UniformBlocks {
            common: &scene_common,
            lights: self.lights.uniform(),
            params: PassParams::default(),
        };

        let mut layers = LayerRenderer {
            targets,
            uniforms,
            default_shader: &self.default_shader,
            shadow_maps: [&self.shadowmaps_opaque, &self.shadowmaps_transparent],
            light_shading: self.collaborators.light_shading.as_mut(),
            line_renderer: self.collaborators.line_renderer.as_mut(),
            line_width_max: frame.line_width_max,
        };

        let opaque = layers.draw_layer(gpu, &batches.opaque, scene, frame.background_color)?;
        gpu.copy_textures(&targets.opaque, &[&opaque.color], Some(&opaque.depth))?;

        let color = TransparencyCompositor {
            targets,
            blend_shader: &self.blend_transparency_shader,
            uniforms,
        }
        .composite_transparency(
            gpu,
            &mut layers,
            &batches.transparent,
            scene,
            frame.transparency_layers,
        )?;

        // Temporal super-sampling
        TemporalAccumulator::<B>::new(&targets.accumulate).accumulate(
            gpu,
            &color,
            self.sample_count,
        )?;

        let depth = if is_final_render {
            Some(self.collaborators.depth_compositor.composite_depth(
                gpu,
                uniforms,
                &targets.opaque_depth,
            )?)
        } else {
            None
        };

        log::debug!(
            "Rendered sample {}/{} at {} ({} opaque, {} transparent batches, {} layers)",
            self.sample_count + 1,
            self.sampler.len(),
            resolution,
            batches.opaque.len(),
            batches.transparent.len(),
            frame.transparency_layers
        );

        let output = RenderOutput {
            color: targets.color_accumulate.clone(),
            depth,
            sample_index: self.sample_count,
            samples_total: self.sampler.len() as u32,
        };
        self.sample_count += 1;
        Ok(output)
    }
}
