//! Shadow map storage and the depth-only passes that fill it.

use crate::error::{PipelineError, Result};
use crate::renderer::backend::{
    GpuBackend, Resolution, ScenePass, ShaderBinder, ShaderBindings, TextureFormat, TextureSlot,
    UniformBlocks,
};
use crate::renderer::lights::{LightsBuffer, LightsUniform, ShadowMatrix};
use crate::renderer::uniforms::{CommonBuffer, PassParams};
use crate::scene::{Batch, PassName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightFamily {
    Spot,
    Sun,
    Point,
}

impl LightFamily {
    pub const ALL: [LightFamily; 3] = [LightFamily::Spot, LightFamily::Sun, LightFamily::Point];

    pub fn name(self) -> &'static str {
        match self {
            LightFamily::Spot => "spot",
            LightFamily::Sun => "sun",
            LightFamily::Point => "point",
        }
    }

    pub fn matrices(self, lights: &LightsBuffer) -> &[ShadowMatrix] {
        match self {
            LightFamily::Spot => &lights.spot_matrices,
            LightFamily::Sun => &lights.sun_matrices,
            LightFamily::Point => &lights.point_matrices,
        }
    }
}

/// Which casters a [`ShadowMapSet`] holds depth for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowCasters {
    Opaque,
    Transparent,
}

impl ShadowCasters {
    pub fn name(self) -> &'static str {
        match self {
            ShadowCasters::Opaque => "opaque",
            ShadowCasters::Transparent => "transparent",
        }
    }

    fn slot(self, family: LightFamily) -> TextureSlot {
        match (self, family) {
            (ShadowCasters::Opaque, LightFamily::Spot) => TextureSlot::ShadowmapsSpotOpaque,
            (ShadowCasters::Opaque, LightFamily::Sun) => TextureSlot::ShadowmapsSunOpaque,
            (ShadowCasters::Opaque, LightFamily::Point) => TextureSlot::ShadowmapsPointOpaque,
            (ShadowCasters::Transparent, LightFamily::Spot) => {
                TextureSlot::ShadowmapsSpotTransparent
            }
            (ShadowCasters::Transparent, LightFamily::Sun) => TextureSlot::ShadowmapsSunTransparent,
            (ShadowCasters::Transparent, LightFamily::Point) => {
                TextureSlot::ShadowmapsPointTransparent
            }
        }
    }
}

struct ShadowArray<B: GpuBackend> {
    resolution: u32,
    layers: usize,
    array: B::Texture,
    targets: Vec<B::RenderTarget>,
}

/// Per-resolution shadow map arrays per light family, one layer per
/// shadow matrix.
pub struct ShadowMapSet<B: GpuBackend> {
    casters: ShadowCasters,
    spot: Option<ShadowArray<B>>,
    sun: Option<ShadowArray<B>>,
    point: Option<ShadowArray<B>>,
}

impl<B: GpuBackend> ShadowMapSet<B> {
    pub fn new(casters: ShadowCasters) -> Self {
        Self {
            casters,
            spot: None,
            sun: None,
            point: None,
        }
    }

    /// Makes sure every family has one cleared layer per matrix at the
    /// requested resolution.
    pub fn load(
        &mut self,
        gpu: &mut B,
        lights: &LightsBuffer,
        spot_resolution: u32,
        sun_resolution: u32,
        point_resolution: u32,
    ) -> Result<()> {
        for (family, resolution) in [
            (LightFamily::Spot, spot_resolution),
            (LightFamily::Sun, sun_resolution),
            (LightFamily::Point, point_resolution),
        ] {
            let layers = family.matrices(lights).len();
            let casters = self.casters;
            let entry = self.family_mut(family);
            let stale = entry
                .as_ref()
                .map_or(true, |array| array.resolution != resolution || array.layers != layers);
            if stale {
                *entry = Some(allocate(gpu, casters, family, resolution, layers)?);
            }
            if let Some(array) = entry.as_ref() {
                for target in &array.targets {
                    gpu.clear(target, &[], Some(1.0), None)?;
                }
            }
        }
        Ok(())
    }

    pub fn targets(&self, family: LightFamily) -> &[B::RenderTarget] {
        match self.family(family) {
            Some(array) => &array.targets,
            None => &[],
        }
    }

    pub fn array(&self, family: LightFamily) -> Option<&B::Texture> {
        self.family(family).as_ref().map(|array| &array.array)
    }

    fn family(&self, family: LightFamily) -> &Option<ShadowArray<B>> {
        match family {
            LightFamily::Spot => &self.spot,
            LightFamily::Sun => &self.sun,
            LightFamily::Point => &self.point,
        }
    }

    fn family_mut(&mut self, family: LightFamily) -> &mut Option<ShadowArray<B>> {
        match family {
            LightFamily::Spot => &mut self.spot,
            LightFamily::Sun => &mut self.sun,
            LightFamily::Point => &mut self.point,
        }
    }
}

fn allocate<B: GpuBackend>(
    gpu: &mut B,
    casters: ShadowCasters,
    family: LightFamily,
    resolution: u32,
    layers: usize,
) -> Result<ShadowArray<B>> {
    let label = format!("{}_{}_shadowmaps", casters.name(), family.name());
    let size = Resolution::square(resolution.max(1));
    // Keep at least one layer so the array can always be bound.
    let (array, layer_textures) = gpu.create_texture_array(
        &label,
        size,
        TextureFormat::Depth32Float,
        layers.max(1) as u32,
    )?;

    let mut targets = Vec::with_capacity(layers);
    for (index, layer) in layer_textures.iter().take(layers).enumerate() {
        targets.push(gpu.create_render_target(&format!("{label}{index}"), &[], Some(layer))?);
    }

    log::info!(
        "Allocated {} {} {} shadow maps at {}",
        layers,
        casters.name(),
        family.name(),
        size
    );

    Ok(ShadowArray {
        resolution,
        layers,
        array,
        targets,
    })
}

impl<B: GpuBackend> ShaderBinder<B> for ShadowMapSet<B> {
    fn apply(&self, _shader: &B::Shader, bindings: &mut ShaderBindings<B::Texture>) {
        for family in LightFamily::ALL {
            if let Some(array) = self.array(family) {
                bindings.bind(self.casters.slot(family), array.clone());
            }
        }
    }
}

/// Draws the opaque and transparent casters into every shadow map of a
/// frame.
pub struct ShadowPassDriver<'a, B: GpuBackend> {
    pub common: &'a CommonBuffer,
    pub lights: &'a LightsUniform,
    pub opaque: &'a [&'a Batch<B>],
    pub transparent: &'a [&'a Batch<B>],
    pub default_shader: &'a B::Shader,
}

impl<'a, B: GpuBackend> ShadowPassDriver<'a, B> {
    /// Renders all three families. Sun cascades are drawn with depth
    /// clamping so casters in front of a cascade are not clipped.
    pub fn render_all(
        &self,
        gpu: &mut B,
        lights: &LightsBuffer,
        opaque_maps: &ShadowMapSet<B>,
        transparent_maps: &ShadowMapSet<B>,
    ) -> Result<()> {
        for family in LightFamily::ALL {
            let matrices = family.matrices(lights);
            let opaque_targets = opaque_maps.targets(family);
            let transparent_targets = transparent_maps.targets(family);

            if family == LightFamily::Sun {
                gpu.set_depth_clamp(true);
                let result = self.render_shadow_passes(
                    gpu,
                    family,
                    matrices,
                    opaque_targets,
                    transparent_targets,
                );
                gpu.set_depth_clamp(false);
                result?;
            } else {
                self.render_shadow_passes(
                    gpu,
                    family,
                    matrices,
                    opaque_targets,
                    transparent_targets,
                )?;
            }
        }
        Ok(())
    }

    /// For each matrix `i`, draws the opaque set into `opaque_targets[i]` and
    /// the transparent set into `transparent_targets[i]` with the
    /// `SHADOW_PASS` variants.
    pub fn render_shadow_passes(
        &self,
        gpu: &mut B,
        family: LightFamily,
        matrices: &[ShadowMatrix],
        opaque_targets: &[B::RenderTarget],
        transparent_targets: &[B::RenderTarget],
    ) -> Result<()> {
        if matrices.len() != opaque_targets.len() || matrices.len() != transparent_targets.len() {
            return Err(PipelineError::ShadowTargetMismatch {
                family: family.name(),
                matrices: matrices.len(),
                opaque: opaque_targets.len(),
                transparent: transparent_targets.len(),
            });
        }

        let textures = ShaderBindings::new();
        for (i, (camera, projection)) in matrices.iter().enumerate() {
            let resolution = gpu.target_resolution(&opaque_targets[i]);
            let common = self.common.view(*camera, *projection, resolution);
            let uniforms = UniformBlocks {
                common: &common,
                lights: self.lights,
                params: PassParams::default(),
            };

            for (target, batches, label) in [
                (&opaque_targets[i], self.opaque, "shadow_opaque"),
                (&transparent_targets[i], self.transparent, "shadow_transparent"),
            ] {
                gpu.draw_pass(&ScenePass {
                    label,
                    target,
                    batches,
                    pass: PassName::ShadowPass,
                    default_shader: self.default_shader,
                    uniforms,
                    textures: &textures,
                    binders: &[],
                })?;
            }
        }

        log::trace!("Rendered {} {} shadow maps", matrices.len(), family.name());
        Ok(())
    }
}
