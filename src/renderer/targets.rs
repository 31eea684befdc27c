use crate::error::{PipelineError, Result};
use crate::renderer::backend::{GpuBackend, Resolution, TextureFormat};

/// Every frame-resolution texture and render target the pipeline uses.
///
/// Created once per resolution. `depth` is shared by the pre-pass and the
/// main pass so the main pass only shades the surfaces the pre-pass kept.
pub struct RenderTargets<B: GpuBackend> {
    resolution: Resolution,

    pub depth: B::Texture,

    pub prepass_normal_depth: B::Texture,
    pub prepass_id: B::Texture,
    pub prepass: B::RenderTarget,

    pub last_layer_id: B::Texture,
    pub last_layer: B::RenderTarget,

    pub main_color: B::Texture,
    pub line_color: B::Texture,
    pub line_data: B::Texture,
    pub main: B::RenderTarget,

    pub opaque_color: B::Texture,
    pub opaque_depth: B::Texture,
    pub opaque: B::RenderTarget,

    pub transparent_color: B::Texture,
    pub transparent_depth: B::Texture,
    pub transparent: B::RenderTarget,

    pub color: B::Texture,
    pub color_target: B::RenderTarget,

    pub color_accumulate: B::Texture,
    pub accumulate: B::RenderTarget,
}

impl<B: GpuBackend> RenderTargets<B> {
    pub fn new(gpu: &mut B, resolution: Resolution) -> Result<Self> {
        if resolution.is_empty() {
            return Err(PipelineError::InvalidResolution(resolution));
        }

        use TextureFormat::{Depth32Float, R32Float, Rgba32Float};
        let mut texture = |label: &str, format| gpu.create_texture(label, resolution, format);

        let depth = texture("depth", Depth32Float)?;
        let prepass_normal_depth = texture("prepass_normal_depth", Rgba32Float)?;
        let prepass_id = texture("prepass_id", R32Float)?;
        let last_layer_id = texture("last_layer_id", R32Float)?;
        let main_color = texture("main_color", Rgba32Float)?;
        let line_color = texture("line_color", Rgba32Float)?;
        let line_data = texture("line_data", Rgba32Float)?;
        let opaque_color = texture("opaque_color", Rgba32Float)?;
        let opaque_depth = texture("opaque_depth", Depth32Float)?;
        let transparent_color = texture("transparent_color", Rgba32Float)?;
        let transparent_depth = texture("transparent_depth", Depth32Float)?;
        let color = texture("color", Rgba32Float)?;
        let color_accumulate = texture("color_accumulate", Rgba32Float)?;

        let prepass =
            gpu.create_render_target("prepass", &[&prepass_normal_depth, &prepass_id], Some(&depth))?;
        let last_layer = gpu.create_render_target("last_layer_id", &[&last_layer_id], None)?;
        let main = gpu.create_render_target(
            "main",
            &[&main_color, &line_color, &line_data],
            Some(&depth),
        )?;
        let opaque = gpu.create_render_target("opaque", &[&opaque_color], Some(&opaque_depth))?;
        let transparent = gpu.create_render_target(
            "transparent",
            &[&transparent_color],
            Some(&transparent_depth),
        )?;
        let color_target = gpu.create_render_target("color", &[&color], None)?;
        let accumulate = gpu.create_render_target("accumulate", &[&color_accumulate], None)?;

        log::info!("Created render targets at {}", resolution);

        Ok(Self {
            resolution,
            depth,
            prepass_normal_depth,
            prepass_id,
            prepass,
            last_layer_id,
            last_layer,
            main_color,
            line_color,
            line_data,
            main,
            opaque_color,
            opaque_depth,
            opaque,
            transparent_color,
            transparent_depth,
            transparent,
            color,
            color_target,
            color_accumulate,
            accumulate,
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

/// A single color output owned by a screen-pass collaborator, reallocated
/// whenever the frame resolution changes.
pub struct ScreenOutput<B: GpuBackend> {
    label: &'static str,
    format: TextureFormat,
    current: Option<(Resolution, B::Texture, B::RenderTarget)>,
}

impl<B: GpuBackend> ScreenOutput<B> {
    pub fn new(label: &'static str, format: TextureFormat) -> Self {
        Self {
            label,
            format,
            current: None,
        }
    }

    pub fn ensure(
        &mut self,
        gpu: &mut B,
        resolution: Resolution,
    ) -> Result<(&B::Texture, &B::RenderTarget)> {
        let stale = self
            .current
            .as_ref()
            .map_or(true, |(current, _, _)| *current != resolution);
        if stale {
            let texture = gpu.create_texture(self.label, resolution, self.format)?;
            let target = gpu.create_render_target(self.label, &[&texture], None)?;
            log::debug!("Allocated {} output at {}", self.label, resolution);
            self.current = Some((resolution, texture, target));
        }
        match &self.current {
            Some((_, texture, target)) => Ok((texture, target)),
            None => Err(PipelineError::InvalidResolution(resolution)),
        }
    }
}
