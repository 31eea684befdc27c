use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::renderer::backend::{GpuBackend, Resolution};
use crate::renderer::sampling::MAX_GRID_SIZE;
use crate::scene::{ParameterNamespace, Scene};

/// Pipeline parameter defaults, loaded from `settings.json`. Keys match the
/// scene and world parameter names that override them per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(rename = "Background Color", default = "PipelineSettings::default_background")]
    pub background_color: [f32; 4],
    #[serde(rename = "Line Width Max", default = "PipelineSettings::default_line_width_max")]
    pub line_width_max: u32,
    #[serde(
        rename = "Samples Grid Size Preview",
        default = "PipelineSettings::default_grid_size_preview"
    )]
    pub samples_grid_size_preview: u32,
    #[serde(
        rename = "Samples Grid Size Render",
        default = "PipelineSettings::default_grid_size_render"
    )]
    pub samples_grid_size_render: u32,
    #[serde(rename = "Samples Width", default = "PipelineSettings::default_samples_width")]
    pub samples_width: f32,
    #[serde(
        rename = "Shadow Cascades Distribution Exponent",
        default = "PipelineSettings::default_cascades_exponent"
    )]
    pub shadow_cascades_distribution_exponent: u32,
    #[serde(
        rename = "ShadowMaps Spot Resolution",
        default = "PipelineSettings::default_shadow_resolution"
    )]
    pub shadowmaps_spot_resolution: u32,
    #[serde(
        rename = "ShadowMaps Sun Resolution",
        default = "PipelineSettings::default_shadow_resolution"
    )]
    pub shadowmaps_sun_resolution: u32,
    #[serde(
        rename = "ShadowMaps Point Resolution",
        default = "PipelineSettings::default_shadow_resolution"
    )]
    pub shadowmaps_point_resolution: u32,
    #[serde(rename = "Transparency Layers", default = "PipelineSettings::default_transparency_layers")]
    pub transparency_layers: u32,
    #[serde(default)]
    pub resolution: Resolution,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            background_color: Self::default_background(),
            line_width_max: Self::default_line_width_max(),
            samples_grid_size_preview: Self::default_grid_size_preview(),
            samples_grid_size_render: Self::default_grid_size_render(),
            samples_width: Self::default_samples_width(),
            shadow_cascades_distribution_exponent: Self::default_cascades_exponent(),
            shadowmaps_spot_resolution: Self::default_shadow_resolution(),
            shadowmaps_sun_resolution: Self::default_shadow_resolution(),
            shadowmaps_point_resolution: Self::default_shadow_resolution(),
            transparency_layers: Self::default_transparency_layers(),
            resolution: Resolution::default(),
        }
    }
}

impl PipelineSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<PipelineSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded pipeline settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default pipeline settings.",
                        path, err
                    );
                    PipelineSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Pipeline settings file {:?} not found. Using default settings.",
                    path
                );
                PipelineSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default pipeline settings.",
                    path, err
                );
                PipelineSettings::default()
            }
        }
    }

    pub fn validate(mut self) -> Self {
        let defaults = Self::default();

        if self.samples_grid_size_preview == 0 {
            warn!("Samples Grid Size Preview must be greater than zero. Using default value.");
            self.samples_grid_size_preview = defaults.samples_grid_size_preview;
        }

        if self.samples_grid_size_render == 0 {
            warn!("Samples Grid Size Render must be greater than zero. Using default value.");
            self.samples_grid_size_render = defaults.samples_grid_size_render;
        }

        self.samples_grid_size_preview =
            cap_grid_size("Samples Grid Size Preview", self.samples_grid_size_preview);
        self.samples_grid_size_render =
            cap_grid_size("Samples Grid Size Render", self.samples_grid_size_render);

        if !(self.samples_width > 0.0) {
            warn!("Samples Width must be positive. Using default value.");
            self.samples_width = defaults.samples_width;
        }

        for (name, value, default) in [
            (
                "ShadowMaps Spot Resolution",
                &mut self.shadowmaps_spot_resolution,
                defaults.shadowmaps_spot_resolution,
            ),
            (
                "ShadowMaps Sun Resolution",
                &mut self.shadowmaps_sun_resolution,
                defaults.shadowmaps_sun_resolution,
            ),
            (
                "ShadowMaps Point Resolution",
                &mut self.shadowmaps_point_resolution,
                defaults.shadowmaps_point_resolution,
            ),
        ] {
            if *value == 0 {
                warn!("{} must be greater than zero. Using default value.", name);
                *value = default;
            }
        }

        if self.resolution.is_empty() {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = defaults.resolution;
        }

        self
    }

    fn default_background() -> [f32; 4] {
        [0.5, 0.5, 0.5, 1.0]
    }

    const fn default_line_width_max() -> u32 {
        10
    }

    const fn default_grid_size_preview() -> u32 {
        4
    }

    const fn default_grid_size_render() -> u32 {
        8
    }

    const fn default_samples_width() -> f32 {
        1.5
    }

    const fn default_cascades_exponent() -> u32 {
        21
    }

    const fn default_shadow_resolution() -> u32 {
        2048
    }

    const fn default_transparency_layers() -> u32 {
        4
    }
}

/// Parameter values in effect for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSettings {
    pub background_color: [f32; 4],
    pub line_width_max: u32,
    pub sampling_grid_size: u32,
    pub samples_width: f32,
    pub shadow_cascades_distribution_exponent: f32,
    pub shadowmaps_spot_resolution: u32,
    pub shadowmaps_sun_resolution: u32,
    pub shadowmaps_point_resolution: u32,
    pub transparency_layers: u32,
}

impl FrameSettings {
    /// Scene and world parameters override `defaults` when present.
    pub fn resolve<B: GpuBackend>(
        scene: &Scene<B>,
        defaults: &PipelineSettings,
        is_final_render: bool,
    ) -> Result<Self> {
        let params = &scene.parameters;
        let grid_name = if is_final_render {
            "Samples Grid Size Render"
        } else {
            "Samples Grid Size Preview"
        };
        let grid_default = if is_final_render {
            defaults.samples_grid_size_render
        } else {
            defaults.samples_grid_size_preview
        };
        let grid_size = cap_grid_size(grid_name, count(params, grid_name, grid_default)?);

        Ok(Self {
            background_color: scene
                .world_parameters
                .vec4("Background Color")?
                .unwrap_or(defaults.background_color),
            line_width_max: count(params, "Line Width Max", defaults.line_width_max)?,
            sampling_grid_size: grid_size.max(1),
            samples_width: params
                .float("Samples Width")?
                .unwrap_or(defaults.samples_width),
            shadow_cascades_distribution_exponent: params
                .float("Shadow Cascades Distribution Exponent")?
                .unwrap_or(defaults.shadow_cascades_distribution_exponent as f32),
            shadowmaps_spot_resolution: count(
                params,
                "ShadowMaps Spot Resolution",
                defaults.shadowmaps_spot_resolution,
            )?
            .max(1),
            shadowmaps_sun_resolution: count(
                params,
                "ShadowMaps Sun Resolution",
                defaults.shadowmaps_sun_resolution,
            )?
            .max(1),
            shadowmaps_point_resolution: count(
                params,
                "ShadowMaps Point Resolution",
                defaults.shadowmaps_point_resolution,
            )?
            .max(1),
            transparency_layers: count(params, "Transparency Layers", defaults.transparency_layers)?,
        })
    }
}

fn cap_grid_size(name: &str, value: u32) -> u32 {
    if value > MAX_GRID_SIZE {
        warn!("{} {} is larger than {}. Clamping.", name, value, MAX_GRID_SIZE);
        MAX_GRID_SIZE
    } else {
        value
    }
}

/// Reads a non-negative integer parameter, clamping negatives to zero.
fn count(params: &ParameterNamespace, name: &str, default: u32) -> Result<u32> {
    Ok(params
        .int(name)?
        .map_or(default, |value| value.max(0) as u32))
}
