#![allow(dead_code)]

//! A CPU stand-in for the GPU backend. Textures are flat RGBA buffers,
//! scene draws paint the material color over the whole target and screen
//! passes are emulated by label.

use std::sync::Arc;

use glam::Vec3;
use npr_pipeline::renderer::backend::{
    GpuBackend, Resolution, ScenePass, ScreenPass, ShaderBindings, ShaderSource, TextureFormat,
    TextureSlot,
};
use npr_pipeline::renderer::uniforms::MaterialUniform;
use npr_pipeline::scene::{Material, MaterialKind, Parameter, PassName};
use npr_pipeline::{Camera, PipelineError, PipelineSettings, Result};

/// Depth every pre-pass and shadow draw writes.
pub const DRAW_DEPTH: f32 = 0.5;

pub type Texel = [f32; 4];

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Clear {
        target: String,
    },
    Copy {
        target: String,
    },
    Draw {
        label: String,
        pass: PassName,
        target: String,
        meshes: usize,
        textures: Vec<(TextureSlot, String)>,
    },
    Screen {
        label: String,
        target: String,
        textures: Vec<(TextureSlot, String)>,
    },
    Blend {
        target: String,
        weight: f32,
    },
    DepthClamp(bool),
}

#[derive(Debug, Clone)]
pub struct FakeTexture {
    index: usize,
    layer: usize,
}

#[derive(Debug)]
pub struct FakeTarget {
    label: String,
    resolution: Resolution,
    colors: Vec<FakeTexture>,
    depth: Option<FakeTexture>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FakeShader {
    pub label: String,
    pub defines: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct FakeMesh {
    pub id: u32,
}

struct TextureData {
    label: String,
    resolution: Resolution,
    format: TextureFormat,
    layers: Vec<Vec<Texel>>,
}

#[derive(Default)]
pub struct RecordingBackend {
    textures: Vec<TextureData>,
    pub commands: Vec<Command>,
    pub compiled: Vec<FakeShader>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&self, texture: &FakeTexture) -> &str {
        &self.textures[texture.index].label
    }

    pub fn format(&self, texture: &FakeTexture) -> TextureFormat {
        self.textures[texture.index].format
    }

    pub fn resolution(&self, texture: &FakeTexture) -> Resolution {
        self.textures[texture.index].resolution
    }

    pub fn pixels(&self, texture: &FakeTexture) -> &[Texel] {
        &self.textures[texture.index].layers[texture.layer]
    }

    pub fn fill(&mut self, texture: &FakeTexture, value: Texel) {
        for texel in &mut self.textures[texture.index].layers[texture.layer] {
            *texel = value;
        }
    }

    fn write(&mut self, texture: &FakeTexture, pixels: Vec<Texel>) {
        self.textures[texture.index].layers[texture.layer] = pixels;
    }

    pub fn screens(&self, label: &str) -> Vec<&Command> {
        self.commands
            .iter()
            .filter(|command| matches!(command, Command::Screen { label: l, .. } if l == label))
            .collect()
    }

    pub fn draws(&self, label: &str) -> Vec<&Command> {
        self.commands
            .iter()
            .filter(|command| matches!(command, Command::Draw { label: l, .. } if l == label))
            .collect()
    }

    fn bound(&self, textures: &ShaderBindings<FakeTexture>) -> Vec<(TextureSlot, String)> {
        let mut bound: Vec<_> = textures
            .iter()
            .map(|(slot, texture)| (slot, self.label(texture).to_owned()))
            .collect();
        bound.sort();
        bound
    }

    fn input(
        &self,
        pass: &str,
        textures: &ShaderBindings<FakeTexture>,
        slot: TextureSlot,
    ) -> Result<Vec<Texel>> {
        textures
            .get(slot)
            .map(|texture| self.pixels(texture).to_vec())
            .ok_or_else(|| PipelineError::Gpu(format!("{pass} is missing {}", slot.name())))
    }

    fn check_resolution(&self, label: &str, expected: Resolution, texture: &FakeTexture) -> Result<()> {
        let found = self.resolution(texture);
        if found != expected {
            return Err(PipelineError::AttachmentMismatch {
                label: label.to_owned(),
                expected,
                found,
            });
        }
        Ok(())
    }
}

/// Straight alpha `front` over `back`.
pub fn blend_over(back: Texel, front: Texel) -> Texel {
    let alpha = front[3] + back[3] * (1.0 - front[3]);
    if alpha <= 0.0 {
        return [0.0; 4];
    }
    let mut out = [0.0, 0.0, 0.0, alpha];
    for c in 0..3 {
        out[c] = (front[c] * front[3] + back[c] * back[3] * (1.0 - front[3])) / alpha;
    }
    out
}

impl GpuBackend for RecordingBackend {
    type Texture = FakeTexture;
    type RenderTarget = FakeTarget;
    type Shader = FakeShader;
    type Mesh = FakeMesh;

    fn create_texture(
        &mut self,
        label: &str,
        resolution: Resolution,
        format: TextureFormat,
    ) -> Result<FakeTexture> {
        let (array, _) = self.create_texture_array(label, resolution, format, 1)?;
        Ok(array)
    }

    fn create_texture_array(
        &mut self,
        label: &str,
        resolution: Resolution,
        format: TextureFormat,
        layers: u32,
    ) -> Result<(FakeTexture, Vec<FakeTexture>)> {
        if resolution.is_empty() {
            return Err(PipelineError::InvalidResolution(resolution));
        }
        let index = self.textures.len();
        self.textures.push(TextureData {
            label: label.to_owned(),
            resolution,
            format,
            layers: vec![vec![[0.0; 4]; resolution.pixel_count()]; layers.max(1) as usize],
        });
        let handles = (0..layers as usize)
            .map(|layer| FakeTexture { index, layer })
            .collect();
        Ok((FakeTexture { index, layer: 0 }, handles))
    }

    fn create_render_target(
        &mut self,
        label: &str,
        colors: &[&FakeTexture],
        depth: Option<&FakeTexture>,
    ) -> Result<FakeTarget> {
        let Some(first) = colors.first().copied().or(depth) else {
            return Err(PipelineError::Gpu(format!("render target `{label}` has no attachments")));
        };
        let resolution = self.resolution(first);
        for texture in colors.iter().copied().chain(depth) {
            self.check_resolution(label, resolution, texture)?;
        }
        Ok(FakeTarget {
            label: label.to_owned(),
            resolution,
            colors: colors.iter().map(|texture| (*texture).clone()).collect(),
            depth: depth.cloned(),
        })
    }

    fn target_resolution(&self, target: &FakeTarget) -> Resolution {
        target.resolution
    }

    fn clear(
        &mut self,
        target: &FakeTarget,
        colors: &[[f32; 4]],
        depth: Option<f32>,
        _stencil: Option<u32>,
    ) -> Result<()> {
        for (texture, value) in target.colors.iter().zip(colors) {
            self.fill(texture, *value);
        }
        if let (Some(texture), Some(value)) = (&target.depth, depth) {
            self.fill(texture, [value, 0.0, 0.0, 0.0]);
        }
        self.commands.push(Command::Clear {
            target: target.label.clone(),
        });
        Ok(())
    }

    fn copy_textures(
        &mut self,
        target: &FakeTarget,
        colors: &[&FakeTexture],
        depth: Option<&FakeTexture>,
    ) -> Result<()> {
        let mut copies: Vec<(&FakeTexture, &FakeTexture)> =
            colors.iter().copied().zip(&target.colors).collect();
        if let (Some(source), Some(destination)) = (depth, &target.depth) {
            copies.push((source, destination));
        }
        for (source, destination) in copies {
            self.check_resolution(&target.label, target.resolution, source)?;
            let pixels = self.pixels(source).to_vec();
            self.write(destination, pixels);
        }
        self.commands.push(Command::Copy {
            target: target.label.clone(),
        });
        Ok(())
    }

    fn compile_shader(&mut self, source: &ShaderSource, defines: &[&str]) -> Result<FakeShader> {
        let shader = FakeShader {
            label: source.label.to_string(),
            defines: defines.iter().map(|define| define.to_string()).collect(),
        };
        self.compiled.push(shader.clone());
        Ok(shader)
    }

    fn draw_pass(&mut self, pass: &ScenePass<'_, Self>) -> Result<()> {
        let mut textures = pass.textures.clone();
        for binder in pass.binders {
            binder.apply(pass.default_shader, &mut textures);
        }

        let mut meshes = 0;
        for batch in pass.batches {
            let material = MaterialUniform::from_material(batch.material.as_deref());
            for mesh in &batch.meshes {
                meshes += 1;
                match pass.pass {
                    PassName::PrePass => {
                        if let Some(id) = pass.target.colors.get(1) {
                            self.fill(id, [mesh.id as f32, 0.0, 0.0, 0.0]);
                        }
                        if let Some(depth) = &pass.target.depth {
                            self.fill(depth, [DRAW_DEPTH, 0.0, 0.0, 0.0]);
                        }
                    }
                    PassName::MainPass => {
                        if let Some(color) = pass.target.colors.first() {
                            self.fill(color, material.color);
                        }
                    }
                    PassName::ShadowPass => {
                        if let Some(depth) = &pass.target.depth {
                            self.fill(depth, [DRAW_DEPTH, 0.0, 0.0, 0.0]);
                        }
                    }
                    PassName::Shader => {}
                }
            }
        }

        let textures = self.bound(&textures);
        self.commands.push(Command::Draw {
            label: pass.label.to_owned(),
            pass: pass.pass,
            target: pass.target.label.clone(),
            meshes,
            textures,
        });
        Ok(())
    }

    fn draw_screen_pass(&mut self, pass: &ScreenPass<'_, Self>) -> Result<()> {
        let Some(output) = pass.target.colors.first() else {
            return Err(PipelineError::Gpu(format!("{} has no color output", pass.label)));
        };
        let pixels = match pass.label {
            "line_composite" => self.input(pass.label, pass.textures, TextureSlot::InColor)?,
            "composite_depth" => self.input(pass.label, pass.textures, TextureSlot::InDepth)?,
            "blend_transparency" => {
                let back = self.input(pass.label, pass.textures, TextureSlot::InBack)?;
                let front = self.input(pass.label, pass.textures, TextureSlot::InFront)?;
                back.into_iter()
                    .zip(front)
                    .map(|(back, front)| blend_over(back, front))
                    .collect()
            }
            _ => vec![[0.0; 4]; pass.target.resolution.pixel_count()],
        };
        self.write(output, pixels);

        let textures = self.bound(pass.textures);
        self.commands.push(Command::Screen {
            label: pass.label.to_owned(),
            target: pass.target.label.clone(),
            textures,
        });
        Ok(())
    }

    fn blend_texture(&mut self, source: &FakeTexture, target: &FakeTarget, weight: f32) -> Result<()> {
        let Some(output) = target.colors.first() else {
            return Err(PipelineError::Gpu(format!("{} has no color output", target.label)));
        };
        let blended = self
            .pixels(output)
            .iter()
            .zip(self.pixels(source))
            .map(|(current, sample)| {
                let mut texel = [0.0; 4];
                for c in 0..4 {
                    texel[c] = current[c] * (1.0 - weight) + sample[c] * weight;
                }
                texel
            })
            .collect();
        self.write(output, blended);
        self.commands.push(Command::Blend {
            target: target.label.clone(),
            weight,
        });
        Ok(())
    }

    fn set_depth_clamp(&mut self, enabled: bool) {
        self.commands.push(Command::DepthClamp(enabled));
    }
}

/// A mesh material painting `color`, compiled by the recording backend.
pub fn mesh_material(
    gpu: &mut RecordingBackend,
    name: &str,
    color: Texel,
    transparent: bool,
) -> Arc<Material<RecordingBackend>> {
    let source = ShaderSource::new(format!("{name}.mesh"), "");
    let mut material = Material::compile(gpu, name, MaterialKind::Mesh, &source).unwrap();
    if let Some(shaders) = material.shader.as_mut() {
        shaders.set_uniform(PassName::MainPass, "Color", Parameter::Vec4(color));
    }
    material.set_transparency(transparent);
    Arc::new(material)
}

/// Defaults small enough that every shadow map stays a handful of texels.
pub fn small_settings() -> PipelineSettings {
    PipelineSettings {
        samples_grid_size_preview: 2,
        samples_grid_size_render: 2,
        shadowmaps_spot_resolution: 4,
        shadowmaps_sun_resolution: 4,
        shadowmaps_point_resolution: 4,
        transparency_layers: 0,
        ..PipelineSettings::default()
    }
}

pub fn camera() -> Camera {
    Camera::look_at(Vec3::new(0.0, 2.0, 6.0), Vec3::ZERO, 1.0, 1.0, 0.1, 50.0)
}

pub fn assert_texels_eq(actual: &[Texel], expected: Texel) {
    for (i, texel) in actual.iter().enumerate() {
        for c in 0..4 {
            assert!(
                (texel[c] - expected[c]).abs() < 1e-5,
                "texel {i}: {texel:?} != {expected:?}"
            );
        }
    }
}
