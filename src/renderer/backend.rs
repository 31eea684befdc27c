//! The GPU resource seam the pipeline drives.
//!
//! Everything the frame orchestration needs from a graphics API is expressed
//! through [`GpuBackend`]: texture and render-target allocation, clears,
//! copies, scene and fullscreen draws and the accumulation blend. Commands are
//! issued from one thread in program order; a pass that samples a texture
//! written by an earlier pass only has to be submitted after it.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::renderer::lights::LightsUniform;
use crate::renderer::uniforms::{CommonUniforms, PassParams};
use crate::scene::{Batch, PassName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn square(size: u32) -> Self {
        Self::new(size, size)
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Storage formats used by the pipeline's render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// High precision color, normals and line data.
    Rgba32Float,
    /// Surface IDs and linear depth.
    R32Float,
    Depth32Float,
}

impl TextureFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }
}

/// Fixed binding locations for every texture a pipeline shader may read.
///
/// Shaders declare `@group(1) @binding(n)` using [`TextureSlot::binding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureSlot {
    InOpaqueDepth,
    InTransparentDepth,
    InLastId,
    InNormalDepth,
    InId,
    InBack,
    InFront,
    InColor,
    InDepth,
    InLineColor,
    InLineData,
    ShadowmapsSpotOpaque,
    ShadowmapsSunOpaque,
    ShadowmapsPointOpaque,
    ShadowmapsSpotTransparent,
    ShadowmapsSunTransparent,
    ShadowmapsPointTransparent,
    InLightShading,
    Custom(u32),
}

impl TextureSlot {
    pub const CUSTOM_BASE: u32 = 32;

    pub fn binding(self) -> u32 {
        match self {
            TextureSlot::InOpaqueDepth => 0,
            TextureSlot::InTransparentDepth => 1,
            TextureSlot::InLastId => 2,
            TextureSlot::InNormalDepth => 3,
            TextureSlot::InId => 4,
            TextureSlot::InBack => 5,
            TextureSlot::InFront => 6,
            TextureSlot::InColor => 7,
            TextureSlot::InDepth => 8,
            TextureSlot::InLineColor => 9,
            TextureSlot::InLineData => 10,
            TextureSlot::ShadowmapsSpotOpaque => 11,
            TextureSlot::ShadowmapsSunOpaque => 12,
            TextureSlot::ShadowmapsPointOpaque => 13,
            TextureSlot::ShadowmapsSpotTransparent => 14,
            TextureSlot::ShadowmapsSunTransparent => 15,
            TextureSlot::ShadowmapsPointTransparent => 16,
            TextureSlot::InLightShading => 17,
            TextureSlot::Custom(index) => Self::CUSTOM_BASE + index,
        }
    }

    pub fn name(self) -> Cow<'static, str> {
        let name = match self {
            TextureSlot::InOpaqueDepth => "IN_OPAQUE_DEPTH",
            TextureSlot::InTransparentDepth => "IN_TRANSPARENT_DEPTH",
            TextureSlot::InLastId => "IN_LAST_ID",
            TextureSlot::InNormalDepth => "IN_NORMAL_DEPTH",
            TextureSlot::InId => "IN_ID",
            TextureSlot::InBack => "IN_BACK",
            TextureSlot::InFront => "IN_FRONT",
            TextureSlot::InColor => "IN_COLOR",
            TextureSlot::InDepth => "IN_DEPTH",
            TextureSlot::InLineColor => "IN_LINE_COLOR",
            TextureSlot::InLineData => "IN_LINE_DATA",
            TextureSlot::ShadowmapsSpotOpaque => "SHADOWMAPS_SPOT_OPAQUE",
            TextureSlot::ShadowmapsSunOpaque => "SHADOWMAPS_SUN_OPAQUE",
            TextureSlot::ShadowmapsPointOpaque => "SHADOWMAPS_POINT_OPAQUE",
            TextureSlot::ShadowmapsSpotTransparent => "SHADOWMAPS_SPOT_TRANSPARENT",
            TextureSlot::ShadowmapsSunTransparent => "SHADOWMAPS_SUN_TRANSPARENT",
            TextureSlot::ShadowmapsPointTransparent => "SHADOWMAPS_POINT_TRANSPARENT",
            TextureSlot::InLightShading => "IN_LIGHT_SHADING",
            TextureSlot::Custom(index) => return Cow::Owned(format!("CUSTOM_{index}")),
        };
        Cow::Borrowed(name)
    }
}

/// Shader source text plus a debug label.
#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub label: Cow<'static, str>,
    pub code: Cow<'static, str>,
}

impl ShaderSource {
    pub fn new(label: impl Into<Cow<'static, str>>, code: impl Into<Cow<'static, str>>) -> Self {
        Self {
            label: label.into(),
            code: code.into(),
        }
    }
}

/// Textures bound to a single draw, keyed by slot. Binding a slot twice
/// replaces the earlier texture.
pub struct ShaderBindings<T> {
    textures: Vec<(TextureSlot, T)>,
}

impl<T: Clone> Clone for ShaderBindings<T> {
    fn clone(&self) -> Self {
        Self {
            textures: self.textures.clone(),
        }
    }
}

impl<T> Default for ShaderBindings<T> {
    fn default() -> Self {
        Self {
            textures: Vec::new(),
        }
    }
}

impl<T> ShaderBindings<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, slot: TextureSlot, texture: T) -> Self {
        self.bind(slot, texture);
        self
    }

    pub fn bind(&mut self, slot: TextureSlot, texture: T) {
        match self.textures.iter_mut().find(|(bound, _)| *bound == slot) {
            Some(entry) => entry.1 = texture,
            None => self.textures.push((slot, texture)),
        }
    }

    pub fn get(&self, slot: TextureSlot) -> Option<&T> {
        self.textures
            .iter()
            .find(|(bound, _)| *bound == slot)
            .map(|(_, texture)| texture)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureSlot, &T)> {
        self.textures.iter().map(|(slot, texture)| (*slot, texture))
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

/// Late-bound contribution to a shader's inputs, applied right before each
/// draw that uses the shader.
pub trait ShaderBinder<B: GpuBackend> {
    fn apply(&self, shader: &B::Shader, bindings: &mut ShaderBindings<B::Texture>);
}

/// Uniform data handed explicitly to each draw.
#[derive(Clone, Copy)]
pub struct UniformBlocks<'a> {
    pub common: &'a CommonUniforms,
    pub lights: &'a LightsUniform,
    pub params: PassParams,
}

/// One scene draw: every batch drawn with its material's `pass` variant.
pub struct ScenePass<'a, B: GpuBackend> {
    pub label: &'a str,
    pub target: &'a B::RenderTarget,
    pub batches: &'a [&'a Batch<B>],
    pub pass: PassName,
    pub default_shader: &'a B::Shader,
    pub uniforms: UniformBlocks<'a>,
    pub textures: &'a ShaderBindings<B::Texture>,
    pub binders: &'a [&'a dyn ShaderBinder<B>],
}

/// A fullscreen draw of `shader` into `target`.
pub struct ScreenPass<'a, B: GpuBackend> {
    pub label: &'a str,
    pub shader: &'a B::Shader,
    pub target: &'a B::RenderTarget,
    pub uniforms: UniformBlocks<'a>,
    pub textures: &'a ShaderBindings<B::Texture>,
}

pub trait GpuBackend: Sized {
    type Texture: Clone;
    type RenderTarget;
    type Shader;
    type Mesh;

    fn create_texture(
        &mut self,
        label: &str,
        resolution: Resolution,
        format: TextureFormat,
    ) -> Result<Self::Texture>;

    /// Creates a layered texture. Returns the whole array (for sampling) and
    /// one handle per layer (for attaching).
    fn create_texture_array(
        &mut self,
        label: &str,
        resolution: Resolution,
        format: TextureFormat,
        layers: u32,
    ) -> Result<(Self::Texture, Vec<Self::Texture>)>;

    fn create_render_target(
        &mut self,
        label: &str,
        colors: &[&Self::Texture],
        depth: Option<&Self::Texture>,
    ) -> Result<Self::RenderTarget>;

    fn target_resolution(&self, target: &Self::RenderTarget) -> Resolution;

    /// Clears color attachments in order; `depth`/`stencil` leave the depth
    /// attachment untouched when `None`.
    fn clear(
        &mut self,
        target: &Self::RenderTarget,
        colors: &[[f32; 4]],
        depth: Option<f32>,
        stencil: Option<u32>,
    ) -> Result<()>;

    /// Copies `colors[i]` into color attachment `i` and `depth` into the depth
    /// attachment of `target`.
    fn copy_textures(
        &mut self,
        target: &Self::RenderTarget,
        colors: &[&Self::Texture],
        depth: Option<&Self::Texture>,
    ) -> Result<()>;

    fn compile_shader(&mut self, source: &ShaderSource, defines: &[&str]) -> Result<Self::Shader>;

    fn draw_pass(&mut self, pass: &ScenePass<'_, Self>) -> Result<()>;

    fn draw_screen_pass(&mut self, pass: &ScreenPass<'_, Self>) -> Result<()>;

    /// `target.color[0] = target.color[0] * (1 - weight) + source * weight`.
    fn blend_texture(
        &mut self,
        source: &Self::Texture,
        target: &Self::RenderTarget,
        weight: f32,
    ) -> Result<()>;

    fn set_depth_clamp(&mut self, enabled: bool);
}
