use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2};

use crate::renderer::backend::{GpuBackend, Resolution};
use crate::scene::{Material, ParameterNamespace, PassName, Scene, TRANSPARENCY_UNIFORM};

/// Camera and sampling state shared by every pipeline shader
/// (`@group(0) @binding(0)`).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CommonUniforms {
    pub camera: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub inverse_camera: [[f32; 4]; 4],
    pub inverse_projection: [[f32; 4]; 4],
    pub resolution: [f32; 2],
    pub sample_offset: [f32; 2],
    pub sample_count: u32,
    pub frame: u32,
    pub time: f32,
    pub _padding: f32,
}

impl CommonUniforms {
    pub fn new(camera: Mat4, projection: Mat4, resolution: Resolution) -> Self {
        Self {
            camera: camera.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            inverse_camera: camera.inverse().to_cols_array_2d(),
            inverse_projection: projection.inverse().to_cols_array_2d(),
            resolution: [resolution.width as f32, resolution.height as f32],
            sample_offset: [0.0, 0.0],
            sample_count: 0,
            frame: 0,
            time: 0.0,
            _padding: 0.0,
        }
    }

    pub fn camera_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.camera)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.projection)
    }

    pub fn target_resolution(&self) -> Resolution {
        Resolution::new(self.resolution[0] as u32, self.resolution[1] as u32)
    }
}

impl Default for CommonUniforms {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Resolution::default())
    }
}

/// Frame-wide values every [`CommonUniforms`] of a frame shares. Shadow
/// passes and the scene passes only differ in the view they feed in.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommonBuffer {
    frame: u32,
    time: f32,
    sample_offset: Vec2,
    sample_count: u32,
    scene_camera: Mat4,
    scene_projection: Mat4,
}

impl CommonBuffer {
    pub fn load<B: GpuBackend>(scene: &Scene<B>, sample_offset: Vec2, sample_count: u32) -> Self {
        Self {
            frame: scene.frame,
            time: scene.time,
            sample_offset,
            sample_count,
            scene_camera: scene.camera.view,
            scene_projection: scene.camera.projection,
        }
    }

    /// Uniforms for the scene camera at the frame resolution. The sample
    /// offset is applied here only.
    pub fn scene_view(&self, resolution: Resolution) -> CommonUniforms {
        let projection = jitter_projection(self.scene_projection, self.sample_offset, resolution);
        let mut uniforms = self.view(self.scene_camera, projection, resolution);
        uniforms.sample_offset = self.sample_offset.to_array();
        uniforms
    }

    /// Uniforms for an arbitrary view, e.g. one shadow map matrix pair.
    pub fn view(&self, camera: Mat4, projection: Mat4, resolution: Resolution) -> CommonUniforms {
        CommonUniforms {
            sample_count: self.sample_count,
            frame: self.frame,
            time: self.time,
            ..CommonUniforms::new(camera, projection, resolution)
        }
    }

    pub fn sample_offset(&self) -> Vec2 {
        self.sample_offset
    }
}

/// Shifts the projection by a sub-pixel `offset` (in pixels).
pub fn jitter_projection(projection: Mat4, offset: Vec2, resolution: Resolution) -> Mat4 {
    if offset == Vec2::ZERO || resolution.is_empty() {
        return projection;
    }
    let ndc = Vec2::new(
        2.0 * offset.x / resolution.width as f32,
        2.0 * offset.y / resolution.height as f32,
    );
    Mat4::from_translation(ndc.extend(0.0)) * projection
}

/// Small per-draw parameter block (`@group(0) @binding(2)`): blend weights,
/// line widths, light indices.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PassParams(pub [f32; 4]);

impl PassParams {
    pub fn scalar(value: f32) -> Self {
        Self([value, 0.0, 0.0, 0.0])
    }
}

/// Surface values a mesh material feeds its shaders (`@group(3)`), read
/// from the material's `MAIN_PASS` uniforms.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialUniform {
    pub color: [f32; 4],
    pub line_color: [f32; 4],
    /// x: transparency flag, y: line width in pixels.
    pub params: [f32; 4],
}

impl MaterialUniform {
    pub const DEFAULT_COLOR: [f32; 4] = [1.0, 1.0, 0.0, 1.0];

    pub fn from_parameters(uniforms: &ParameterNamespace) -> Self {
        let read_vec4 = |name: &str, default: [f32; 4]| {
            uniforms
                .get(name)
                .and_then(|value| value.as_vec4())
                .unwrap_or(default)
        };
        let transparent = uniforms
            .get(TRANSPARENCY_UNIFORM)
            .is_some_and(|value| value.as_bool());
        let line_width = uniforms
            .get("Line Width")
            .and_then(|value| value.as_float())
            .unwrap_or(1.0);

        Self {
            color: read_vec4("Color", Self::DEFAULT_COLOR),
            line_color: read_vec4("Line Color", [0.0, 0.0, 0.0, 1.0]),
            params: [if transparent { 1.0 } else { 0.0 }, line_width, 0.0, 0.0],
        }
    }

    pub fn from_material<B: GpuBackend>(material: Option<&Material<B>>) -> Self {
        material
            .and_then(|material| material.shader.as_ref())
            .and_then(|shader| shader.get(PassName::MainPass))
            .map(|main| Self::from_parameters(&main.uniforms))
            .unwrap_or_default()
    }
}

impl Default for MaterialUniform {
    fn default() -> Self {
        Self::from_parameters(&ParameterNamespace::new())
    }
}
