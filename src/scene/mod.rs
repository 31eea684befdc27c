//! Per-frame scene description consumed read-only by the pipeline.

pub mod camera;
pub mod material;
pub mod parameters;
pub mod transform;

use std::sync::Arc;

use glam::Vec3;

use crate::renderer::backend::GpuBackend;

pub use camera::Camera;
pub use material::{
    compile_material, CompiledShader, Material, MaterialKind, MaterialShaders, PassName,
    TRANSPARENCY_UNIFORM,
};
pub use parameters::{Parameter, ParameterNamespace};
pub use transform::Transform;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Directional light, shadowed through camera aligned cascades.
    Sun,
    /// Cone light. `angle` is the full cone angle in radians, `blend` the
    /// soft edge fraction.
    Spot { angle: f32, blend: f32 },
    Point,
}

impl LightKind {
    pub fn index(&self) -> u32 {
        match self {
            LightKind::Sun => 1,
            LightKind::Spot { .. } => 2,
            LightKind::Point => 3,
        }
    }
}

pub struct Light<B: GpuBackend> {
    pub kind: LightKind,
    pub transform: Transform,
    pub color: Vec3,
    pub radius: f32,
    /// Optional custom light material compiled as [`MaterialKind::Light`].
    pub shader: Option<Arc<Material<B>>>,
    pub parameters: ParameterNamespace,
}

impl<B: GpuBackend> Light<B> {
    pub fn new(kind: LightKind, transform: Transform, color: Vec3, radius: f32) -> Self {
        Self {
            kind,
            transform,
            color,
            radius,
            shader: None,
            parameters: ParameterNamespace::new(),
        }
    }

    pub fn sun(transform: Transform, color: Vec3) -> Self {
        Self::new(LightKind::Sun, transform, color, 0.0)
    }

    pub fn spot(transform: Transform, color: Vec3, radius: f32, angle: f32, blend: f32) -> Self {
        Self::new(LightKind::Spot { angle, blend }, transform, color, radius)
    }

    pub fn point(transform: Transform, color: Vec3, radius: f32) -> Self {
        Self::new(LightKind::Point, transform, color, radius)
    }

    pub fn with_shader(mut self, shader: Arc<Material<B>>) -> Self {
        self.shader = Some(shader);
        self
    }
}

/// A material together with every mesh drawn with it.
pub struct Batch<B: GpuBackend> {
    pub material: Option<Arc<Material<B>>>,
    pub meshes: Vec<B::Mesh>,
}

impl<B: GpuBackend> Batch<B> {
    pub fn new(material: Option<Arc<Material<B>>>, meshes: Vec<B::Mesh>) -> Self {
        Self { material, meshes }
    }

    pub fn material_name(&self) -> &str {
        self.material
            .as_deref()
            .map(|material| material.name.as_str())
            .unwrap_or("<default>")
    }

    /// The shader this batch draws `pass` with, if its material has one.
    pub fn shader(&self, pass: PassName) -> Option<&B::Shader> {
        self.material
            .as_deref()
            .and_then(|material| material.variant(pass))
    }
}

pub struct Scene<B: GpuBackend> {
    pub camera: Camera,
    pub lights: Vec<Light<B>>,
    pub batches: Vec<Batch<B>>,
    /// Scene-global parameters (`Transparency Layers`, `Samples Width`, ...).
    pub parameters: ParameterNamespace,
    /// World parameters (`Background Color`).
    pub world_parameters: ParameterNamespace,
    pub frame: u32,
    pub time: f32,
}

impl<B: GpuBackend> Scene<B> {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            lights: Vec::new(),
            batches: Vec::new(),
            parameters: ParameterNamespace::new(),
            world_parameters: ParameterNamespace::new(),
            frame: 0,
            time: 0.0,
        }
    }

    pub fn add_light(&mut self, light: Light<B>) -> &mut Self {
        self.lights.push(light);
        self
    }

    pub fn add_batch(&mut self, batch: Batch<B>) -> &mut Self {
        self.batches.push(batch);
        self
    }

    pub fn lights_of<'a>(
        &'a self,
        filter: impl Fn(&LightKind) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Light<B>> + 'a {
        self.lights.iter().filter(move |light| filter(&light.kind))
    }
}
