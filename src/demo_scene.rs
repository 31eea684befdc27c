use std::path::Path;
use std::sync::Arc;

use glam::{Quat, Vec3};
use log::info;
use npr_pipeline::renderer::gpu::{MeshData, WgpuBackend};
use npr_pipeline::renderer::pipeline::default_mesh_source;
use npr_pipeline::scene::{Parameter, PassName};
use npr_pipeline::{
    Batch, Camera, Light, Material, MaterialKind, Resolution, Result, Scene, Transform,
};

type WgpuScene = Scene<WgpuBackend>;

struct SurfaceStyle {
    color: [f32; 4],
    line_color: [f32; 4],
    line_width: f32,
    transparent: bool,
}

fn mesh_material(
    gpu: &mut WgpuBackend,
    name: &str,
    style: SurfaceStyle,
) -> Result<Arc<Material<WgpuBackend>>> {
    let mut material = Material::compile(gpu, name, MaterialKind::Mesh, &default_mesh_source())?;
    if let Some(shader) = material.shader.as_mut() {
        shader.set_uniform(PassName::MainPass, "Color", Parameter::Vec4(style.color));
        shader.set_uniform(PassName::MainPass, "Line Color", Parameter::Vec4(style.line_color));
        shader.set_uniform(PassName::MainPass, "Line Width", Parameter::Float(style.line_width));
    }
    material.set_transparency(style.transparent);
    Ok(Arc::new(material))
}

/// A toon cube on a floor behind two overlapping glass panels, lit by a sun
/// and a spot light with a halo.
pub fn build(gpu: &mut WgpuBackend, resolution: Resolution) -> Result<WgpuScene> {
    let aspect = resolution.width as f32 / resolution.height.max(1) as f32;
    let camera = Camera::look_at(
        Vec3::new(4.0, 3.0, 6.0),
        Vec3::new(0.0, 0.5, 0.0),
        45f32.to_radians(),
        aspect,
        0.1,
        50.0,
    );
    let mut scene = WgpuScene::new(camera);

    let black = [0.0, 0.0, 0.0, 1.0];
    let toon = mesh_material(
        gpu,
        "toon",
        SurfaceStyle {
            color: [0.9, 0.35, 0.2, 1.0],
            line_color: black,
            line_width: 3.0,
            transparent: false,
        },
    )?;
    let floor = mesh_material(
        gpu,
        "floor",
        SurfaceStyle {
            color: [0.7, 0.7, 0.65, 1.0],
            line_color: black,
            line_width: 0.0,
            transparent: false,
        },
    )?;
    let glass = mesh_material(
        gpu,
        "glass",
        SurfaceStyle {
            color: [0.3, 0.6, 1.0, 0.35],
            line_color: [0.1, 0.2, 0.5, 1.0],
            line_width: 2.0,
            transparent: true,
        },
    )?;

    let cube = gpu.create_mesh(
        "cube",
        &MeshData::cube(1.0),
        &Transform::from_trs(
            Vec3::new(0.0, 0.5, 0.0),
            Quat::from_rotation_y(0.6),
            Vec3::ONE,
        ),
        1,
    );
    let ground = gpu.create_mesh("floor", &MeshData::plane(12.0), &Transform::IDENTITY, 2);
    let panels = vec![
        gpu.create_mesh(
            "panel_front",
            &MeshData::quad(1.6),
            &Transform::from_translation(Vec3::new(0.6, 0.8, 1.6)),
            3,
        ),
        gpu.create_mesh(
            "panel_back",
            &MeshData::quad(1.6),
            &Transform::from_translation(Vec3::new(-0.2, 0.9, 1.1)),
            4,
        ),
    ];

    scene
        .add_batch(Batch::new(Some(toon), vec![cube]))
        .add_batch(Batch::new(Some(floor), vec![ground]))
        .add_batch(Batch::new(Some(glass), panels));

    let halo_path =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/materials/halo.light.wgsl");
    let halo = Arc::new(Material::load(gpu, halo_path)?);

    scene
        .add_light(Light::sun(
            Transform::looking_at(Vec3::new(3.0, 6.0, 2.0), Vec3::ZERO),
            Vec3::new(1.0, 0.95, 0.85),
        ))
        .add_light(
            Light::spot(
                Transform::looking_at(Vec3::new(-2.5, 3.0, 1.5), Vec3::new(0.0, 0.5, 0.0)),
                Vec3::new(0.4, 0.6, 1.0),
                10.0,
                50f32.to_radians(),
                0.2,
            )
            .with_shader(halo),
        );

    scene
        .world_parameters
        .set("Background Color", Parameter::Vec4([0.55, 0.6, 0.7, 1.0]));

    info!(
        "Built demo scene: {} batches, {} lights",
        scene.batches.len(),
        scene.lights.len()
    );
    Ok(scene)
}
