mod common;

use common::{
    assert_texels_eq, camera, mesh_material, small_settings, Command, FakeMesh, RecordingBackend,
    DRAW_DEPTH,
};
use glam::Vec3;
use npr_pipeline::renderer::backend::TextureSlot;
use npr_pipeline::renderer::pipeline::default_mesh_source;
use npr_pipeline::renderer::sampling::MAX_GRID_SIZE;
use npr_pipeline::scene::Parameter;
use npr_pipeline::{Batch, Light, NprPipeline, PipelineError, Resolution, Scene, Transform};

const RESOLUTION: Resolution = Resolution::new(64, 64);
const TOON: [f32; 4] = [0.2, 0.4, 0.6, 1.0];
const GLASS: [f32; 4] = [1.0, 0.0, 0.0, 0.5];

fn opaque_scene(gpu: &mut RecordingBackend) -> Scene<RecordingBackend> {
    let mut scene = Scene::new(camera());
    let toon = mesh_material(gpu, "toon", TOON, false);
    scene.add_batch(Batch::new(Some(toon), vec![FakeMesh { id: 1 }]));
    scene
}

fn pipeline(gpu: &mut RecordingBackend) -> NprPipeline<RecordingBackend> {
    NprPipeline::with_builtin_collaborators(gpu, small_settings()).unwrap()
}

#[test]
fn preview_render_has_no_depth() {
    let mut gpu = RecordingBackend::new();
    let scene = opaque_scene(&mut gpu);
    let mut pipeline = pipeline(&mut gpu);

    let output = pipeline.render(&mut gpu, RESOLUTION, &scene, false, true).unwrap();

    assert!(output.depth.is_none());
    assert!(gpu.screens("composite_depth").is_empty());
    assert_eq!(gpu.resolution(&output.color), RESOLUTION);
}

#[test]
fn final_render_composites_depth() {
    let mut gpu = RecordingBackend::new();
    let scene = opaque_scene(&mut gpu);
    let mut pipeline = pipeline(&mut gpu);

    let output = pipeline.render(&mut gpu, RESOLUTION, &scene, true, true).unwrap();

    let depth = output.depth.expect("final renders produce depth");
    assert_eq!(gpu.resolution(&depth), RESOLUTION);
    assert_texels_eq(gpu.pixels(&depth), [DRAW_DEPTH, 0.0, 0.0, 0.0]);

    let composites = gpu.screens("composite_depth");
    assert_eq!(composites.len(), 1);
    let Command::Screen { textures, .. } = composites[0] else {
        unreachable!()
    };
    assert_eq!(textures, &vec![(TextureSlot::InDepth, "opaque_depth".to_owned())]);
}

#[test]
fn opaque_frame_without_transparency_is_the_opaque_layer() {
    let mut gpu = RecordingBackend::new();
    let scene = opaque_scene(&mut gpu);
    let mut pipeline = pipeline(&mut gpu);

    let output = pipeline.render(&mut gpu, RESOLUTION, &scene, false, true).unwrap();

    assert_texels_eq(gpu.pixels(&output.color), TOON);
    assert_eq!(gpu.draws("pre_pass").len(), 1);
    assert_eq!(gpu.draws("main_pass").len(), 1);
    // Only the final opaque + transparent composite.
    assert_eq!(gpu.screens("blend_transparency").len(), 1);
}

#[test]
fn empty_scene_renders_world_background() {
    let mut gpu = RecordingBackend::new();
    let mut scene = Scene::new(camera());
    let background = [0.1, 0.2, 0.3, 1.0];
    scene
        .world_parameters
        .set("Background Color", Parameter::Vec4(background));
    let mut pipeline = pipeline(&mut gpu);

    let output = pipeline.render(&mut gpu, RESOLUTION, &scene, false, true).unwrap();

    assert_texels_eq(gpu.pixels(&output.color), background);
}

#[test]
fn transparency_layers_parameter_controls_peeling() {
    let mut gpu = RecordingBackend::new();
    let mut scene = opaque_scene(&mut gpu);
    let glass = mesh_material(&mut gpu, "glass", GLASS, true);
    scene.add_batch(Batch::new(Some(glass), vec![FakeMesh { id: 2 }]));
    scene.parameters.set("Transparency Layers", Parameter::Int(3));
    let mut pipeline = pipeline(&mut gpu);

    pipeline.render(&mut gpu, RESOLUTION, &scene, false, true).unwrap();

    // One opaque layer plus three peeled layers.
    assert_eq!(gpu.draws("pre_pass").len(), 4);
    assert_eq!(gpu.screens("blend_transparency").len(), 4);

    let meshes: Vec<usize> = gpu
        .draws("main_pass")
        .into_iter()
        .map(|command| match command {
            Command::Draw { meshes, .. } => *meshes,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(meshes, vec![1, 1, 1, 1]);
}

#[test]
fn one_transparent_layer_is_blended_over_the_opaque_layer() {
    let mut gpu = RecordingBackend::new();
    let mut scene = opaque_scene(&mut gpu);
    let glass = mesh_material(&mut gpu, "glass", GLASS, true);
    scene.add_batch(Batch::new(Some(glass), vec![FakeMesh { id: 2 }]));
    scene.parameters.set("Transparency Layers", Parameter::Int(1));
    let mut pipeline = pipeline(&mut gpu);

    let output = pipeline.render(&mut gpu, RESOLUTION, &scene, false, true).unwrap();

    // 0.5 red over opaque blue-ish.
    let expected = [
        GLASS[0] * 0.5 + TOON[0] * 0.5,
        GLASS[1] * 0.5 + TOON[1] * 0.5,
        GLASS[2] * 0.5 + TOON[2] * 0.5,
        1.0,
    ];
    assert_texels_eq(gpu.pixels(&output.color), expected);
}

#[test]
fn samples_accumulate_until_the_frame_changes() {
    let mut gpu = RecordingBackend::new();
    let scene = opaque_scene(&mut gpu);
    let mut pipeline = pipeline(&mut gpu);

    let indices: Vec<u32> = [true, false, false]
        .into_iter()
        .map(|new_frame| {
            pipeline
                .render(&mut gpu, RESOLUTION, &scene, false, new_frame)
                .unwrap()
                .sample_index
        })
        .collect();
    assert_eq!(indices, vec![0, 1, 2]);

    let restarted = pipeline.render(&mut gpu, RESOLUTION, &scene, false, true).unwrap();
    assert_eq!(restarted.sample_index, 0);

    let resized = pipeline
        .render(&mut gpu, Resolution::new(32, 16), &scene, false, false)
        .unwrap();
    assert_eq!(resized.sample_index, 0);
    assert_eq!(gpu.resolution(&resized.color), Resolution::new(32, 16));

    let weights: Vec<f32> = gpu
        .commands
        .iter()
        .filter_map(|command| match command {
            Command::Blend { target, weight } if target == "accumulate" => Some(*weight),
            _ => None,
        })
        .collect();
    assert_eq!(weights, vec![1.0, 0.5, 1.0 / 3.0, 1.0, 1.0]);
}

#[test]
fn render_converges_after_every_sample_offset() {
    let mut gpu = RecordingBackend::new();
    let scene = opaque_scene(&mut gpu);
    let mut pipeline = pipeline(&mut gpu);

    let mut rendered = 0;
    loop {
        let output = pipeline
            .render(&mut gpu, RESOLUTION, &scene, true, rendered == 0)
            .unwrap();
        rendered += 1;
        assert_eq!(output.samples_total, 4);
        if output.is_converged() {
            break;
        }
    }
    assert_eq!(rendered, 4);
}

#[test]
fn sun_shadows_are_drawn_with_depth_clamp() {
    let mut gpu = RecordingBackend::new();
    let mut scene = opaque_scene(&mut gpu);
    scene.add_light(Light::sun(
        Transform::looking_at(Vec3::new(2.0, 5.0, 1.0), Vec3::ZERO),
        Vec3::ONE,
    ));
    let mut pipeline = pipeline(&mut gpu);

    pipeline.render(&mut gpu, RESOLUTION, &scene, false, true).unwrap();

    let clamps: Vec<bool> = gpu
        .commands
        .iter()
        .filter_map(|command| match command {
            Command::DepthClamp(enabled) => Some(*enabled),
            _ => None,
        })
        .collect();
    assert_eq!(clamps, vec![true, false]);
    assert_eq!(gpu.draws("shadow_opaque").len(), 4);
    assert_eq!(gpu.draws("shadow_transparent").len(), 4);

    // Main pass shaders see the shadow map arrays.
    let Command::Draw { textures, .. } = gpu.draws("main_pass")[0] else {
        unreachable!()
    };
    assert!(textures.contains(&(
        TextureSlot::ShadowmapsSunOpaque,
        "opaque_sun_shadowmaps".to_owned()
    )));
}

#[test]
fn default_material_reads_the_spot_shadow_map() {
    let mut gpu = RecordingBackend::new();
    let mut scene = opaque_scene(&mut gpu);
    scene.add_light(Light::spot(
        Transform::looking_at(Vec3::new(0.0, 4.0, 0.0), Vec3::ZERO),
        Vec3::ONE,
        20.0,
        0.8,
        0.1,
    ));
    let mut pipeline = pipeline(&mut gpu);

    pipeline.render(&mut gpu, RESOLUTION, &scene, false, true).unwrap();

    assert_eq!(gpu.draws("shadow_opaque").len(), 1);
    let Command::Draw { textures, .. } = gpu.draws("main_pass")[0] else {
        unreachable!()
    };
    let slot = TextureSlot::ShadowmapsSpotOpaque;
    assert!(textures.contains(&(slot, "opaque_spot_shadowmaps".to_owned())));

    let declaration = format!("@binding({}) var {}", slot.binding(), slot.name());
    let source = default_mesh_source();
    assert!(source.code.contains(&declaration));
    assert!(source.code.contains(&format!("textureLoad({}", slot.name())));
}

#[test]
fn empty_resolution_is_rejected() {
    let mut gpu = RecordingBackend::new();
    let scene = opaque_scene(&mut gpu);
    let mut pipeline = pipeline(&mut gpu);

    let err = pipeline
        .render(&mut gpu, Resolution::new(0, 64), &scene, false, true)
        .err()
        .unwrap();
    assert!(matches!(err, PipelineError::InvalidResolution(_)));
}

#[test]
fn mistyped_scene_parameter_fails_the_frame() {
    let mut gpu = RecordingBackend::new();
    let mut scene = opaque_scene(&mut gpu);
    scene
        .parameters
        .set("Transparency Layers", Parameter::Vec4([1.0; 4]));
    let mut pipeline = pipeline(&mut gpu);

    let err = pipeline
        .render(&mut gpu, RESOLUTION, &scene, false, true)
        .err()
        .unwrap();
    assert!(matches!(err, PipelineError::ParameterType { ref name, .. } if name == "Transparency Layers"));
}

#[test]
fn oversized_sample_grid_is_clamped() {
    let mut gpu = RecordingBackend::new();
    let mut scene = opaque_scene(&mut gpu);
    scene
        .parameters
        .set("Samples Grid Size Preview", Parameter::Int(70_000));
    let mut pipeline = pipeline(&mut gpu);

    let output = pipeline.render(&mut gpu, RESOLUTION, &scene, false, true).unwrap();

    assert_eq!(output.samples_total, MAX_GRID_SIZE * MAX_GRID_SIZE);
    assert_texels_eq(gpu.pixels(&output.color), TOON);
}
