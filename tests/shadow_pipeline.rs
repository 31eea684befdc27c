mod common;

use common::{camera, RecordingBackend};
use glam::{Mat4, Vec3};
use npr_pipeline::renderer::lights::{
    build_sun_cascades, LightsBuffer, MAX_LIGHTS, MAX_SPOTS, SUN_CASCADES,
};
use npr_pipeline::{Camera, Light, Scene, Transform};

const EPSILON: f32 = 1e-4;

/// Shadow map lookup as the mesh shader does it: `[0, 1]` texture
/// coordinates with y pointing down, depth unchanged.
fn project_shadow_cpu(matrix: Mat4, world_pos: Vec3) -> Vec3 {
    let clip = matrix * world_pos.extend(1.0);
    if clip.w <= 0.0 {
        return Vec3::splat(-1.0);
    }
    let ndc = clip.truncate() / clip.w;
    Vec3::new(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5, ndc.z)
}

fn inside_map(projected: Vec3) -> bool {
    (-EPSILON..=1.0 + EPSILON).contains(&projected.x)
        && (-EPSILON..=1.0 + EPSILON).contains(&projected.y)
        && (-EPSILON..=1.0 + EPSILON).contains(&projected.z)
}

fn uniform_matrix(matrix: &[[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(matrix)
}

fn load(scene: &Scene<RecordingBackend>) -> LightsBuffer {
    let mut lights = LightsBuffer::new();
    lights.load(scene, SUN_CASCADES, 21.0);
    lights
}

fn spot_above_origin() -> Light<RecordingBackend> {
    Light::spot(
        Transform::looking_at(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO),
        Vec3::ONE,
        30.0,
        60_f32.to_radians(),
        0.1,
    )
}

#[test]
fn uniform_matrices_match_shadow_pass_views() {
    let mut scene = Scene::new(camera());
    scene.add_light(spot_above_origin());
    let lights = load(&scene);

    let (view, projection) = lights.spot_matrices[0];
    let expected = projection * view;
    let uploaded = uniform_matrix(&lights.uniform().spot_matrices[0]);
    assert!(uploaded.abs_diff_eq(expected, EPSILON));
    assert_eq!(lights.uniform().lights[0].shadow_index, 0);
}

#[test]
fn spot_shadow_projection_rejects_points_behind_light() {
    let mut scene = Scene::new(camera());
    scene.add_light(spot_above_origin());
    let lights = load(&scene);
    let spot = uniform_matrix(&lights.uniform().spot_matrices[0]);

    let behind_light = Vec3::new(0.0, 15.0, 0.0);
    assert!((spot * behind_light.extend(1.0)).w <= 0.0);
    assert_eq!(project_shadow_cpu(spot, behind_light), Vec3::splat(-1.0));

    let target = project_shadow_cpu(spot, Vec3::ZERO);
    assert!(inside_map(target), "{target:?}");
    assert!((target.x - 0.5).abs() < EPSILON && (target.y - 0.5).abs() < EPSILON);

    // Outside the cone.
    let beside = project_shadow_cpu(spot, Vec3::new(20.0, 0.0, 0.0));
    assert!(!inside_map(beside), "{beside:?}");
}

#[test]
fn shadow_texture_axis_is_flipped_from_clip_space() {
    let camera = Camera::look_at(Vec3::new(0.0, 5.0, 5.0), Vec3::ZERO, 1.0, 1.0, 0.1, 20.0);
    let (cascades, _) = build_sun_cascades(&camera, Vec3::NEG_Y, 1, 21.0);
    let (view, projection) = cascades[0];
    let matrix = projection * view;

    // Looking straight down, the light's up axis is +Z.
    let top = Vec3::new(0.0, 0.0, 1.0);
    let bottom = Vec3::new(0.0, 0.0, -1.0);

    let ndc_top = matrix.project_point3(top);
    let ndc_bottom = matrix.project_point3(bottom);
    assert!(ndc_top.y > ndc_bottom.y);

    let tex_top = project_shadow_cpu(matrix, top);
    let tex_bottom = project_shadow_cpu(matrix, bottom);
    assert!(tex_top.y < tex_bottom.y);
    assert!((tex_top.z - ndc_top.z).abs() < EPSILON);
}

#[test]
fn sun_cascade_splits_reach_the_far_plane() {
    let mut scene = Scene::new(camera());
    scene.add_light(Light::sun(
        Transform::looking_at(Vec3::new(0.4, 1.0, 0.2), Vec3::ZERO),
        Vec3::ONE,
    ));
    let lights = load(&scene);

    let splits = lights.uniform().cascade_splits[0];
    assert!(splits.windows(2).all(|pair| pair[0] < pair[1]), "{splits:?}");
    let (_, far) = scene.camera.clip_range();
    assert!((splits[SUN_CASCADES - 1] - far).abs() < 1e-2);
    assert_eq!(lights.uniform().counts[1], SUN_CASCADES as u32);

    // Every point of the visible ground lands in some cascade.
    for x in [-1.0, 0.0, 1.0] {
        let point = Vec3::new(x, 0.0, 0.0);
        let covered = lights
            .sun_matrices
            .iter()
            .any(|(view, projection)| inside_map(project_shadow_cpu(*projection * *view, point)));
        assert!(covered, "{point:?}");
    }
}

#[test]
fn point_shadow_faces_cover_every_direction() {
    let mut scene = Scene::new(camera());
    let center = Vec3::new(1.0, 2.0, 3.0);
    scene.add_light(Light::point(Transform::from_translation(center), Vec3::ONE, 10.0));
    let lights = load(&scene);
    assert_eq!(lights.point_matrices.len(), 6);

    let dirs = [
        Vec3::X,
        Vec3::NEG_X,
        Vec3::Y,
        Vec3::NEG_Y,
        Vec3::Z,
        Vec3::NEG_Z,
    ];
    for (face, dir) in dirs.into_iter().enumerate() {
        let matrix = uniform_matrix(&lights.uniform().point_matrices[face]);
        let projected = project_shadow_cpu(matrix, center + dir * 4.0);
        assert!(inside_map(projected), "face {face}: {projected:?}");
        assert!((projected.x - 0.5).abs() < EPSILON && (projected.y - 0.5).abs() < EPSILON);
    }
}

#[test]
fn lights_past_capacity_are_dropped() {
    let mut scene = Scene::new(camera());
    for _ in 0..MAX_LIGHTS + 4 {
        scene.add_light(spot_above_origin());
    }
    let lights = load(&scene);

    assert_eq!(lights.light_count(), MAX_LIGHTS);
    assert_eq!(lights.spot_matrices.len(), MAX_SPOTS);
    let uniform = lights.uniform();
    assert_eq!(uniform.lights[MAX_SPOTS - 1].shadow_index, (MAX_SPOTS - 1) as i32);
    assert_eq!(uniform.lights[MAX_SPOTS].shadow_index, -1);
}
