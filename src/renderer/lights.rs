use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::renderer::backend::GpuBackend;
use crate::scene::transform::safe_normalize;
use crate::scene::{Camera, Light, LightKind, Scene};

pub const MAX_LIGHTS: usize = 32;
pub const MAX_SPOTS: usize = 16;
pub const MAX_SUNS: usize = 8;
pub const MAX_POINTS: usize = 16;
pub const SUN_CASCADES: usize = 4;
pub const POINT_FACES: usize = 6;

const MAX_SUN_MATRICES: usize = 32;
const MAX_POINT_MATRICES: usize = 96;

const SHADOW_NEAR: f32 = 0.01;

/// `(camera, projection)` pair a shadow map is rendered with.
pub type ShadowMatrix = (Mat4, Mat4);

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LightRaw {
    /// rgb color, radius in w.
    pub color: [f32; 4],
    pub position: [f32; 4],
    pub direction: [f32; 4],
    pub kind: u32,
    /// First matrix/layer of this light in its family's shadow arrays, -1
    /// when the light casts no shadow.
    pub shadow_index: i32,
    pub spot_angle: f32,
    pub spot_blend: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct LightsUniform {
    pub lights: [LightRaw; MAX_LIGHTS],
    pub spot_matrices: [[[f32; 4]; 4]; MAX_SPOTS],
    pub sun_matrices: [[[f32; 4]; 4]; MAX_SUN_MATRICES],
    pub point_matrices: [[[f32; 4]; 4]; MAX_POINT_MATRICES],
    /// Far distance of each cascade, one vec4 per sun.
    pub cascade_splits: [[f32; 4]; MAX_SUNS],
    /// x: light count, y: cascades per sun.
    pub counts: [u32; 4],
}

impl Default for LightsUniform {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Scene lights plus the shadow matrix lists of every light family.
pub struct LightsBuffer {
    pub spot_matrices: Vec<ShadowMatrix>,
    pub sun_matrices: Vec<ShadowMatrix>,
    pub point_matrices: Vec<ShadowMatrix>,
    uniform: Box<LightsUniform>,
}

impl Default for LightsBuffer {
    fn default() -> Self {
        Self {
            spot_matrices: Vec::new(),
            sun_matrices: Vec::new(),
            point_matrices: Vec::new(),
            uniform: Box::new(LightsUniform::zeroed()),
        }
    }
}

impl LightsBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<B: GpuBackend>(
        &mut self,
        scene: &Scene<B>,
        cascades: usize,
        cascades_distribution_exponent: f32,
    ) {
        let cascades = cascades.clamp(1, SUN_CASCADES);
        self.spot_matrices.clear();
        self.sun_matrices.clear();
        self.point_matrices.clear();
        *self.uniform = LightsUniform::zeroed();

        let mut count = 0usize;
        for light in &scene.lights {
            if count == MAX_LIGHTS {
                log::warn!(
                    "Scene has {} lights, only the first {} are rendered",
                    scene.lights.len(),
                    MAX_LIGHTS
                );
                break;
            }

            let shadow_index = match light.kind {
                LightKind::Spot { angle, .. } if self.spot_matrices.len() < MAX_SPOTS => {
                    let index = self.spot_matrices.len();
                    self.spot_matrices.push(build_spot_shadow(light, angle));
                    Some(index)
                }
                LightKind::Sun if self.sun_matrices.len() / cascades < MAX_SUNS => {
                    let sun = self.sun_matrices.len() / cascades;
                    let index = self.sun_matrices.len();
                    let (matrices, splits) = build_sun_cascades(
                        &scene.camera,
                        light.transform.forward(),
                        cascades,
                        cascades_distribution_exponent,
                    );
                    self.sun_matrices.extend(matrices);
                    for (slot, split) in self.uniform.cascade_splits[sun].iter_mut().zip(splits) {
                        *slot = split;
                    }
                    Some(index)
                }
                LightKind::Point if self.point_matrices.len() + POINT_FACES <= MAX_POINT_MATRICES => {
                    let index = self.point_matrices.len();
                    self.point_matrices.extend(build_point_shadow(
                        light.transform.translation,
                        light.radius,
                    ));
                    Some(index)
                }
                _ => {
                    log::warn!("Shadow capacity exceeded, light {} casts no shadow", count);
                    None
                }
            };

            self.uniform.lights[count] = light_raw(light, shadow_index);
            count += 1;
        }

        write_matrices(&mut self.uniform.spot_matrices, &self.spot_matrices);
        write_matrices(&mut self.uniform.sun_matrices, &self.sun_matrices);
        write_matrices(&mut self.uniform.point_matrices, &self.point_matrices);
        self.uniform.counts = [count as u32, cascades as u32, 0, 0];

        log::trace!(
            "Loaded {} lights ({} spot, {} sun, {} point shadow matrices)",
            count,
            self.spot_matrices.len(),
            self.sun_matrices.len(),
            self.point_matrices.len()
        );
    }

    pub fn uniform(&self) -> &LightsUniform {
        &self.uniform
    }

    pub fn light_count(&self) -> usize {
        self.uniform.counts[0] as usize
    }
}

fn write_matrices(slots: &mut [[[f32; 4]; 4]], matrices: &[ShadowMatrix]) {
    for (slot, (camera, projection)) in slots.iter_mut().zip(matrices) {
        *slot = (*projection * *camera).to_cols_array_2d();
    }
}

fn light_raw<B: GpuBackend>(light: &Light<B>, shadow_index: Option<usize>) -> LightRaw {
    let (spot_angle, spot_blend) = match light.kind {
        LightKind::Spot { angle, blend } => (angle, blend),
        _ => (0.0, 0.0),
    };
    LightRaw {
        color: light.color.extend(light.radius).to_array(),
        position: light.transform.translation.extend(1.0).to_array(),
        direction: light.transform.forward().extend(0.0).to_array(),
        kind: light.kind.index(),
        shadow_index: shadow_index.map_or(-1, |index| index as i32),
        spot_angle,
        spot_blend,
    }
}

pub(crate) fn build_spot_shadow<B: GpuBackend>(light: &Light<B>, angle: f32) -> ShadowMatrix {
    let far = light.radius.max(SHADOW_NEAR + 0.1);
    let fov = angle.clamp(0.1, std::f32::consts::PI - 0.1);

    let position = light.transform.translation;
    let forward = light.transform.forward();
    let mut up = light.transform.up();

    let mut right = forward.cross(up);
    if right.length_squared() < 1e-8 {
        let fallback = if forward.dot(Vec3::X).abs() < 0.9 {
            Vec3::X
        } else {
            Vec3::Y
        };
        right = forward.cross(fallback);
    }
    right = right.normalize();
    up = right.cross(forward).normalize();

    let camera = Mat4::look_at_rh(position, position + forward, up);
    let projection = Mat4::perspective_rh(fov, 1.0, SHADOW_NEAR, far);
    (camera, projection)
}

pub(crate) fn build_point_shadow(position: Vec3, radius: f32) -> [ShadowMatrix; POINT_FACES] {
    use std::f32::consts::FRAC_PI_2;

    let far = radius.max(SHADOW_NEAR + 0.1);
    let projection = Mat4::perspective_rh(FRAC_PI_2, 1.0, SHADOW_NEAR, far);

    let dirs = [
        Vec3::X,
        Vec3::NEG_X,
        Vec3::Y,
        Vec3::NEG_Y,
        Vec3::Z,
        Vec3::NEG_Z,
    ];
    let ups = [Vec3::Y, Vec3::Y, Vec3::Z, Vec3::NEG_Z, Vec3::Y, Vec3::Y];

    let mut matrices = [(Mat4::IDENTITY, projection); POINT_FACES];
    for ((matrix, dir), up) in matrices.iter_mut().zip(dirs.iter()).zip(ups.iter()) {
        matrix.0 = Mat4::look_at_rh(position, position + *dir, *up);
    }
    matrices
}

/// View distance at which cascade boundary `t` (0..=1) sits. The exponent is
/// the base of an exponential distribution; values <= 1 split linearly.
pub fn cascade_split(near: f32, far: f32, t: f32, exponent: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if exponent <= 1.0 + f32::EPSILON {
        return near + (far - near) * t;
    }
    near + (far - near) * ((exponent.powf(t) - 1.0) / (exponent - 1.0))
}

/// Orthographic cascades fitted around consecutive slices of the camera
/// frustum. Returns the matrices and each cascade's far distance.
pub fn build_sun_cascades(
    camera: &Camera,
    direction: Vec3,
    cascades: usize,
    exponent: f32,
) -> (Vec<ShadowMatrix>, Vec<f32>) {
    let direction = safe_normalize(direction, Vec3::NEG_Y);
    let up = if direction.dot(Vec3::Y).abs() > 0.95 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let light_view = Mat4::look_at_rh(Vec3::ZERO, direction, up);
    let (near, far) = camera.clip_range();

    let mut matrices = Vec::with_capacity(cascades);
    let mut splits = Vec::with_capacity(cascades);
    for i in 0..cascades {
        let slice_near = cascade_split(near, far, i as f32 / cascades as f32, exponent);
        let slice_far = cascade_split(near, far, (i + 1) as f32 / cascades as f32, exponent);

        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for corner in camera.frustum_slice(slice_near, slice_far) {
            let p = light_view.transform_point3(corner);
            min = min.min(p);
            max = max.max(p);
        }

        // Casters in front of the slice are kept by depth clamping.
        let projection = Mat4::orthographic_rh(min.x, max.x, min.y, max.y, -max.z, -min.z);
        matrices.push((light_view, projection));
        splits.push(slice_far);
    }
    (matrices, splits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lights_uniform_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<LightRaw>(), 64);
        assert_eq!(std::mem::size_of::<LightsUniform>() % 16, 0);
    }

    #[test]
    fn cascade_splits_cover_clip_range() {
        for exponent in [0.0, 1.0, 21.0] {
            assert!((cascade_split(0.1, 100.0, 0.0, exponent) - 0.1).abs() < 1e-5);
            assert!((cascade_split(0.1, 100.0, 1.0, exponent) - 100.0).abs() < 1e-3);
        }
    }

    #[test]
    fn higher_exponent_moves_splits_towards_camera() {
        let linear = cascade_split(0.1, 100.0, 0.25, 1.0);
        let skewed = cascade_split(0.1, 100.0, 0.25, 21.0);
        assert!(skewed < linear, "{skewed} >= {linear}");
    }

    #[test]
    fn sun_cascades_contain_their_frustum_slice() {
        let camera = Camera::look_at(Vec3::new(0.0, 3.0, 10.0), Vec3::ZERO, 1.0, 1.0, 0.1, 50.0);
        let direction = Vec3::new(0.3, -1.0, -0.4);
        let (matrices, splits) = build_sun_cascades(&camera, direction, 4, 21.0);
        assert_eq!(matrices.len(), 4);
        assert!(splits.windows(2).all(|pair| pair[0] < pair[1]));

        let mut slice_near = camera.clip_range().0;
        for ((view, projection), slice_far) in matrices.iter().zip(&splits) {
            for corner in camera.frustum_slice(slice_near, *slice_far) {
                let ndc = (*projection * *view).project_point3(corner);
                assert!(ndc.x.abs() <= 1.0 + 1e-3 && ndc.y.abs() <= 1.0 + 1e-3, "{ndc:?}");
                assert!(ndc.z >= -1e-3 && ndc.z <= 1.0 + 1e-3, "{ndc:?}");
            }
            slice_near = *slice_far;
        }
    }

    #[test]
    fn point_shadow_faces_look_down_each_axis() {
        let position = Vec3::new(-3.0, 4.5, 1.0);
        let faces = build_point_shadow(position, 12.0);
        let dirs = [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
        ];
        for ((camera, _), dir) in faces.iter().zip(dirs) {
            let dir_in_view = camera.transform_vector3(dir).normalize();
            assert!(dir_in_view.abs_diff_eq(Vec3::NEG_Z, 1e-5));
        }
    }
}
