use glam::{Mat4, Vec3, Vec4Swizzles};

/// The view being rendered, as the matrices the host computed for it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub view: Mat4,
    pub projection: Mat4,
}

impl Camera {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self { view, projection }
    }

    pub fn look_at(
        eye: Vec3,
        target: Vec3,
        fov_y_radians: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            projection: Mat4::perspective_rh(fov_y_radians, aspect, near, far),
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn position(&self) -> Vec3 {
        self.view.inverse().w_axis.xyz()
    }

    /// View space distances of the near and far clip planes.
    pub fn clip_range(&self) -> (f32, f32) {
        let inverse = self.projection.inverse();
        let near = inverse.project_point3(Vec3::new(0.0, 0.0, 0.0));
        let far = inverse.project_point3(Vec3::new(0.0, 0.0, 1.0));
        (-near.z, -far.z)
    }

    /// World space corners of the view frustum between the `near` and `far`
    /// view distances, near plane first.
    pub fn frustum_slice(&self, near: f32, far: f32) -> [Vec3; 8] {
        let (clip_near, clip_far) = self.clip_range();
        let inverse_projection = self.projection.inverse();
        let inverse_view = self.view.inverse();
        let span = (clip_far - clip_near).max(f32::EPSILON);

        let mut corners = [Vec3::ZERO; 8];
        let ndc = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        for (i, (x, y)) in ndc.into_iter().enumerate() {
            let a = inverse_projection.project_point3(Vec3::new(x, y, 0.0));
            let b = inverse_projection.project_point3(Vec3::new(x, y, 1.0));
            let t_near = (near - clip_near) / span;
            let t_far = (far - clip_near) / span;
            corners[i] = inverse_view.transform_point3(a.lerp(b, t_near));
            corners[i + 4] = inverse_view.transform_point3(a.lerp(b, t_far));
        }
        corners
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::look_at(
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::ZERO,
            60f32.to_radians(),
            16.0 / 9.0,
            0.1,
            100.0,
        )
    }
}
