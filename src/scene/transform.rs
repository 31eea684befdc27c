use glam::{Mat4, Quat, Vec3};

/// Placement of a light or object. Lights shine along their local -Z axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_trs(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// A transform at `position` whose -Z axis points towards `target`.
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let direction = safe_normalize(target - position, Vec3::NEG_Z);
        Self {
            translation: position,
            rotation: Quat::from_rotation_arc(Vec3::NEG_Z, direction),
            scale: Vec3::ONE,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn forward(&self) -> Vec3 {
        safe_normalize(self.rotation * Vec3::NEG_Z, Vec3::NEG_Z)
    }

    pub fn up(&self) -> Vec3 {
        safe_normalize(self.rotation * Vec3::Y, Vec3::Y)
    }
}

pub(crate) fn safe_normalize(vec: Vec3, fallback: Vec3) -> Vec3 {
    if vec.length_squared() > 1e-6 {
        vec.normalize()
    } else {
        fallback
    }
}
