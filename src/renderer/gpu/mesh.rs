use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::vertex::Vertex;

/// CPU side geometry, uploaded with `WgpuBackend::create_mesh`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Axis aligned cube of edge `size` centred on the origin, 4 vertices
    /// per face so normals stay flat.
    pub fn cube(size: f32) -> Self {
        let h = size * 0.5;
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];

        let mut mesh = Self::default();
        for (normal, u, w) in faces {
            mesh.push_quad(normal * h, u * h, w * h, normal);
        }
        mesh
    }

    /// Square in the XZ plane facing +Y.
    pub fn plane(size: f32) -> Self {
        let h = size * 0.5;
        let mut mesh = Self::default();
        mesh.push_quad(Vec3::ZERO, Vec3::X * h, Vec3::NEG_Z * h, Vec3::Y);
        mesh
    }

    /// Square in the XY plane facing +Z.
    pub fn quad(size: f32) -> Self {
        let h = size * 0.5;
        let mut mesh = Self::default();
        mesh.push_quad(Vec3::ZERO, Vec3::X * h, Vec3::Y * h, Vec3::Z);
        mesh
    }

    fn push_quad(&mut self, center: Vec3, u: Vec3, w: Vec3, normal: Vec3) {
        let base = self.vertices.len() as u32;
        self.vertices.extend(
            [center - u - w, center + u - w, center + u + w, center - u + w]
                .map(|corner| Vertex::new(corner, normal)),
        );
        self.indices
            .extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

/// Per-mesh block bound at `@group(2) @binding(0)`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    /// x: surface ID written by the pre-pass.
    pub id: [f32; 4],
}

impl ObjectUniform {
    pub fn new(model: Mat4, id: u32) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            id: [id as f32, 0.0, 0.0, 0.0],
        }
    }
}

/// Uploaded geometry plus its object uniform.
pub struct WgpuMesh {
    pub(crate) label: String,
    pub(crate) vertices: wgpu::Buffer,
    pub(crate) indices: wgpu::Buffer,
    pub(crate) index_count: u32,
    pub(crate) object: wgpu::BindGroup,
    pub(crate) id: u32,
}

impl WgpuMesh {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_faces_point_outwards() {
        let cube = MeshData::cube(2.0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);

        for triangle in cube.indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| Vec3::from(cube.vertices[triangle[i] as usize].position));
            let face_normal = (b - a).cross(c - a).normalize();
            let stored = Vec3::from(cube.vertices[triangle[0] as usize].normal);
            assert!(face_normal.dot(stored) > 0.99, "{face_normal} vs {stored}");
            assert!((a.abs().max_element() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn plane_faces_up() {
        let plane = MeshData::plane(4.0);
        let [a, b, c] = [0, 1, 2].map(|i| Vec3::from(plane.vertices[plane.indices[i] as usize].position));
        assert!((b - a).cross(c - a).normalize().abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn object_uniform_carries_id() {
        let object = ObjectUniform::new(Mat4::IDENTITY, 7);
        assert_eq!(object.id[0], 7.0);
        assert_eq!(std::mem::size_of::<ObjectUniform>(), 80);
    }
}
