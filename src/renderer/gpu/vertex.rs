use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Mesh vertex as read by `vs_main`: position at location 0, normal at
/// location 1. Materials shade flat colors so there are no texture
/// coordinates.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_two_packed_vec3() {
        let layout = Vertex::layout();
        assert_eq!(layout.array_stride, 24);
        assert_eq!(layout.attributes[1].offset, 12);
    }

    #[test]
    fn builtin_mesh_shader_reads_the_same_locations() {
        let source = include_str!("../../shader/default.mesh.wgsl");
        assert!(source.contains("@location(0) position: vec3<f32>"));
        assert!(source.contains("@location(1) normal: vec3<f32>"));
        assert!(!source.contains("@location(2) uv"));
    }
}
