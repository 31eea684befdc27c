use std::sync::Arc;

use crate::renderer::backend::{Resolution, TextureFormat};

pub(crate) const TEXTURE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

pub(crate) fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

/// How a texture is declared in WGSL, which decides its bind group layout
/// entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum BindingKind {
    Float,
    Depth,
    FloatArray,
    DepthArray,
}

impl BindingKind {
    pub(crate) fn layout_entry(self, binding: u32) -> wgpu::BindGroupLayoutEntry {
        let (sample_type, view_dimension) = match self {
            BindingKind::Float => (
                wgpu::TextureSampleType::Float { filterable: false },
                wgpu::TextureViewDimension::D2,
            ),
            BindingKind::Depth => (
                wgpu::TextureSampleType::Depth,
                wgpu::TextureViewDimension::D2,
            ),
            BindingKind::FloatArray => (
                wgpu::TextureSampleType::Float { filterable: false },
                wgpu::TextureViewDimension::D2Array,
            ),
            BindingKind::DepthArray => (
                wgpu::TextureSampleType::Depth,
                wgpu::TextureViewDimension::D2Array,
            ),
        };
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type,
                view_dimension,
                multisampled: false,
            },
            count: None,
        }
    }
}

/// A 2D texture, a whole texture array, or one layer of an array. Cloning
/// shares the GPU allocation.
#[derive(Clone)]
pub struct WgpuTexture {
    texture: Arc<wgpu::Texture>,
    view: Arc<wgpu::TextureView>,
    format: TextureFormat,
    resolution: Resolution,
    base_layer: u32,
    is_array: bool,
}

impl WgpuTexture {
    pub(crate) fn new(
        device: &wgpu::Device,
        label: &str,
        resolution: Resolution,
        format: TextureFormat,
    ) -> Self {
        let texture = Arc::new(create(device, label, resolution, format, 1));
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view: Arc::new(view),
            format,
            resolution,
            base_layer: 0,
            is_array: false,
        }
    }

    /// The array handle followed by one handle per layer.
    pub(crate) fn new_array(
        device: &wgpu::Device,
        label: &str,
        resolution: Resolution,
        format: TextureFormat,
        layers: u32,
    ) -> (Self, Vec<Self>) {
        let layers = layers.max(1);
        let texture = Arc::new(create(device, label, resolution, format, layers));
        let array_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            base_array_layer: 0,
            array_layer_count: Some(layers),
            ..Default::default()
        });
        let array = Self {
            texture: texture.clone(),
            view: Arc::new(array_view),
            format,
            resolution,
            base_layer: 0,
            is_array: true,
        };

        let layer_handles = (0..layers)
            .map(|layer| {
                let view = texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(label),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                });
                Self {
                    texture: texture.clone(),
                    view: Arc::new(view),
                    format,
                    resolution,
                    base_layer: layer,
                    is_array: false,
                }
            })
            .collect();

        (array, layer_handles)
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn is_array(&self) -> bool {
        self.is_array
    }

    pub(crate) fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub(crate) fn raw_format(&self) -> wgpu::TextureFormat {
        wgpu_format(self.format)
    }

    pub(crate) fn binding_kind(&self) -> BindingKind {
        match (self.format.is_depth(), self.is_array) {
            (false, false) => BindingKind::Float,
            (true, false) => BindingKind::Depth,
            (false, true) => BindingKind::FloatArray,
            (true, true) => BindingKind::DepthArray,
        }
    }

    /// Copy location of this handle's first layer.
    pub(crate) fn copy_info(&self) -> wgpu::TexelCopyTextureInfo<'_> {
        wgpu::TexelCopyTextureInfo {
            texture: &self.texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: self.base_layer,
            },
            aspect: if self.format.is_depth() {
                wgpu::TextureAspect::DepthOnly
            } else {
                wgpu::TextureAspect::All
            },
        }
    }

    pub(crate) fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.resolution.width,
            height: self.resolution.height,
            depth_or_array_layers: 1,
        }
    }
}

fn create(
    device: &wgpu::Device,
    label: &str,
    resolution: Resolution,
    format: TextureFormat,
    layers: u32,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: resolution.width.max(1),
            height: resolution.height.max(1),
            depth_or_array_layers: layers,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu_format(format),
        usage: TEXTURE_USAGE,
        view_formats: &[],
    })
}

/// Bytes of one texel as read back by `WgpuBackend::read_texture`.
pub(crate) fn texel_size(format: TextureFormat) -> u32 {
    match format {
        TextureFormat::Rgba32Float => 16,
        TextureFormat::R32Float | TextureFormat::Depth32Float => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_arrays_bind_as_depth_arrays() {
        let entry = BindingKind::DepthArray.layout_entry(12);
        assert_eq!(entry.binding, 12);
        assert!(matches!(
            entry.ty,
            wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                view_dimension: wgpu::TextureViewDimension::D2Array,
                ..
            }
        ));
    }

    #[test]
    fn texel_sizes_match_formats() {
        assert_eq!(texel_size(TextureFormat::Rgba32Float), 16);
        assert_eq!(texel_size(TextureFormat::R32Float), 4);
    }
}
