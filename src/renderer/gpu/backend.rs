//! [`GpuBackend`] on top of wgpu.
//!
//! Every operation records its own command encoder and submits it right
//! away, so uniform writes made through the queue land between submissions
//! in program order. Pipelines and texture bind group layouts are cached by
//! everything that makes them differ: shader, attachment formats, bound
//! texture kinds and depth clamping.

use std::collections::HashMap;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use super::context::GpuContext;
use super::mesh::{MeshData, ObjectUniform, WgpuMesh};
use super::pipeline_builder::PipelineBuilder;
use super::texture::{texel_size, BindingKind, WgpuTexture};
use super::vertex::Vertex;
use crate::error::{PipelineError, Result};
use crate::renderer::backend::{
    GpuBackend, Resolution, ScenePass, ScreenPass, ShaderBindings, ShaderSource, TextureFormat,
    TextureSlot, UniformBlocks,
};
use crate::renderer::lights::LightsUniform;
use crate::renderer::uniforms::{CommonUniforms, MaterialUniform, PassParams};
use crate::scene::{PassName, Transform};

const ACCUMULATE_LABEL: &str = "accumulate";
const SHADOW_CONSTANT_BIAS: i32 = 2;
const SHADOW_SLOPE_BIAS: f32 = 2.0;

/// Which entry points and fixed function state a compiled shader uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ShaderStage {
    PrePass,
    MainPass,
    ShadowPass,
    Screen,
}

impl ShaderStage {
    fn from_defines(defines: &[&str]) -> Self {
        let defined = |pass: PassName| defines.contains(&pass.as_str());
        if defined(PassName::PrePass) {
            ShaderStage::PrePass
        } else if defined(PassName::MainPass) {
            ShaderStage::MainPass
        } else if defined(PassName::ShadowPass) {
            ShaderStage::ShadowPass
        } else {
            ShaderStage::Screen
        }
    }

    fn is_scene(self) -> bool {
        self != ShaderStage::Screen
    }

    fn vertex_entry(self) -> &'static str {
        match self {
            ShaderStage::Screen => "vs_fullscreen",
            _ => "vs_main",
        }
    }

    fn fragment_entry(self, code: &str) -> Option<&'static str> {
        match self {
            ShaderStage::PrePass => Some("fs_pre_pass"),
            ShaderStage::MainPass => Some("fs_main_pass"),
            ShaderStage::ShadowPass => {
                code.contains("fn fs_shadow_pass").then_some("fs_shadow_pass")
            }
            ShaderStage::Screen => Some("fs_main"),
        }
    }
}

pub struct WgpuShader {
    id: u64,
    label: String,
    module: wgpu::ShaderModule,
    stage: ShaderStage,
    fragment_entry: Option<&'static str>,
}

impl WgpuShader {
    pub fn label(&self) -> &str {
        &self.label
    }
}

pub struct WgpuRenderTarget {
    label: String,
    resolution: Resolution,
    colors: Vec<WgpuTexture>,
    depth: Option<WgpuTexture>,
}

impl WgpuRenderTarget {
    pub fn label(&self) -> &str {
        &self.label
    }
}

type LayoutKey = Vec<(u32, BindingKind)>;

#[derive(Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    shader: u64,
    colors: Vec<wgpu::TextureFormat>,
    depth: Option<wgpu::TextureFormat>,
    unclipped_depth: bool,
    textures: LayoutKey,
}

struct UniformBuffers {
    common: wgpu::Buffer,
    lights: wgpu::Buffer,
    params: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

pub struct WgpuBackend {
    context: GpuContext,
    object_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    globals_layout: wgpu::BindGroupLayout,
    uniforms: UniformBuffers,
    texture_layouts: HashMap<LayoutKey, Arc<wgpu::BindGroupLayout>>,
    pipelines: HashMap<PipelineKey, Arc<wgpu::RenderPipeline>>,
    accumulate_shader: Option<Arc<WgpuShader>>,
    accumulate_scratch: Option<WgpuTexture>,
    depth_clamp: bool,
    next_shader_id: u64,
}

fn uniform_entry(binding: u32, size: usize) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(size as u64),
        },
        count: None,
    }
}

fn uniform_buffer(device: &wgpu::Device, label: &str, size: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl WgpuBackend {
    /// Creates a backend on a new headless device.
    pub fn headless() -> Result<Self> {
        Self::new(GpuContext::blocking()?)
    }

    pub fn new(context: GpuContext) -> Result<Self> {
        use std::mem::size_of;

        let device = &context.device;
        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("globals"),
            entries: &[
                uniform_entry(0, size_of::<CommonUniforms>()),
                uniform_entry(1, size_of::<LightsUniform>()),
                uniform_entry(2, size_of::<PassParams>()),
            ],
        });
        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object"),
            entries: &[uniform_entry(0, size_of::<ObjectUniform>())],
        });
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material"),
            entries: &[uniform_entry(0, size_of::<MaterialUniform>())],
        });

        let common = uniform_buffer(device, "common", size_of::<CommonUniforms>());
        let lights = uniform_buffer(device, "lights", size_of::<LightsUniform>());
        let params = uniform_buffer(device, "params", size_of::<PassParams>());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals"),
            layout: &globals_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: common.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params.as_entire_binding(),
                },
            ],
        });

        let mut backend = Self {
            context,
            object_layout,
            material_layout,
            globals_layout,
            uniforms: UniformBuffers {
                common,
                lights,
                params,
                bind_group,
            },
            texture_layouts: HashMap::new(),
            pipelines: HashMap::new(),
            accumulate_shader: None,
            accumulate_scratch: None,
            depth_clamp: false,
            next_shader_id: 0,
        };

        let accumulate = ShaderSource::new(
            ACCUMULATE_LABEL,
            include_str!("../../shader/accumulate.wgsl"),
        );
        backend.accumulate_shader = Some(Arc::new(backend.compile_shader(&accumulate, &[])?));

        log::info!("Created wgpu backend");
        Ok(backend)
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Uploads `data` as a mesh drawn at `transform`. `id` is the surface ID
    /// written by the pre-pass and must be non-zero, zero marks background.
    pub fn create_mesh(
        &mut self,
        label: &str,
        data: &MeshData,
        transform: &Transform,
        id: u32,
    ) -> WgpuMesh {
        if id == 0 {
            log::warn!("Mesh `{}` uses surface ID 0, which is reserved for background", label);
        }
        let device = &self.context.device;
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let object_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(&ObjectUniform::new(transform.matrix(), id)),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let object = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: object_buffer.as_entire_binding(),
            }],
        });

        WgpuMesh {
            label: label.to_owned(),
            vertices,
            indices,
            index_count: data.indices.len() as u32,
            object,
            id,
        }
    }

    /// Reads a texture back to the CPU, row major, one `f32` per channel.
    pub fn read_texture(&self, texture: &WgpuTexture) -> Result<Vec<f32>> {
        let resolution = texture.resolution();
        let unpadded = resolution.width * texel_size(texture.format());
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size: padded as u64 * resolution.height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.context.encoder("readback");
        encoder.copy_texture_to_buffer(
            texture.copy_info(),
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(resolution.height),
                },
            },
            texture.extent(),
        );
        self.context.submit(encoder);

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.context
            .device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|err| PipelineError::Gpu(err.to_string()))?;
        rx.recv()
            .map_err(|err| PipelineError::Gpu(err.to_string()))?
            .map_err(|err| PipelineError::Gpu(err.to_string()))?;

        let texels = {
            let data = slice.get_mapped_range();
            let mut texels = Vec::with_capacity(resolution.pixel_count() * 4);
            for row in data.chunks(padded as usize) {
                texels.extend(bytemuck::pod_collect_to_vec::<u8, f32>(&row[..unpadded as usize]));
            }
            texels
        };
        buffer.unmap();
        Ok(texels)
    }

    fn write_uniforms(&self, uniforms: &UniformBlocks<'_>) {
        let queue = &self.context.queue;
        queue.write_buffer(&self.uniforms.common, 0, bytemuck::bytes_of(uniforms.common));
        queue.write_buffer(&self.uniforms.lights, 0, bytemuck::bytes_of(uniforms.lights));
        queue.write_buffer(&self.uniforms.params, 0, bytemuck::bytes_of(&uniforms.params));
    }

    fn texture_layout(&mut self, key: &LayoutKey) -> Arc<wgpu::BindGroupLayout> {
        if let Some(layout) = self.texture_layouts.get(key) {
            return layout.clone();
        }
        let entries: Vec<_> = key
            .iter()
            .map(|(binding, kind)| kind.layout_entry(*binding))
            .collect();
        let layout = Arc::new(self.context.device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: Some("textures"),
                entries: &entries,
            },
        ));
        self.texture_layouts.insert(key.clone(), layout.clone());
        layout
    }

    fn texture_group(
        &mut self,
        label: &str,
        textures: &ShaderBindings<WgpuTexture>,
    ) -> (LayoutKey, Arc<wgpu::BindGroupLayout>, wgpu::BindGroup) {
        let mut bound: Vec<(u32, &WgpuTexture)> = textures
            .iter()
            .map(|(slot, texture)| (slot.binding(), texture))
            .collect();
        bound.sort_by_key(|(binding, _)| *binding);

        let key: LayoutKey = bound
            .iter()
            .map(|(binding, texture)| (*binding, texture.binding_kind()))
            .collect();
        let layout = self.texture_layout(&key);

        let entries: Vec<_> = bound
            .iter()
            .map(|(binding, texture)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::TextureView(texture.view()),
            })
            .collect();
        let bind_group = self
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &entries,
            });
        (key, layout, bind_group)
    }

    fn material_group(&self, material: &MaterialUniform) -> wgpu::BindGroup {
        let device = &self.context.device;
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("material"),
            contents: bytemuck::bytes_of(material),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material"),
            layout: &self.material_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    fn pipeline(
        &mut self,
        shader: &WgpuShader,
        target: &WgpuRenderTarget,
        textures: &LayoutKey,
        textures_layout: &wgpu::BindGroupLayout,
    ) -> Result<Arc<wgpu::RenderPipeline>> {
        let unclipped_depth = shader.stage == ShaderStage::ShadowPass
            && self.depth_clamp
            && self.context.supports_depth_clamp;
        let key = PipelineKey {
            shader: shader.id,
            colors: target.colors.iter().map(WgpuTexture::raw_format).collect(),
            depth: target.depth.as_ref().map(WgpuTexture::raw_format),
            unclipped_depth,
            textures: textures.clone(),
        };
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Ok(pipeline.clone());
        }

        let scene_layouts = [
            &self.globals_layout,
            textures_layout,
            &self.object_layout,
            &self.material_layout,
        ];
        let bind_group_layouts: &[&wgpu::BindGroupLayout] = if shader.stage.is_scene() {
            &scene_layouts
        } else {
            &scene_layouts[..2]
        };
        let color_formats: &[wgpu::TextureFormat] = match shader.fragment_entry {
            Some(_) => &key.colors,
            None => &[],
        };

        let pipeline = self
            .context
            .validated(|device| {
                let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(&shader.label),
                    bind_group_layouts,
                    push_constant_ranges: &[],
                });
                let mut builder = PipelineBuilder::new(device, &layout, &shader.module)
                    .with_label(&shader.label)
                    .with_vertex_entry(shader.stage.vertex_entry())
                    .with_fragment_entry(shader.fragment_entry)
                    .with_color_targets(color_formats)
                    .with_unclipped_depth(unclipped_depth);
                if shader.stage.is_scene() {
                    builder = builder.with_vertex_buffer(Vertex::layout());
                }
                if let Some(depth) = key.depth {
                    use wgpu::CompareFunction;
                    builder = match shader.stage {
                        ShaderStage::PrePass => {
                            builder.with_depth_stencil(depth, true, CompareFunction::Less)
                        }
                        ShaderStage::MainPass => {
                            builder.with_depth_stencil(depth, false, CompareFunction::LessEqual)
                        }
                        ShaderStage::ShadowPass => builder.with_depth_stencil_biased(
                            depth,
                            CompareFunction::Less,
                            SHADOW_CONSTANT_BIAS,
                            SHADOW_SLOPE_BIAS,
                        ),
                        ShaderStage::Screen => {
                            builder.with_depth_stencil(depth, false, CompareFunction::Always)
                        }
                    };
                }
                builder.build()
            })
            .map_err(|message| PipelineError::ShaderCompilation {
                label: shader.label.clone(),
                message,
            })?;

        log::debug!("Created pipeline for `{}` into `{}`", shader.label, target.label);
        let pipeline = Arc::new(pipeline);
        self.pipelines.insert(key, pipeline.clone());
        Ok(pipeline)
    }

    fn fullscreen(
        &mut self,
        label: &str,
        shader: &WgpuShader,
        target: &WgpuRenderTarget,
        textures: &ShaderBindings<WgpuTexture>,
    ) -> Result<()> {
        if shader.stage.is_scene() {
            return Err(PipelineError::Gpu(format!(
                "mesh shader `{}` used for screen pass `{}`",
                shader.label, label
            )));
        }
        let (key, layout, texture_group) = self.texture_group(label, textures);
        let pipeline = self.pipeline(shader, target, &key, &layout)?;

        let mut encoder = self.context.encoder(label);
        {
            let mut pass = begin_pass(&mut encoder, label, target, &[], None);
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &self.uniforms.bind_group, &[]);
            pass.set_bind_group(1, &texture_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.context.submit(encoder);
        Ok(())
    }

    fn scratch_like(&mut self, texture: &WgpuTexture) -> WgpuTexture {
        if let Some(scratch) = self.accumulate_scratch.as_ref().filter(|scratch| {
            scratch.resolution() == texture.resolution() && scratch.format() == texture.format()
        }) {
            return scratch.clone();
        }
        let scratch = WgpuTexture::new(
            &self.context.device,
            "accumulate_scratch",
            texture.resolution(),
            texture.format(),
        );
        self.accumulate_scratch = Some(scratch.clone());
        scratch
    }
}

fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    label: &str,
    target: &WgpuRenderTarget,
    clear_colors: &[[f32; 4]],
    clear_depth: Option<f32>,
) -> wgpu::RenderPass<'e> {
    let color_attachments: Vec<_> = target
        .colors
        .iter()
        .enumerate()
        .map(|(index, texture)| {
            let load = match clear_colors.get(index) {
                Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                    r: *r as f64,
                    g: *g as f64,
                    b: *b as f64,
                    a: *a as f64,
                }),
                None => wgpu::LoadOp::Load,
            };
            Some(wgpu::RenderPassColorAttachment {
                view: texture.view(),
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })
        })
        .collect();

    let depth_stencil_attachment =
        target
            .depth
            .as_ref()
            .map(|depth| wgpu::RenderPassDepthStencilAttachment {
                view: depth.view(),
                depth_ops: Some(wgpu::Operations {
                    load: clear_depth.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            });

    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &color_attachments,
        depth_stencil_attachment,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

fn copy_texture(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    source: &WgpuTexture,
    destination: &WgpuTexture,
) -> Result<()> {
    if source.resolution() != destination.resolution() {
        return Err(PipelineError::AttachmentMismatch {
            label: label.to_owned(),
            expected: destination.resolution(),
            found: source.resolution(),
        });
    }
    if source.format() != destination.format() {
        return Err(PipelineError::Gpu(format!(
            "cannot copy {:?} into {:?} attachment of `{}`",
            source.format(),
            destination.format(),
            label
        )));
    }
    encoder.copy_texture_to_texture(source.copy_info(), destination.copy_info(), source.extent());
    Ok(())
}

impl GpuBackend for WgpuBackend {
    type Texture = WgpuTexture;
    type RenderTarget = WgpuRenderTarget;
    type Shader = WgpuShader;
    type Mesh = WgpuMesh;

    fn create_texture(
        &mut self,
        label: &str,
        resolution: Resolution,
        format: TextureFormat,
    ) -> Result<WgpuTexture> {
        if resolution.is_empty() {
            return Err(PipelineError::InvalidResolution(resolution));
        }
        Ok(WgpuTexture::new(&self.context.device, label, resolution, format))
    }

    fn create_texture_array(
        &mut self,
        label: &str,
        resolution: Resolution,
        format: TextureFormat,
        layers: u32,
    ) -> Result<(WgpuTexture, Vec<WgpuTexture>)> {
        if resolution.is_empty() {
            return Err(PipelineError::InvalidResolution(resolution));
        }
        Ok(WgpuTexture::new_array(
            &self.context.device,
            label,
            resolution,
            format,
            layers,
        ))
    }

    fn create_render_target(
        &mut self,
        label: &str,
        colors: &[&WgpuTexture],
        depth: Option<&WgpuTexture>,
    ) -> Result<WgpuRenderTarget> {
        let mut attachments = colors.iter().copied().chain(depth);
        let Some(first) = attachments.next() else {
            return Err(PipelineError::Gpu(format!(
                "render target `{label}` has no attachments"
            )));
        };
        let resolution = first.resolution();
        if let Some(other) = attachments.find(|texture| texture.resolution() != resolution) {
            return Err(PipelineError::AttachmentMismatch {
                label: label.to_owned(),
                expected: resolution,
                found: other.resolution(),
            });
        }

        Ok(WgpuRenderTarget {
            label: label.to_owned(),
            resolution,
            colors: colors.iter().map(|texture| (*texture).clone()).collect(),
            depth: depth.cloned(),
        })
    }

    fn target_resolution(&self, target: &WgpuRenderTarget) -> Resolution {
        target.resolution
    }

    fn clear(
        &mut self,
        target: &WgpuRenderTarget,
        colors: &[[f32; 4]],
        depth: Option<f32>,
        _stencil: Option<u32>,
    ) -> Result<()> {
        let mut encoder = self.context.encoder("clear");
        drop(begin_pass(&mut encoder, &target.label, target, colors, depth));
        self.context.submit(encoder);
        Ok(())
    }

    fn copy_textures(
        &mut self,
        target: &WgpuRenderTarget,
        colors: &[&WgpuTexture],
        depth: Option<&WgpuTexture>,
    ) -> Result<()> {
        if colors.len() > target.colors.len() {
            return Err(PipelineError::Gpu(format!(
                "copying {} colors into the {} attachments of `{}`",
                colors.len(),
                target.colors.len(),
                target.label
            )));
        }

        let mut encoder = self.context.encoder("copy_textures");
        for (source, destination) in colors.iter().zip(&target.colors) {
            copy_texture(&mut encoder, &target.label, source, destination)?;
        }
        if let Some(source) = depth {
            let Some(destination) = &target.depth else {
                return Err(PipelineError::Gpu(format!(
                    "render target `{}` has no depth attachment",
                    target.label
                )));
            };
            copy_texture(&mut encoder, &target.label, source, destination)?;
        }
        self.context.submit(encoder);
        Ok(())
    }

    fn compile_shader(&mut self, source: &ShaderSource, defines: &[&str]) -> Result<WgpuShader> {
        let stage = ShaderStage::from_defines(defines);
        let fragment_entry = stage.fragment_entry(&source.code);

        for entry in std::iter::once(stage.vertex_entry()).chain(fragment_entry) {
            if !source.code.contains(&format!("fn {entry}")) {
                return Err(PipelineError::ShaderCompilation {
                    label: source.label.to_string(),
                    message: format!("missing entry point `{entry}`"),
                });
            }
        }

        let label = if defines.is_empty() {
            source.label.to_string()
        } else {
            format!("{} [{}]", source.label, defines.join(" "))
        };
        let module = self
            .context
            .validated(|device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&label),
                    source: wgpu::ShaderSource::Wgsl(source.code.clone()),
                })
            })
            .map_err(|message| PipelineError::ShaderCompilation {
                label: source.label.to_string(),
                message,
            })?;

        self.next_shader_id += 1;
        log::debug!("Compiled shader `{}`", label);
        Ok(WgpuShader {
            id: self.next_shader_id,
            label,
            module,
            stage,
            fragment_entry,
        })
    }

    fn draw_pass(&mut self, pass: &ScenePass<'_, Self>) -> Result<()> {
        self.write_uniforms(&pass.uniforms);

        let mut draws = Vec::with_capacity(pass.batches.len());
        for batch in pass.batches {
            if batch.meshes.is_empty() {
                continue;
            }
            let shader = batch.shader(pass.pass).unwrap_or(pass.default_shader);
            if !shader.stage.is_scene() {
                return Err(PipelineError::Gpu(format!(
                    "screen shader `{}` used for {} of `{}`",
                    shader.label,
                    pass.pass,
                    batch.material_name()
                )));
            }

            let mut textures = pass.textures.clone();
            for binder in pass.binders {
                binder.apply(shader, &mut textures);
            }
            let (key, layout, texture_group) = self.texture_group(pass.label, &textures);
            let pipeline = self.pipeline(shader, pass.target, &key, &layout)?;
            let material =
                self.material_group(&MaterialUniform::from_material(batch.material.as_deref()));
            draws.push((pipeline, texture_group, material, *batch));
        }

        let mut encoder = self.context.encoder(pass.label);
        {
            let mut render_pass = begin_pass(&mut encoder, pass.label, pass.target, &[], None);
            render_pass.set_bind_group(0, &self.uniforms.bind_group, &[]);
            for (pipeline, texture_group, material, batch) in &draws {
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(1, texture_group, &[]);
                render_pass.set_bind_group(3, material, &[]);
                for mesh in &batch.meshes {
                    render_pass.set_bind_group(2, &mesh.object, &[]);
                    render_pass.set_vertex_buffer(0, mesh.vertices.slice(..));
                    render_pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
            }
        }
        self.context.submit(encoder);
        Ok(())
    }

    fn draw_screen_pass(&mut self, pass: &ScreenPass<'_, Self>) -> Result<()> {
        self.write_uniforms(&pass.uniforms);
        self.fullscreen(pass.label, pass.shader, pass.target, pass.textures)
    }

    fn blend_texture(
        &mut self,
        source: &WgpuTexture,
        target: &WgpuRenderTarget,
        weight: f32,
    ) -> Result<()> {
        let Some(accumulated) = target.colors.first() else {
            return Err(PipelineError::Gpu(format!(
                "render target `{}` has no color to blend into",
                target.label
            )));
        };
        let shader = self
            .accumulate_shader
            .clone()
            .ok_or_else(|| PipelineError::Gpu("accumulate shader missing".to_owned()))?;

        let scratch = self.scratch_like(accumulated);
        let mut encoder = self.context.encoder(ACCUMULATE_LABEL);
        copy_texture(&mut encoder, &target.label, accumulated, &scratch)?;
        self.context.submit(encoder);

        self.context.queue.write_buffer(
            &self.uniforms.params,
            0,
            bytemuck::bytes_of(&PassParams::scalar(weight)),
        );
        let textures = ShaderBindings::new()
            .with(TextureSlot::InColor, source.clone())
            .with(TextureSlot::InBack, scratch);
        self.fullscreen(ACCUMULATE_LABEL, &shader, target, &textures)
    }

    fn set_depth_clamp(&mut self, enabled: bool) {
        self.depth_clamp = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_defines_select_entry_points() {
        assert_eq!(
            ShaderStage::from_defines(&["IS_MESH_SHADER", "PRE_PASS"]),
            ShaderStage::PrePass
        );
        assert_eq!(
            ShaderStage::from_defines(&["IS_MESH_SHADER", "MAIN_PASS"]),
            ShaderStage::MainPass
        );
        assert_eq!(
            ShaderStage::from_defines(&["IS_LIGHT_SHADER"]),
            ShaderStage::Screen
        );
        assert_eq!(ShaderStage::MainPass.fragment_entry(""), Some("fs_main_pass"));
        assert_eq!(ShaderStage::Screen.vertex_entry(), "vs_fullscreen");
    }

    #[test]
    fn shadow_fragment_is_optional() {
        assert_eq!(ShaderStage::ShadowPass.fragment_entry("fn vs_main() {}"), None);
        assert_eq!(
            ShaderStage::ShadowPass.fragment_entry("fn fs_shadow_pass() {}"),
            Some("fs_shadow_pass")
        );
    }

    #[test]
    fn builtin_shaders_declare_their_entry_points() {
        let mesh = include_str!("../../shader/default.mesh.wgsl");
        for entry in ["fn vs_main", "fn fs_pre_pass", "fn fs_main_pass"] {
            assert!(mesh.contains(entry), "{entry}");
        }
        for screen in [
            include_str!("../../shader/accumulate.wgsl"),
            include_str!("../../shader/blend_transparency.wgsl"),
            include_str!("../../shader/line_composite.wgsl"),
            include_str!("../../shader/composite_depth.wgsl"),
        ] {
            assert!(screen.contains("fn vs_fullscreen") && screen.contains("fn fs_main"));
        }
    }
}
