use crate::error::{PipelineError, Result};

/// Bytes per sample of the widest attachment set the pipeline renders to:
/// three `Rgba32Float` main pass outputs.
const REQUIRED_ATTACHMENT_BYTES: u32 = 48;

/// Headless device and queue the backend submits to.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
    pub supports_depth_clamp: bool,
}

impl GpuContext {
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|err| PipelineError::Gpu(format!("no suitable adapter: {err}")))?;

        let adapter_info = adapter.get_info();
        log::info!("Using adapter: {:?}", adapter_info);
        log::info!("Using backend: {:?}", adapter_info.backend);
        let adapter_features = adapter.features();
        let adapter_limits = adapter.limits();

        let mut required_features = wgpu::Features::empty();
        let supports_depth_clamp = adapter_features.contains(wgpu::Features::DEPTH_CLIP_CONTROL);
        if supports_depth_clamp {
            required_features |= wgpu::Features::DEPTH_CLIP_CONTROL;
        } else {
            log::warn!("Depth clip control not supported, sun cascades may clip casters");
        }

        let mut limits = wgpu::Limits::default();
        limits.max_bind_groups = limits.max_bind_groups.max(4);
        limits.max_color_attachment_bytes_per_sample = adapter_limits
            .max_color_attachment_bytes_per_sample
            .max(limits.max_color_attachment_bytes_per_sample);
        if limits.max_color_attachment_bytes_per_sample < REQUIRED_ATTACHMENT_BYTES {
            return Err(PipelineError::Gpu(format!(
                "adapter allows {} color attachment bytes per sample, {} needed",
                limits.max_color_attachment_bytes_per_sample, REQUIRED_ATTACHMENT_BYTES
            )));
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("npr device"),
                required_features,
                required_limits: limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|err| PipelineError::Gpu(format!("failed to create device: {err}")))?;

        Ok(Self {
            device,
            queue,
            adapter_info,
            supports_depth_clamp,
        })
    }

    /// Blocks on [`GpuContext::new`].
    pub fn blocking() -> Result<Self> {
        pollster::block_on(Self::new())
    }

    /// Runs `create` inside a validation error scope so invalid shaders and
    /// pipelines become errors instead of panics.
    pub(crate) fn validated<T>(
        &self,
        create: impl FnOnce(&wgpu::Device) -> T,
    ) -> std::result::Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(err.to_string()),
            None => Ok(value),
        }
    }

    pub(crate) fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    pub(crate) fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }
}
