use crate::error::Result;
use crate::renderer::backend::GpuBackend;

/// Weight of sample `sample_index` in a running mean.
pub fn blend_weight(sample_index: u32) -> f32 {
    1.0 / (sample_index as f32 + 1.0)
}

/// Averages successive jittered frames into `target`.
///
/// After `accumulate` ran for `sample_index = 0..n` on a cleared target, the
/// target holds the mean of the `n` samples. Clearing the target together with
/// resetting the sample index is the caller's job.
pub struct TemporalAccumulator<'a, B: GpuBackend> {
    pub target: &'a B::RenderTarget,
}

impl<'a, B: GpuBackend> TemporalAccumulator<'a, B> {
    pub fn new(target: &'a B::RenderTarget) -> Self {
        Self { target }
    }

    pub fn accumulate(&self, gpu: &mut B, sample: &B::Texture, sample_index: u32) -> Result<()> {
        gpu.blend_texture(sample, self.target, blend_weight(sample_index))
    }

    pub fn clear(&self, gpu: &mut B) -> Result<()> {
        gpu.clear(self.target, &[[0.0; 4]], None, None)
    }
}
