use crate::renderer::backend::GpuBackend;
use crate::scene::Batch;

/// The scene batches split by their material's transparency flag.
pub struct ClassifiedBatches<'a, B: GpuBackend> {
    pub opaque: Vec<&'a Batch<B>>,
    pub transparent: Vec<&'a Batch<B>>,
}

impl<'a, B: GpuBackend> ClassifiedBatches<'a, B> {
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }
}

/// Partitions `batches` into opaque and transparent sets. Batches without a
/// material, or whose material has no shader, are opaque.
pub fn classify<B: GpuBackend>(batches: &[Batch<B>]) -> ClassifiedBatches<'_, B> {
    let (transparent, opaque): (Vec<_>, Vec<_>) = batches.iter().partition(|batch| {
        batch
            .material
            .as_deref()
            .is_some_and(|material| material.is_transparent())
    });
    ClassifiedBatches {
        opaque,
        transparent,
    }
}
