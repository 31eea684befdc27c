use glam::Vec2;

/// Largest supported grid edge. Larger requests are clamped to it.
pub const MAX_GRID_SIZE: u32 = 32;

/// Rotated grid supersampling offsets, in pixels.
///
/// A `grid_size` x `grid_size` grid of cell centers spanning one pixel is
/// rotated by `atan(1/2)` and scaled by `width`. The result only depends on the arguments.
/// `grid_size` is clamped to `1..=MAX_GRID_SIZE`.
pub fn rgss_samples(grid_size: u32, width: f32) -> Vec<Vec2> {
    let grid_size = grid_size.clamp(1, MAX_GRID_SIZE);
    let (sin, cos) = 0.5f32.atan().sin_cos();
    let step = 1.0 / grid_size as f32;

    let mut samples = Vec::with_capacity((grid_size as usize).pow(2));
    for x in 0..grid_size {
        for y in 0..grid_size {
            let cell = Vec2::new(
                (x as f32 + 0.5) * step - 0.5,
                (y as f32 + 0.5) * step - 0.5,
            );
            let rotated = Vec2::new(cell.x * cos - cell.y * sin, cell.x * sin + cell.y * cos);
            samples.push(rotated * width);
        }
    }
    samples
}

/// Per-frame sample offset selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Sampler {
    grid_size: u32,
    width: f32,
    samples: Vec<Vec2>,
}

impl Sampler {
    pub fn new(grid_size: u32, width: f32) -> Self {
        Self {
            grid_size: grid_size.clamp(1, MAX_GRID_SIZE),
            width,
            samples: rgss_samples(grid_size, width),
        }
    }

    /// Rebuilds the pattern only when the parameters changed.
    pub fn configure(&mut self, grid_size: u32, width: f32) {
        if self.grid_size != grid_size.clamp(1, MAX_GRID_SIZE) || self.width != width {
            *self = Self::new(grid_size, width);
        }
    }

    pub fn samples(&self) -> &[Vec2] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Offset for `sample_count`, wrapping once every offset has been used.
    pub fn offset(&self, sample_count: u32) -> Vec2 {
        self.samples[sample_count as usize % self.samples.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_grid_size_squared_offsets() {
        for grid_size in 1..=8 {
            assert_eq!(rgss_samples(grid_size, 1.5).len(), (grid_size * grid_size) as usize);
        }
    }

    #[test]
    fn offsets_are_centered() {
        for grid_size in 1..=8 {
            let samples = rgss_samples(grid_size, 1.5);
            let mean = samples.iter().copied().sum::<Vec2>() / samples.len() as f32;
            assert!(mean.length() < 1e-5, "grid {grid_size} mean {mean:?}");
        }
    }

    #[test]
    fn single_sample_is_pixel_center() {
        assert_eq!(rgss_samples(1, 2.0), vec![Vec2::ZERO]);
    }

    #[test]
    fn deterministic_for_same_arguments() {
        assert_eq!(rgss_samples(4, 1.5), rgss_samples(4, 1.5));
    }

    #[test]
    fn oversized_grid_is_clamped() {
        let samples = rgss_samples(u32::MAX, 1.5);
        assert_eq!(samples.len(), (MAX_GRID_SIZE * MAX_GRID_SIZE) as usize);
        assert_eq!(Sampler::new(70_000, 1.5).len(), samples.len());
    }

    #[test]
    fn offset_wraps_past_the_last_sample() {
        let sampler = Sampler::new(2, 1.0);
        assert_eq!(sampler.offset(0), sampler.offset(4));
        assert_eq!(sampler.offset(3), sampler.offset(7));
    }
}
