mod demo_scene;

use std::path::{Path, PathBuf};

use image::{ImageBuffer, Luma, Rgba};
use npr_pipeline::renderer::gpu::WgpuBackend;
use npr_pipeline::{NprPipeline, PipelineSettings, Resolution, Result};

fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// `npr-render [settings.json] [output.png]`
fn main() {
    init_logging();

    if let Err(err) = run() {
        log::error!("Render failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => PipelineSettings::load_from_path(path),
        None => PipelineSettings::load(),
    };
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("render.png"));
    let resolution = settings.resolution;

    let mut gpu = WgpuBackend::headless()?;
    let mut pipeline = NprPipeline::with_builtin_collaborators(&mut gpu, settings)?;
    let scene = demo_scene::build(&mut gpu, resolution)?;

    let mut is_new_frame = true;
    let frame = loop {
        let frame = pipeline.render(&mut gpu, resolution, &scene, true, is_new_frame)?;
        is_new_frame = false;
        if frame.is_converged() {
            break frame;
        }
    };
    log::info!(
        "Accumulated {} samples at {}",
        frame.sample_index + 1,
        resolution
    );

    let color = gpu.read_texture(&frame.color)?;
    save_color(&output, resolution, &color)?;
    log::info!("Wrote {:?}", output);

    if let Some(depth) = &frame.depth {
        let depth_path = output.with_extension("depth.png");
        save_depth(&depth_path, resolution, &gpu.read_texture(depth)?)?;
        log::info!("Wrote {:?}", depth_path);
    }
    Ok(())
}

fn to_srgb8(linear: f32) -> u8 {
    let linear = linear.clamp(0.0, 1.0);
    let srgb = if linear <= 0.003_130_8 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    };
    (srgb * 255.0).round() as u8
}

fn save_color(path: &Path, resolution: Resolution, texels: &[f32]) -> Result<()> {
    let image = ImageBuffer::from_fn(resolution.width, resolution.height, |x, y| {
        let i = (y * resolution.width + x) as usize * 4;
        Rgba([
            to_srgb8(texels[i]),
            to_srgb8(texels[i + 1]),
            to_srgb8(texels[i + 2]),
            (texels[i + 3].clamp(0.0, 1.0) * 255.0).round() as u8,
        ])
    });
    image.save(path)?;
    Ok(())
}

/// Linear depth normalized by the farthest pixel.
fn save_depth(path: &Path, resolution: Resolution, depth: &[f32]) -> Result<()> {
    let far = depth
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .fold(f32::EPSILON, f32::max);
    let image = ImageBuffer::from_fn(resolution.width, resolution.height, |x, y| {
        let value = depth[(y * resolution.width + x) as usize] / far;
        Luma([(value.clamp(0.0, 1.0) * u16::MAX as f32) as u16])
    });
    image.save(path)?;
    Ok(())
}
