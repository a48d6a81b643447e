//! Glint studio
//!
//! Renders a batch of rotated, tinted triangles through the wgpu backend and
//! writes every image of the batch as a PNG.

use std::f32::consts::TAU;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use glint_engine::logging::{init_logging, LoggingConfig};
use glint_engine::op::{RasterizeOp, RasterizeOpConfig};
use glint_engine::tensor::Tensor;

const TRIANGLE_WGSL: &str = include_str!("../shaders/triangle.wgsl");

/// Clip-space (x, y, z, w) of the three vertices.
#[rustfmt::skip]
const TRIANGLE: [f32; 12] = [
     0.0,  0.8, 0.5, 1.0,
    -0.7, -0.5, 0.5, 1.0,
     0.7, -0.5, 0.5, 1.0,
];

#[derive(Parser, Debug)]
#[command(name = "glint-studio")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Render a batch of rotated triangles to PNG files", long_about = None)]
struct Args {
    /// Directory the PNG files are written to
    #[arg(short, long, default_value = "glint-out")]
    out: PathBuf,

    /// Image width in pixels
    #[arg(long, default_value_t = 256)]
    width: u32,

    /// Image height in pixels
    #[arg(long, default_value_t = 256)]
    height: u32,

    /// Number of images in the batch
    #[arg(short, long, default_value_t = 8)]
    count: usize,

    /// Render on a software adapter
    #[arg(long)]
    fallback: bool,

    /// Log filter in env_logger syntax, e.g. "glint_engine=debug"
    #[arg(long)]
    log: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(LoggingConfig {
        env_filter: args.log.clone(),
        ..LoggingConfig::default()
    });

    let mut config = RasterizeOpConfig::with_resolution(args.height, args.width)
        .shaders(TRIANGLE_WGSL, "", TRIANGLE_WGSL)
        .variable("transform", "mat")
        .variable("vertices", "buffer")
        .variable("tint", "buffer");
    config.red_clear = 0.05;
    config.green_clear = 0.05;
    config.blue_clear = 0.08;
    config.device.force_fallback_adapter = args.fallback;

    let op = RasterizeOp::new(&config)?;
    let values = batch_inputs(args.count, args.width, args.height)?;

    let output = op.compute(3, &values).context("rendering triangle batch")?;
    let pixels = output
        .as_f32()
        .ok_or_else(|| anyhow!("rasterizer output is not float32"))?;

    fs::create_dir_all(&args.out)
        .with_context(|| format!("creating output directory {}", args.out.display()))?;

    let image_len = args.width as usize * args.height as usize * 4;
    for (i, rgba) in pixels.chunks_exact(image_len).enumerate() {
        let path = args.out.join(format!("triangle_{i:03}.png"));
        write_png(&path, args.width, args.height, rgba)?;
    }

    log::info!(
        "wrote {} images ({}x{}) to {}",
        args.count,
        args.width,
        args.height,
        args.out.display()
    );
    Ok(())
}

/// Per-image transform, shared triangle and per-image tint.
fn batch_inputs(count: usize, width: u32, height: u32) -> Result<Vec<Tensor>> {
    let aspect = height as f32 / width as f32;

    let mut transforms = Vec::with_capacity(count * 16);
    let mut vertices = Vec::with_capacity(count * 12);
    let mut tints = Vec::with_capacity(count * 4);

    for i in 0..count {
        let t = i as f32 / count.max(1) as f32;
        let (s, c) = (t * TAU).sin_cos();

        // Row-major rotation about z, x squeezed to keep the triangle square.
        #[rustfmt::skip]
        let rotation = [
            c * aspect, -s * aspect, 0.0, 0.0,
            s,           c,          0.0, 0.0,
            0.0,         0.0,        1.0, 0.0,
            0.0,         0.0,        0.0, 1.0,
        ];
        transforms.extend_from_slice(&rotation);
        vertices.extend_from_slice(&TRIANGLE);

        let [r, g, b] = hue(t);
        tints.extend_from_slice(&[r, g, b, 1.0]);
    }

    Ok(vec![
        Tensor::from_f32(vec![count, 4, 4], transforms)?,
        Tensor::from_f32(vec![count, 12], vertices)?,
        Tensor::from_f32(vec![count, 4], tints)?,
    ])
}

/// Fully saturated color at position `t` on the hue wheel.
fn hue(t: f32) -> [f32; 3] {
    let h = t.fract() * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    match h as u32 {
        0 => [1.0, x, 0.0],
        1 => [x, 1.0, 0.0],
        2 => [0.0, 1.0, x],
        3 => [0.0, x, 1.0],
        4 => [x, 0.0, 1.0],
        _ => [1.0, 0.0, x],
    }
}

fn write_png(path: &Path, width: u32, height: u32, rgba: &[f32]) -> Result<()> {
    let bytes: Vec<u8> = rgba
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();
    let buffer = image::RgbaImage::from_raw(width, height, bytes)
        .ok_or_else(|| anyhow!("image buffer does not match {width}x{height}"))?;
    buffer
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}
