//! Polar sweep to RGBA raster conversion.
//!
//! The raster is laid out with one row per ray and one column per range
//! bin, so it maps directly onto the radial mesh texture coordinates
//! (u along range, v along azimuth).

use super::colormap::ColorMap;
use super::model::{is_sentinel, Sweep, BADVAL};

/// A tightly packed RGBA8 image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RgbaBuffer {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl RgbaBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height * 4],
        }
    }

    /// True when there is nothing to upload.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }
}

/// Result of rasterizing a sweep, including timing information.
pub struct RasterResult {
    pub buffer: RgbaBuffer,
    /// Time taken to rasterize in milliseconds
    pub render_time_ms: f64,
}

/// Rasterizes a sweep through a colormap.
///
/// Width is the largest bin count of any ray; shorter rays are padded with
/// transparent pixels. Sentinel codes are always fully transparent and the
/// colormap's alpha scale is applied to every other value.
pub fn rasterize(sweep: &Sweep, colormap: &ColorMap) -> RgbaBuffer {
    let width = sweep.max_bins();
    let height = sweep.ray_count();
    if width == 0 || height == 0 {
        return RgbaBuffer::new(0, 0);
    }

    // Resolve the per-code colors once instead of per bin
    let mut lut = [[0u8; 4]; 256];
    for (code, entry) in lut.iter_mut().enumerate() {
        let code = code as u8;
        if is_sentinel(code) {
            continue;
        }
        let [r, g, b, a] = colormap.color(code);
        let alpha = (a as f32 * colormap.alpha_scale).round().clamp(0.0, 255.0) as u8;
        *entry = [r, g, b, alpha];
    }
    debug_assert_eq!(lut[BADVAL as usize][3], 0);

    let mut buffer = RgbaBuffer::new(width, height);
    for (row, ray) in sweep.rays.iter().enumerate() {
        let start = row * width * 4;
        for (col, &code) in ray.bins.iter().enumerate() {
            let i = start + col * 4;
            buffer.pixels[i..i + 4].copy_from_slice(&lut[code as usize]);
        }
    }
    buffer
}

/// Rasterizes a sweep and records how long it took.
pub fn rasterize_timed(sweep: &Sweep, colormap: &ColorMap) -> RasterResult {
    let start = web_time::Instant::now();
    let buffer = rasterize(sweep, colormap);
    let render_time_ms = start.elapsed().as_secs_f64() * 1000.0;
    log::debug!(
        "Rasterized {}x{} sweep in {:.2}ms",
        buffer.width,
        buffer.height,
        render_time_ms
    );
    RasterResult {
        buffer,
        render_time_ms,
    }
}
