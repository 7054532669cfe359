//! Displayable sweeps of one decoded volume.
//!
//! [`Level2`] owns the decoded [`Radar`] for as long as it is shown and
//! turns a (product, elevation) choice into a [`SweepDisplay`]: the
//! rasterized texture plus the radial mesh it is draped over. Both are
//! CPU-side, so a display can be built on a worker thread and handed to
//! the UI thread for upload.

use super::colormap::{ColorMap, ColorMaps};
use super::mesh::{MeshOptions, RadialMesh};
use super::model::{Product, Radar};
use super::rasterize::{rasterize_timed, RgbaBuffer};
use std::sync::Arc;

/// A sweep ready to be drawn.
#[derive(Debug, Clone)]
pub struct SweepDisplay {
    pub product: Product,
    /// Elevation of the selected sweep
    pub elevation: f32,
    pub raster: RgbaBuffer,
    pub mesh: RadialMesh,
    pub colormap: Arc<ColorMap>,
    /// Site position the mesh is relative to
    pub lat: f64,
    pub lon: f64,
    pub render_time_ms: f64,
}

impl SweepDisplay {
    /// True when the sweep had no rays and nothing should be drawn.
    pub fn is_empty(&self) -> bool {
        self.raster.is_empty() || self.mesh.is_empty()
    }
}

/// Selectable elevations for one product.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepChoice {
    pub product: Product,
    pub elevations: Vec<f32>,
}

/// Content of the per-site sweep selector.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SweepChoices {
    /// Scan time, e.g. "2024-05-06 21:35 UTC"
    pub time: String,
    pub rows: Vec<SweepChoice>,
}

/// One loaded volume and the settings used to display it.
pub struct Level2 {
    radar: Radar,
    colormaps: ColorMaps,
    options: MeshOptions,
}

impl Level2 {
    pub fn new(radar: Radar, colormaps: ColorMaps, options: MeshOptions) -> Self {
        Self {
            radar,
            colormaps,
            options,
        }
    }

    /// Builds the display for the sweep of `product` closest to `elevation`.
    ///
    /// Returns `None` when the volume has no such product or no colormap.
    pub fn set_sweep(&self, product: Product, elevation: f32) -> Option<SweepDisplay> {
        let volume = self.radar.volume(product)?;
        let sweep = volume.closest_sweep(elevation)?;
        let colormap = self.colormaps.for_product(product)?;

        let raster = rasterize_timed(sweep, &colormap);
        let mesh = RadialMesh::build(sweep, &self.options);
        log::debug!(
            "{}: {} {:.1} deg, {} rays, {}x{} raster",
            self.radar.site_id,
            product,
            sweep.elevation,
            sweep.ray_count(),
            raster.buffer.width,
            raster.buffer.height
        );

        Some(SweepDisplay {
            product,
            elevation: sweep.elevation,
            raster: raster.buffer,
            mesh,
            colormap,
            lat: self.radar.lat,
            lon: self.radar.lon,
            render_time_ms: raster.render_time_ms,
        })
    }

    /// Lowest reflectivity sweep, or the lowest sweep of the first product
    /// present when there is no reflectivity.
    pub fn initial_sweep(&self) -> Option<SweepDisplay> {
        let product = self
            .radar
            .volume(Product::Reflectivity)
            .map(|v| v.product)
            .or_else(|| self.radar.products().next())?;
        let lowest = self
            .radar
            .volume(product)?
            .sweeps
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.elevation)
            .reduce(f32::min)?;
        self.set_sweep(product, lowest)
    }

    /// Products and their distinct non-zero elevations, plus the scan time.
    pub fn sweep_choices(&self) -> SweepChoices {
        let time = chrono::DateTime::from_timestamp(self.radar.timestamp, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_default();
        let rows = self
            .radar
            .volumes
            .iter()
            .map(|v| SweepChoice {
                product: v.product,
                elevations: v.elevations(),
            })
            .filter(|row| !row.elevations.is_empty())
            .collect();
        SweepChoices { time, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nexrad::model::{Ray, Sweep, Volume};

    fn sweep(elevation: f32, rays: usize) -> Sweep {
        Sweep::new(
            elevation,
            (0..rays)
                .map(|i| Ray {
                    azimuth: i as f32 + 0.5,
                    beam_width: 1.0,
                    first_gate_m: 2125.0,
                    gate_size_m: 250.0,
                    elevation,
                    bins: vec![40; 100],
                })
                .collect(),
        )
    }

    fn radar() -> Radar {
        let mut reflectivity = Volume::new(Product::Reflectivity);
        reflectivity.sweeps = vec![sweep(0.5, 360), sweep(1.5, 360), sweep(0.5, 360)];
        let mut velocity = Volume::new(Product::Velocity);
        velocity.sweeps = vec![sweep(0.5, 360), sweep(2.4, 360)];
        Radar {
            site_id: "KLSX".into(),
            lat: 38.7,
            lon: -90.7,
            height_m: 185.0,
            timestamp: 1_715_031_300,
            volumes: vec![reflectivity, velocity],
        }
    }

    fn level2() -> Level2 {
        Level2::new(radar(), ColorMaps::builtin(), MeshOptions::default())
    }

    #[test]
    fn test_initial_sweep_is_lowest_reflectivity() {
        let display = level2().initial_sweep().unwrap();
        assert_eq!(display.product, Product::Reflectivity);
        assert_eq!(display.elevation, 0.5);
        assert_eq!(display.raster.width, 100);
        assert_eq!(display.raster.height, 360);
        assert_eq!(display.mesh.pair_count(), 361);
        assert!(!display.is_empty());
    }

    #[test]
    fn test_set_sweep_closest() {
        let level2 = level2();
        let display = level2.set_sweep(Product::Velocity, 2.0).unwrap();
        assert_eq!(display.elevation, 2.4);
        assert_eq!(display.colormap.product, Product::Velocity);
        assert!(level2.set_sweep(Product::DifferentialPhase, 0.5).is_none());
    }

    #[test]
    fn test_sweep_choices() {
        let choices = level2().sweep_choices();
        assert_eq!(choices.time, "2024-05-06 21:35 UTC");
        assert_eq!(choices.rows.len(), 2);
        assert_eq!(choices.rows[0].product, Product::Reflectivity);
        assert_eq!(choices.rows[0].elevations, vec![0.5, 1.5]);
        assert_eq!(choices.rows[1].elevations, vec![0.5, 2.4]);
    }

    #[test]
    fn test_empty_radar() {
        let mut radar = radar();
        radar.volumes.clear();
        let level2 = Level2::new(radar, ColorMaps::builtin(), MeshOptions::default());
        assert!(level2.initial_sweep().is_none());
        assert!(level2.sweep_choices().rows.is_empty());
    }
}
