//! Color lookup tables for coded radar values.
//!
//! Each product has its own 256-entry table indexed by coded bin value.
//! Tables are static lookup data built once at startup and shared
//! between sites.

use super::model::{Product, MAX_DATA_CODE};
use std::sync::Arc;

/// RGBA color for one coded value.
pub type Rgba = [u8; 4];

const TRANSPARENT: Rgba = [0, 0, 0, 0];

/// Alpha multiplier applied to dual-pol products.
const DUAL_POL_ALPHA_SCALE: f32 = 0.75;

/// Maps coded values (0-255) of one product to colors.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMap {
    pub product: Product,
    pub name: String,
    /// One entry per coded value
    colors: Vec<Rgba>,
    /// Multiplier applied to the stored alpha when rasterizing
    pub alpha_scale: f32,
}

impl ColorMap {
    /// Creates a colormap from a full 256-entry table.
    ///
    /// Shorter tables are padded with transparent entries, longer ones
    /// are truncated.
    pub fn new(product: Product, name: impl Into<String>, mut colors: Vec<Rgba>) -> Self {
        colors.resize(256, TRANSPARENT);
        let alpha_scale = if product.is_dual_pol() {
            DUAL_POL_ALPHA_SCALE
        } else {
            1.0
        };
        Self {
            product,
            name: name.into(),
            colors,
            alpha_scale,
        }
    }

    pub fn with_alpha_scale(mut self, alpha_scale: f32) -> Self {
        self.alpha_scale = alpha_scale;
        self
    }

    /// Stored color for a coded value.
    pub fn color(&self, code: u8) -> Rgba {
        self.colors[code as usize]
    }

    pub fn colors(&self) -> &[Rgba] {
        &self.colors
    }

    /// Builds a table by linear interpolation between `(physical, rgba)`
    /// stops. Values outside the stop range are transparent.
    fn from_stops(product: Product, name: &str, stops: &[(f32, Rgba)]) -> Self {
        let mut colors = vec![TRANSPARENT; 256];
        for code in 1..=MAX_DATA_CODE {
            let value = product.decode(code);
            colors[code as usize] = interpolate(stops, value);
        }
        Self::new(product, name, colors)
    }

    /// NWS standard reflectivity palette, in 5 dBZ steps.
    pub fn nws_reflectivity() -> Self {
        let mut colors = vec![TRANSPARENT; 256];
        for code in 1..=MAX_DATA_CODE {
            let dbz = Product::Reflectivity.decode(code);
            colors[code as usize] = match dbz {
                d if d < 5.0 => TRANSPARENT,
                d if d < 10.0 => [0x04, 0xe9, 0xe7, 0xff],
                d if d < 15.0 => [0x01, 0x9f, 0xf4, 0xff],
                d if d < 20.0 => [0x03, 0x00, 0xf4, 0xff],
                d if d < 25.0 => [0x02, 0xfd, 0x02, 0xff],
                d if d < 30.0 => [0x01, 0xc5, 0x01, 0xff],
                d if d < 35.0 => [0x00, 0x8e, 0x00, 0xff],
                d if d < 40.0 => [0xfd, 0xf8, 0x02, 0xff],
                d if d < 45.0 => [0xe5, 0xbc, 0x00, 0xff],
                d if d < 50.0 => [0xfd, 0x95, 0x00, 0xff],
                d if d < 55.0 => [0xfd, 0x00, 0x00, 0xff],
                d if d < 60.0 => [0xd4, 0x00, 0x00, 0xff],
                d if d < 65.0 => [0xbc, 0x00, 0x00, 0xff],
                d if d < 70.0 => [0xf8, 0x00, 0xfd, 0xff],
                d if d < 75.0 => [0x98, 0x54, 0xc6, 0xff],
                _ => [0xfd, 0xfd, 0xfd, 0xff],
            };
        }
        Self::new(Product::Reflectivity, "NWS Reflectivity", colors)
    }

    pub fn velocity() -> Self {
        Self::from_stops(
            Product::Velocity,
            "Velocity",
            &[
                (-64.0, [0x90, 0x00, 0xa0, 0xff]),
                (-40.0, [0x00, 0x10, 0xf0, 0xff]),
                (-20.0, [0x00, 0xc8, 0x00, 0xff]),
                (-1.0, [0x60, 0x80, 0x60, 0xff]),
                (1.0, [0x80, 0x60, 0x60, 0xff]),
                (20.0, [0xf0, 0x20, 0x00, 0xff]),
                (40.0, [0xff, 0xc0, 0x00, 0xff]),
                (64.0, [0xff, 0xff, 0xff, 0xff]),
            ],
        )
    }

    pub fn spectrum_width() -> Self {
        Self::from_stops(
            Product::SpectrumWidth,
            "Spectrum Width",
            &[
                (0.0, [0x40, 0x40, 0x40, 0x00]),
                (4.0, [0x80, 0x80, 0x80, 0xc0]),
                (10.0, [0xff, 0x00, 0x00, 0xff]),
                (20.0, [0xff, 0xff, 0x00, 0xff]),
                (30.0, [0xff, 0xff, 0xff, 0xff]),
            ],
        )
    }

    pub fn differential_reflectivity() -> Self {
        Self::from_stops(
            Product::DifferentialReflectivity,
            "Differential Reflectivity",
            &[
                (-8.0, [0x00, 0x00, 0x00, 0xff]),
                (-1.0, [0x80, 0x80, 0x80, 0xff]),
                (0.0, [0x40, 0x40, 0xc0, 0xff]),
                (1.0, [0x00, 0xc0, 0xc0, 0xff]),
                (2.0, [0x00, 0xc0, 0x00, 0xff]),
                (3.0, [0xff, 0xff, 0x00, 0xff]),
                (4.0, [0xff, 0x80, 0x00, 0xff]),
                (6.0, [0xff, 0x00, 0x00, 0xff]),
                (8.0, [0xff, 0xc0, 0xff, 0xff]),
            ],
        )
    }

    pub fn correlation_coefficient() -> Self {
        Self::from_stops(
            Product::CorrelationCoefficient,
            "Correlation Coefficient",
            &[
                (0.2, [0x00, 0x00, 0x40, 0xff]),
                (0.7, [0x80, 0x80, 0xff, 0xff]),
                (0.85, [0x00, 0xc0, 0x00, 0xff]),
                (0.95, [0xff, 0xff, 0x00, 0xff]),
                (0.98, [0xff, 0x40, 0x00, 0xff]),
                (1.05, [0xa0, 0x00, 0x00, 0xff]),
            ],
        )
    }

    pub fn differential_phase() -> Self {
        Self::from_stops(
            Product::DifferentialPhase,
            "Differential Phase",
            &[
                (0.0, [0x20, 0x20, 0x80, 0xff]),
                (90.0, [0x00, 0xc0, 0xc0, 0xff]),
                (180.0, [0x00, 0xc0, 0x00, 0xff]),
                (270.0, [0xff, 0xc0, 0x00, 0xff]),
                (360.0, [0xff, 0x00, 0x00, 0xff]),
            ],
        )
    }
}

/// Linear interpolation between sorted stops; transparent outside them.
fn interpolate(stops: &[(f32, Rgba)], value: f32) -> Rgba {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return TRANSPARENT;
    };
    if value < first.0 || value > last.0 {
        return TRANSPARENT;
    }
    for pair in stops.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if value >= lo.0 && value <= hi.0 {
            let span = hi.0 - lo.0;
            let t = if span > 0.0 { (value - lo.0) / span } else { 0.0 };
            let mut out = [0u8; 4];
            for (i, channel) in out.iter_mut().enumerate() {
                let a = lo.1[i] as f32;
                let b = hi.1[i] as f32;
                *channel = (a + (b - a) * t).round() as u8;
            }
            return out;
        }
    }
    last.1
}

/// The full set of colormaps, one per product.
#[derive(Debug, Clone)]
pub struct ColorMaps {
    maps: Vec<Arc<ColorMap>>,
}

impl Default for ColorMaps {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ColorMaps {
    pub fn new(maps: Vec<ColorMap>) -> Self {
        Self {
            maps: maps.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            ColorMap::nws_reflectivity(),
            ColorMap::velocity(),
            ColorMap::spectrum_width(),
            ColorMap::differential_reflectivity(),
            ColorMap::correlation_coefficient(),
            ColorMap::differential_phase(),
        ])
    }

    pub fn for_product(&self, product: Product) -> Option<Arc<ColorMap>> {
        self.maps.iter().find(|m| m.product == product).cloned()
    }
}
