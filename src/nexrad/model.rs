//! Decoded radar volume data model.
//!
//! A [`Radar`] is one decoded Level-II file. It owns one [`Volume`] per
//! product, each volume holds its [`Sweep`]s in scan order, and each sweep
//! holds its [`Ray`]s in azimuth order as they were collected.
//!
//! Bin values are stored on a coded byte scale: `1..=250` carry data
//! (see [`Product::encode`]) and the remaining codes are reserved sentinels.

use serde::{Deserialize, Serialize};

/// Below threshold / bad value.
pub const BADVAL: u8 = 0;
/// No echo detected.
pub const NOECHO: u8 = 251;
/// Not found, vertical channel.
pub const NOTFOUND_V: u8 = 252;
/// Not found, horizontal channel.
pub const NOTFOUND_H: u8 = 253;
/// Anomalous propagation flag.
pub const APFLAG: u8 = 254;
/// Range folded.
pub const RFVAL: u8 = 255;

/// Highest coded value that carries real data.
pub const MAX_DATA_CODE: u8 = 250;

/// Returns true for coded values that never represent valid data.
pub fn is_sentinel(code: u8) -> bool {
    matches!(
        code,
        BADVAL | NOECHO | NOTFOUND_V | NOTFOUND_H | APFLAG | RFVAL
    )
}

/// Radar products (moments) carried in a Level-II volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Product {
    Reflectivity,
    Velocity,
    SpectrumWidth,
    DifferentialReflectivity,
    CorrelationCoefficient,
    DifferentialPhase,
}

impl Product {
    pub fn all() -> &'static [Product] {
        &[
            Product::Reflectivity,
            Product::Velocity,
            Product::SpectrumWidth,
            Product::DifferentialReflectivity,
            Product::CorrelationCoefficient,
            Product::DifferentialPhase,
        ]
    }

    /// Two letter field code used in panel rows and log output.
    pub fn code(&self) -> &'static str {
        match self {
            Product::Reflectivity => "DZ",
            Product::Velocity => "VR",
            Product::SpectrumWidth => "SW",
            Product::DifferentialReflectivity => "DR",
            Product::CorrelationCoefficient => "RH",
            Product::DifferentialPhase => "PH",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Product::Reflectivity => "Reflectivity",
            Product::Velocity => "Velocity",
            Product::SpectrumWidth => "Spectrum Width",
            Product::DifferentialReflectivity => "Differential Reflectivity",
            Product::CorrelationCoefficient => "Correlation Coefficient",
            Product::DifferentialPhase => "Differential Phase",
        }
    }

    /// Archive II generic moment block name for this product.
    pub fn moment_name(&self) -> &'static [u8; 3] {
        match self {
            Product::Reflectivity => b"REF",
            Product::Velocity => b"VEL",
            Product::SpectrumWidth => b"SW ",
            Product::DifferentialReflectivity => b"ZDR",
            Product::CorrelationCoefficient => b"RHO",
            Product::DifferentialPhase => b"PHI",
        }
    }

    pub fn from_moment_name(name: &[u8]) -> Option<Product> {
        Product::all()
            .iter()
            .copied()
            .find(|p| p.moment_name().as_slice() == name)
    }

    /// Dual-polarization fields are drawn more translucently.
    pub fn is_dual_pol(&self) -> bool {
        matches!(
            self,
            Product::DifferentialReflectivity
                | Product::CorrelationCoefficient
                | Product::DifferentialPhase
        )
    }

    /// (scale, offset) mapping a physical value onto the coded byte scale.
    fn coding(&self) -> (f32, f32) {
        match self {
            // dBZ, one code per dB
            Product::Reflectivity => (1.0, 0.0),
            // m/s centred on 128
            Product::Velocity => (1.0, 128.0),
            // m/s, quarter metre steps
            Product::SpectrumWidth => (4.0, 1.0),
            // dB in [-8, 7.5]
            Product::DifferentialReflectivity => (16.0, 128.0),
            // unitless in [0, 1.05]
            Product::CorrelationCoefficient => (230.0, 1.0),
            // degrees in [0, 360]
            Product::DifferentialPhase => (0.69, 1.0),
        }
    }

    /// Encodes a physical value onto the data range `1..=250`.
    pub fn encode(&self, value: f32) -> u8 {
        let (scale, offset) = self.coding();
        let coded = (value * scale + offset).round();
        if coded.is_nan() {
            return BADVAL;
        }
        coded.clamp(1.0, MAX_DATA_CODE as f32) as u8
    }

    /// Inverse of [`Product::encode`], for legend labels.
    pub fn decode(&self, code: u8) -> f32 {
        let (scale, offset) = self.coding();
        (code as f32 - offset) / scale
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One radial beam.
#[derive(Debug, Clone, PartialEq)]
pub struct Ray {
    /// Azimuth of the beam centre in degrees, clockwise from north
    pub azimuth: f32,
    /// Beam width in degrees
    pub beam_width: f32,
    /// Range to the first gate in metres
    pub first_gate_m: f32,
    /// Gate spacing in metres
    pub gate_size_m: f32,
    /// Elevation angle in degrees
    pub elevation: f32,
    /// Coded bin values, nearest gate first
    pub bins: Vec<u8>,
}

impl Ray {
    /// Distance to the far edge of the last gate in metres.
    pub fn far_range_m(&self) -> f32 {
        self.first_gate_m + self.bins.len() as f32 * self.gate_size_m
    }
}

/// One antenna rotation at a fixed elevation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sweep {
    /// Nominal elevation angle in degrees
    pub elevation: f32,
    pub rays: Vec<Ray>,
}

impl Sweep {
    pub fn new(elevation: f32, rays: Vec<Ray>) -> Self {
        Self { elevation, rays }
    }

    pub fn ray_count(&self) -> usize {
        self.rays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rays.is_empty()
    }

    /// Largest bin count across all rays.
    pub fn max_bins(&self) -> usize {
        self.rays.iter().map(|r| r.bins.len()).max().unwrap_or(0)
    }
}

/// All sweeps of one product in a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub product: Product,
    pub sweeps: Vec<Sweep>,
}

impl Volume {
    pub fn new(product: Product) -> Self {
        Self {
            product,
            sweeps: Vec::new(),
        }
    }

    /// Finds the sweep whose elevation is closest to `elevation`.
    ///
    /// Ties keep the earliest sweep in scan order.
    pub fn closest_sweep(&self, elevation: f32) -> Option<&Sweep> {
        let mut best: Option<&Sweep> = None;
        for sweep in self.sweeps.iter().filter(|s| !s.is_empty()) {
            let better = match best {
                Some(b) => (sweep.elevation - elevation).abs() < (b.elevation - elevation).abs(),
                None => true,
            };
            if better {
                best = Some(sweep);
            }
        }
        best
    }

    /// Distinct non-zero elevations in scan order.
    pub fn elevations(&self) -> Vec<f32> {
        let mut elevations: Vec<f32> = Vec::new();
        for sweep in &self.sweeps {
            if sweep.is_empty() || sweep.elevation == 0.0 {
                continue;
            }
            if !elevations
                .iter()
                .any(|e| (e - sweep.elevation).abs() < 0.005)
            {
                elevations.push(sweep.elevation);
            }
        }
        elevations
    }
}

/// One decoded volume-scan file.
#[derive(Debug, Clone, PartialEq)]
pub struct Radar {
    /// Four-letter site identifier (e.g. "KLSX")
    pub site_id: String,
    pub lat: f64,
    pub lon: f64,
    /// Site height above sea level in metres
    pub height_m: f64,
    /// Scan start as Unix seconds
    pub timestamp: i64,
    pub volumes: Vec<Volume>,
}

impl Radar {
    pub fn volume(&self, product: Product) -> Option<&Volume> {
        self.volumes.iter().find(|v| v.product == product)
    }

    pub fn products(&self) -> impl Iterator<Item = Product> + '_ {
        self.volumes.iter().map(|v| v.product)
    }
}
