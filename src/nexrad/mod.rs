//! NEXRAD Level-II data handling.
//!
//! This module provides functionality for:
//! - Decompressing and decoding Archive II volume files
//! - The decoded radar/volume/sweep/ray model
//! - Colormaps per product
//! - Rasterizing sweeps to RGBA textures and building their radial meshes

mod archive;
mod colormap;
mod level2;
mod mesh;
mod model;
mod rasterize;

pub use archive::{
    decode_volume_file, decompress, ArchiveDecoder, Bzip2Filter, CommandFilter, DecompressFilter,
    VolumeDecoder,
};
pub use colormap::{ColorMap, ColorMaps, Rgba};
pub use level2::{Level2, SweepChoice, SweepChoices, SweepDisplay};
pub use mesh::{MeshOptions, MeshVertex, RadialMesh};
pub use model::{
    is_sentinel, Product, Radar, Ray, Sweep, Volume, APFLAG, BADVAL, MAX_DATA_CODE, NOECHO,
    NOTFOUND_H, NOTFOUND_V, RFVAL,
};
pub use rasterize::{rasterize, rasterize_timed, RasterResult, RgbaBuffer};
