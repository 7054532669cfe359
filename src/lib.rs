#![warn(clippy::all)]

//! NEXRAD radar layers for a map viewer.
//!
//! Per-site Level-II sweeps are fetched, decoded, rasterized and draped
//! over radial meshes; a CONUS mosaic is split into two tiles; a legend
//! shows the colormap of the last sweep displayed. The layers talk to the
//! viewer through [`viewer::Viewer`] and never block its thread.

pub mod app;
pub mod data;
pub mod error;
pub mod fetch;
pub mod geo;
pub mod nexrad;
pub mod plugin;
pub mod settings;
pub mod ui;
pub mod viewer;
