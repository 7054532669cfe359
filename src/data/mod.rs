//! Static datasets.
//!
//! - `sites`: NEXRAD radar site definitions

pub mod sites;

pub use sites::{get_site, NexradSite, NEXRAD_SITES};
