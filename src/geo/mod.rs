//! Geographic helpers: earth geometry and the map projection used by the
//! demo viewer.

mod earth;
mod projection;

pub use earth::{distance, lle_to_xyz, offset, Location, EARTH_R};
pub use projection::MapProjection;
