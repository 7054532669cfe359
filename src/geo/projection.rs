//! Map projection and coordinate transformation.
//!
//! Handles converting between geographic coordinates (lat/lon) and
//! screen coordinates for rendering on the canvas, and derives the camera
//! eye position the radar layers use to decide which sites to load.

use super::earth::{Location, EARTH_R};
use eframe::egui::{Pos2, Rect, Vec2};
use geo_types::Coord;

/// Metres of camera height per degree of visible half-span.
const ELEVATION_PER_DEG: f64 = EARTH_R * std::f64::consts::PI / 180.0 * 0.6;

/// Map projection for converting geographic to screen coordinates.
#[derive(Debug, Clone)]
pub struct MapProjection {
    /// Center latitude of the view (radar site location)
    pub center_lat: f64,
    /// Center longitude of the view (radar site location)
    pub center_lon: f64,
    /// Visible range in degrees (how much lat/lon span is visible)
    pub range_deg: f64,
    /// Current zoom level
    pub zoom: f32,
    /// Pan offset in screen pixels
    pub pan_offset: Vec2,
    /// Screen rectangle for the canvas
    pub screen_rect: Rect,
}

impl Default for MapProjection {
    fn default() -> Self {
        Self {
            // Default to center of continental US
            center_lat: 39.0,
            center_lon: -98.0,
            // Whole CONUS visible
            range_deg: 20.0,
            zoom: 1.0,
            pan_offset: Vec2::ZERO,
            screen_rect: Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0)),
        }
    }
}

impl MapProjection {
    /// Creates a new projection centered on a point.
    pub fn new(center_lat: f64, center_lon: f64) -> Self {
        Self {
            center_lat,
            center_lon,
            ..Default::default()
        }
    }

    /// Updates the projection with current view state.
    pub fn update(&mut self, zoom: f32, pan_offset: Vec2, screen_rect: Rect) {
        self.zoom = zoom;
        self.pan_offset = pan_offset;
        self.screen_rect = screen_rect;
    }

    /// Converts geographic coordinates (lon, lat) to screen position.
    ///
    /// Uses a simple equirectangular projection which is adequate for
    /// the typical ~500km range of NEXRAD displays.
    pub fn geo_to_screen(&self, coord: Coord<f64>) -> Pos2 {
        let lon = coord.x;
        let lat = coord.y;

        // Calculate the effective range based on zoom
        let effective_range = self.range_deg / self.zoom as f64;

        // Normalize coordinates relative to center
        let rel_lon = lon - self.center_lon;
        let rel_lat = lat - self.center_lat;

        // Apply latitude correction for longitude (approximate Mercator-like behavior)
        let lat_correction = (self.center_lat.to_radians()).cos();
        let corrected_lon = rel_lon * lat_correction;

        // Convert to normalized coordinates (-1 to 1)
        let norm_x = corrected_lon / effective_range;
        let norm_y = -rel_lat / effective_range; // Flip Y since screen Y increases downward

        // Convert to screen coordinates
        let center = self.screen_rect.center() + self.pan_offset;
        let half_size = self.screen_rect.size().min_elem() / 2.0;

        Pos2::new(
            center.x + (norm_x as f32) * half_size,
            center.y + (norm_y as f32) * half_size,
        )
    }

    /// Converts screen position to geographic coordinates (lon, lat).
    pub fn screen_to_geo(&self, pos: Pos2) -> Coord<f64> {
        let effective_range = self.range_deg / self.zoom as f64;

        let center = self.screen_rect.center() + self.pan_offset;
        let half_size = self.screen_rect.size().min_elem() / 2.0;

        // Convert from screen to normalized
        let norm_x = (pos.x - center.x) / half_size;
        let norm_y = (pos.y - center.y) / half_size;

        // Convert from normalized to geographic
        let lat_correction = (self.center_lat.to_radians()).cos();
        let rel_lon = (norm_x as f64) * effective_range / lat_correction;
        let rel_lat = -(norm_y as f64) * effective_range; // Flip Y back

        Coord {
            x: self.center_lon + rel_lon,
            y: self.center_lat + rel_lat,
        }
    }

    /// Visible half-span in degrees at the current zoom.
    pub fn effective_range_deg(&self) -> f64 {
        self.range_deg / self.zoom as f64
    }

    /// Camera height above the surface, proportional to the visible span.
    pub fn camera_elevation_m(&self) -> f64 {
        self.effective_range_deg() * ELEVATION_PER_DEG
    }

    /// Camera eye position: above the point under the canvas centre.
    pub fn camera_location(&self) -> Location {
        let ground = self.screen_to_geo(self.screen_rect.center());
        Location::new(ground.y, ground.x, self.camera_elevation_m())
    }

    /// Returns the visible geographic bounds as (min_lon, min_lat, max_lon, max_lat).
    pub fn visible_bounds(&self) -> (f64, f64, f64, f64) {
        let top_left = self.screen_to_geo(self.screen_rect.left_top());
        let bottom_right = self.screen_to_geo(self.screen_rect.right_bottom());

        (
            top_left.x.min(bottom_right.x),
            top_left.y.min(bottom_right.y),
            top_left.x.max(bottom_right.x),
            top_left.y.max(bottom_right.y),
        )
    }

    /// Checks if a coordinate is within the visible bounds (with margin).
    pub fn is_visible(&self, coord: Coord<f64>, margin_deg: f64) -> bool {
        let (min_lon, min_lat, max_lon, max_lat) = self.visible_bounds();
        coord.x >= min_lon - margin_deg
            && coord.x <= max_lon + margin_deg
            && coord.y >= min_lat - margin_deg
            && coord.y <= max_lat + margin_deg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_round_trip() {
        let mut projection = MapProjection::new(38.7, -90.7);
        projection.update(
            2.0,
            Vec2::new(10.0, -5.0),
            Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0)),
        );
        let coord = Coord { x: -91.2, y: 39.1 };
        let back = projection.screen_to_geo(projection.geo_to_screen(coord));
        assert!((back.x - coord.x).abs() < 1e-3);
        assert!((back.y - coord.y).abs() < 1e-3);
    }

    #[test]
    fn test_camera_descends_with_zoom() {
        let mut projection = MapProjection::new(38.7, -90.7);
        let far = projection.camera_elevation_m();
        projection.zoom = 10.0;
        let near = projection.camera_elevation_m();
        assert!((far / near - 10.0).abs() < 1e-9);

        let eye = projection.camera_location();
        assert!((eye.lat - 38.7).abs() < 1e-9);
        assert!((eye.lon + 90.7).abs() < 1e-9);
        assert!(projection.is_visible(eye.coord(), 0.0));
    }
}
