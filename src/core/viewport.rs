use crate::core::constants::{DEFAULT_MAX_ZOOM, TILE_SIZE};
use crate::core::geo::{LatLng, LatLngBounds, Point};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Manages the current view of the map: center, zoom, and screen dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The center of the map view in geographical coordinates
    pub center: LatLng,
    /// The current zoom level (whole levels only)
    pub zoom: f64,
    /// The size of the viewport in pixels
    pub size: Point,
    /// The minimum allowed zoom level
    pub min_zoom: f64,
    /// The maximum allowed zoom level
    pub max_zoom: f64,
}

impl Viewport {
    /// Creates a new viewport
    pub fn new(center: LatLng, zoom: f64, size: Point) -> Self {
        let mut viewport = Self {
            center: LatLng::default(),
            zoom: 0.0,
            size,
            min_zoom: 0.0,
            max_zoom: DEFAULT_MAX_ZOOM,
        };
        viewport.set_zoom(zoom);
        viewport.set_center(center);
        viewport
    }

    /// Sets the center of the viewport, clamping latitude and wrapping longitude
    pub fn set_center(&mut self, center: LatLng) {
        self.center = LatLng::new(LatLng::clamp_lat(center.lat), LatLng::wrap_lng(center.lng));
    }

    /// Sets the zoom level, snapping to whole levels and clamping to the limits
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.round().clamp(self.min_zoom, self.max_zoom);
    }

    /// Sets the viewport size
    pub fn set_size(&mut self, size: Point) {
        self.size = size;
    }

    /// Sets the zoom limits and re-clamps the current zoom
    pub fn set_zoom_limits(&mut self, min_zoom: f64, max_zoom: f64) {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom.max(min_zoom);
        self.set_zoom(self.zoom);
    }

    /// Gets the scale factor for the current zoom level
    pub fn scale(&self) -> f64 {
        2_f64.powf(self.zoom)
    }

    /// Projects a LatLng to world pixel coordinates (EPSG:3857) at the given zoom level
    pub fn project(&self, lat_lng: &LatLng, zoom: Option<f64>) -> Point {
        let z = zoom.unwrap_or(self.zoom);
        let world = TILE_SIZE as f64 * 2_f64.powf(z);

        let lat_rad = LatLng::clamp_lat(lat_lng.lat).to_radians();
        let x = (lat_lng.lng + 180.0) / 360.0 * world;
        let y = (1.0 - (PI / 4.0 + lat_rad / 2.0).tan().ln() / PI) / 2.0 * world;

        Point::new(x, y)
    }

    /// Unprojects world pixel coordinates back to LatLng at the given zoom level
    pub fn unproject(&self, pixel: &Point, zoom: Option<f64>) -> LatLng {
        let z = zoom.unwrap_or(self.zoom);
        let world = TILE_SIZE as f64 * 2_f64.powf(z);

        let lng = pixel.x / world * 360.0 - 180.0;
        let n = PI * (1.0 - 2.0 * pixel.y / world);
        let lat = n.sinh().atan().to_degrees();

        LatLng::new(lat, lng)
    }

    /// World pixel coordinate of the top-left corner of the viewport
    pub fn pixel_origin(&self) -> Point {
        let center = self.project(&self.center, None);
        center.subtract(&self.size.multiply(0.5))
    }

    /// Converts a geographical coordinate to screen pixel coordinates (container relative)
    pub fn lat_lng_to_pixel(&self, lat_lng: &LatLng) -> Point {
        self.project(lat_lng, None).subtract(&self.pixel_origin())
    }

    /// Converts screen pixel coordinates back to geographical coordinates
    pub fn pixel_to_lat_lng(&self, pixel: &Point) -> LatLng {
        self.unproject(&pixel.add(&self.pixel_origin()), None)
    }

    /// Moves the view so content follows a drag of `delta` screen pixels
    pub fn pan(&mut self, delta: Point) {
        let center = self.project(&self.center, None).subtract(&delta);
        let center = self.unproject(&center, None);
        self.set_center(center);
    }

    /// Steps the zoom by `delta` levels. Returns whether the zoom changed.
    pub fn zoom_by(&mut self, delta: f64) -> bool {
        let previous = self.zoom;
        self.set_zoom(self.zoom + delta);
        (self.zoom - previous).abs() > f64::EPSILON
    }

    /// Gets the current viewport bounds in geographical coordinates
    pub fn bounds(&self) -> LatLngBounds {
        let nw = self.pixel_to_lat_lng(&Point::new(0.0, 0.0));
        let se = self.pixel_to_lat_lng(&self.size);

        LatLngBounds::new(LatLng::new(se.lat, nw.lng), LatLng::new(nw.lat, se.lng))
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(LatLng::new(0.0, 0.0), 0.0, Point::new(800.0, 600.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_creation() {
        let viewport = Viewport::new(LatLng::new(15.0, 0.0), 2.0, Point::new(800.0, 600.0));

        assert_eq!(viewport.zoom, 2.0);
        assert_eq!(viewport.center.lat, 15.0);
        assert_eq!(viewport.size.x, 800.0);
    }

    #[test]
    fn test_coordinate_conversion() {
        let viewport = Viewport::new(LatLng::new(0.0, 0.0), 1.0, Point::new(512.0, 512.0));

        let center_lat_lng = viewport.pixel_to_lat_lng(&Point::new(256.0, 256.0));
        assert!(center_lat_lng.lat.abs() < 0.01);
        assert!(center_lat_lng.lng.abs() < 0.01);

        let target = LatLng::new(40.7128, -74.0060);
        let back = viewport.pixel_to_lat_lng(&viewport.lat_lng_to_pixel(&target));
        assert!((back.lat - target.lat).abs() < 1e-6);
        assert!((back.lng - target.lng).abs() < 1e-6);
    }

    #[test]
    fn test_zoom_limits() {
        let mut viewport = Viewport::default();
        viewport.set_zoom_limits(2.0, 15.0);

        viewport.set_zoom(1.0);
        assert_eq!(viewport.zoom, 2.0);

        viewport.set_zoom(20.0);
        assert_eq!(viewport.zoom, 15.0);

        viewport.set_zoom(7.4);
        assert_eq!(viewport.zoom, 7.0);
    }

    #[test]
    fn test_zoom_by_reports_change() {
        let mut viewport = Viewport::default();
        viewport.set_zoom_limits(0.0, 3.0);
        viewport.set_zoom(3.0);

        assert!(!viewport.zoom_by(1.0));
        assert!(viewport.zoom_by(-1.0));
        assert_eq!(viewport.zoom, 2.0);
    }

    #[test]
    fn test_pan() {
        let mut viewport = Viewport::new(LatLng::new(0.0, 0.0), 3.0, Point::new(512.0, 512.0));

        // dragging content to the left moves the view east
        viewport.pan(Point::new(-100.0, 0.0));
        assert!(viewport.center.lng > 0.0);
        assert!(viewport.center.lat.abs() < 1e-9);
    }

    #[test]
    fn test_bounds_are_ordered() {
        let viewport = Viewport::new(LatLng::new(15.0, 0.0), 2.0, Point::new(800.0, 600.0));
        let bounds = viewport.bounds();

        assert!(bounds.north() > bounds.south());
        assert!(bounds.east() > bounds.west());
        assert!(bounds.contains(&viewport.center));
    }
}
