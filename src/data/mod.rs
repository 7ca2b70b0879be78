pub mod geoip;

pub use geoip::{parse_points, resolution_for_zoom, GeoipQuery, HeatPoint};
