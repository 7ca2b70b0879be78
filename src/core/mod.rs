pub mod config;
pub mod constants;
pub mod geo;
pub mod viewport;

// Re-export the essential types
pub use config::ClientConfig;
pub use geo::{LatLng, LatLngBounds, Point, TileCoord};
pub use viewport::Viewport;
