//! # geoheat
//!
//! A desktop client for a geo-located heatmap service.
//!
//! The map view shows a slippy basemap with a heat layer built from the
//! points a `/geoip` backend returns for the visible area. Viewport changes
//! are debounced into requests; uploads of new data refresh the map once the
//! backend accepts them.

pub mod background;
pub mod controllers;
pub mod core;
pub mod data;
pub mod input;
pub mod layers;
pub mod prelude;
pub mod runtime;
#[cfg(feature = "egui")]
pub mod ui;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    config::ClientConfig,
    geo::{LatLng, LatLngBounds, Point, TileCoord},
    viewport::Viewport,
};

pub use controllers::{
    map::{MapController, RefreshHandle},
    upload::{UploadController, UploadStatus},
};

pub use background::{
    debounce::Debouncer,
    geoip::{GeoipSource, HttpGeoipClient, UploadFile, UploadResponse},
};

pub use data::geoip::{GeoipQuery, HeatPoint};

pub use input::events::{MapEvent, RefreshTrigger};

pub use layers::{
    heat::{HeatGradient, HeatLayer, HeatLayerOptions, HeatLayerSlot},
    tile::TileLayer,
};

#[cfg(feature = "egui")]
pub use ui::{map_view::MapView, upload_panel::UploadPanel};

/// Installs `env_logger` with `info` as the default level; `RUST_LOG`
/// overrides it. Safe to call more than once.
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Error type alias for convenience
pub type Error = MapError;
