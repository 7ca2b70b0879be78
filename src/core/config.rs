//! Client configuration
//!
//! Everything the map and upload controllers need to know about their
//! environment lives in [`ClientConfig`]. The defaults reproduce the stock
//! web client; the `with_*` methods adjust individual settings.

use crate::core::constants::{
    DEBOUNCE_MS, DEFAULT_CENTER, DEFAULT_MAX_ZOOM, DEFAULT_TILE_CACHE_SIZE, DEFAULT_UPLOAD_INFO,
    DEFAULT_ZOOM, ESRI_ATTRIBUTION, ESRI_LIGHT_GRAY_URL,
};
use crate::core::geo::LatLng;
pub use crate::input::events::RefreshTrigger;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the backend, e.g. `http://localhost:8080`
    pub server_url: String,
    pub center: LatLng,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Quiet period for viewport-change debouncing
    pub debounce_ms: u64,
    /// Which zoom event refreshes the heatmap
    pub refresh_trigger: RefreshTrigger,
    /// Basemap URL template with `{z}`, `{x}`, `{y}` placeholders
    pub tile_url: String,
    pub attribution: String,
    pub tile_cache_size: usize,
    /// Status text shown next to the file picker when idle
    pub upload_info: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            center: LatLng::new(DEFAULT_CENTER.0, DEFAULT_CENTER.1),
            zoom: DEFAULT_ZOOM,
            min_zoom: 0.0,
            max_zoom: DEFAULT_MAX_ZOOM,
            debounce_ms: DEBOUNCE_MS,
            refresh_trigger: RefreshTrigger::default(),
            tile_url: ESRI_LIGHT_GRAY_URL.to_string(),
            attribution: ESRI_ATTRIBUTION.to_string(),
            tile_cache_size: DEFAULT_TILE_CACHE_SIZE,
            upload_info: DEFAULT_UPLOAD_INFO.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    pub fn with_view(mut self, center: LatLng, zoom: f64) -> Self {
        self.center = center;
        self.zoom = zoom;
        self
    }

    pub fn with_zoom_limits(mut self, min_zoom: f64, max_zoom: f64) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = debounce.as_millis() as u64;
        self
    }

    pub fn with_refresh_trigger(mut self, trigger: RefreshTrigger) -> Self {
        self.refresh_trigger = trigger;
        self
    }

    pub fn with_tiles(mut self, url: impl Into<String>, attribution: impl Into<String>) -> Self {
        self.tile_url = url.into();
        self.attribution = attribution.into();
        self
    }

    pub fn with_upload_info(mut self, info: impl Into<String>) -> Self {
        self.upload_info = info.into();
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Backend base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }
}
