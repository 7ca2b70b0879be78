//! Client-wide constants: map defaults, `/geoip` wire names and heat-layer tuning.
//! Keeping them in a single place makes it easier to tweak the magic numbers.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Initial map center (latitude, longitude).
pub const DEFAULT_CENTER: (f64, f64) = (15.0, 0.0);

/// Initial zoom level.
pub const DEFAULT_ZOOM: f64 = 2.0;

/// Highest zoom served by the basemap.
pub const DEFAULT_MAX_ZOOM: f64 = 16.0;

/// Quiet period before a burst of viewport changes turns into a request.
pub const DEBOUNCE_MS: u64 = 250;

/// Path of the point-data and upload endpoint.
pub const GEOIP_PATH: &str = "/geoip";

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// Zoom levels at or below this use the coarse resolution.
pub const COARSE_RESOLUTION_MAX_ZOOM: f64 = 3.0;

/// Aggregation cell (degrees) requested for world-scale views.
pub const COARSE_RESOLUTION: f64 = 0.25;

/// Zoom levels at or below this (and above the coarse limit) use the medium resolution.
pub const MEDIUM_RESOLUTION_MAX_ZOOM: f64 = 5.0;

/// Aggregation cell (degrees) requested for continent-scale views.
pub const MEDIUM_RESOLUTION: f64 = 0.125;

/// Intensity that saturates the heat gradient.
pub const HEAT_MAX_INTENSITY: f64 = 33.0;

/// Blur as a fraction of the point radius.
pub const HEAT_BLUR_FACTOR: f64 = 0.75;

/// Status text shown while an upload is in flight.
pub const LOADING_MESSAGE: &str = "Loading…";

/// Status text shown when no upload is running.
pub const DEFAULT_UPLOAD_INFO: &str = "Choose a CSV file of IP networks to add it to the map.";

/// Light-gray Esri basemap.
pub const ESRI_LIGHT_GRAY_URL: &str = "https://server.arcgisonline.com/ArcGIS/rest/services/Canvas/World_Light_Gray_Base/MapServer/tile/{z}/{y}/{x}";

/// Attribution required by the Esri basemap.
pub const ESRI_ATTRIBUTION: &str = "Tiles © Esri, DeLorme, NAVTEQ";

/// Decoded tiles kept in memory.
pub const DEFAULT_TILE_CACHE_SIZE: usize = 256;

/// Widget ids, named after the page elements of the web client.
pub mod ids {
    pub const MAP: &str = "map";
    pub const UPLOAD_FORM: &str = "upload";
    pub const FILE_INPUT: &str = "file";
    pub const UPLOAD_INFO: &str = "upload-info";
}
