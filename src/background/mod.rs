pub mod debounce;
pub mod geoip;

pub use debounce::Debouncer;
pub use geoip::{GeoipSource, HttpGeoipClient, UploadFile, UploadResponse};
