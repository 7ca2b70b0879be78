//! egui widgets for the map and the upload form

pub mod map_view;
pub mod upload_panel;

pub use map_view::{MapView, MapViewState};
pub use upload_panel::UploadPanel;
