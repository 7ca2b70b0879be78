pub mod heat;
pub mod tile;

pub use heat::{HeatGradient, HeatLayer, HeatLayerOptions, HeatLayerSlot};
pub use tile::{DecodedTile, TileLayer, VisibleTile};
