//! Prelude module for common geoheat types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use geoheat::prelude::*;`

pub use crate::core::{
    config::ClientConfig,
    geo::{LatLng, LatLngBounds, Point, TileCoord},
    viewport::Viewport,
};

pub use crate::controllers::{
    map::{MapController, RefreshHandle},
    upload::{UploadController, UploadStatus},
};

pub use crate::background::{
    debounce::Debouncer,
    geoip::{GeoipSource, HttpGeoipClient, UploadFile, UploadResponse},
};

pub use crate::data::geoip::{GeoipQuery, HeatPoint};

pub use crate::input::events::{MapEvent, RefreshTrigger};

pub use crate::layers::{
    heat::{HeatGradient, HeatLayer, HeatLayerOptions, HeatLayerSlot},
    tile::TileLayer,
};

pub use crate::runtime::{init_runtime, runtime, spawn, AsyncHandle, AsyncSpawner};

#[cfg(feature = "egui")]
pub use crate::ui::{
    map_view::{MapView, MapViewState},
    upload_panel::UploadPanel,
};

pub use crate::{Error as MapError, Result};

pub use std::{
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};

pub use futures::Future;
