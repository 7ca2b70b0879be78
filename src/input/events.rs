use crate::core::geo::{LatLng, Point};
use serde::{Deserialize, Serialize};

/// Map event types emitted by the map view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MapEvent {
    /// The initial view has been laid out
    Load { center: LatLng, zoom: f64 },
    /// Zoom started
    ZoomStart { zoom: f64 },
    /// Zoom ended
    ZoomEnd { zoom: f64 },
    /// Start of drag operation
    DragStart { position: Point },
    /// End of drag operation
    DragEnd { center: LatLng },
    /// Viewport/window resize
    Resize { size: Point },
}

impl MapEvent {
    /// Short name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            MapEvent::Load { .. } => "load",
            MapEvent::ZoomStart { .. } => "zoomstart",
            MapEvent::ZoomEnd { .. } => "zoomend",
            MapEvent::DragStart { .. } => "dragstart",
            MapEvent::DragEnd { .. } => "dragend",
            MapEvent::Resize { .. } => "resize",
        }
    }

    /// Checks if this is a zoom event
    pub fn is_zoom_event(&self) -> bool {
        matches!(self, MapEvent::ZoomStart { .. } | MapEvent::ZoomEnd { .. })
    }
}

/// Which zoom event schedules a heatmap refresh.
///
/// Drag end and the initial load always schedule one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
    /// Refresh once a zoom has finished
    #[default]
    ZoomEnd,
    /// Refresh as soon as a zoom begins
    ZoomStart,
}

impl RefreshTrigger {
    /// Whether `event` should (re)start the debounce timer
    pub fn triggers(&self, event: &MapEvent) -> bool {
        match event {
            MapEvent::Load { .. } | MapEvent::DragEnd { .. } => true,
            MapEvent::ZoomEnd { .. } => *self == RefreshTrigger::ZoomEnd,
            MapEvent::ZoomStart { .. } => *self == RefreshTrigger::ZoomStart,
            MapEvent::DragStart { .. } | MapEvent::Resize { .. } => false,
        }
    }
}
