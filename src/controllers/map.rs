use crate::background::debounce::Debouncer;
use crate::background::geoip::GeoipSource;
use crate::core::config::ClientConfig;
use crate::core::geo::Point;
use crate::core::viewport::Viewport;
use crate::data::geoip::{GeoipQuery, HeatPoint};
use crate::input::events::{MapEvent, RefreshTrigger};
use crate::layers::heat::{HeatLayer, HeatLayerOptions, HeatLayerSlot};
use crate::prelude::{Duration, HashMap, Instant};
use crate::runtime::{self, AsyncHandle};
use crate::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;

/// Lets other components ask the map for an immediate heatmap refresh
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    tx: Sender<()>,
}

impl RefreshHandle {
    /// Queues a refresh; the map issues it on its next `poll`.
    /// Returns false once the map controller is gone.
    pub fn request(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

struct FetchOutcome {
    seq: u64,
    result: Result<Vec<HeatPoint>>,
}

/// Owns the viewport and the heat layer, and turns viewport changes into
/// debounced `/geoip` requests.
///
/// Every request is stamped with a sequence number. Only the response to the
/// latest issued request may replace the heat layer, so a slow response can
/// never overwrite a newer view.
pub struct MapController {
    viewport: Viewport,
    refresh_trigger: RefreshTrigger,
    source: Arc<dyn GeoipSource>,
    debouncer: Debouncer,
    heat: HeatLayerSlot,
    last_issued: u64,
    in_flight: HashMap<u64, Box<dyn AsyncHandle>>,
    result_tx: Sender<FetchOutcome>,
    result_rx: Receiver<FetchOutcome>,
    refresh_tx: Sender<()>,
    refresh_rx: Receiver<()>,
    last_error: Option<String>,
}

impl MapController {
    pub fn new(config: &ClientConfig, source: Arc<dyn GeoipSource>) -> Self {
        let mut viewport = Viewport::new(config.center, config.zoom, Point::new(800.0, 600.0));
        viewport.set_zoom_limits(config.min_zoom, config.max_zoom);
        viewport.set_zoom(config.zoom);

        let (result_tx, result_rx) = unbounded();
        let (refresh_tx, refresh_rx) = unbounded();

        Self {
            viewport,
            refresh_trigger: config.refresh_trigger,
            source,
            debouncer: Debouncer::new(config.debounce()),
            heat: HeatLayerSlot::new(),
            last_issued: 0,
            in_flight: HashMap::default(),
            result_tx,
            result_rx,
            refresh_tx,
            refresh_rx,
            last_error: None,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Mutable viewport access for the map view. Changes only reach the
    /// backend once a matching [`MapEvent`] is handled.
    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn refresh_trigger(&self) -> RefreshTrigger {
        self.refresh_trigger
    }

    pub fn heat_layer(&self) -> Option<&HeatLayer> {
        self.heat.layer()
    }

    pub fn heat_slot(&self) -> &HeatLayerSlot {
        &self.heat
    }

    pub fn refresh_handle(&self) -> RefreshHandle {
        RefreshHandle {
            tx: self.refresh_tx.clone(),
        }
    }

    /// Sequence number of the most recent request, 0 before the first one
    pub fn last_issued_seq(&self) -> u64 {
        self.last_issued
    }

    pub fn in_flight_requests(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_refresh_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Time until the debounce timer fires, if it is armed
    pub fn time_to_refresh(&self, now: Instant) -> Option<Duration> {
        self.debouncer.remaining(now)
    }

    /// Message of the most recent failed fetch, cleared by the next success
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Reacts to a viewport event. Returns whether a refresh was scheduled.
    pub fn handle_event(&mut self, event: &MapEvent, now: Instant) -> bool {
        if let MapEvent::Resize { size } = event {
            self.viewport.set_size(*size);
        }

        if self.refresh_trigger.triggers(event) {
            log::debug!(
                "{} at zoom {}: heatmap refresh in {:?}",
                event.name(),
                self.viewport.zoom,
                self.debouncer.delay()
            );
            self.debouncer.trigger(now);
            true
        } else {
            if event.is_zoom_event() {
                log::debug!("{} at zoom {}", event.name(), self.viewport.zoom);
            }
            false
        }
    }

    /// Requests point data for the current viewport right away, bypassing the
    /// debounce timer. Returns the request's sequence number.
    pub fn refresh_now(&mut self) -> Result<u64> {
        let query = GeoipQuery::from_viewport(&self.viewport);
        let seq = self.last_issued + 1;

        log::info!(
            "Requesting heatmap #{} (zoom {}, resolution {:?})",
            seq,
            query.zoom,
            query.resolution
        );

        let source = Arc::clone(&self.source);
        let result_tx = self.result_tx.clone();
        let handle = runtime::spawn(async move {
            let result = source.fetch(&query).await;
            let _ = result_tx.send(FetchOutcome { seq, result });
        })?;

        self.last_issued = seq;
        self.in_flight.insert(seq, handle);
        Ok(seq)
    }

    /// Drives the controller from the UI loop: services refresh requests,
    /// fires an expired debounce timer and applies finished responses.
    /// Returns whether the heat layer changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut forced = false;
        while self.refresh_rx.try_recv().is_ok() {
            forced = true;
        }
        if forced {
            self.issue("forced");
        }

        if self.debouncer.poll(now) {
            self.issue("debounced");
        }

        // A finished task has already sent its outcome, so prune before draining
        self.in_flight.retain(|_, handle| !handle.is_finished());

        let mut changed = false;
        while let Ok(outcome) = self.result_rx.try_recv() {
            changed |= self.apply(outcome);
        }
        changed
    }

    fn issue(&mut self, reason: &str) {
        if let Err(e) = self.refresh_now() {
            log::error!("Unable to request {} heatmap refresh: {}", reason, e);
            self.last_error = Some(e.to_string());
        }
    }

    fn apply(&mut self, outcome: FetchOutcome) -> bool {
        self.in_flight.remove(&outcome.seq);

        if outcome.seq != self.last_issued {
            match &outcome.result {
                Ok(_) => log::debug!(
                    "Discarding stale heatmap response #{} (latest #{})",
                    outcome.seq,
                    self.last_issued
                ),
                Err(e) => log::debug!(
                    "Ignoring failure of superseded heatmap request #{}: {}",
                    outcome.seq,
                    e
                ),
            }
            return false;
        }

        let points = match outcome.result {
            Ok(points) => points,
            Err(e) => {
                log::error!("Unable to load heatmap data (#{}): {}", outcome.seq, e);
                self.last_error = Some(e.to_string());
                return false;
            }
        };

        let options = HeatLayerOptions::for_zoom(self.viewport.zoom);
        let count = points.len();
        let replaced = self
            .heat
            .replace(outcome.seq, HeatLayer::new(points, options));
        if replaced {
            log::info!("Heatmap #{} loaded with {} points", outcome.seq, count);
            self.last_error = None;
        }
        replaced
    }
}

impl Drop for MapController {
    fn drop(&mut self) {
        for handle in self.in_flight.values() {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::geoip::{UploadFile, UploadResponse};
    use crate::MapError;
    use async_trait::async_trait;

    struct NoBackend;

    #[async_trait]
    impl GeoipSource for NoBackend {
        async fn fetch(&self, _query: &GeoipQuery) -> Result<Vec<HeatPoint>> {
            Err(MapError::InvalidResponse("offline".to_string()))
        }

        async fn upload(&self, _file: UploadFile) -> Result<UploadResponse> {
            Ok(UploadResponse::ok())
        }
    }

    fn controller(trigger: RefreshTrigger) -> MapController {
        let config = ClientConfig::default().with_refresh_trigger(trigger);
        MapController::new(&config, Arc::new(NoBackend))
    }

    #[test]
    fn test_initial_view_from_config() {
        let config = ClientConfig::default().with_zoom_limits(3.0, 10.0);
        let map = MapController::new(&config, Arc::new(NoBackend));
        assert_eq!(map.viewport().zoom, 3.0);
        assert_eq!(map.viewport().center.lat, 15.0);
        assert!(map.heat_layer().is_none());
        assert_eq!(map.last_issued_seq(), 0);
    }

    #[test]
    fn test_events_arm_debouncer_per_trigger() {
        let now = Instant::now();

        let mut map = controller(RefreshTrigger::ZoomEnd);
        assert!(!map.handle_event(&MapEvent::ZoomStart { zoom: 3.0 }, now));
        assert!(!map.is_refresh_pending());
        assert!(map.handle_event(&MapEvent::ZoomEnd { zoom: 3.0 }, now));
        assert!(map.is_refresh_pending());

        let mut map = controller(RefreshTrigger::ZoomStart);
        assert!(!map.handle_event(&MapEvent::ZoomEnd { zoom: 3.0 }, now));
        assert!(map.handle_event(&MapEvent::ZoomStart { zoom: 3.0 }, now));
        assert_eq!(map.time_to_refresh(now), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_resize_updates_viewport_without_refresh() {
        let mut map = controller(RefreshTrigger::ZoomEnd);
        let scheduled = map.handle_event(
            &MapEvent::Resize {
                size: Point::new(1024.0, 768.0),
            },
            Instant::now(),
        );
        assert!(!scheduled);
        assert_eq!(map.viewport().size, Point::new(1024.0, 768.0));
    }

    #[test]
    fn test_refresh_outside_runtime_is_reported() {
        let mut map = controller(RefreshTrigger::ZoomEnd);
        let now = Instant::now();
        map.handle_event(&MapEvent::DragEnd { center: map.viewport().center }, now);

        // no tokio context in a plain #[test]
        assert!(!map.poll(now + Duration::from_millis(300)));
        assert_eq!(map.last_issued_seq(), 0);
        assert!(map.last_error().is_some());
    }

    #[test]
    fn test_refresh_handle_outlives_nothing() {
        let map = controller(RefreshTrigger::ZoomEnd);
        let handle = map.refresh_handle();
        assert!(handle.request());
        drop(map);
        assert!(!handle.request());
    }
}
