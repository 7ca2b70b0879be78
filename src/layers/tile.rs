use crate::background::geoip::HTTP_CLIENT;
use crate::core::constants::{
    DEFAULT_MAX_ZOOM, DEFAULT_TILE_CACHE_SIZE, ESRI_ATTRIBUTION, ESRI_LIGHT_GRAY_URL, TILE_SIZE,
};
use crate::core::geo::{Point, TileCoord};
use crate::core::viewport::Viewport;
use crate::prelude::HashSet;
use crate::{runtime, MapError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

/// A downloaded tile, decoded to RGBA8
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTile {
    pub size: [usize; 2],
    pub rgba: Arc<Vec<u8>>,
}

impl DecodedTile {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = image.dimensions();
        Ok(Self {
            size: [width as usize, height as usize],
            rgba: Arc::new(image.into_raw()),
        })
    }
}

/// A tile that covers part of the viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleTile {
    /// Tile to draw (column wrapped into the world)
    pub coord: TileCoord,
    /// Top-left corner in screen pixels
    pub min: Point,
    /// Bottom-right corner in screen pixels
    pub max: Point,
}

struct TileResult {
    coord: TileCoord,
    data: Result<DecodedTile>,
}

/// Slippy-map basemap: works out which tiles the viewport needs, downloads
/// them in the background and keeps the decoded ones in an LRU cache
pub struct TileLayer {
    url_template: String,
    attribution: String,
    max_zoom: u8,
    cache: LruCache<TileCoord, DecodedTile>,
    pending: HashSet<TileCoord>,
    result_tx: Sender<TileResult>,
    result_rx: Receiver<TileResult>,
}

impl TileLayer {
    pub fn new(url_template: impl Into<String>, attribution: impl Into<String>) -> Self {
        let (result_tx, result_rx) = unbounded();
        Self {
            url_template: url_template.into(),
            attribution: attribution.into(),
            max_zoom: DEFAULT_MAX_ZOOM as u8,
            cache: LruCache::new(Self::capacity(DEFAULT_TILE_CACHE_SIZE)),
            pending: HashSet::default(),
            result_tx,
            result_rx,
        }
    }

    /// Esri "World Light Gray" canvas basemap
    pub fn esri_light_gray() -> Self {
        Self::new(ESRI_LIGHT_GRAY_URL, ESRI_ATTRIBUTION)
    }

    pub fn with_max_zoom(mut self, max_zoom: u8) -> Self {
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache.resize(Self::capacity(cache_size));
        self
    }

    fn capacity(cache_size: usize) -> NonZeroUsize {
        NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn attribution(&self) -> &str {
        &self.attribution
    }

    /// Download URL of `coord`
    pub fn url_for(&self, coord: &TileCoord) -> String {
        self.url_template
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }

    /// Tile zoom level used for `viewport`
    pub fn tile_zoom(&self, viewport: &Viewport) -> u8 {
        viewport.zoom.round().clamp(0.0, self.max_zoom as f64) as u8
    }

    /// Tiles covering the viewport with their on-screen rectangles
    pub fn visible_tiles(&self, viewport: &Viewport) -> Vec<VisibleTile> {
        let zoom = self.tile_zoom(viewport);
        let origin = viewport.pixel_origin();
        // Tiles are scaled when the view zoom is beyond the tile zoom
        let scale = 2_f64.powf(viewport.zoom - zoom as f64);
        let tile_size = TILE_SIZE as f64 * scale;

        let min_x = (origin.x / tile_size).floor() as i64;
        let min_y = (origin.y / tile_size).floor() as i64;
        let max_x = ((origin.x + viewport.size.x) / tile_size).floor() as i64;
        let max_y = ((origin.y + viewport.size.y) / tile_size).floor() as i64;

        let mut tiles = Vec::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                if let Some(coord) = TileCoord::wrapped(x, y, zoom) {
                    let min = Point::new(x as f64 * tile_size, y as f64 * tile_size)
                        .subtract(&origin);
                    let max = min.add(&Point::new(tile_size, tile_size));
                    tiles.push(VisibleTile { coord, min, max });
                }
            }
        }
        tiles
    }

    /// Queues downloads for visible tiles that are neither cached nor in flight.
    /// Returns how many were queued.
    pub fn update(&mut self, viewport: &Viewport) -> Result<usize> {
        let mut queued = 0;
        for tile in self.visible_tiles(viewport) {
            let coord = tile.coord;
            if self.cache.contains(&coord) || self.pending.contains(&coord) {
                continue;
            }

            let url = self.url_for(&coord);
            let result_tx = self.result_tx.clone();
            log::debug!("Loading tile {:?}", coord);

            runtime::spawn(async move {
                let data = Self::download_tile(url).await;
                let _ = result_tx.send(TileResult { coord, data });
            })?;

            self.pending.insert(coord);
            queued += 1;
        }
        Ok(queued)
    }

    /// Moves finished downloads into the cache. Returns how many tiles arrived.
    pub fn poll(&mut self) -> usize {
        let mut arrived = 0;
        while let Ok(result) = self.result_rx.try_recv() {
            self.pending.remove(&result.coord);
            match result.data {
                Ok(tile) => {
                    self.cache.put(result.coord, tile);
                    arrived += 1;
                }
                Err(e) => log::warn!("Failed to load tile {:?}: {}", result.coord, e),
            }
        }
        arrived
    }

    /// Decoded tile, if cached
    pub fn tile(&mut self, coord: &TileCoord) -> Option<&DecodedTile> {
        self.cache.get(coord)
    }

    pub fn insert_tile(&mut self, coord: TileCoord, tile: DecodedTile) {
        self.pending.remove(&coord);
        self.cache.put(coord, tile);
    }

    pub fn is_loading(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    async fn download_tile(url: String) -> Result<DecodedTile> {
        let response = HTTP_CLIENT
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(MapError::Http {
                status,
                body: format!("tile {url}"),
            });
        }

        let bytes = response.bytes().await?;
        decode_off_thread(bytes.to_vec()).await
    }
}

#[cfg(feature = "tokio-runtime")]
async fn decode_off_thread(bytes: Vec<u8>) -> Result<DecodedTile> {
    tokio::task::spawn_blocking(move || DecodedTile::decode(&bytes))
        .await
        .map_err(|e| MapError::Runtime(e.to_string()))?
}

#[cfg(not(feature = "tokio-runtime"))]
async fn decode_off_thread(bytes: Vec<u8>) -> Result<DecodedTile> {
    DecodedTile::decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::LatLng;

    fn solid_tile() -> DecodedTile {
        DecodedTile {
            size: [1, 1],
            rgba: Arc::new(vec![200, 200, 200, 255]),
        }
    }

    #[test]
    fn test_url_template() {
        let layer = TileLayer::esri_light_gray();
        let url = layer.url_for(&TileCoord::new(3, 5, 4));
        assert!(url.ends_with("/MapServer/tile/4/5/3"));
        assert_eq!(layer.attribution(), "Tiles © Esri, DeLorme, NAVTEQ");
    }

    #[test]
    fn test_visible_tiles_cover_viewport() {
        let layer = TileLayer::esri_light_gray();
        let viewport = Viewport::new(LatLng::new(0.0, 0.0), 2.0, Point::new(512.0, 512.0));

        let tiles = layer.visible_tiles(&viewport);
        // world is 1024px wide; a centered 512px view spans x/y tiles 1..=2 plus the edge row/col
        assert!(tiles.iter().all(|t| t.coord.z == 2 && t.coord.is_valid()));
        assert!(tiles.iter().any(|t| t.coord == TileCoord::new(1, 1, 2)));
        assert!(tiles
            .iter()
            .any(|t| t.min.x <= 0.0 && t.min.y <= 0.0 && t.max.x > 0.0 && t.max.y > 0.0));
    }

    #[test]
    fn test_visible_tiles_wrap_antimeridian() {
        let layer = TileLayer::esri_light_gray();
        let viewport = Viewport::new(LatLng::new(0.0, 179.0), 1.0, Point::new(256.0, 256.0));

        let tiles = layer.visible_tiles(&viewport);
        assert!(tiles.iter().any(|t| t.coord.x == 0));
        assert!(tiles.iter().any(|t| t.coord.x == 1));
    }

    #[test]
    fn test_tile_zoom_capped() {
        let layer = TileLayer::esri_light_gray().with_max_zoom(4);
        let viewport = Viewport::new(LatLng::new(0.0, 0.0), 6.0, Point::new(256.0, 256.0));
        assert_eq!(layer.tile_zoom(&viewport), 4);
        assert!(layer.visible_tiles(&viewport).iter().all(|t| t.coord.z == 4));
    }

    #[test]
    fn test_cached_tiles_are_not_requeued() {
        let mut layer = TileLayer::esri_light_gray();
        let viewport = Viewport::new(LatLng::new(0.0, 0.0), 0.0, Point::new(256.0, 256.0));

        layer.insert_tile(TileCoord::new(0, 0, 0), solid_tile());
        assert_eq!(layer.update(&viewport).unwrap(), 0);
        assert_eq!(layer.cached_count(), 1);
        assert!(layer.tile(&TileCoord::new(0, 0, 0)).is_some());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            DecodedTile::decode(b"not an image"),
            Err(MapError::Image(_))
        ));
    }
}
