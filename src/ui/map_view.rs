use crate::controllers::map::MapController;
use crate::core::constants::ids;
use crate::core::geo::{LatLng, Point, TileCoord};
use crate::core::viewport::Viewport;
use crate::input::events::MapEvent;
use crate::layers::heat::HeatCell;
use crate::layers::tile::TileLayer;
use crate::prelude::{Duration, HashMap, HashSet, Instant};
use egui::{
    Align2, Button, Color32, ColorImage, FontId, Id, Pos2, Rect, Response, Sense, TextureHandle,
    TextureOptions, Ui, Vec2, Widget,
};

/// Scroll distance (in points) that makes one zoom step
const SCROLL_STEP: f32 = 50.0;
const ZOOM_BUTTON_SIZE: f32 = 26.0;
const BACKGROUND: Color32 = Color32::from_rgb(221, 221, 221);

/// Frame-to-frame state of a [`MapView`]: tile textures, the cached heat
/// raster and whether the initial load event has been sent
#[derive(Default)]
pub struct MapViewState {
    textures: HashMap<TileCoord, TextureHandle>,
    loaded: bool,
    last_size: Option<Point>,
    scroll_accum: f32,
    heat_cache: Option<(HeatCacheKey, Vec<HeatCell>)>,
}

impl MapViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the first frame has been laid out
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct HeatCacheKey {
    seq: Option<u64>,
    center: LatLng,
    zoom: f64,
    size: Point,
}

/// Interactive world map: basemap tiles with the heat layer on top.
///
/// Drag to pan, scroll or double-click to zoom, or use the zoom buttons.
/// Every interaction is reported to the [`MapController`] as a [`MapEvent`].
pub struct MapView<'a> {
    map: &'a mut MapController,
    tiles: &'a mut TileLayer,
    state: &'a mut MapViewState,
    size: Option<Vec2>,
}

impl<'a> MapView<'a> {
    pub fn new(
        map: &'a mut MapController,
        tiles: &'a mut TileLayer,
        state: &'a mut MapViewState,
    ) -> Self {
        Self {
            map,
            tiles,
            state,
            size: None,
        }
    }

    /// Fixed widget size; defaults to all available space
    pub fn size(mut self, size: Vec2) -> Self {
        self.size = Some(size);
        self
    }
}

impl Widget for MapView<'_> {
    fn ui(self, ui: &mut Ui) -> Response {
        let MapView {
            map,
            tiles,
            state,
            size,
        } = self;

        let desired_size = size.unwrap_or_else(|| ui.available_size());
        let (rect, _) = ui.allocate_exact_size(desired_size, Sense::hover());
        let response = ui.interact(rect, Id::new(ids::MAP), Sense::click_and_drag());
        let mut events = Vec::new();

        let view_size = Point::new(rect.width() as f64, rect.height() as f64);
        if state.last_size != Some(view_size) {
            map.viewport_mut().set_size(view_size);
            if state.last_size.is_some() {
                events.push(MapEvent::Resize { size: view_size });
            }
            state.last_size = Some(view_size);
        }

        if !state.loaded {
            state.loaded = true;
            let viewport = map.viewport();
            events.push(MapEvent::Load {
                center: viewport.center,
                zoom: viewport.zoom,
            });
        }

        if response.drag_started() {
            let position = response
                .interact_pointer_pos()
                .map(|pos| to_local(rect, pos))
                .unwrap_or_default();
            events.push(MapEvent::DragStart { position });
        }
        if response.dragged() {
            let delta = response.drag_delta();
            if delta != Vec2::ZERO {
                map.viewport_mut()
                    .pan(Point::new(delta.x as f64, delta.y as f64));
            }
        }
        if response.drag_released() {
            events.push(MapEvent::DragEnd {
                center: map.viewport().center,
            });
        }

        let anchor = response.hover_pos().map(|pos| to_local(rect, pos));
        let mut zoom_step = 0.0;
        if response.hovered() {
            state.scroll_accum += ui.input(|i| i.raw_scroll_delta.y);
            if state.scroll_accum.abs() >= SCROLL_STEP {
                zoom_step = state.scroll_accum.signum() as f64;
                state.scroll_accum = 0.0;
            }
        } else {
            state.scroll_accum = 0.0;
        }
        if response.double_clicked() {
            zoom_step = 1.0;
        }
        if zoom_step != 0.0 {
            zoom_view(map.viewport_mut(), zoom_step, anchor, &mut events);
        }

        let now = Instant::now();
        for event in &events {
            map.handle_event(event, now);
        }

        let heat_changed = map.poll(now);
        let tiles_arrived = tiles.poll();
        if let Err(e) = tiles.update(map.viewport()) {
            log::debug!("Unable to queue tile downloads: {}", e);
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, BACKGROUND);
        paint_tiles(ui.ctx(), &painter, rect, tiles, state, map.viewport());
        paint_heat(&painter, rect, map, state);

        if !tiles.attribution().is_empty() {
            painter.text(
                rect.right_bottom() + Vec2::new(-4.0, -2.0),
                Align2::RIGHT_BOTTOM,
                tiles.attribution(),
                FontId::proportional(10.0),
                Color32::from_gray(80),
            );
        }

        // Zoom buttons sit above the map so they win the click
        let zoom_in_rect = Rect::from_min_size(
            rect.left_top() + Vec2::new(10.0, 10.0),
            Vec2::splat(ZOOM_BUTTON_SIZE),
        );
        let zoom_out_rect = zoom_in_rect.translate(Vec2::new(0.0, ZOOM_BUTTON_SIZE + 2.0));
        let viewport = map.viewport();
        let can_zoom_in = viewport.zoom < viewport.max_zoom;
        let can_zoom_out = viewport.zoom > viewport.min_zoom;
        let zoom_in = ui.put(zoom_in_rect, Button::new("+").sense(sense_if(can_zoom_in)));
        let zoom_out = ui.put(zoom_out_rect, Button::new("−").sense(sense_if(can_zoom_out)));

        let button_step = if zoom_in.clicked() {
            1.0
        } else if zoom_out.clicked() {
            -1.0
        } else {
            0.0
        };
        if button_step != 0.0 {
            let mut button_events = Vec::new();
            zoom_view(map.viewport_mut(), button_step, None, &mut button_events);
            for event in &button_events {
                map.handle_event(event, now);
            }
            ui.ctx().request_repaint();
        }

        if heat_changed || tiles_arrived > 0 || !events.is_empty() {
            ui.ctx().request_repaint();
        }
        if tiles.is_loading() || map.in_flight_requests() > 0 {
            ui.ctx().request_repaint_after(Duration::from_millis(100));
        }
        if let Some(wait) = map.time_to_refresh(Instant::now()) {
            ui.ctx().request_repaint_after(wait);
        }

        response
    }
}

fn sense_if(enabled: bool) -> Sense {
    if enabled {
        Sense::click()
    } else {
        Sense::hover()
    }
}

fn to_local(rect: Rect, pos: Pos2) -> Point {
    let local = pos - rect.min;
    Point::new(local.x as f64, local.y as f64)
}

fn to_screen(rect: Rect, point: &Point) -> Pos2 {
    rect.min + Vec2::new(point.x as f32, point.y as f32)
}

/// Zooms one step, keeping the map point under `anchor` in place
fn zoom_view(viewport: &mut Viewport, step: f64, anchor: Option<Point>, events: &mut Vec<MapEvent>) {
    let previous = viewport.zoom;
    let anchored = anchor.map(|pixel| (pixel, viewport.pixel_to_lat_lng(&pixel)));

    if !viewport.zoom_by(step) {
        return;
    }

    if let Some((pixel, lat_lng)) = anchored {
        let moved_to = viewport.lat_lng_to_pixel(&lat_lng);
        viewport.pan(pixel.subtract(&moved_to));
    }

    events.push(MapEvent::ZoomStart { zoom: previous });
    events.push(MapEvent::ZoomEnd {
        zoom: viewport.zoom,
    });
}

fn paint_tiles(
    ctx: &egui::Context,
    painter: &egui::Painter,
    rect: Rect,
    tiles: &mut TileLayer,
    state: &mut MapViewState,
    viewport: &Viewport,
) {
    // Textures live only as long as their tile is on screen
    let visible = tiles.visible_tiles(viewport);
    let on_screen: HashSet<TileCoord> = visible.iter().map(|tile| tile.coord).collect();
    state.textures.retain(|coord, _| on_screen.contains(coord));

    let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
    for tile in visible {
        let texture_id = match state.textures.get(&tile.coord) {
            Some(texture) => texture.id(),
            None => {
                let Some(decoded) = tiles.tile(&tile.coord) else {
                    continue;
                };
                let image = ColorImage::from_rgba_unmultiplied(decoded.size, &decoded.rgba);
                let texture = ctx.load_texture(
                    format!("tile_{}_{}_{}", tile.coord.z, tile.coord.x, tile.coord.y),
                    image,
                    TextureOptions::LINEAR,
                );
                let id = texture.id();
                state.textures.insert(tile.coord, texture);
                id
            }
        };

        let tile_rect = Rect::from_min_max(to_screen(rect, &tile.min), to_screen(rect, &tile.max));
        painter.image(texture_id, tile_rect, uv, Color32::WHITE);
    }
}

fn paint_heat(painter: &egui::Painter, rect: Rect, map: &MapController, state: &mut MapViewState) {
    let viewport = map.viewport();
    let key = HeatCacheKey {
        seq: map.heat_slot().seq(),
        center: viewport.center,
        zoom: viewport.zoom,
        size: viewport.size,
    };

    let stale = state
        .heat_cache
        .as_ref()
        .map_or(true, |(cached, _)| *cached != key);
    if stale {
        let cells = map
            .heat_layer()
            .map(|layer| layer.cells(viewport))
            .unwrap_or_default();
        state.heat_cache = Some((key, cells));
    }

    if let Some((_, cells)) = &state.heat_cache {
        for cell in cells {
            let min = to_screen(rect, &cell.min);
            let cell_rect = Rect::from_min_size(min, Vec2::splat(cell.size as f32));
            let [r, g, b, a] = cell.color;
            painter.rect_filled(cell_rect, 0.0, Color32::from_rgba_unmultiplied(r, g, b, a));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_keeps_anchor_in_place() {
        let mut viewport = Viewport::new(LatLng::new(20.0, 10.0), 4.0, Point::new(800.0, 600.0));
        let anchor = Point::new(600.0, 150.0);
        let before = viewport.pixel_to_lat_lng(&anchor);

        let mut events = Vec::new();
        zoom_view(&mut viewport, 1.0, Some(anchor), &mut events);

        let after = viewport.pixel_to_lat_lng(&anchor);
        assert_eq!(viewport.zoom, 5.0);
        assert!((before.lat - after.lat).abs() < 1e-6);
        assert!((before.lng - after.lng).abs() < 1e-6);
        assert_eq!(
            events,
            vec![
                MapEvent::ZoomStart { zoom: 4.0 },
                MapEvent::ZoomEnd { zoom: 5.0 }
            ]
        );
    }

    #[test]
    fn test_zoom_at_limit_emits_nothing() {
        let mut viewport = Viewport::default();
        viewport.set_zoom_limits(0.0, 2.0);
        viewport.set_zoom(2.0);

        let mut events = Vec::new();
        zoom_view(&mut viewport, 1.0, None, &mut events);
        assert!(events.is_empty());
        assert_eq!(viewport.zoom, 2.0);
    }
}
