use crate::core::constants::{HEAT_BLUR_FACTOR, HEAT_MAX_INTENSITY};
use crate::core::geo::Point;
use crate::core::viewport::Viewport;
use crate::data::geoip::HeatPoint;

/// RGBA color, unmultiplied
pub type Rgba = [u8; 4];

/// Color ramp keyed by normalized intensity
#[derive(Debug, Clone, PartialEq)]
pub struct HeatGradient {
    stops: Vec<(f64, [u8; 3])>,
}

impl HeatGradient {
    /// Builds a gradient from `(threshold, color)` stops; stops are sorted by threshold
    pub fn new(mut stops: Vec<(f64, [u8; 3])>) -> Self {
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { stops }
    }

    /// blue → cyan → green → yellow → red → magenta
    pub fn geoip() -> Self {
        Self::new(vec![
            (0.0, [0, 0, 255]),
            (0.05, [0, 255, 255]),
            (0.1, [0, 255, 0]),
            (0.2, [255, 255, 0]),
            (0.4, [255, 0, 0]),
            (0.8, [255, 0, 255]),
        ])
    }

    pub fn stops(&self) -> &[(f64, [u8; 3])] {
        &self.stops
    }

    /// Interpolated color at normalized intensity `t`
    pub fn color_at(&self, t: f64) -> [u8; 3] {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return [0, 0, 0],
        };
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }

        for pair in self.stops.windows(2) {
            let (t1, c1) = pair[0];
            let (t2, c2) = pair[1];
            if t >= t1 && t <= t2 {
                let f = if t2 > t1 { (t - t1) / (t2 - t1) } else { 0.0 };
                let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
                return [lerp(c1[0], c2[0]), lerp(c1[1], c2[1]), lerp(c1[2], c2[2])];
            }
        }

        last.1
    }
}

impl Default for HeatGradient {
    fn default() -> Self {
        Self::geoip()
    }
}

/// Radius in pixels of a point's influence at `zoom`
pub fn radius_for_zoom(zoom: f64) -> f64 {
    2.0 * (zoom + 1.0).powf(1.25)
}

/// Rendering options of a heat layer
#[derive(Debug, Clone, PartialEq)]
pub struct HeatLayerOptions {
    pub radius: f64,
    pub blur: f64,
    /// Accumulated intensity that maps to the top of the gradient
    pub max: f64,
    pub gradient: HeatGradient,
    /// Opacity floor for any painted cell
    pub min_opacity: f64,
}

impl HeatLayerOptions {
    /// Options sized for the given zoom level
    pub fn for_zoom(zoom: f64) -> Self {
        let radius = radius_for_zoom(zoom);
        Self {
            radius,
            blur: radius * HEAT_BLUR_FACTOR,
            max: HEAT_MAX_INTENSITY,
            gradient: HeatGradient::geoip(),
            min_opacity: 0.05,
        }
    }

    /// Color and alpha for an accumulated value
    pub fn colorize(&self, value: f64) -> Rgba {
        let t = if self.max > 0.0 {
            (value / self.max).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let [r, g, b] = self.gradient.color_at(t);
        let alpha = t.max(self.min_opacity).min(1.0);
        [r, g, b, (alpha * 255.0).round() as u8]
    }
}

/// One painted cell of a rasterized heat layer, in screen pixels
#[derive(Debug, Clone, PartialEq)]
pub struct HeatCell {
    pub min: Point,
    pub size: f64,
    pub value: f64,
    pub color: Rgba,
}

/// Screen-space accumulation grid
#[derive(Debug, Clone)]
pub struct HeatGrid {
    pub cell_size: f64,
    pub cols: usize,
    pub rows: usize,
    values: Vec<f64>,
}

impl HeatGrid {
    pub fn value(&self, col: usize, row: usize) -> f64 {
        self.values.get(row * self.cols + col).copied().unwrap_or(0.0)
    }

    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }
}

/// Points plus the options they are drawn with
#[derive(Debug, Clone, PartialEq)]
pub struct HeatLayer {
    points: Vec<HeatPoint>,
    options: HeatLayerOptions,
}

impl HeatLayer {
    pub fn new(points: Vec<HeatPoint>, options: HeatLayerOptions) -> Self {
        Self { points, options }
    }

    pub fn points(&self) -> &[HeatPoint] {
        &self.points
    }

    pub fn options(&self) -> &HeatLayerOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Accumulates point influence into a grid of `radius / 2` cells covering the viewport
    pub fn grid(&self, viewport: &Viewport) -> HeatGrid {
        let radius = self.options.radius.max(1.0);
        let blur = self.options.blur.max(f64::EPSILON);
        let cell_size = (radius / 2.0).max(1.0);
        let cols = (viewport.size.x.max(0.0) / cell_size).ceil() as usize;
        let rows = (viewport.size.y.max(0.0) / cell_size).ceil() as usize;
        let mut values = vec![0.0; cols * rows];

        if cols == 0 || rows == 0 {
            return HeatGrid {
                cell_size,
                cols,
                rows,
                values,
            };
        }

        for point in &self.points {
            let pixel = viewport.lat_lng_to_pixel(&point.position());
            if pixel.x < -radius
                || pixel.y < -radius
                || pixel.x > viewport.size.x + radius
                || pixel.y > viewport.size.y + radius
            {
                continue;
            }

            let first_col = ((pixel.x - radius) / cell_size).floor().max(0.0) as usize;
            let first_row = ((pixel.y - radius) / cell_size).floor().max(0.0) as usize;
            let last_col = (((pixel.x + radius) / cell_size).floor() as usize).min(cols - 1);
            let last_row = (((pixel.y + radius) / cell_size).floor() as usize).min(rows - 1);

            for row in first_row..=last_row {
                for col in first_col..=last_col {
                    let center = Point::new(
                        (col as f64 + 0.5) * cell_size,
                        (row as f64 + 0.5) * cell_size,
                    );
                    let distance = center.distance_to(&pixel);
                    if distance <= radius {
                        let falloff = (-distance * distance / (2.0 * blur * blur)).exp();
                        values[row * cols + col] += point.intensity * falloff;
                    }
                }
            }
        }

        HeatGrid {
            cell_size,
            cols,
            rows,
            values,
        }
    }

    /// Colored cells worth painting for `viewport`
    pub fn cells(&self, viewport: &Viewport) -> Vec<HeatCell> {
        if self.points.is_empty() {
            return Vec::new();
        }

        let grid = self.grid(viewport);
        let threshold = self.options.max * 1e-3;
        let mut cells = Vec::new();

        for row in 0..grid.rows {
            for col in 0..grid.cols {
                let value = grid.value(col, row);
                if value > threshold {
                    cells.push(HeatCell {
                        min: Point::new(col as f64 * grid.cell_size, row as f64 * grid.cell_size),
                        size: grid.cell_size,
                        value,
                        color: self.options.colorize(value),
                    });
                }
            }
        }

        cells
    }
}

/// Holds the single heat layer attached to the map, tagged with the
/// sequence number of the request that produced it
#[derive(Debug, Default)]
pub struct HeatLayerSlot {
    current: Option<(u64, HeatLayer)>,
}

impl HeatLayerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swaps in `layer` if `seq` is newer than the attached layer's.
    /// Returns whether the slot changed.
    pub fn replace(&mut self, seq: u64, layer: HeatLayer) -> bool {
        if let Some((current_seq, _)) = &self.current {
            if seq <= *current_seq {
                return false;
            }
        }
        self.current = Some((seq, layer));
        true
    }

    pub fn layer(&self) -> Option<&HeatLayer> {
        self.current.as_ref().map(|(_, layer)| layer)
    }

    pub fn seq(&self) -> Option<u64> {
        self.current.as_ref().map(|(seq, _)| *seq)
    }
}
