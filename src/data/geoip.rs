//! Wire format of the `/geoip` endpoint.
//!
//! A query carries the visible bounds plus an optional aggregation
//! `resolution` picked from the zoom level. The response is a JSON array of
//! points, either `[lat, lng, intensity]` tuples or objects.

use crate::core::constants::{
    COARSE_RESOLUTION, COARSE_RESOLUTION_MAX_ZOOM, GEOIP_PATH, MEDIUM_RESOLUTION,
    MEDIUM_RESOLUTION_MAX_ZOOM,
};
use crate::core::geo::LatLng;
use crate::core::viewport::Viewport;
use crate::{MapError, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Aggregation resolution (degrees) the backend should round points to at `zoom`.
///
/// Returns `None` when full precision is wanted.
pub fn resolution_for_zoom(zoom: f64) -> Option<f64> {
    if zoom <= COARSE_RESOLUTION_MAX_ZOOM {
        Some(COARSE_RESOLUTION)
    } else if zoom <= MEDIUM_RESOLUTION_MAX_ZOOM {
        Some(MEDIUM_RESOLUTION)
    } else {
        None
    }
}

/// Parameters of a point-data request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoipQuery {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f64>,
    /// Zoom the query was built for; not sent
    #[serde(skip)]
    pub zoom: f64,
}

impl GeoipQuery {
    /// Builds the query covering what `viewport` currently shows
    pub fn from_viewport(viewport: &Viewport) -> Self {
        let bounds = viewport.bounds();
        Self {
            north: bounds.north(),
            south: bounds.south(),
            east: bounds.east(),
            west: bounds.west(),
            resolution: resolution_for_zoom(viewport.zoom),
            zoom: viewport.zoom,
        }
    }

    /// Query-string pairs in wire order
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("north", self.north.to_string()),
            ("south", self.south.to_string()),
            ("east", self.east.to_string()),
            ("west", self.west.to_string()),
        ];
        if let Some(resolution) = self.resolution {
            pairs.push(("resolution", resolution.to_string()));
        }
        pairs
    }

    /// Looks up a single parameter as it would be sent
    pub fn param(&self, name: &str) -> Option<String> {
        self.query_pairs()
            .into_iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Full request URL below `base_url`
    pub fn url(&self, base_url: &str) -> Result<reqwest::Url> {
        let endpoint = format!("{}{}", base_url.trim_end_matches('/'), GEOIP_PATH);
        reqwest::Url::parse_with_params(&endpoint, self.query_pairs())
            .map_err(|e| MapError::InvalidResponse(format!("bad server url {endpoint}: {e}")))
    }
}

/// A weighted location returned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatPoint {
    pub lat: f64,
    pub lng: f64,
    pub intensity: f64,
}

impl HeatPoint {
    pub fn new(lat: f64, lng: f64, intensity: f64) -> Self {
        Self {
            lat,
            lng,
            intensity,
        }
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPoint {
    Tuple(Vec<f64>),
    Object {
        lat: f64,
        #[serde(alias = "lon", alias = "longitude")]
        lng: f64,
        #[serde(default, alias = "count", alias = "value")]
        intensity: Option<f64>,
    },
}

impl<'de> Deserialize<'de> for HeatPoint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawPoint::deserialize(deserializer)? {
            RawPoint::Tuple(values) => match values.as_slice() {
                [lat, lng] => Ok(HeatPoint::new(*lat, *lng, 1.0)),
                [lat, lng, intensity, ..] => Ok(HeatPoint::new(*lat, *lng, *intensity)),
                _ => Err(serde::de::Error::custom(format!(
                    "expected [lat, lng, intensity], got {} values",
                    values.len()
                ))),
            },
            RawPoint::Object {
                lat,
                lng,
                intensity,
            } => Ok(HeatPoint::new(lat, lng, intensity.unwrap_or(1.0))),
        }
    }
}

/// Parses a `/geoip` response body
pub fn parse_points(body: &str) -> Result<Vec<HeatPoint>> {
    Ok(serde_json::from_str(body)?)
}
