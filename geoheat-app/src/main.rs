use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use geoheat::constants::ids;
use geoheat::prelude::*;
use geoheat::runtime::spawners::tokio_impl::TokioSpawner;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RefreshOn {
    /// Refresh once a zoom has finished
    ZoomEnd,
    /// Refresh as soon as a zoom starts
    ZoomStart,
}

impl From<RefreshOn> for RefreshTrigger {
    fn from(value: RefreshOn) -> Self {
        match value {
            RefreshOn::ZoomEnd => RefreshTrigger::ZoomEnd,
            RefreshOn::ZoomStart => RefreshTrigger::ZoomStart,
        }
    }
}

/// Heatmap viewer for a /geoip backend
#[derive(Debug, Parser)]
#[command(name = "geoheat-app", version, about)]
struct Args {
    /// JSON file with a client configuration; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL [default: http://localhost:8080]
    #[arg(short, long)]
    server: Option<String>,

    /// Initial latitude
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Initial longitude
    #[arg(long, allow_hyphen_values = true)]
    lng: Option<f64>,

    /// Initial zoom level
    #[arg(short, long)]
    zoom: Option<f64>,

    #[arg(long)]
    min_zoom: Option<f64>,

    #[arg(long)]
    max_zoom: Option<f64>,

    /// Zoom event that refreshes the heatmap
    #[arg(long, value_enum)]
    refresh_on: Option<RefreshOn>,

    /// Quiet period before a viewport change reaches the backend
    #[arg(long)]
    debounce_ms: Option<u64>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => ClientConfig::default(),
        };

        if let Some(server) = self.server {
            config.server_url = server;
        }
        if let Some(lat) = self.lat {
            config.center.lat = lat;
        }
        if let Some(lng) = self.lng {
            config.center.lng = lng;
        }
        if let Some(zoom) = self.zoom {
            config.zoom = zoom;
        }
        if let Some(min_zoom) = self.min_zoom {
            config.min_zoom = min_zoom;
        }
        if let Some(max_zoom) = self.max_zoom {
            config.max_zoom = max_zoom;
        }
        if let Some(refresh_on) = self.refresh_on {
            config.refresh_trigger = refresh_on.into();
        }
        if let Some(debounce_ms) = self.debounce_ms {
            config.debounce_ms = debounce_ms;
        }

        anyhow::ensure!(
            config.center.is_valid(),
            "initial center ({}, {}) is out of range",
            config.center.lat,
            config.center.lng
        );
        anyhow::ensure!(
            config.min_zoom <= config.max_zoom,
            "min zoom {} is above max zoom {}",
            config.min_zoom,
            config.max_zoom
        );
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    geoheat::init_logging();

    let config = Args::parse().into_config()?;
    log::info!("Using backend {}", config.base_url());

    init_runtime(Box::new(TokioSpawner::with_handle(
        tokio::runtime::Handle::current(),
    )));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("GeoIP heatmap")
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "geoheat-app",
        options,
        Box::new(move |_cc| Box::new(GeoheatApp::new(&config))),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    Ok(())
}

struct GeoheatApp {
    map: MapController,
    upload: UploadController,
    tiles: TileLayer,
    view_state: MapViewState,
}

impl GeoheatApp {
    fn new(config: &ClientConfig) -> Self {
        let source: Arc<dyn GeoipSource> = Arc::new(HttpGeoipClient::new(config.base_url()));
        let map = MapController::new(config, Arc::clone(&source));
        let upload = UploadController::new(config.upload_info.clone(), source, map.refresh_handle());
        let tiles = TileLayer::new(config.tile_url.clone(), config.attribution.clone())
            .with_max_zoom(config.max_zoom.clamp(0.0, u8::MAX as f64) as u8)
            .with_cache_size(config.tile_cache_size);

        Self {
            map,
            upload,
            tiles,
            view_state: MapViewState::new(),
        }
    }
}

impl eframe::App for GeoheatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top(ids::UPLOAD_FORM).show(ctx, |ui| {
            ui.add_space(4.0);
            ui.add(UploadPanel::new(&mut self.upload));
            ui.add_space(4.0);
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                ui.add(MapView::new(
                    &mut self.map,
                    &mut self.tiles,
                    &mut self.view_state,
                ));
            });
    }
}
