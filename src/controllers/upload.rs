use crate::background::geoip::{GeoipSource, UploadFile, UploadResponse};
use crate::controllers::map::RefreshHandle;
use crate::core::constants::LOADING_MESSAGE;
use crate::prelude::Future;
use crate::runtime::{self, AsyncHandle};
use crate::{MapError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::Path;
use std::sync::Arc;

/// What the upload info line currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    /// Original info text, input enabled
    Idle,
    /// Upload in flight, input disabled
    Loading,
    /// Server rejection or transport failure, shown as an error
    Error(String),
}

/// Sends a selected file to the backend and tracks the upload's status.
///
/// The file input is disabled while an upload is in flight. An accepted
/// upload restores the info text and asks the map to refresh.
pub struct UploadController {
    original_info: String,
    status: UploadStatus,
    input_enabled: bool,
    source: Arc<dyn GeoipSource>,
    refresh: RefreshHandle,
    in_flight: Option<Box<dyn AsyncHandle>>,
    result_tx: Sender<Result<UploadResponse>>,
    result_rx: Receiver<Result<UploadResponse>>,
}

impl UploadController {
    pub fn new(
        original_info: impl Into<String>,
        source: Arc<dyn GeoipSource>,
        refresh: RefreshHandle,
    ) -> Self {
        let (result_tx, result_rx) = unbounded();
        Self {
            original_info: original_info.into(),
            status: UploadStatus::Idle,
            input_enabled: true,
            source,
            refresh,
            in_flight: None,
            result_tx,
            result_rx,
        }
    }

    pub fn status(&self) -> &UploadStatus {
        &self.status
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    pub fn is_uploading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, UploadStatus::Error(_))
    }

    pub fn original_info(&self) -> &str {
        &self.original_info
    }

    /// Text for the info line
    pub fn info_text(&self) -> &str {
        match &self.status {
            UploadStatus::Idle => &self.original_info,
            UploadStatus::Loading => LOADING_MESSAGE,
            UploadStatus::Error(message) => message,
        }
    }

    /// Starts uploading the first of `paths`. Returns false when nothing was
    /// started: the selection was empty or the input is disabled.
    pub fn select_files<I, P>(&mut self, paths: I) -> bool
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        if !self.input_enabled {
            log::debug!("Upload in progress; ignoring file selection");
            return false;
        }
        let Some(path) = paths.into_iter().next() else {
            return false;
        };

        let path = path.as_ref().to_path_buf();
        log::info!("Uploading {}", path.display());
        let source = Arc::clone(&self.source);
        self.start(async move {
            let file = UploadFile::read(&path).await?;
            source.upload(file).await
        })
    }

    /// Starts uploading in-memory file contents, e.g. a file dropped onto
    /// the window without a path
    pub fn upload_bytes(&mut self, file_name: impl Into<String>, bytes: Vec<u8>) -> bool {
        if !self.input_enabled {
            log::debug!("Upload in progress; ignoring file selection");
            return false;
        }

        let file = UploadFile::new(file_name, bytes);
        log::info!("Uploading {} ({} bytes)", file.file_name, file.bytes.len());
        let source = Arc::clone(&self.source);
        self.start(async move { source.upload(file).await })
    }

    fn start<F>(&mut self, work: F) -> bool
    where
        F: Future<Output = Result<UploadResponse>> + Send + 'static,
    {
        let result_tx = self.result_tx.clone();
        match runtime::spawn(async move {
            let _ = result_tx.send(work.await);
        }) {
            Ok(handle) => {
                self.in_flight = Some(handle);
                self.status = UploadStatus::Loading;
                self.input_enabled = false;
                true
            }
            Err(e) => {
                log::error!("Unable to start upload: {}", e);
                self.status = UploadStatus::Error(e.to_string());
                false
            }
        }
    }

    /// Applies a finished upload. Returns whether the status changed.
    pub fn poll(&mut self) -> bool {
        if let Ok(result) = self.result_rx.try_recv() {
            self.finish(result);
            return true;
        }

        let task_ended = self
            .in_flight
            .as_ref()
            .is_some_and(|handle| handle.is_finished());
        if task_ended {
            // a finished task has already sent its result, unless it panicked
            let result = self.result_rx.try_recv().unwrap_or_else(|_| {
                Err(MapError::Runtime(
                    "upload task ended without a response".to_string(),
                ))
            });
            self.finish(result);
            return true;
        }

        false
    }

    fn finish(&mut self, result: Result<UploadResponse>) {
        self.in_flight = None;
        self.input_enabled = true;

        match result {
            Ok(response) if response.is_success() => {
                log::info!("Upload accepted");
                self.status = UploadStatus::Idle;
                if !self.refresh.request() {
                    log::warn!("Map is gone; skipping heatmap refresh after upload");
                }
            }
            Ok(response) => {
                let message = response.body.trim().to_string();
                log::warn!("Upload rejected with HTTP {}: {}", response.status, message);
                self.status = UploadStatus::Error(message);
            }
            Err(e) => {
                log::error!("Upload failed: {}", e);
                self.status = UploadStatus::Error(e.to_string());
            }
        }
    }
}

impl Drop for UploadController {
    fn drop(&mut self) {
        if let Some(handle) = &self.in_flight {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ClientConfig;
    use crate::controllers::map::MapController;
    use crate::data::geoip::{GeoipQuery, HeatPoint};
    use async_trait::async_trait;

    struct Rejecting;

    #[async_trait]
    impl GeoipSource for Rejecting {
        async fn fetch(&self, _query: &GeoipQuery) -> Result<Vec<HeatPoint>> {
            Ok(Vec::new())
        }

        async fn upload(&self, _file: UploadFile) -> Result<UploadResponse> {
            Ok(UploadResponse::new(400, "bad file\n"))
        }
    }

    fn controller() -> (MapController, UploadController) {
        let source: Arc<dyn GeoipSource> = Arc::new(Rejecting);
        let map = MapController::new(&ClientConfig::default(), Arc::clone(&source));
        let upload = UploadController::new("Pick a file", source, map.refresh_handle());
        (map, upload)
    }

    #[test]
    fn test_initial_state() {
        let (_map, upload) = controller();
        assert_eq!(upload.status(), &UploadStatus::Idle);
        assert!(upload.input_enabled());
        assert!(!upload.is_error());
        assert_eq!(upload.info_text(), "Pick a file");
    }

    #[test]
    fn test_empty_selection_is_ignored() {
        let (_map, mut upload) = controller();
        assert!(!upload.select_files(Vec::<std::path::PathBuf>::new()));
        assert_eq!(upload.status(), &UploadStatus::Idle);
        assert!(upload.input_enabled());
    }

    #[test]
    fn test_finish_statuses() {
        let (_map, mut upload) = controller();

        upload.finish(Ok(UploadResponse::new(413, "file too large\n")));
        assert_eq!(upload.status(), &UploadStatus::Error("file too large".to_string()));
        assert_eq!(upload.info_text(), "file too large");
        assert!(upload.input_enabled());

        upload.finish(Ok(UploadResponse::ok()));
        assert_eq!(upload.status(), &UploadStatus::Idle);
        assert_eq!(upload.info_text(), "Pick a file");

        upload.finish(Err(MapError::InvalidResponse("connection reset".to_string())));
        assert!(upload.is_error());
        assert!(upload.input_enabled());
    }

    #[test]
    fn test_start_outside_runtime_reports_error() {
        let (_map, mut upload) = controller();
        assert!(!upload.upload_bytes("nets.csv", b"10.0.0.0/8".to_vec()));
        assert!(upload.is_error());
        assert!(upload.input_enabled());
        assert!(!upload.poll());
    }
}
