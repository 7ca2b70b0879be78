#![allow(dead_code)]

use async_trait::async_trait;
use geoheat::prelude::*;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scripted fetch reply: how long to take and what to return
pub struct Reply {
    pub delay: Duration,
    pub result: geoheat::Result<Vec<HeatPoint>>,
}

impl Reply {
    pub fn points(points: Vec<HeatPoint>) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(points),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn error(error: MapError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(error),
        }
    }
}

/// In-memory backend that records what the controllers ask for
#[derive(Default)]
pub struct MockSource {
    queries: Mutex<Vec<GeoipQuery>>,
    replies: Mutex<VecDeque<Reply>>,
    zoom_replies: Mutex<Vec<(f64, Reply)>>,
    uploads: Mutex<Vec<UploadFile>>,
    upload_reply: Mutex<Option<(Duration, geoheat::Result<UploadResponse>)>>,
}

impl MockSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Reply used for the first request made at `zoom`
    pub fn push_reply_for_zoom(&self, zoom: f64, reply: Reply) {
        self.zoom_replies.lock().unwrap().push((zoom, reply));
    }

    pub fn set_upload_reply(&self, delay: Duration, result: geoheat::Result<UploadResponse>) {
        *self.upload_reply.lock().unwrap() = Some((delay, result));
    }

    pub fn queries(&self) -> Vec<GeoipQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<UploadFile> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl GeoipSource for MockSource {
    async fn fetch(&self, query: &GeoipQuery) -> geoheat::Result<Vec<HeatPoint>> {
        self.queries.lock().unwrap().push(query.clone());
        let by_zoom = {
            let mut zoom_replies = self.zoom_replies.lock().unwrap();
            zoom_replies
                .iter()
                .position(|(zoom, _)| *zoom == query.zoom)
                .map(|index| zoom_replies.remove(index).1)
        };
        let reply = by_zoom
            .or_else(|| self.replies.lock().unwrap().pop_front())
            .unwrap_or_else(|| Reply::points(Vec::new()));

        tokio::time::sleep(reply.delay).await;
        reply.result
    }

    async fn upload(&self, file: UploadFile) -> geoheat::Result<UploadResponse> {
        self.uploads.lock().unwrap().push(file);
        let (delay, result) = self
            .upload_reply
            .lock()
            .unwrap()
            .take()
            .unwrap_or((Duration::ZERO, Ok(UploadResponse::ok())));

        tokio::time::sleep(delay).await;
        result
    }
}

/// Polls `map` until `done` holds, failing the test after two seconds
pub async fn drive_map(map: &mut MapController, done: impl Fn(&MapController) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        map.poll(Instant::now());
        if done(map) {
            return;
        }
        assert!(Instant::now() < deadline, "map controller did not settle");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Polls `upload` until no upload is in flight
pub async fn drive_upload(upload: &mut UploadController) {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        upload.poll();
        if !upload.is_uploading() {
            return;
        }
        assert!(Instant::now() < deadline, "upload did not finish");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn config() -> ClientConfig {
    ClientConfig::new("http://localhost:8080").with_debounce(Duration::from_millis(50))
}
