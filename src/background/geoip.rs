use crate::core::constants::{GEOIP_PATH, UPLOAD_FIELD};
use crate::data::geoip::{parse_points, GeoipQuery, HeatPoint};
use crate::{MapError, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::path::Path;

/// Shared async HTTP client for the backend and the basemap
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("geoheat/", env!("CARGO_PKG_VERSION")))
        .tcp_keepalive(std::time::Duration::from_secs(30))
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .pool_max_idle_per_host(8)
        .build()
        .expect("failed to build reqwest async client")
});

/// A file picked for upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Reads `path` from disk, keeping its file name for the form part
    pub async fn read(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| UPLOAD_FIELD.to_string());
        let bytes = read_file(path).await?;
        Ok(Self { file_name, bytes })
    }
}

#[cfg(feature = "tokio-runtime")]
async fn read_file(path: &Path) -> Result<Vec<u8>> {
    Ok(tokio::fs::read(path).await?)
}

#[cfg(not(feature = "tokio-runtime"))]
async fn read_file(path: &Path) -> Result<Vec<u8>> {
    Ok(std::fs::read(path)?)
}

/// Status and body of an upload response. Any status is a valid outcome here;
/// only transport failures are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: u16,
    pub body: String,
}

impl UploadResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200, "")
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// The backend as seen by the controllers
#[async_trait]
pub trait GeoipSource: Send + Sync {
    /// `GET /geoip` for the given query; anything but a 200 with a JSON point
    /// array is an error
    async fn fetch(&self, query: &GeoipQuery) -> Result<Vec<HeatPoint>>;

    /// `POST /geoip` with the file as multipart form data
    async fn upload(&self, file: UploadFile) -> Result<UploadResponse>;
}

/// [`GeoipSource`] talking HTTP to a real backend
#[derive(Debug, Clone)]
pub struct HttpGeoipClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGeoipClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, HTTP_CLIENT.clone())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, GEOIP_PATH)
    }
}

#[async_trait]
impl GeoipSource for HttpGeoipClient {
    async fn fetch(&self, query: &GeoipQuery) -> Result<Vec<HeatPoint>> {
        let url = query.url(&self.base_url)?;
        log::debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        if status != 200 {
            return Err(MapError::Http { status, body });
        }
        parse_points(&body)
    }

    async fn upload(&self, file: UploadFile) -> Result<UploadResponse> {
        log::info!(
            "POST {} ({}, {} bytes)",
            self.endpoint(),
            file.file_name,
            file.bytes.len()
        );

        let part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.file_name);
        let form = reqwest::multipart::Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(UploadResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = HttpGeoipClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.endpoint(), "http://localhost:8080/geoip");
    }

    #[test]
    fn test_upload_response_success() {
        assert!(UploadResponse::ok().is_success());
        assert!(!UploadResponse::new(413, "file too large").is_success());
        assert!(!UploadResponse::new(201, "").is_success());
    }

    /// One-shot HTTP server on a local port. The join handle yields the raw
    /// request it received.
    fn serve_once(status: &str, body: &str) -> (String, std::thread::JoinHandle<String>) {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (base_url, handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let headers = text[..header_end].to_ascii_lowercase();
        let body = &request[header_end + 4..];

        if headers.contains("transfer-encoding: chunked") {
            return body.ends_with(b"0\r\n\r\n");
        }
        let length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body.len() >= length
    }

    fn local_client(base_url: &str) -> HttpGeoipClient {
        HttpGeoipClient::with_client(base_url, reqwest::Client::new())
    }

    fn query() -> GeoipQuery {
        GeoipQuery {
            north: 1.0,
            south: -1.0,
            east: 2.0,
            west: -2.0,
            resolution: Some(0.25),
            zoom: 2.0,
        }
    }

    #[cfg(feature = "tokio-runtime")]
    #[tokio::test]
    async fn test_fetch_sends_bounds_and_decodes_points() {
        let (base_url, server) = serve_once("200 OK", "[[1.5,2.5,3.0]]");

        let points = local_client(&base_url).fetch(&query()).await.unwrap();
        assert_eq!(points, vec![HeatPoint::new(1.5, 2.5, 3.0)]);

        let request = server.join().unwrap();
        assert!(request.starts_with(
            "GET /geoip?north=1&south=-1&east=2&west=-2&resolution=0.25 HTTP/1.1\r\n"
        ));
    }

    #[cfg(feature = "tokio-runtime")]
    #[tokio::test]
    async fn test_fetch_non_200_is_http_error() {
        let (base_url, server) = serve_once("500 Internal Server Error", "database unavailable");

        let result = local_client(&base_url).fetch(&query()).await;
        match result {
            Err(MapError::Http { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "database unavailable");
            }
            other => panic!("expected an HTTP error, got {:?}", other),
        }
        server.join().unwrap();
    }

    #[cfg(feature = "tokio-runtime")]
    #[tokio::test]
    async fn test_upload_posts_file_field_and_returns_rejection() {
        let (base_url, server) = serve_once("413 Payload Too Large", "file too large\n");

        let file = UploadFile::new("nets.csv", b"10.0.0.0/8,51.5,-0.1\n".to_vec());
        let response = local_client(&base_url).upload(file).await.unwrap();
        assert_eq!(response, UploadResponse::new(413, "file too large\n"));

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /geoip HTTP/1.1\r\n"));
        assert!(request.contains("multipart/form-data; boundary="));
        assert!(request.contains("name=\"file\"; filename=\"nets.csv\""));
        assert!(request.contains("10.0.0.0/8,51.5,-0.1"));
    }

    #[cfg(feature = "tokio-runtime")]
    #[tokio::test]
    async fn test_upload_file_read_keeps_name() {
        let path = std::env::temp_dir().join("geoheat-upload-read.csv");
        tokio::fs::write(&path, b"network,latitude,longitude\n")
            .await
            .unwrap();

        let file = UploadFile::read(&path).await.unwrap();
        assert_eq!(file.file_name, "geoheat-upload-read.csv");
        assert_eq!(file.bytes, b"network,latitude,longitude\n");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[cfg(feature = "tokio-runtime")]
    #[tokio::test]
    async fn test_upload_file_read_missing() {
        let path = std::env::temp_dir().join("geoheat-definitely-missing.csv");
        assert!(matches!(
            UploadFile::read(&path).await,
            Err(MapError::Io(_))
        ));
    }
}
