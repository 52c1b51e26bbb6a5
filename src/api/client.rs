use futures::Stream;
use futures::TryStreamExt;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::models::{
    ApiConfig, DownloadResponse, ErrorBody, MediaBody, ProgressResponse, VideoDownloadBody,
    VideoInfo,
};
use crate::domain::{Browser, DeliveredFile, Delivery};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    ApiError { status: u16, detail: Option<String> },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Message the backend attached to a failed call, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::ApiError { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    /// `path` appended to the base, keeping any prefix the base carries.
    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path))?)
    }

    /// Resolves a file URL handed out by the backend. Absolute URLs pass through.
    pub fn resolve(&self, file_url: &str) -> Result<Url> {
        if file_url.starts_with("http://") || file_url.starts_with("https://") {
            return Ok(Url::parse(file_url)?);
        }
        self.endpoint(file_url)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.json::<ErrorBody>().await.unwrap_or_default();
            return Err(ApiError::ApiError {
                status: status.as_u16(),
                detail: body.detail_message(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))
    }

    /// Metadata and available formats for a source URL
    pub async fn info(&self, url: &str, browser: Browser) -> Result<VideoInfo> {
        let response = self
            .http
            .post(self.endpoint("/api/info")?)
            .json(&MediaBody { url, browser })
            .send()
            .await?;

        Self::read_json(response).await
    }

    /// Runs a video download on the backend; resolves once the file is ready.
    pub async fn download(
        &self,
        url: &str,
        browser: Browser,
        format_id: &str,
    ) -> Result<Delivery> {
        let response = self
            .http
            .post(self.endpoint("/api/download")?)
            .json(&VideoDownloadBody {
                url,
                browser,
                format_id,
            })
            .send()
            .await?;

        delivery(Self::read_json(response).await?)
    }

    /// Same as [`ApiClient::download`] but the backend extracts MP3 audio.
    pub async fn download_mp3(&self, url: &str, browser: Browser) -> Result<Delivery> {
        let response = self
            .http
            .post(self.endpoint("/api/download_mp3")?)
            .json(&MediaBody { url, browser })
            .send()
            .await?;

        delivery(Self::read_json(response).await?)
    }

    /// Raw progress text the backend keeps for `url`
    pub async fn progress(&self, url: &str) -> Result<String> {
        let mut endpoint = self.endpoint("/api/progress")?;
        endpoint.query_pairs_mut().append_pair("url", url);

        let response = self.http.get(endpoint).send().await?;
        let body: ProgressResponse = Self::read_json(response).await?;
        Ok(body.progress)
    }

    /// Asks a locally running backend to reveal its downloads folder.
    pub async fn open_folder(&self) -> Result<()> {
        let response = self.http.get(self.endpoint("/api/open-folder")?).send().await?;
        debug!(status = %response.status(), "open-folder answered");
        Ok(())
    }

    pub async fn fetch_bytes(&self, file_url: &str) -> Result<bytes::Bytes> {
        let response = self
            .http
            .get(self.resolve(file_url)?)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::ApiError {
                status: e.status().map(|s| s.as_u16()).unwrap_or_default(),
                detail: Some(format!("File request failed: {}", e)),
            })?;

        Ok(response.bytes().await?)
    }

    /// Returns (total_size, stream)
    pub async fn download_file_stream(
        &self,
        file_url: &str,
    ) -> Result<(Option<u64>, impl Stream<Item = Result<bytes::Bytes>>)> {
        let response = self
            .http
            .get(self.resolve(file_url)?)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::ApiError {
                status: e.status().map(|s| s.as_u16()).unwrap_or_default(),
                detail: Some(format!("File request failed: {}", e)),
            })?;

        let total_size = response.content_length();
        let stream = response.bytes_stream().map_err(ApiError::RequestError);

        Ok((total_size, stream))
    }
}

fn delivery(response: DownloadResponse) -> Result<Delivery> {
    match response {
        DownloadResponse {
            url: Some(file_url),
            filename: Some(file_name),
            ..
        } => Ok(Delivery::Served(DeliveredFile {
            file_url,
            file_name,
        })),
        DownloadResponse {
            file: Some(path), ..
        } => Ok(Delivery::SavedOnServer(path)),
        _ => Err(ApiError::InvalidResponse(
            "response carries neither url/filename nor file".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> ApiClient {
        ApiClient::new(ApiConfig {
            base_url: server.url(),
        })
    }

    #[tokio::test]
    async fn info_posts_url_and_browser() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/info")
            .match_body(Matcher::Json(json!({ "url": "https://v/1", "browser": "none" })))
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "title": "Clip",
                    "thumbnail": "https://img/1.jpg",
                    "formats": [{ "id": "18", "ext": "mp4", "res": "640x360" }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let info = client_for(&server)
            .info("https://v/1", Browser::None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(info.display_title(), "Clip");
        assert_eq!(info.formats[0].id, "18");
    }

    #[tokio::test]
    async fn error_status_carries_backend_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/info")
            .with_status(400)
            .with_body(json!({ "detail": "Invalid URL" }).to_string())
            .create_async()
            .await;

        let err = client_for(&server)
            .info("nope", Browser::None)
            .await
            .unwrap_err();

        assert_eq!(err.detail(), Some("Invalid URL"));
    }

    #[tokio::test]
    async fn error_status_without_json_has_no_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/download_mp3")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let err = client_for(&server)
            .download_mp3("https://v/1", Browser::None)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::ApiError { status: 500, detail: None }));
    }

    #[tokio::test]
    async fn progress_sends_encoded_url_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/progress")
            .match_query(Matcher::UrlEncoded(
                "url".into(),
                "https://v/watch?v=a&t=1".into(),
            ))
            .with_body(json!({ "progress": "12.5%" }).to_string())
            .create_async()
            .await;

        let progress = client_for(&server)
            .progress("https://v/watch?v=a&t=1")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(progress, "12.5%");
    }

    #[tokio::test]
    async fn download_sends_format_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/download")
            .match_body(Matcher::PartialJson(json!({ "format_id": "137" })))
            .with_body(json!({ "url": "/downloads/Youtube/x.mp4", "filename": "x.mp4" }).to_string())
            .create_async()
            .await;

        let delivery = client_for(&server)
            .download("https://v/1", Browser::Chrome, "137")
            .await
            .unwrap();

        assert_eq!(
            delivery,
            Delivery::Served(DeliveredFile {
                file_url: "/downloads/Youtube/x.mp4".into(),
                file_name: "x.mp4".into(),
            })
        );
    }

    #[tokio::test]
    async fn download_reads_file_saved_on_server() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/download")
            .with_body(json!({ "status": "success", "file": "Downloads/youtube/clip.mp4" }).to_string())
            .create_async()
            .await;

        let delivery = client_for(&server)
            .download("https://v/1", Browser::None, "best")
            .await
            .unwrap();

        assert_eq!(
            delivery,
            Delivery::SavedOnServer("Downloads/youtube/clip.mp4".into())
        );
    }

    #[test]
    fn download_response_without_file_is_rejected() {
        assert!(delivery(DownloadResponse::default()).is_err());
    }

    #[tokio::test]
    async fn prefixed_base_keeps_its_path() {
        let mut server = mockito::Server::new_async().await;
        let root = server
            .mock("POST", "/api/info")
            .expect(0)
            .create_async()
            .await;
        let prefixed = server
            .mock("POST", "/downloader/api/info")
            .with_body(json!({ "title": "Prefixed" }).to_string())
            .create_async()
            .await;

        let client = ApiClient::new(ApiConfig {
            base_url: format!("{}/downloader/", server.url()),
        });
        let info = client.info("https://v/1", Browser::None).await.unwrap();

        assert_eq!(info.display_title(), "Prefixed");
        prefixed.assert_async().await;
        root.assert_async().await;
    }

    #[test]
    fn resolve_relative_and_absolute_file_urls() {
        let client = ApiClient::new(ApiConfig {
            base_url: "https://backend.example/downloader".into(),
        });
        assert_eq!(
            client.resolve("/downloads/a%20b.mp4").unwrap().as_str(),
            "https://backend.example/downloader/downloads/a%20b.mp4"
        );
        assert_eq!(
            client.resolve("https://cdn.example/x.mp3").unwrap().as_str(),
            "https://cdn.example/x.mp3"
        );
    }
}
