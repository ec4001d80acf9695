use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::shipment::ShipmentRecord;
use crate::upload::FileCandidate;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Why a backend call did not produce a usable response.
#[derive(Debug, Error)]
pub enum RequestFailure {
    #[error("{}", status_message(.status, .detail))]
    Status { status: u16, detail: Option<String> },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response from backend: {0}")]
    Decode(String),

    #[error("Could not read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn status_message(status: &u16, detail: &Option<String>) -> String {
    match detail {
        Some(d) => d.to_string(),
        None => format!("Request failed with status code {}", status),
    }
}

impl RequestFailure {
    /// Message suitable for the card, or `None` when the caller should use
    /// its own contextual fallback.
    pub fn message(&self) -> Option<String> {
        match self {
            RequestFailure::Transport(_) => None,
            other => Some(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for RequestFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RequestFailure::Decode(e.to_string())
        } else {
            RequestFailure::Transport(e.to_string())
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct UploadReceipt {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub chunks: Option<usize>,
}

#[derive(Serialize)]
pub struct AskRequest<'a> {
    pub question: &'a str,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default)]
    pub supporting_source_text: Option<Vec<String>>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
}

impl AskResponse {
    pub fn excerpts(&self) -> &[String] {
        self.supporting_source_text.as_deref().unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(mut base_url: Url) -> Self {
        // `Url::join` would otherwise replace the last path segment
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, RequestFailure> {
        self.base_url
            .join(path)
            .map_err(|e| RequestFailure::Transport(format!("Invalid endpoint {}: {}", path, e)))
    }

    pub async fn upload(&self, file: &FileCandidate) -> Result<UploadReceipt, RequestFailure> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|source| RequestFailure::File {
                path: file.path.display().to_string(),
                source,
            })?;
        tracing::debug!("POST /upload {} ({} bytes, {})", file.name, bytes.len(), file.content_type());

        let part = Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(file.content_type())?;
        let form = Form::new().part("file", part);

        let resp = self
            .client
            .post(self.endpoint("upload")?)
            .multipart(form)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }

    pub async fn ask(&self, question: &str) -> Result<AskResponse, RequestFailure> {
        tracing::debug!("POST /ask ({} chars)", question.len());
        let resp = self
            .client
            .post(self.endpoint("ask")?)
            .json(&AskRequest { question })
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    pub async fn extract(&self) -> Result<ShipmentRecord, RequestFailure> {
        tracing::debug!("POST /extract");
        let resp = self.client.post(self.endpoint("extract")?).send().await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }
}

/// Turns a non-2xx response into `RequestFailure::Status`, pulling the
/// backend's `detail` string out of the body when there is one.
async fn check_status(resp: Response) -> Result<Response, RequestFailure> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.detail.as_str().map(str::to_string))
        .filter(|d| !d.trim().is_empty());
    tracing::warn!("Backend returned {}: {:?}", status, detail);
    Err(RequestFailure::Status {
        status: status.as_u16(),
        detail,
    })
}
