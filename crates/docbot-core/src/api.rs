//! HTTP seam to the document/chat backend.
//!
//! Workflows only see the [`Backend`] trait; [`HttpBackend`] is the reqwest
//! implementation of the wire contract.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};

use crate::documents::FileUpload;
use crate::error::ApiError;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Returns the server's confirmation message.
    async fn upload(&self, token: &str, file: &FileUpload) -> Result<String, ApiError>;

    /// Returns the server's confirmation message.
    async fn delete(&self, token: &str, filename: &str) -> Result<String, ApiError>;

    /// Authoritative listing, in server order.
    async fn list(&self, token: &str) -> Result<Vec<String>, ApiError>;

    /// Returns the bot's reply text.
    async fn chat(&self, token: &str, message: &str) -> Result<String, ApiError>;

    /// Raw bytes of a stored document. Unauthenticated on the server side.
    async fn download(&self, filename: &str) -> Result<Vec<u8>, ApiError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    user_message: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    files: Vec<String>,
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    /// Every request made through this backend is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Public URL of a stored document.
    pub fn file_url(&self, filename: &str) -> Result<Url, ApiError> {
        self.endpoint(&["uploads", filename])
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(ErrorBody { detail: serde_json::Value::String(s) }) => s,
            Ok(ErrorBody { detail }) => detail.to_string(),
            Err(_) if body.is_empty() => status.canonical_reason().unwrap_or_default().to_string(),
            Err(_) => body,
        };
        Err(ApiError::Status { status: status.as_u16(), detail })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upload(&self, token: &str, file: &FileUpload) -> Result<String, ApiError> {
        let url = self.endpoint(&["documents", "upload"])?;
        debug!("POST {} ({} bytes)", url, file.bytes.len());

        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(file.mime)?;
        let form = Form::new().part("file", part);

        let response = self.client.post(url).bearer_auth(token).multipart(form).send().await?;
        let body: MessageResponse = Self::check(response).await?.json().await?;
        Ok(body.message)
    }

    async fn delete(&self, token: &str, filename: &str) -> Result<String, ApiError> {
        let url = self.endpoint(&["documents", filename])?;
        debug!("DELETE {}", url);

        let response = self.client.delete(url).bearer_auth(token).send().await?;
        let body: MessageResponse = Self::check(response).await?.json().await?;
        Ok(body.message)
    }

    async fn list(&self, token: &str) -> Result<Vec<String>, ApiError> {
        let url = self.endpoint(&["documents", "getfile"])?;
        debug!("GET {}", url);

        let response = self.client.get(url).bearer_auth(token).send().await?;
        let body: ListResponse = Self::check(response).await?.json().await?;
        Ok(body.files)
    }

    async fn chat(&self, token: &str, message: &str) -> Result<String, ApiError> {
        let url = self.endpoint(&["chat"])?;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&ChatRequest { user_message: message })
            .send()
            .await?;
        let body: ChatResponse = Self::check(response).await?.json().await?;
        Ok(body.response)
    }

    async fn download(&self, filename: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.file_url(filename)?;
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
