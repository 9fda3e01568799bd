//! HTTP token and upload services
//!
//! The transport sits behind [`HttpClient`] so the services can be exercised
//! without a network. [`UreqHttpClient`] is the production implementation;
//! `ureq` is blocking, so every request runs on the blocking pool.

use crate::audio::ArtifactHandle;
use crate::integration::config::SubmissionConfig;
use crate::submission::multipart::MultipartForm;
use crate::submission::services::{
    ExerciseToken, TokenRequest, TokenResponse, TokenService, UploadResponse, UploadService,
};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A buffered HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "POST".to_string(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// A buffered HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).context("invalid JSON response body")
    }

    /// Server-provided reason for a failed request
    fn failure_message(&self) -> String {
        #[derive(Deserialize)]
        struct ErrorBody {
            message: Option<String>,
            error: Option<String>,
        }

        let from_json = self
            .json::<ErrorBody>()
            .ok()
            .and_then(|body| body.message.or(body.error));
        match from_json {
            Some(message) => message,
            None => {
                let text = self.body_string();
                let text = text.trim();
                if text.is_empty() {
                    format!("HTTP {}", self.status_code)
                } else {
                    format!("HTTP {}: {}", self.status_code, text)
                }
            }
        }
    }
}

/// Executes HTTP requests
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// `ureq` transport
///
/// Non-2xx statuses are returned as responses, not errors, so the services
/// can read the server's message.
#[derive(Debug, Clone)]
pub struct UreqHttpClient {
    agent: ureq::Agent,
}

impl UreqHttpClient {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
        }
    }
}

#[async_trait]
impl HttpClient for UreqHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || {
            let response = match request.method.as_str() {
                "POST" => {
                    let mut req = agent.post(&request.url);
                    for (key, value) in &request.headers {
                        req = req.header(key, value);
                    }
                    match request.body {
                        Some(body) => req.send(&body[..])?,
                        None => req.send_empty()?,
                    }
                }
                "GET" => {
                    let mut req = agent.get(&request.url);
                    for (key, value) in &request.headers {
                        req = req.header(key, value);
                    }
                    req.call()?
                }
                method => bail!("Unsupported HTTP method: {}", method),
            };

            let status_code = response.status().as_u16();
            let body = response.into_body().read_to_vec()?;
            Ok(HttpResponse { status_code, body })
        })
        .await?
    }
}

async fn execute_with_timeout(
    client: &dyn HttpClient,
    request: HttpRequest,
    timeout: Duration,
) -> Result<HttpResponse> {
    let url = request.url.clone();
    tokio::time::timeout(timeout, client.execute(request))
        .await
        .map_err(|_| anyhow!("request to {} timed out after {:?}", url, timeout))?
}

/// Token endpoint client
///
/// Authenticated with the user's session credential; the exercise token it
/// returns is only ever handed to the upload.
pub struct HttpTokenService {
    client: Arc<dyn HttpClient>,
    url: String,
    session_token: String,
    timeout: Duration,
}

impl HttpTokenService {
    pub fn new(
        client: Arc<dyn HttpClient>,
        config: &SubmissionConfig,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: config.token_url(),
            session_token: session_token.into(),
            timeout: config.timeout(),
        }
    }
}

#[async_trait(?Send)]
impl TokenService for HttpTokenService {
    async fn issue(&self, request: &TokenRequest) -> Result<TokenResponse> {
        let body = serde_json::to_vec(request)?;
        let http_request = HttpRequest::post(&self.url)
            .with_header("Accept", "application/json")
            .with_header("Content-Type", "application/json")
            .with_header("Authorization", format!("Bearer {}", self.session_token.trim()))
            .with_body(body);

        debug!("Requesting exercise token from {}", self.url);
        let response = execute_with_timeout(self.client.as_ref(), http_request, self.timeout).await?;
        if !response.is_success() {
            bail!(response.failure_message());
        }
        response.json()
    }
}

/// Upload endpoint client
pub struct HttpUploadService {
    client: Arc<dyn HttpClient>,
    url: String,
    timeout: Duration,
}

impl HttpUploadService {
    pub fn new(client: Arc<dyn HttpClient>, config: &SubmissionConfig) -> Self {
        Self {
            client,
            url: config.upload_url(),
            timeout: config.timeout(),
        }
    }
}

#[async_trait(?Send)]
impl UploadService for HttpUploadService {
    async fn submit(
        &self,
        artifact: &ArtifactHandle,
        duration_seconds: u64,
        token: ExerciseToken,
    ) -> Result<UploadResponse> {
        let path = artifact
            .local_path()
            .ok_or_else(|| anyhow!("artifact {} is not a local file", artifact))?;
        let audio = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;

        let (content_type, body) = MultipartForm::new()
            .file("audio", &artifact.file_name(), artifact.mime_type(), &audio)
            .text("duration", &duration_seconds.to_string())
            .finish();

        let http_request = HttpRequest::post(&self.url)
            .with_header("Accept", "application/json")
            .with_header("Content-Type", content_type)
            .with_header("Authorization", token.bearer())
            .with_body(body);

        debug!(
            "Uploading {} ({} bytes, {}s) to {}",
            artifact,
            audio.len(),
            duration_seconds,
            self.url
        );
        let response = execute_with_timeout(self.client.as_ref(), http_request, self.timeout).await?;
        if !response.is_success() {
            bail!(response.failure_message());
        }
        match response.json::<UploadResponse>() {
            Ok(parsed) => Ok(parsed),
            // A 2xx without a JSON body carries no success marker
            Err(_) => Ok(UploadResponse {
                success: None,
                status: None,
                message: Some(response.body_string().trim().to_string())
                    .filter(|m| !m.is_empty()),
            }),
        }
    }
}
