//! Scripted token and upload services for tests and the demo

use crate::audio::ArtifactHandle;
use crate::submission::services::{
    ExerciseToken, TokenRequest, TokenResponse, TokenService, UploadResponse, UploadService,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

enum Scripted<T> {
    Respond(T),
    Fail(String),
}

/// Issues `token-1`, `token-2`, ... unless scripted otherwise
#[derive(Default)]
pub struct ScriptedTokenService {
    requests: Mutex<Vec<TokenRequest>>,
    script: Mutex<VecDeque<Scripted<TokenResponse>>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedTokenService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<TokenRequest> {
        self.requests.lock().clone()
    }

    pub fn respond_next(&self, response: TokenResponse) {
        self.script.lock().push_back(Scripted::Respond(response));
    }

    pub fn fail_next(&self, message: impl Into<String>) {
        self.script.lock().push_back(Scripted::Fail(message.into()));
    }

    /// Hold every response for `delay`
    pub fn delay_responses(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }
}

#[async_trait(?Send)]
impl TokenService for ScriptedTokenService {
    async fn issue(&self, request: &TokenRequest) -> Result<TokenResponse> {
        let issued = {
            let mut requests = self.requests.lock();
            requests.push(request.clone());
            requests.len()
        };

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().pop_front();
        match next {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => bail!(message),
            None => Ok(TokenResponse {
                token: Some(format!("token-{}", issued)),
                message: None,
            }),
        }
    }
}

/// An upload as the scripted service received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub artifact: ArtifactHandle,
    pub duration_seconds: u64,
    pub token: String,
}

/// Accepts every upload unless scripted otherwise
#[derive(Default)]
pub struct ScriptedUploadService {
    uploads: Mutex<Vec<RecordedUpload>>,
    script: Mutex<VecDeque<Scripted<UploadResponse>>>,
}

impl ScriptedUploadService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().clone()
    }

    pub fn respond_next(&self, response: UploadResponse) {
        self.script.lock().push_back(Scripted::Respond(response));
    }

    pub fn fail_next(&self, message: impl Into<String>) {
        self.script.lock().push_back(Scripted::Fail(message.into()));
    }
}

#[async_trait(?Send)]
impl UploadService for ScriptedUploadService {
    async fn submit(
        &self,
        artifact: &ArtifactHandle,
        duration_seconds: u64,
        token: ExerciseToken,
    ) -> Result<UploadResponse> {
        self.uploads.lock().push(RecordedUpload {
            artifact: artifact.clone(),
            duration_seconds,
            token: token.as_str().to_string(),
        });

        let next = self.script.lock().pop_front();
        match next {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => bail!(message),
            None => Ok(UploadResponse::accepted("Recording received")),
        }
    }
}
