//! Submission collaborators and wire payloads

use crate::audio::ArtifactHandle;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Single-use upload credential
///
/// Not `Clone`: the upload service takes it by value, so a token can be
/// presented at most once and is never cached.
pub struct ExerciseToken(String);

impl ExerciseToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for an `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0.trim())
    }
}

impl fmt::Debug for ExerciseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExerciseToken(<redacted>)")
    }
}

/// What the token is scoped to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionScope {
    pub assigned_task_id: String,
    /// Resolved from the user profile; submission is refused without it
    pub student_id: Option<String>,
    pub task_id: String,
    pub repeat_count: u32,
    pub due_date: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
}

impl SubmissionScope {
    pub fn new(
        assigned_task_id: impl Into<String>,
        task_id: impl Into<String>,
        student_id: impl Into<String>,
    ) -> Self {
        Self {
            assigned_task_id: assigned_task_id.into(),
            student_id: Some(student_id.into()),
            task_id: task_id.into(),
            ..Self::default()
        }
    }

    pub fn with_repeat_count(mut self, repeat_count: u32) -> Self {
        self.repeat_count = repeat_count;
        self
    }

    pub fn with_dates(
        mut self,
        start_date: Option<DateTime<Utc>>,
        due_date: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_date = start_date;
        self.due_date = due_date;
        self
    }

    pub fn without_student(mut self) -> Self {
        self.student_id = None;
        self
    }

    /// Student id, if present and not blank
    pub fn resolved_student_id(&self) -> Option<&str> {
        self.student_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Token issuance payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub assigned_task_id: String,
    pub student_id: String,
    pub task_id: String,
    pub repeat_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    pub role: String,
    pub environment: String,
}

impl TokenRequest {
    pub fn new(
        scope: &SubmissionScope,
        student_id: &str,
        role: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            assigned_task_id: scope.assigned_task_id.clone(),
            student_id: student_id.to_string(),
            task_id: scope.task_id.clone(),
            repeat_count: scope.repeat_count,
            due_date: scope.due_date,
            start_date: scope.start_date,
            role: role.into(),
            environment: environment.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl TokenResponse {
    /// The token, unless missing or blank
    pub fn usable_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl UploadResponse {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            success: Some(true),
            status: None,
            message: Some(message.into()),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            status: None,
            message: Some(message.into()),
        }
    }

    /// A 2xx status alone is not enough; the body must say so
    ///
    /// Every marker present must agree: a `status` other than "success"
    /// rejects the upload even when `success` is true.
    pub fn is_success(&self) -> bool {
        let status_ok = self
            .status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("success"));
        match (self.success, status_ok) {
            (None, None) => false,
            (success, status) => success.unwrap_or(true) && status.unwrap_or(true),
        }
    }
}

/// Issues exercise tokens
#[async_trait(?Send)]
pub trait TokenService {
    async fn issue(&self, request: &TokenRequest) -> Result<TokenResponse>;
}

/// Uploads a finished recording
#[async_trait(?Send)]
pub trait UploadService {
    async fn submit(
        &self,
        artifact: &ArtifactHandle,
        duration_seconds: u64,
        token: ExerciseToken,
    ) -> Result<UploadResponse>;
}
