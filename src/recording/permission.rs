//! Microphone authorization

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Platform permission API
#[async_trait(?Send)]
pub trait PermissionsProvider {
    /// Current authorization, without prompting
    async fn query(&self) -> PermissionStatus;

    /// Show the OS prompt and return the resulting authorization
    async fn request(&self) -> PermissionStatus;
}

/// Gate in front of the microphone
///
/// Denial is terminal as far as the core is concerned: the gate never
/// retries, and only the OS settings can change the answer.
#[derive(Clone)]
pub struct PermissionGate {
    provider: Arc<dyn PermissionsProvider>,
}

impl PermissionGate {
    pub fn new(provider: Arc<dyn PermissionsProvider>) -> Self {
        Self { provider }
    }

    pub async fn is_granted(&self) -> bool {
        self.provider.query().await == PermissionStatus::Granted
    }

    /// Prompt if needed; returns immediately when already granted
    pub async fn request(&self) -> bool {
        if self.is_granted().await {
            return true;
        }
        let granted = self.provider.request().await == PermissionStatus::Granted;
        if granted {
            info!("Microphone permission granted");
        } else {
            warn!("Microphone permission denied");
        }
        granted
    }
}

#[derive(Debug)]
struct PermissionsInner {
    status: PermissionStatus,
    grant_on_request: bool,
    queries: usize,
    requests: usize,
}

/// Scriptable permission provider for tests and the demo
#[derive(Debug)]
pub struct SimulatedPermissions {
    inner: Mutex<PermissionsInner>,
}

impl SimulatedPermissions {
    pub fn granted() -> Self {
        Self::with_status(PermissionStatus::Granted, true)
    }

    /// Not yet decided; the prompt grants access
    pub fn undetermined() -> Self {
        Self::with_status(PermissionStatus::Denied, true)
    }

    /// Denied, and the prompt keeps denying
    pub fn denied() -> Self {
        Self::with_status(PermissionStatus::Denied, false)
    }

    fn with_status(status: PermissionStatus, grant_on_request: bool) -> Self {
        Self {
            inner: Mutex::new(PermissionsInner {
                status,
                grant_on_request,
                queries: 0,
                requests: 0,
            }),
        }
    }

    /// Number of OS prompts shown
    pub fn prompts(&self) -> usize {
        self.inner.lock().requests
    }

    pub fn queries(&self) -> usize {
        self.inner.lock().queries
    }

    /// Simulate the user flipping the switch in OS settings
    pub fn set_status(&self, status: PermissionStatus) {
        self.inner.lock().status = status;
    }
}

#[async_trait(?Send)]
impl PermissionsProvider for SimulatedPermissions {
    async fn query(&self) -> PermissionStatus {
        let mut inner = self.inner.lock();
        inner.queries += 1;
        inner.status
    }

    async fn request(&self) -> PermissionStatus {
        let mut inner = self.inner.lock();
        inner.requests += 1;
        if inner.grant_on_request {
            inner.status = PermissionStatus::Granted;
        }
        inner.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_when_granted_skips_prompt() {
        let provider = Arc::new(SimulatedPermissions::granted());
        let gate = PermissionGate::new(provider.clone());

        assert!(gate.request().await);
        assert!(gate.request().await);
        assert_eq!(provider.prompts(), 0);
    }

    #[tokio::test]
    async fn test_prompt_grants_once() {
        let provider = Arc::new(SimulatedPermissions::undetermined());
        let gate = PermissionGate::new(provider.clone());

        assert!(!gate.is_granted().await);
        assert!(gate.request().await);
        assert!(gate.request().await);
        assert_eq!(provider.prompts(), 1);
    }

    #[tokio::test]
    async fn test_denial_is_terminal_until_settings_change() {
        let provider = Arc::new(SimulatedPermissions::denied());
        let gate = PermissionGate::new(provider.clone());

        assert!(!gate.request().await);
        assert!(!gate.request().await);

        provider.set_status(PermissionStatus::Granted);
        assert!(gate.is_granted().await);
    }
}
