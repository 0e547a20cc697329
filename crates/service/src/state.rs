//! Service lifecycle state machine
//!
//! UNINITIALIZED -> LOADING -> READY or DEGRADED. Transitions only move
//! forward; there is no way back to LOADING without a process restart, and
//! the predictor behind READY is immutable and shared by every request.

use crate::errors::ServiceError;
use std::sync::{Arc, RwLock};
use triage_core::Predictor;

/// Lifecycle of the artifact-backed predictor
#[derive(Debug, Clone)]
pub enum ServiceState {
    Uninitialized,
    Loading,
    Ready(Arc<Predictor>),
    Degraded(String),
}

impl ServiceState {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceState::Uninitialized => "uninitialized",
            ServiceState::Loading => "loading",
            ServiceState::Ready(_) => "ready",
            ServiceState::Degraded(_) => "degraded",
        }
    }
}

/// Shared handle on the service state
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<RwLock<ServiceState>>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ServiceState::Uninitialized)),
        }
    }

    fn transition(&self, next: ServiceState, allowed_from: &str) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if guard.label() == allowed_from {
            tracing::info!(from = guard.label(), to = next.label(), "service state change");
            *guard = next;
        } else {
            tracing::warn!(
                from = guard.label(),
                to = next.label(),
                "ignoring invalid service state transition"
            );
        }
    }

    pub fn begin_loading(&self) {
        self.transition(ServiceState::Loading, "uninitialized");
    }

    pub fn set_ready(&self, predictor: Predictor) {
        self.transition(ServiceState::Ready(Arc::new(predictor)), "loading");
    }

    pub fn set_degraded(&self, reason: impl Into<String>) {
        self.transition(ServiceState::Degraded(reason.into()), "loading");
    }

    pub fn label(&self) -> &'static str {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .label()
    }

    /// The predictor, or the error a request in this state must see.
    pub fn predictor(&self) -> Result<Arc<Predictor>, ServiceError> {
        let guard = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match &*guard {
            ServiceState::Uninitialized | ServiceState::Loading => Err(ServiceError::NotReady),
            ServiceState::Degraded(reason) => {
                Err(ServiceError::ModelUnavailable(reason.clone()))
            }
            ServiceState::Ready(predictor) => Ok(predictor.clone()),
        }
    }
}
