// ABOUTME: Single-flight guard for install/remove/apply operations.
// ABOUTME: A reservation is an RAII permit that returns the guard to Idle when dropped.

use crate::error::{Result, RiverShadeError};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationState {
    Idle,
    Reserved,
    Applying,
    Removing,
}

#[derive(Debug)]
struct GuardInner {
    state: OperationState,
    holder: Option<String>,
}

/// Allows one mutating operation at a time. Requests while busy are rejected, not queued.
#[derive(Debug, Clone)]
pub struct OperationGuard {
    inner: Arc<Mutex<GuardInner>>,
}

impl Default for OperationGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationGuard {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(GuardInner {
                state: OperationState::Idle,
                holder: None,
            })),
        }
    }

    pub fn state(&self) -> OperationState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    pub fn is_busy(&self) -> bool {
        self.state() != OperationState::Idle
    }

    /// Name of the operation holding the guard, if any.
    pub fn holder(&self) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .holder
            .clone()
    }

    /// Move `Idle -> Reserved` for `operation`, or fail naming the current holder.
    pub fn try_reserve(&self, operation: &str) -> Result<OperationPermit> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.state != OperationState::Idle {
            let holder = inner.holder.clone().unwrap_or_default();
            debug!(operation, holder = %holder, "operation rejected, guard busy");
            return Err(RiverShadeError::OperationInProgress(holder));
        }
        inner.state = OperationState::Reserved;
        inner.holder = Some(operation.to_string());
        Ok(OperationPermit {
            inner: self.inner.clone(),
        })
    }
}

/// Proof of a reservation. Dropping it releases the guard.
#[derive(Debug)]
pub struct OperationPermit {
    inner: Arc<Mutex<GuardInner>>,
}

impl OperationPermit {
    /// Record the phase the reserved operation has entered.
    pub fn enter(&self, state: OperationState) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state = state;
    }
}

impl Drop for OperationPermit {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.state = OperationState::Idle;
        inner.holder = None;
    }
}
