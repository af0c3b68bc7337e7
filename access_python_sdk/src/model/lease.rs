//! Time-limited access to a host request record.
//!
//! A [`Lease`] is what a script-visible handle holds instead of the record
//! itself. It is only granted through [`Lease::scoped`], which revokes it
//! before returning, so a handle that outlives its invocation can never
//! reach the record again, nor whatever the host later places at the same
//! address.

use crate::model::deadline::{Deadline, DeadlineError};
use http_host::HttpRequest;
use std::ptr::NonNull;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum LeaseError {
    #[error("request handle used after its invocation returned")]
    Expired,

    #[error(transparent)]
    Deadline(#[from] DeadlineError),

    #[error("request lease lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, Copy)]
struct RequestPtr(NonNull<HttpRequest>);

// SAFETY: the pointer is only dereferenced while the lease is live, and
// `Lease::scoped` keeps the borrow it was created from alive for exactly
// that long. `HttpRequest` itself is `Sync`.
unsafe impl Send for RequestPtr {}
unsafe impl Sync for RequestPtr {}

#[derive(Debug)]
struct LeaseState {
    request: Option<RequestPtr>,
    deadline: Deadline,
}

#[derive(Debug, Clone)]
pub struct Lease {
    inner: Arc<RwLock<LeaseState>>,
}

struct RevokeOnDrop<'a>(&'a Lease);

impl Drop for RevokeOnDrop<'_> {
    fn drop(&mut self) {
        self.0.revoke();
    }
}

impl Lease {
    /// Grants a lease on `request` for the duration of `f`.
    ///
    /// The lease is revoked when `f` returns or unwinds; clones that escape
    /// `f` observe [`LeaseError::Expired`] from then on.
    pub fn scoped<R>(request: &HttpRequest, deadline: Deadline, f: impl FnOnce(&Lease) -> R) -> R {
        let lease = Lease {
            inner: Arc::new(RwLock::new(LeaseState {
                request: Some(RequestPtr(NonNull::from(request))),
                deadline,
            })),
        };
        let _revoke = RevokeOnDrop(&lease);
        f(&lease)
    }

    pub fn with_request<R>(&self, f: impl FnOnce(&HttpRequest) -> R) -> Result<R, LeaseError> {
        let state = self.inner.read().map_err(|_| LeaseError::Poisoned)?;
        let ptr = state.request.ok_or(LeaseError::Expired)?;
        state.deadline.check()?;
        // SAFETY: `request` is cleared under the write lock before the borrow
        // in `scoped` ends, and the read guard is held across `f`.
        let request = unsafe { ptr.0.as_ref() };
        Ok(f(request))
    }

    pub fn revoke(&self) {
        let mut state = match self.inner.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.request = None;
    }

    pub fn is_live(&self) -> bool {
        match self.inner.read() {
            Ok(state) => state.request.is_some(),
            Err(_) => false,
        }
    }

    pub fn deadline(&self) -> Result<Deadline, LeaseError> {
        let state = self.inner.read().map_err(|_| LeaseError::Poisoned)?;
        Ok(state.deadline.clone())
    }
}
