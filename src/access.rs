// SPDX-License-Identifier: Apache-2.0

//! Access-phase decision built on top of the Python handler.

use access_sdk::{Bridge, Deadline, InvokeError, Verdict};
use http_host::HttpRequest;
use std::fmt;
use tracing::{debug, error, warn};

pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_FORBIDDEN: u16 = 403;
pub const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// No opinion, later phases decide.
    Declined,
    Allow,
    Deny(u16),
    Error(u16),
}

impl AccessDecision {
    pub fn status(&self) -> Option<u16> {
        match self {
            AccessDecision::Deny(status) | AccessDecision::Error(status) => Some(*status),
            AccessDecision::Declined | AccessDecision::Allow => None,
        }
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessDecision::Declined => f.write_str("declined"),
            AccessDecision::Allow => f.write_str("allow"),
            AccessDecision::Deny(status) => write!(f, "deny {status}"),
            AccessDecision::Error(status) => write!(f, "error {status}"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AccessPhase;

impl AccessPhase {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, bridge: &Bridge, request: &HttpRequest, deadline: Deadline) -> AccessDecision {
        match bridge.run(request, deadline) {
            Ok(invocation) => {
                let decision = decide(&invocation.verdict);
                debug!(
                    request = %invocation.id,
                    verdict = %invocation.verdict,
                    decision = %decision,
                    elapsed = ?invocation.elapsed,
                    "Access handler returned"
                );
                decision
            }
            Err(InvokeError::AlreadyInvoked { earlier }) => {
                debug!(earlier = %earlier, "Access handler already ran for request, declining");
                AccessDecision::Declined
            }
            Err(InvokeError::Handler {
                id,
                message,
                traceback,
            }) => {
                error!(
                    request = %id,
                    error = %message,
                    traceback = %traceback.unwrap_or_default(),
                    "Access handler failed"
                );
                AccessDecision::Error(STATUS_INTERNAL_SERVER_ERROR)
            }
            Err(e) => {
                error!(
                    request = ?e.id().map(|id| id.to_string()),
                    error = %e,
                    "Access handler did not complete"
                );
                AccessDecision::Error(STATUS_INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// Maps a handler's return value onto an access decision.
pub fn decide(verdict: &Verdict) -> AccessDecision {
    match verdict {
        Verdict::None | Verdict::Bool(true) => AccessDecision::Declined,
        Verdict::Bool(false) => AccessDecision::Deny(STATUS_FORBIDDEN),
        Verdict::Int(200..=299) => AccessDecision::Allow,
        Verdict::Int(n @ 300..=599) => AccessDecision::Deny(*n as u16),
        Verdict::Text(s) if s.eq_ignore_ascii_case("allow") => AccessDecision::Allow,
        Verdict::Text(s) if s.eq_ignore_ascii_case("deny") => AccessDecision::Deny(STATUS_FORBIDDEN),
        other => {
            warn!(verdict = %other, "Unrecognised access handler result, declining");
            AccessDecision::Declined
        }
    }
}
