// SPDX-License-Identifier: Apache-2.0

use crate::access::{AccessDecision, AccessPhase, STATUS_BAD_REQUEST};
use crate::init::config::AccessConfig;
use access_sdk::{Bridge, Deadline};
use bytes::Bytes;
use http_host::{parse_request, HeaderOffsetIndex, HttpRequest};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub decision: AccessDecision,
    /// `None` when the request could not be parsed.
    pub request_line: Option<String>,
    pub elapsed: Duration,
}

/// Runs the access phase for requests arriving on one worker.
pub struct Worker {
    bridge: Bridge,
    phase: AccessPhase,
    config: AccessConfig,
    cancel: Option<CancellationToken>,
}

impl Worker {
    pub fn new(bridge: Bridge, config: &AccessConfig) -> Self {
        Self {
            bridge,
            phase: AccessPhase::new(),
            config: config.clone(),
            cancel: None,
        }
    }

    /// Cancelling `token` interrupts the handler of any in-flight request.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    fn deadline(&self) -> Deadline {
        let deadline = self.config.deadline();
        match &self.cancel {
            Some(token) => deadline.with_cancellation(token.clone()),
            None => deadline,
        }
    }

    /// Parses `raw` and decides whether it may proceed.
    pub fn process(&self, raw: Bytes) -> Outcome {
        let started = Instant::now();

        let request = match parse_request(raw, HeaderOffsetIndex::global()) {
            Ok(request) => request,
            Err(e) => {
                info!(error = %e, decision = "deny 400", "Rejected request");
                return Outcome {
                    decision: AccessDecision::Deny(STATUS_BAD_REQUEST),
                    request_line: None,
                    elapsed: started.elapsed(),
                };
            }
        };

        let decision = self.handle(&request);
        let elapsed = started.elapsed();
        info!(
            request = request.ctx.claimed_by().unwrap_or("-"),
            method = %String::from_utf8_lossy(&request.method_name),
            uri = %String::from_utf8_lossy(&request.uri),
            decision = %decision,
            elapsed = ?elapsed,
            "Processed request"
        );

        Outcome {
            decision,
            request_line: Some(request.to_string()),
            elapsed,
        }
    }

    /// Access phase for an already parsed request. The handler runs at most
    /// once per request; repeated calls decline.
    pub fn handle(&self, request: &HttpRequest) -> AccessDecision {
        self.phase.handle(&self.bridge, request, self.deadline())
    }
}
