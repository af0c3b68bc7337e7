//! Exposes the host's per-request record to Python access handlers.

pub mod model;
pub mod py;

pub use model::deadline::Deadline;
pub use model::error::{BridgeError, InvokeError};
pub use model::invoke::{Bridge, BridgeConfig, Invocation, Verdict, HANDLER_SYMBOL};
pub use model::request_id::{RequestId, RequestIdGenerator};
