use crate::model::request_id::RequestId;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading a handler script. All of them are fatal
/// configuration errors.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to start the Python interpreter: {0}")]
    Interpreter(String),

    #[error("failed to read script {}: {source}", path.display())]
    ScriptRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load script {}: {message}", path.display())]
    ScriptLoad { path: PathBuf, message: String },

    #[error("script {} does not define {symbol}", path.display())]
    MissingHandler { symbol: &'static str, path: PathBuf },

    #[error("{symbol} in script {} is not callable", path.display())]
    HandlerNotCallable { symbol: &'static str, path: PathBuf },

    #[error("failed to prepare namespace {name}: {message}")]
    Namespace { name: String, message: String },
}

/// Failures of a single handler invocation.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("access handler already ran for this request as {earlier}")]
    AlreadyInvoked { earlier: String },

    #[error("access handler {id} failed: {message}")]
    Handler {
        id: RequestId,
        message: String,
        traceback: Option<String>,
    },

    #[error("access handler {id} exceeded its deadline")]
    DeadlineExceeded { id: RequestId },

    #[error("interpreter error in {id}: {message}")]
    Interpreter { id: RequestId, message: String },
}

impl InvokeError {
    pub fn id(&self) -> Option<RequestId> {
        match self {
            InvokeError::AlreadyInvoked { .. } => None,
            InvokeError::Handler { id, .. }
            | InvokeError::DeadlineExceeded { id }
            | InvokeError::Interpreter { id, .. } => Some(*id),
        }
    }
}
