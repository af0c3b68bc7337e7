use crate::headers::HeadersIn;
use bytes::Bytes;
use std::fmt;
use std::sync::OnceLock;

pub const HTTP_VERSION_9: u32 = 9;
pub const HTTP_VERSION_10: u32 = 1000;
pub const HTTP_VERSION_11: u32 = 1001;
pub const HTTP_VERSION_20: u32 = 2000;
pub const HTTP_VERSION_30: u32 = 3000;

/// Methods the host recognises. Anything else parses as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Unknown,
    Get,
    Head,
    Post,
    Put,
    Delete,
    Mkcol,
    Copy,
    Move,
    Options,
    Propfind,
    Proppatch,
    Lock,
    Unlock,
    Patch,
    Trace,
    Connect,
}

impl HttpMethod {
    pub fn from_bytes(name: &[u8]) -> Self {
        match name {
            b"GET" => HttpMethod::Get,
            b"HEAD" => HttpMethod::Head,
            b"POST" => HttpMethod::Post,
            b"PUT" => HttpMethod::Put,
            b"DELETE" => HttpMethod::Delete,
            b"MKCOL" => HttpMethod::Mkcol,
            b"COPY" => HttpMethod::Copy,
            b"MOVE" => HttpMethod::Move,
            b"OPTIONS" => HttpMethod::Options,
            b"PROPFIND" => HttpMethod::Propfind,
            b"PROPPATCH" => HttpMethod::Proppatch,
            b"LOCK" => HttpMethod::Lock,
            b"UNLOCK" => HttpMethod::Unlock,
            b"PATCH" => HttpMethod::Patch,
            b"TRACE" => HttpMethod::Trace,
            b"CONNECT" => HttpMethod::Connect,
            _ => HttpMethod::Unknown,
        }
    }

    pub fn as_str(self) -> Option<&'static str> {
        let name = match self {
            HttpMethod::Unknown => return None,
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Mkcol => "MKCOL",
            HttpMethod::Copy => "COPY",
            HttpMethod::Move => "MOVE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Propfind => "PROPFIND",
            HttpMethod::Proppatch => "PROPPATCH",
            HttpMethod::Lock => "LOCK",
            HttpMethod::Unlock => "UNLOCK",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Connect => "CONNECT",
        };
        Some(name)
    }
}

/// Per-request context slot owned by the access phase.
///
/// Set at most once; the stored label identifies the invocation that
/// claimed the request.
#[derive(Debug, Default)]
pub struct RequestCtx {
    access: OnceLock<String>,
}

impl RequestCtx {
    /// Claims the slot. Returns the label of the earlier claim if there
    /// was one.
    pub fn claim(&self, label: impl Into<String>) -> Result<(), &str> {
        let label = label.into();
        let mut claimed = false;
        let current = self.access.get_or_init(|| {
            claimed = true;
            label
        });
        if claimed {
            Ok(())
        } else {
            Err(current.as_str())
        }
    }

    pub fn claimed_by(&self) -> Option<&str> {
        self.access.get().map(String::as_str)
    }
}

/// The host's record of one in-flight request.
///
/// Byte fields are views into the received buffer, except `uri` which is
/// freshly allocated when decoding changed it. The record is owned by the
/// host for the lifetime of the request; nothing outside the host mutates it.
#[derive(Debug)]
pub struct HttpRequest {
    pub header_in: Bytes,
    pub request_line: Bytes,
    pub method: HttpMethod,
    pub method_name: Bytes,
    pub http_protocol: Bytes,
    pub http_version: u32,
    pub unparsed_uri: Bytes,
    pub uri: Bytes,
    pub args: Bytes,
    pub exten: Bytes,
    pub headers_in: HeadersIn,
    pub ctx: RequestCtx,
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.request_line))
    }
}
