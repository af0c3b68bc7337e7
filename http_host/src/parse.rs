//! Request line and header parsing.
//!
//! Produces an [`HttpRequest`] whose byte fields are slices of the received
//! buffer. Header names are folded and hashed once, here, and the result is
//! used to fill the per-request header cache through the same
//! [`HeaderOffsetIndex`] that later serves named lookups.

use crate::hash::hash_strlow;
use crate::headers::{HeadersIn, KnownHeader, Policy, TableElt};
use crate::index::HeaderOffsetIndex;
use crate::request::{
    HttpMethod, HttpRequest, RequestCtx, HTTP_VERSION_10, HTTP_VERSION_11, HTTP_VERSION_9,
};
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

/// Upper bound on header lines in one request.
const MAX_HEADERS: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("client sent invalid method")]
    InvalidMethod,

    #[error("client sent invalid request")]
    InvalidRequest,

    #[error("client sent invalid version")]
    InvalidVersion,

    #[error("client sent invalid header line")]
    InvalidHeader,

    #[error("client sent too many header lines")]
    TooManyHeaders,

    #[error("client sent duplicate header line: \"{0}\"")]
    DuplicateHeader(String),

    #[error("client sent HTTP/1.1 request without \"Host\" header")]
    MissingHost,

    #[error("client sent truncated request")]
    Truncated,
}

impl From<httparse::Error> for ParseError {
    fn from(err: httparse::Error) -> Self {
        match err {
            httparse::Error::Version => ParseError::InvalidVersion,
            httparse::Error::HeaderName
            | httparse::Error::HeaderValue
            | httparse::Error::NewLine => ParseError::InvalidHeader,
            httparse::Error::TooManyHeaders => ParseError::TooManyHeaders,
            _ => ParseError::InvalidRequest,
        }
    }
}

fn is_method_char(c: u8) -> bool {
    c.is_ascii_uppercase() || c == b'_' || c == b'-'
}

// Underscores are not accepted in header names, matching the host default.
fn is_header_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-'
}

pub fn parse_request(buf: Bytes, index: &HeaderOffsetIndex) -> Result<HttpRequest, ParseError> {
    let line_len = buf
        .iter()
        .position(|&c| c == b'\n')
        .ok_or(ParseError::Truncated)?;
    let line = buf[..line_len].strip_suffix(b"\r").unwrap_or(&buf[..line_len]);
    let request_line = buf.slice_ref(line);

    let method_end = line
        .iter()
        .position(|&c| c == b' ')
        .ok_or(ParseError::InvalidMethod)?;
    if method_end == 0 || !line[..method_end].iter().all(|&c| is_method_char(c)) {
        return Err(ParseError::InvalidMethod);
    }
    let method_name = buf.slice(..method_end);
    let method = HttpMethod::from_bytes(&method_name);

    // a simple request is just a method and a target
    let rest = line[method_end..].trim_ascii();
    if !rest.contains(&b' ') {
        if rest.is_empty() || method != HttpMethod::Get {
            return Err(ParseError::InvalidRequest);
        }
        let (uri, args, exten) = split_target(&buf.slice_ref(rest))?;
        return Ok(HttpRequest {
            header_in: buf.slice(..line_len + 1),
            request_line,
            method,
            method_name,
            http_protocol: Bytes::new(),
            http_version: HTTP_VERSION_9,
            unparsed_uri: buf.slice_ref(rest),
            uri,
            args,
            exten,
            headers_in: HeadersIn::new(),
            ctx: RequestCtx::default(),
        });
    }

    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);
    let header_end = match httparse::ParserConfig::default()
        .allow_multiple_spaces_in_request_line_delimiters(true)
        .ignore_invalid_headers_in_requests(true)
        .parse_request(&mut req, &buf)?
    {
        httparse::Status::Complete(header_end) => header_end,
        httparse::Status::Partial => return Err(ParseError::Truncated),
    };

    let version = req.version.ok_or(ParseError::InvalidVersion)?;
    let http_version = HTTP_VERSION_10 + u32::from(version);
    let http_protocol = line
        .rsplit(|&c| c == b' ')
        .find(|token| !token.is_empty())
        .map(|token| buf.slice_ref(token))
        .ok_or(ParseError::InvalidVersion)?;

    let unparsed_uri = buf.slice_ref(req.path.ok_or(ParseError::InvalidRequest)?.as_bytes());
    let (uri, args, exten) = split_target(&unparsed_uri)?;

    let mut headers_in = HeadersIn::new();
    for header in req.headers.iter() {
        add_header(&buf, header, index, &mut headers_in)?;
    }

    if http_version >= HTTP_VERSION_11 && !headers_in.contains(KnownHeader::Host) {
        return Err(ParseError::MissingHost);
    }

    Ok(HttpRequest {
        header_in: buf.slice(..header_end),
        request_line,
        method,
        method_name,
        http_protocol,
        http_version,
        unparsed_uri,
        uri,
        args,
        exten,
        headers_in,
        ctx: RequestCtx::default(),
    })
}

/// Splits a request target into its normalized path, query and extension.
fn split_target(unparsed_uri: &Bytes) -> Result<(Bytes, Bytes, Bytes), ParseError> {
    let (path, args) = match unparsed_uri.iter().position(|&c| c == b'?') {
        Some(q) => (unparsed_uri.slice(..q), unparsed_uri.slice(q + 1..)),
        None => (unparsed_uri.clone(), Bytes::new()),
    };

    let uri = if path.as_ref() == b"*" {
        path
    } else {
        normalize_path(&path)?
    };
    let exten = extension(&uri);
    Ok((uri, args, exten))
}

fn add_header(
    buf: &Bytes,
    header: &httparse::Header<'_>,
    index: &HeaderOffsetIndex,
    headers_in: &mut HeadersIn,
) -> Result<(), ParseError> {
    let name = header.name.as_bytes();
    if !name.iter().all(|&c| is_header_name_char(c)) {
        debug!(header = %header.name, "client sent invalid header line, ignored");
        return Ok(());
    }

    let (hash, lowcase) = hash_strlow(name);
    let elt = TableElt {
        hash,
        key: buf.slice_ref(name),
        lowcase_key: Bytes::from(lowcase),
        value: buf.slice_ref(header.value.trim_ascii()),
    };

    let offset = index.find(elt.hash, &elt.lowcase_key);
    let existing = offset.and_then(|o| headers_in.slot(o)).is_some();
    let position = headers_in.push(elt);

    if let Some(offset) = offset {
        if !existing {
            headers_in.fill_slot(offset, position);
        } else if offset.header().map(|h| h.policy()) == Some(Policy::Unique) {
            return Err(ParseError::DuplicateHeader(format!(
                "{}: {}",
                header.name,
                String::from_utf8_lossy(header.value)
            )));
        }
    }

    Ok(())
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Decodes percent escapes, merges slashes and resolves dot segments.
/// Returns a slice of `path` when nothing had to change.
fn normalize_path(path: &Bytes) -> Result<Bytes, ParseError> {
    if path.first() != Some(&b'/') {
        return Err(ParseError::InvalidRequest);
    }

    let mut decoded = Vec::with_capacity(path.len());
    let mut i = 0;
    while i < path.len() {
        let c = path[i];
        if c == b'%' {
            let hi = path.get(i + 1).copied().and_then(hex_value);
            let lo = path.get(i + 2).copied().and_then(hex_value);
            match (hi, lo) {
                (Some(hi), Some(lo)) if hi != 0 || lo != 0 => decoded.push(hi << 4 | lo),
                _ => return Err(ParseError::InvalidRequest),
            }
            i += 3;
        } else if c < 0x20 || c == 0x7f {
            return Err(ParseError::InvalidRequest);
        } else {
            decoded.push(c);
            i += 1;
        }
    }

    let mut segments: Vec<&[u8]> = Vec::new();
    let mut trailing_slash = false;
    for segment in decoded.split(|&c| c == b'/') {
        trailing_slash = false;
        match segment {
            b"" => trailing_slash = true,
            b"." => trailing_slash = true,
            b".." => {
                segments.pop().ok_or(ParseError::InvalidRequest)?;
                trailing_slash = true;
            }
            _ => segments.push(segment),
        }
    }

    let mut normalized = Vec::with_capacity(decoded.len());
    for segment in &segments {
        normalized.push(b'/');
        normalized.extend_from_slice(segment);
    }
    if trailing_slash || segments.is_empty() {
        normalized.push(b'/');
    }

    if normalized == path.as_ref() {
        Ok(path.clone())
    } else {
        Ok(Bytes::from(normalized))
    }
}

fn extension(uri: &Bytes) -> Bytes {
    let segment_start = uri.iter().rposition(|&c| c == b'/').map_or(0, |p| p + 1);
    match uri[segment_start..].iter().rposition(|&c| c == b'.') {
        Some(dot) => uri.slice(segment_start + dot + 1..),
        None => Bytes::new(),
    }
}
