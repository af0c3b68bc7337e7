//! `request_*` functions reading one field of the current request.
//!
//! Every function takes exactly one request handle. Byte fields are decoded
//! as UTF-8, replacing invalid sequences.

use crate::py::handle::with_request;
use bytes::Bytes;
use http_host::{HttpMethod, KnownHeader};
use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

pub(crate) fn text(bytes: &Bytes) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Method label given to scripts. Methods other than these four are
/// reported as `OTHER`; `request_method_name` has the exact name.
pub fn method_label(method: HttpMethod) -> &'static str {
    match method {
        HttpMethod::Get => "GET",
        HttpMethod::Post => "POST",
        HttpMethod::Put => "PUT",
        HttpMethod::Delete => "DELETE",
        _ => "OTHER",
    }
}

#[pyfunction]
pub fn request_http_version(handle: &Bound<'_, PyAny>) -> PyResult<u32> {
    with_request(handle, |r| r.http_version)
}

#[pyfunction]
pub fn request_http_protocol(handle: &Bound<'_, PyAny>) -> PyResult<String> {
    with_request(handle, |r| text(&r.http_protocol))
}

#[pyfunction]
pub fn request_request_line(handle: &Bound<'_, PyAny>) -> PyResult<String> {
    with_request(handle, |r| text(&r.request_line))
}

#[pyfunction]
pub fn request_method(handle: &Bound<'_, PyAny>) -> PyResult<&'static str> {
    with_request(handle, |r| method_label(r.method))
}

#[pyfunction]
pub fn request_method_name(handle: &Bound<'_, PyAny>) -> PyResult<String> {
    with_request(handle, |r| text(&r.method_name))
}

#[pyfunction]
pub fn request_uri(handle: &Bound<'_, PyAny>) -> PyResult<String> {
    with_request(handle, |r| text(&r.uri))
}

#[pyfunction]
pub fn request_args(handle: &Bound<'_, PyAny>) -> PyResult<String> {
    with_request(handle, |r| text(&r.args))
}

#[pyfunction]
pub fn request_exten(handle: &Bound<'_, PyAny>) -> PyResult<String> {
    with_request(handle, |r| text(&r.exten))
}

#[pyfunction]
pub fn request_unparsed_uri(handle: &Bound<'_, PyAny>) -> PyResult<String> {
    with_request(handle, |r| text(&r.unparsed_uri))
}

/// User from `Authorization: Basic`, or `None`.
#[pyfunction]
pub fn request_user(handle: &Bound<'_, PyAny>) -> PyResult<Option<String>> {
    with_request(handle, |r| r.headers_in.basic_auth().map(|c| text(&c.user)))
}

/// Password from `Authorization: Basic`, or `None`.
#[pyfunction]
pub fn request_password(handle: &Bound<'_, PyAny>) -> PyResult<Option<String>> {
    with_request(handle, |r| r.headers_in.basic_auth().map(|c| text(&c.passwd)))
}

fn header_value(handle: &Bound<'_, PyAny>, header: KnownHeader) -> PyResult<Option<String>> {
    with_request(handle, |r| r.headers_in.get(header).map(text))
}

pub(crate) fn add_field_accessors(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(request_http_version, m)?)?;
    m.add_function(wrap_pyfunction!(request_http_protocol, m)?)?;
    m.add_function(wrap_pyfunction!(request_request_line, m)?)?;
    m.add_function(wrap_pyfunction!(request_method, m)?)?;
    m.add_function(wrap_pyfunction!(request_method_name, m)?)?;
    m.add_function(wrap_pyfunction!(request_uri, m)?)?;
    m.add_function(wrap_pyfunction!(request_args, m)?)?;
    m.add_function(wrap_pyfunction!(request_exten, m)?)?;
    m.add_function(wrap_pyfunction!(request_unparsed_uri, m)?)?;
    m.add_function(wrap_pyfunction!(request_user, m)?)?;
    m.add_function(wrap_pyfunction!(request_password, m)?)?;
    Ok(())
}

macro_rules! header_accessors {
    ($($fn_name:ident => $header:ident,)*) => {
        $(
            #[pyfunction]
            pub fn $fn_name(handle: &Bound<'_, PyAny>) -> PyResult<Option<String>> {
                header_value(handle, KnownHeader::$header)
            }
        )*

        /// Python name of each header accessor with the header it reads.
        pub const HEADER_ACCESSORS: &[(&str, KnownHeader)] = &[
            $((stringify!($fn_name), KnownHeader::$header),)*
        ];

        pub(crate) fn add_header_accessors(m: &Bound<'_, PyModule>) -> PyResult<()> {
            $(m.add_function(wrap_pyfunction!($fn_name, m)?)?;)*
            Ok(())
        }
    };
}

header_accessors! {
    request_header_host => Host,
    request_header_connection => Connection,
    request_header_if_modified_since => IfModifiedSince,
    request_header_if_unmodified_since => IfUnmodifiedSince,
    request_header_if_match => IfMatch,
    request_header_if_none_match => IfNoneMatch,
    request_header_user_agent => UserAgent,
    request_header_referer => Referer,
    request_header_content_length => ContentLength,
    request_header_content_range => ContentRange,
    request_header_content_type => ContentType,
    request_header_range => Range,
    request_header_if_range => IfRange,
    request_header_transfer_encoding => TransferEncoding,
    request_header_te => Te,
    request_header_expect => Expect,
    request_header_upgrade => Upgrade,
    request_header_accept_encoding => AcceptEncoding,
    request_header_via => Via,
    request_header_authorization => Authorization,
    request_header_keep_alive => KeepAlive,
    request_header_x_forwarded_for => XForwardedFor,
    request_header_x_real_ip => XRealIp,
    request_header_accept => Accept,
    request_header_accept_language => AcceptLanguage,
    request_header_depth => Depth,
    request_header_destination => Destination,
    request_header_overwrite => Overwrite,
    request_header_date => Date,
    request_header_cookie => Cookie,
}
