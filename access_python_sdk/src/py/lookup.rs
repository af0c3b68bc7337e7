use crate::py::accessors::text;
use crate::py::handle::{assert_type, with_request};
use bytes::Bytes;
use http_host::hash::hash_strlow;
use http_host::{HeaderOffsetIndex, HttpRequest};
use pyo3::prelude::*;
use pyo3::types::PyString;

/// Finds a well-known header by name, ignoring ASCII case.
///
/// Goes through the same hash index the parser used to fill the header
/// cache, so a name resolves here exactly when it resolved there. Names
/// outside the index and headers the client did not send both give `None`.
pub fn lookup_header<'r>(
    request: &'r HttpRequest,
    index: &HeaderOffsetIndex,
    name: &[u8],
) -> Option<&'r Bytes> {
    let (key, lowcase) = hash_strlow(name);
    let offset = index.find(key, &lowcase)?;
    request.headers_in.slot(offset).map(|elt| &elt.value)
}

/// `request_header(handle, name)`: value of a well-known header, or `None`.
#[pyfunction]
pub fn request_header(
    handle: &Bound<'_, PyAny>,
    name: &Bound<'_, PyAny>,
) -> PyResult<Option<String>> {
    // the handle is checked before the name
    assert_type(handle)?;
    let name = name.downcast::<PyString>()?.to_string_lossy();
    with_request(handle, |r| {
        lookup_header(r, HeaderOffsetIndex::global(), name.as_bytes()).map(text)
    })
}
