use crate::model::lease::Lease;
use crate::py::NotARequestHandle;
use http_host::HttpRequest;
use pyo3::prelude::*;

/// Opaque reference to the request being processed.
///
/// Instances are only created by the bridge. Scripts pass them to the
/// `request_*` functions; the handle itself exposes no request data.
#[pyclass(frozen, module = "access_sdk")]
pub struct RequestHandle {
    id: String,
    lease: Lease,
}

impl RequestHandle {
    pub fn new(id: String, lease: Lease) -> Self {
        Self { id, lease }
    }

    pub fn lease(&self) -> &Lease {
        &self.lease
    }
}

#[pymethods]
impl RequestHandle {
    #[getter]
    fn id(&self) -> &str {
        &self.id
    }

    #[getter]
    fn valid(&self) -> bool {
        self.lease.is_live()
    }

    fn __repr__(&self) -> String {
        let state = if self.lease.is_live() { "live" } else { "expired" };
        format!("<RequestHandle {} ({})>", self.id, state)
    }
}

/// Checks that `value` is a [`RequestHandle`], raising `NotARequestHandle`
/// otherwise.
pub fn assert_type<'a, 'py>(
    value: &'a Bound<'py, PyAny>,
) -> PyResult<&'a Bound<'py, RequestHandle>> {
    value.downcast::<RequestHandle>().map_err(|_| {
        let type_name = value
            .get_type()
            .name()
            .map(|n| n.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        NotARequestHandle::new_err(format!("not a request handle: {type_name}"))
    })
}

/// Runs `f` against the record behind `value`.
pub(crate) fn with_request<R>(
    value: &Bound<'_, PyAny>,
    f: impl FnOnce(&HttpRequest) -> R,
) -> PyResult<R> {
    let handle = assert_type(value)?;
    Ok(handle.get().lease.with_request(f)?)
}
