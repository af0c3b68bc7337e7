pub mod accessors;
pub mod handle;
pub mod lookup;
pub mod tracer;

use crate::model::deadline::DeadlineError;
use crate::model::lease::LeaseError;
use handle::RequestHandle;
use pyo3::create_exception;
use pyo3::exceptions::{PyRuntimeError, PyTimeoutError, PyTypeError};
use pyo3::prelude::*;
use pyo3::wrap_pyfunction;
use std::sync::{Mutex, MutexGuard, Once, PoisonError};
use tracing::info;

static INTERPRETER_INIT: Once = Once::new();

create_exception!(
    access_sdk,
    NotARequestHandle,
    PyTypeError,
    "An accessor received something other than a request handle."
);
create_exception!(
    access_sdk,
    RequestExpired,
    PyRuntimeError,
    "The handle's invocation has already returned."
);
create_exception!(
    access_sdk,
    DeadlineExceeded,
    PyTimeoutError,
    "The invocation ran past its deadline or was cancelled."
);

impl From<DeadlineError> for PyErr {
    fn from(e: DeadlineError) -> Self {
        DeadlineExceeded::new_err(e.to_string())
    }
}

impl From<LeaseError> for PyErr {
    fn from(e: LeaseError) -> Self {
        match e {
            LeaseError::Expired => RequestExpired::new_err(e.to_string()),
            LeaseError::Deadline(d) => d.into(),
            LeaseError::Poisoned => PyRuntimeError::new_err(e.to_string()),
        }
    }
}

/// Registers `access_sdk` as a built-in module and starts the interpreter.
/// Safe to call any number of times.
pub fn initialize() {
    INTERPRETER_INIT.call_once(|| {
        pyo3::append_to_inittab!(access_sdk);
        pyo3::prepare_freethreaded_python();
    });
}

/// Target of `sys.stdout` while scripts run. Text is buffered until a
/// newline, and each completed line becomes an `info` event with target
/// `script`.
#[pyclass]
#[derive(Default)]
pub struct ScriptStdout {
    pending: Mutex<String>,
}

impl ScriptStdout {
    fn pending(&self) -> MutexGuard<'_, String> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn emit_line(line: &str) {
    let line = line.trim_end_matches(['\n', '\r']);
    if !line.is_empty() {
        info!(target: "script", "{}", line);
    }
}

#[pymethods]
impl ScriptStdout {
    fn write(&self, data: &str) -> usize {
        let mut pending = self.pending();
        pending.push_str(data);
        while let Some(newline) = pending.find('\n') {
            let line: String = pending.drain(..=newline).collect();
            emit_line(&line);
        }
        data.chars().count()
    }

    fn flush(&self) {
        let rest = std::mem::take(&mut *self.pending());
        emit_line(&rest);
    }
}

pub fn install_stdout(py: Python<'_>) -> PyResult<()> {
    py.import("sys")?
        .setattr("stdout", Bound::new(py, ScriptStdout::default())?)
}

/// Logs whatever a script printed without a final newline.
pub fn flush_stdout(py: Python<'_>) -> PyResult<()> {
    py.import("sys")?.getattr("stdout")?.call_method0("flush")?;
    Ok(())
}

/// Binds every accessor, `request_header`, the handle class and the
/// exception classes into `m`, extending its `__all__`.
pub fn export_accessors(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = m.py();
    m.add_class::<RequestHandle>()?;
    m.add("NotARequestHandle", py.get_type::<NotARequestHandle>())?;
    m.add("RequestExpired", py.get_type::<RequestExpired>())?;
    m.add("DeadlineExceeded", py.get_type::<DeadlineExceeded>())?;
    accessors::add_field_accessors(m)?;
    accessors::add_header_accessors(m)?;
    m.add_function(wrap_pyfunction!(lookup::request_header, m)?)?;
    Ok(())
}

#[pymodule]
pub fn access_sdk(m: &Bound<'_, PyModule>) -> PyResult<()> {
    export_accessors(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::deadline::Deadline;
    use crate::model::lease::Lease;
    use http_host::HttpRequest;
    use pyo3::ffi::c_str;
    use pyo3::types::PyList;
    use std::ffi::CString;
    use std::time::{Duration, Instant};
    use tracing_test::traced_test;
    use utilities::request::{FakeRequest, SENTINEL};

    fn load_script<'py>(script: &str, py: Python<'py>) -> PyResult<Bound<'py, PyModule>> {
        install_stdout(py)?;
        let code = std::fs::read_to_string(format!("./python_tests/{}", script))?;
        PyModule::from_code(
            py,
            CString::new(code)?.as_c_str(),
            c_str!("example.py"),
            c_str!("example"),
        )
    }

    /// Calls `func` from `script` with a handle on `request`, outside of any
    /// bridge.
    fn run_script(
        script: &str,
        func: &str,
        request: &HttpRequest,
        deadline: Deadline,
    ) -> PyResult<PyObject> {
        initialize();
        Python::with_gil(|py| {
            let module = load_script(script, py)?;
            Lease::scoped(request, deadline, |lease| -> PyResult<PyObject> {
                let handle = Bound::new(py, RequestHandle::new("t-1".to_string(), lease.clone()))?;
                Ok(module.getattr(func)?.call1((handle,))?.unbind())
            })
        })
    }

    fn run_for_string(script: &str, func: &str, request: &HttpRequest) -> String {
        let result = run_script(script, func, request, Deadline::none()).unwrap();
        Python::with_gil(|py| result.extract::<String>(py)).unwrap()
    }

    #[test]
    fn reads_request_line_fields() {
        let request = FakeRequest::simple_get().parsed();
        let fields = run_for_string("read_fields.py", "describe", &request);
        assert_eq!(
            fields,
            "1001|HTTP/1.1|GET /a/b.html?x=1 HTTP/1.1|GET|GET|/a/b.html|x=1|html|/a/b.html?x=1"
        );
    }

    #[test]
    fn named_lookup_on_a_simple_get() {
        let request = FakeRequest::simple_get().header("X-Custom", "1").parsed();
        let result = run_script("read_fields.py", "host_and_custom", &request, Deadline::none())
            .unwrap();
        let values: Vec<Option<String>> = Python::with_gil(|py| result.extract(py)).unwrap();
        assert_eq!(values, vec![Some("example.com".to_string()), None]);
    }

    #[test]
    fn http_09_has_empty_protocol() {
        let request = FakeRequest::get("/old.txt").http_09().parsed();
        let fields = run_for_string("read_fields.py", "describe", &request);
        assert_eq!(fields, "9||GET /old.txt|GET|GET|/old.txt||txt|/old.txt");
    }

    #[test]
    fn other_methods_are_not_reported_as_get() {
        let request = FakeRequest::new("PATCH", "/doc").parsed();
        assert_eq!(run_for_string("read_fields.py", "method", &request), "OTHER:PATCH");

        let request = FakeRequest::new("BREW", "/pot").parsed();
        assert_eq!(run_for_string("read_fields.py", "method", &request), "OTHER:BREW");

        let request = FakeRequest::new("DELETE", "/doc").parsed();
        assert_eq!(run_for_string("read_fields.py", "method", &request), "DELETE:DELETE");
    }

    #[test]
    fn header_accessors_agree_with_named_lookup() {
        let request = FakeRequest::with_all_known_headers().parsed();
        let compared = run_script("header_parity.py", "compare_all", &request, Deadline::none())
            .unwrap();
        let compared = Python::with_gil(|py| compared.extract::<usize>(py)).unwrap();
        assert_eq!(compared, accessors::HEADER_ACCESSORS.len());
    }

    #[test]
    fn header_values_reach_python() {
        let request = FakeRequest::with_all_known_headers()
            .header("X-Custom", "hidden")
            .parsed();
        let result = run_script("header_parity.py", "sample", &request, Deadline::none()).unwrap();
        Python::with_gil(|py| {
            let sample = result.bind(py).downcast::<PyList>().unwrap();
            let values: Vec<Option<String>> = sample.extract().unwrap();
            assert_eq!(
                values,
                vec![
                    Some("value-of-content-type".to_string()),
                    Some("value-of-content-type".to_string()),
                    Some("value-of-content-type".to_string()),
                    Some("value-of-user-agent".to_string()),
                    None,
                    None,
                ]
            );
        });
    }

    #[test]
    fn unsent_headers_are_none() {
        let request = FakeRequest::simple_get().parsed();
        let result = run_script("header_parity.py", "sample", &request, Deadline::none()).unwrap();
        Python::with_gil(|py| {
            let values: Vec<Option<String>> = result.extract(py).unwrap();
            assert!(values.iter().all(Option::is_none));
        });
    }

    #[test]
    fn basic_auth_is_decoded() {
        let request = FakeRequest::with_all_known_headers().parsed();
        assert_eq!(run_for_string("read_fields.py", "credentials", &request), "user:secret");

        let request = FakeRequest::simple_get().parsed();
        assert_eq!(run_for_string("read_fields.py", "credentials", &request), "None:None");
    }

    #[test]
    fn non_handles_are_rejected() {
        let request = FakeRequest::simple_get().parsed();
        let checked = run_script("type_mismatch.py", "check_all", &request, Deadline::none())
            .unwrap();
        let checked = Python::with_gil(|py| checked.extract::<usize>(py)).unwrap();
        // every accessor plus request_header
        assert_eq!(checked, 11 + accessors::HEADER_ACCESSORS.len() + 1);
    }

    #[test]
    fn rejection_names_the_type() {
        initialize();
        Python::with_gil(|py| {
            let value = 42i64.into_pyobject(py).unwrap().into_any();
            let err = handle::assert_type(&value).err().unwrap();
            assert!(err.is_instance_of::<NotARequestHandle>(py));
            assert!(err.is_instance_of::<PyTypeError>(py));
            assert_eq!(err.value(py).to_string(), "not a request handle: int");
        });
    }

    #[test]
    fn handle_expires_with_its_invocation() {
        initialize();
        let first = FakeRequest::simple_get().parsed();
        let second = FakeRequest::sentinel().parsed();

        Python::with_gil(|py| {
            let module = load_script("keep_handle.py", py).unwrap();
            let keep = module.getattr("handle_request").unwrap();

            let first_result = Lease::scoped(&first, Deadline::none(), |lease| {
                let handle = Bound::new(py, RequestHandle::new("w0-1".into(), lease.clone())).unwrap();
                keep.call1((handle,)).unwrap().extract::<String>().unwrap()
            });
            assert_eq!(first_result, "first:/a/b.html");

            let second_result = Lease::scoped(&second, Deadline::none(), |lease| {
                let handle = Bound::new(py, RequestHandle::new("w0-2".into(), lease.clone())).unwrap();
                keep.call1((handle,)).unwrap().extract::<String>().unwrap()
            });
            assert_eq!(second_result, "expired");
            assert!(!second_result.contains(SENTINEL));

            let kept = module.getattr("kept").unwrap().get_item(0).unwrap();
            let kept = kept.downcast::<RequestHandle>().unwrap();
            assert!(!kept.get().lease().is_live());
            assert_eq!(kept.repr().unwrap().to_string(), "<RequestHandle w0-1 (expired)>");
        });
    }

    #[test]
    fn accessors_observe_the_deadline() {
        let request = FakeRequest::simple_get().parsed();
        let past = Deadline::at(Instant::now() - Duration::from_millis(1));
        let err = run_script("read_fields.py", "describe", &request, past).unwrap_err();
        Python::with_gil(|py| {
            assert!(err.is_instance_of::<DeadlineExceeded>(py));
            assert!(err.is_instance_of::<PyTimeoutError>(py));
        });
    }

    #[test]
    fn exceptions_are_importable() {
        let request = FakeRequest::simple_get().parsed();
        let ok = run_script("type_mismatch.py", "hierarchy", &request, Deadline::none()).unwrap();
        assert!(Python::with_gil(|py| ok.extract::<bool>(py)).unwrap());
    }

    #[traced_test]
    #[test]
    fn print_goes_to_tracing() {
        let request = FakeRequest::simple_get().parsed();
        run_script("prints.py", "handle_request", &request, Deadline::none()).unwrap();
        assert!(logs_contain("printed /a/b.html"));
    }

    #[traced_test]
    #[test]
    fn script_output_is_logged_by_line() {
        let out = ScriptStdout::default();
        out.write("first");
        out.write(" ");
        out.write("part\nsecond");
        assert!(logs_contain("first part"));
        assert!(!logs_contain("second"));
        out.flush();
        assert!(logs_contain("second"));
    }

    #[test]
    fn odd_header_names_are_absent() {
        let request = FakeRequest::with_all_known_headers().parsed();
        let result = run_script("header_parity.py", "odd_names", &request, Deadline::none()).unwrap();
        Python::with_gil(|py| {
            let values: Vec<Option<String>> = result.extract(py).unwrap();
            assert_eq!(values.len(), 4);
            assert!(values.iter().all(Option::is_none));
        });
    }
}
