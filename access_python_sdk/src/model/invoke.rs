use crate::model::deadline::Deadline;
use crate::model::error::{BridgeError, InvokeError};
use crate::model::lease::Lease;
use crate::model::request_id::{RequestId, RequestIdGenerator};
use crate::py;
use crate::py::handle::RequestHandle;
use crate::py::tracer::TraceGuard;
use http_host::HttpRequest;
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyInt, PyString};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Name the script must bind its handler to.
pub const HANDLER_SYMBOL: &str = "handle_request";

pub const DEFAULT_NAMESPACE: &str = "access_handler";

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub script: PathBuf,
    /// Name of the module the script executes in.
    pub namespace: String,
    pub worker_id: u32,
    /// Interrupt long-running handlers through `sys.settrace` when a
    /// deadline is set.
    pub trace_deadline: bool,
}

impl BridgeConfig {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            worker_id: 0,
            trace_deadline: true,
        }
    }
}

/// The handler's return value, passed on uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    None,
    Bool(bool),
    Int(i64),
    Text(String),
    /// Anything else, as its `repr()`.
    Other(String),
}

impl Verdict {
    fn from_py(value: &Bound<'_, PyAny>) -> Self {
        if value.is_none() {
            return Verdict::None;
        }
        // bool before int, bool is a subclass of int
        if let Ok(b) = value.downcast::<PyBool>() {
            return Verdict::Bool(b.is_true());
        }
        if value.is_instance_of::<PyInt>() {
            if let Ok(n) = value.extract::<i64>() {
                return Verdict::Int(n);
            }
        }
        if let Ok(s) = value.downcast::<PyString>() {
            return Verdict::Text(s.to_string_lossy().into_owned());
        }
        let repr = value
            .repr()
            .map(|r| r.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unrepresentable>".to_string());
        Verdict::Other(repr)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::None => f.write_str("None"),
            Verdict::Bool(b) => write!(f, "{b}"),
            Verdict::Int(n) => write!(f, "{n}"),
            Verdict::Text(s) => write!(f, "{s:?}"),
            Verdict::Other(repr) => f.write_str(repr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub id: RequestId,
    pub elapsed: Duration,
    pub verdict: Verdict,
}

/// A loaded handler script, ready to run once per request.
pub struct Bridge {
    config: BridgeConfig,
    namespace: Py<PyModule>,
    handler: PyObject,
    ids: RequestIdGenerator,
}

fn format_py_err(py: Python<'_>, err: &PyErr) -> (String, Option<String>) {
    let traceback = err.traceback(py).and_then(|tb| tb.format().ok());
    (err.to_string(), traceback)
}

fn exec_script(py: Python<'_>, namespace: &Bound<'_, PyModule>, code: &str, filename: &str) -> PyResult<()> {
    let builtins = py.import("builtins")?;
    let compiled = builtins
        .getattr("compile")?
        .call1((code, filename, "exec"))?;
    builtins
        .getattr("exec")?
        .call1((compiled, namespace.dict()))?;
    Ok(())
}

impl Bridge {
    /// Reads and executes the script, then resolves its handler.
    pub fn load(config: BridgeConfig) -> Result<Self, BridgeError> {
        py::initialize();

        let code = std::fs::read_to_string(&config.script).map_err(|source| {
            BridgeError::ScriptRead {
                path: config.script.clone(),
                source,
            }
        })?;
        let filename = config.script.to_string_lossy().into_owned();

        Python::with_gil(|py| {
            let namespace_err = |e: PyErr| BridgeError::Namespace {
                name: config.namespace.clone(),
                message: e.to_string(),
            };

            py::install_stdout(py).map_err(|e| BridgeError::Interpreter(e.to_string()))?;

            let namespace = PyModule::new(py, &config.namespace).map_err(namespace_err)?;
            namespace
                .setattr("__file__", filename.as_str())
                .map_err(namespace_err)?;
            py::export_accessors(&namespace).map_err(namespace_err)?;
            py.import("sys")
                .and_then(|sys| sys.getattr("modules"))
                .and_then(|modules| modules.set_item(config.namespace.as_str(), &namespace))
                .map_err(namespace_err)?;

            exec_script(py, &namespace, &code, &filename).map_err(|e| {
                let (message, traceback) = format_py_err(py, &e);
                BridgeError::ScriptLoad {
                    path: config.script.clone(),
                    message: match traceback {
                        Some(tb) => format!("{message}\n{tb}"),
                        None => message,
                    },
                }
            })?;

            let handler = namespace
                .getattr(HANDLER_SYMBOL)
                .map_err(|_| BridgeError::MissingHandler {
                    symbol: HANDLER_SYMBOL,
                    path: config.script.clone(),
                })?;
            if !handler.is_callable() {
                return Err(BridgeError::HandlerNotCallable {
                    symbol: HANDLER_SYMBOL,
                    path: config.script.clone(),
                });
            }

            info!(
                script = %config.script.display(),
                namespace = config.namespace,
                worker = config.worker_id,
                "Loaded access handler"
            );

            Ok(Bridge {
                ids: RequestIdGenerator::new(config.worker_id),
                namespace: namespace.unbind(),
                handler: handler.unbind(),
                config,
            })
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Module the script was executed in.
    pub fn namespace(&self) -> &Py<PyModule> {
        &self.namespace
    }

    /// Runs the handler for `request`.
    ///
    /// The handle given to the script is only usable until this returns.
    /// A request is handled at most once; later calls return
    /// [`InvokeError::AlreadyInvoked`] without entering Python.
    pub fn run(&self, request: &HttpRequest, deadline: Deadline) -> Result<Invocation, InvokeError> {
        let id = self.ids.next_id();
        if let Err(earlier) = request.ctx.claim(id.to_string()) {
            return Err(InvokeError::AlreadyInvoked {
                earlier: earlier.to_string(),
            });
        }

        let started = Instant::now();
        debug!(request = %id, line = %request, "Invoking access handler");

        let result = Python::with_gil(|py| {
            Lease::scoped(request, deadline.clone(), |lease| {
                self.invoke(py, id, lease, &deadline)
            })
        });

        let verdict = result?;
        Ok(Invocation {
            id,
            elapsed: started.elapsed(),
            verdict,
        })
    }

    fn invoke(
        &self,
        py: Python<'_>,
        id: RequestId,
        lease: &Lease,
        deadline: &Deadline,
    ) -> Result<Verdict, InvokeError> {
        let interpreter_err = |e: PyErr| InvokeError::Interpreter {
            id,
            message: e.to_string(),
        };

        if deadline.check().is_err() {
            return Err(InvokeError::DeadlineExceeded { id });
        }

        let handle = Bound::new(py, RequestHandle::new(id.to_string(), lease.clone()))
            .map_err(interpreter_err)?;

        let result = {
            let _trace = if self.config.trace_deadline && deadline.is_bounded() {
                Some(TraceGuard::install(py, deadline.clone()).map_err(interpreter_err)?)
            } else {
                None
            };
            self.handler.bind(py).call1((handle,))
        };
        lease.revoke();
        if let Err(e) = py::flush_stdout(py) {
            debug!(request = %id, error = %e, "Failed to flush script output");
        }

        match result {
            Err(e) if e.is_instance_of::<py::DeadlineExceeded>(py) => {
                Err(InvokeError::DeadlineExceeded { id })
            }
            Err(e) => {
                let (message, traceback) = format_py_err(py, &e);
                Err(InvokeError::Handler {
                    id,
                    message,
                    traceback,
                })
            }
            // a handler that swallowed the deadline still ran past it
            Ok(_) if deadline.check().is_err() => Err(InvokeError::DeadlineExceeded { id }),
            Ok(value) => Ok(Verdict::from_py(&value)),
        }
    }
}
