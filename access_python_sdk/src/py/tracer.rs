use crate::model::deadline::Deadline;
use pyo3::prelude::*;

/// `sys.settrace` hook raising `DeadlineExceeded` from inside a running
/// handler once its deadline passes.
///
/// Installed as the global trace function it returns itself as the local
/// one, so it also sees every line executed in traced frames.
#[pyclass(frozen, module = "access_sdk")]
pub struct DeadlineTracer {
    deadline: Deadline,
}

impl DeadlineTracer {
    pub fn new(deadline: Deadline) -> Self {
        Self { deadline }
    }
}

#[pymethods]
impl DeadlineTracer {
    fn __call__(
        slf: &Bound<'_, Self>,
        _frame: &Bound<'_, PyAny>,
        _event: &Bound<'_, PyAny>,
        _arg: &Bound<'_, PyAny>,
    ) -> PyResult<Py<Self>> {
        slf.get().deadline.check()?;
        Ok(slf.clone().unbind())
    }
}

/// Restores the previous trace function when dropped.
pub(crate) struct TraceGuard<'py> {
    py: Python<'py>,
    previous: Bound<'py, PyAny>,
}

impl<'py> TraceGuard<'py> {
    pub(crate) fn install(py: Python<'py>, deadline: Deadline) -> PyResult<Self> {
        let sys = py.import("sys")?;
        let previous = sys.getattr("gettrace")?.call0()?;
        let tracer = Bound::new(py, DeadlineTracer::new(deadline))?;
        sys.getattr("settrace")?.call1((tracer,))?;
        Ok(Self { py, previous })
    }
}

impl Drop for TraceGuard<'_> {
    fn drop(&mut self) {
        let restored = self
            .py
            .import("sys")
            .and_then(|sys| sys.getattr("settrace"))
            .and_then(|settrace| settrace.call1((&self.previous,)));
        if let Err(e) = restored {
            tracing::warn!(error = %e, "failed to restore trace function");
        }
    }
}
