use crate::init::args::AccessArgs;
use access_sdk::{BridgeConfig, Deadline};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tower::BoxError;

#[derive(Debug, Clone)]
pub struct AccessConfig {
    pub bridge: BridgeConfig,
    /// `None` lets handlers run unbounded.
    pub timeout: Option<Duration>,
}

impl AccessConfig {
    pub fn from_args(args: &AccessArgs) -> Result<Self, BoxError> {
        let script = resolve_script_path(&args.script, &env::current_dir()?);

        let bridge = BridgeConfig {
            script,
            namespace: args.namespace.clone(),
            worker_id: args.worker_id,
            trace_deadline: args.trace_deadline,
        };

        let timeout = match args.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Ok(Self { bridge, timeout })
    }

    /// Deadline for one request, starting now.
    pub fn deadline(&self) -> Deadline {
        match self.timeout {
            Some(timeout) => Deadline::after(timeout),
            None => Deadline::none(),
        }
    }
}

// Use absolute path if provided, otherwise make relative to `base`
fn resolve_script_path(script: &str, base: &Path) -> PathBuf {
    let path = Path::new(script);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
