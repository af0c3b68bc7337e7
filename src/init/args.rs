use crate::init::parse;
use clap::Args;

#[derive(Debug, Args, Clone)]
pub struct AccessArgs {
    /// Python script defining `handle_request(r)`
    #[arg(long, env = "SCRIPTED_ACCESS_SCRIPT")]
    pub script: String,

    /// Worker id, used to label invocations
    #[arg(long, env = "SCRIPTED_ACCESS_WORKER_ID", default_value = "0")]
    pub worker_id: u32,

    /// Per-request handler deadline in milliseconds, 0 disables it
    #[arg(long, env = "SCRIPTED_ACCESS_TIMEOUT_MS", default_value = "0")]
    pub timeout_ms: u64,

    /// Interrupt handlers running past their deadline via sys.settrace
    #[arg(
        long,
        env = "SCRIPTED_ACCESS_TRACE_DEADLINE",
        default_value = "true",
        action = clap::ArgAction::Set,
        value_parser = parse::parse_bool_value
    )]
    pub trace_deadline: bool,

    /// Module name the script is executed in
    #[arg(
        long,
        env = "SCRIPTED_ACCESS_NAMESPACE",
        default_value = access_sdk::model::invoke::DEFAULT_NAMESPACE,
        value_parser = parse::parse_namespace
    )]
    pub namespace: String,
}

#[derive(Debug, Args, Clone)]
pub struct CheckRun {
    #[command(flatten)]
    pub access: AccessArgs,

    /// Files holding raw HTTP requests, `-` reads stdin
    #[arg(required = true)]
    pub requests: Vec<String>,
}
