use clap::Args;
use tracing_subscriber::EnvFilter;

const CRATE_TARGET: &str = "app_switcher";

/// Logging controls shared by every entry point.
#[derive(Debug, Clone, Default, Args)]
pub struct LogArgs {
    /// Log at trace level (this crate only)
    #[arg(long, conflicts_with_all = ["debug", "log_level", "log_filter"])]
    pub trace: bool,

    /// Log at debug level (this crate only)
    #[arg(long, conflicts_with_all = ["trace", "log_level", "log_filter"])]
    pub debug: bool,

    /// Single level for this crate (error|warn|info|debug|trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Explicit tracing filter directive, overrides the other flags
    #[arg(long)]
    pub log_filter: Option<String>,
}

fn level_spec_for(level: &str) -> String {
    format!("{}={}", CRATE_TARGET, level.to_ascii_lowercase())
}

/// Resolve the filter directive. Precedence: explicit filter, level flags,
/// `RUST_LOG`, then crate-scoped `info`.
pub fn compute_spec(args: &LogArgs, rust_log: Option<&str>) -> String {
    if let Some(spec) = args.log_filter.as_deref() {
        return spec.to_string();
    }
    if args.trace {
        return level_spec_for("trace");
    }
    if args.debug {
        return level_spec_for("debug");
    }
    if let Some(level) = args.log_level.as_deref() {
        return level_spec_for(level);
    }
    match rust_log {
        Some(spec) if !spec.trim().is_empty() => spec.to_string(),
        _ => level_spec_for("info"),
    }
}

pub fn init(args: &LogArgs) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let spec = compute_spec(args, rust_log.as_deref());
    let filter = EnvFilter::try_new(&spec).unwrap_or_else(|_| EnvFilter::new(level_spec_for("info")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(trace: bool, debug: bool, level: Option<&str>, filter: Option<&str>) -> LogArgs {
        LogArgs {
            trace,
            debug,
            log_level: level.map(str::to_string),
            log_filter: filter.map(str::to_string),
        }
    }

    #[test]
    fn filter_precedence() {
        let cases = [
            (args(false, false, None, Some("x=warn")), Some("y=info"), "x=warn"),
            (args(true, false, None, None), Some("y=info"), "app_switcher=trace"),
            (args(false, true, None, None), None, "app_switcher=debug"),
            (args(false, false, Some("WARN"), None), Some("y=info"), "app_switcher=warn"),
            (args(false, false, None, None), Some("y=info"), "y=info"),
            (args(false, false, None, None), Some("  "), "app_switcher=info"),
            (args(false, false, None, None), None, "app_switcher=info"),
        ];
        for (input, rust_log, expected) in cases {
            assert_eq!(
                compute_spec(&input, rust_log),
                expected,
                "args: {input:?} rust_log: {rust_log:?}"
            );
        }
    }
}
