//! Tracing subscriber setup for the `yams` binary.

use tracing_subscriber::EnvFilter;

/// Overrides the verbosity flags when set, e.g. `YAMS_LOG=yams_core=trace`.
pub const LOG_ENV: &str = "YAMS_LOG";

fn filter(verbose: u8, quiet: bool) -> EnvFilter {
    if let Ok(env) = std::env::var(LOG_ENV) {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    }
}

/// Log to stderr so command output on stdout stays clean.
pub fn init_tracing(verbose: u8, quiet: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(verbose, quiet))
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
