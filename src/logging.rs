use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter (falls back to RUST_LOG)
pub const LOG_ENV: &str = "VIDGRAB_LOG";

/// Filter used when nothing is configured; each `-v` raises the level
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "vidgrab=warn",
        1 => "vidgrab=info",
        _ => "vidgrab=debug",
    }
}

/// Initialize logging to stderr.
///
/// `-v` flags win over `VIDGRAB_LOG` / `RUST_LOG`; an unparsable filter
/// falls back to the default.
pub fn init_logging(verbosity: u8) {
    let from_env = if verbosity == 0 {
        std::env::var(LOG_ENV)
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok()
            .and_then(|filter| EnvFilter::try_new(filter).ok())
    } else {
        None
    };
    let filter = from_env.unwrap_or_else(|| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    tracing::debug!("Logging initialized");
}
