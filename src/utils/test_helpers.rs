use std::sync::Once;

static LOGGING_INIT: Once = Once::new();

/// Routes `tracing` output of the finder through the test harness writer.
///
/// Safe to call from every test; only the first call installs the subscriber.
/// `RUST_LOG` overrides the default `file_finder=debug` filter.
pub fn setup_test_logging() {
    LOGGING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("file_finder=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Returns true when the current process runs as root (UID 0), which can
/// read directories regardless of their permission bits.
#[cfg(test)]
pub fn running_as_root() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}
