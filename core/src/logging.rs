//! Logging setup for hosts embedding the dive map core.
//!
//! The library only emits `tracing` events. Hosts that do not install their own
//! subscriber can call [`init_logging`] once at startup.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, uniffi::Enum)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Debug and above.
    Verbose,
    /// Everything, including per-marker trace events.
    Trace,
}

impl Verbosity {
    pub fn to_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Filter directive applied when `RUST_LOG` is unset.
///
/// Below `Trace` the per-marker surface chatter from the reconciler is held
/// one level quieter than the rest of the crate.
pub fn default_directive(verbosity: Verbosity) -> String {
    let level = verbosity.to_level();
    let reconciler = match verbosity {
        Verbosity::Trace => Level::TRACE,
        Verbosity::Verbose => Level::INFO,
        Verbosity::Normal | Verbosity::Quiet => Level::WARN.min(level),
    };
    format!("divelog_map={level},divelog_map::reconciler={reconciler}")
}

/// Install a compact, colourless subscriber writing to stderr.
///
/// Host consoles (Xcode, logcat, browser devtools) show escape codes verbatim,
/// so ANSI output is off. `RUST_LOG` takes precedence over `verbosity`. Only
/// the first call installs a subscriber.
///
/// Hosts reach this through the exported `enable_logging` before building a
/// `MapController`:
///
/// ```no_run
/// use divelog_map::{init_logging, Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// tracing::info!("map core ready");
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .compact()
                .with_ansi(false)
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .try_init();
}

#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
