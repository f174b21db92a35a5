//! Observability and diagnostics for the pattern engine.
//!
//! Tree building is adaptive, so its decisions need to be visible. This module
//! provides the `log_metric!` macro for structured key-value lines and a
//! one-shot `env_logger` initializer for binaries and tests.
//!
//! `log_metric!` is compiled out of release builds via `#[cfg(debug_assertions)]`.

use log::LevelFilter;
use std::fs::OpenOptions;
use std::sync::Once;

/// Logs a structured key-value metric line at debug level, only in debug builds.
///
/// # Example
/// ```
/// use colshape::log_metric;
/// let coverage = 0.97;
/// log_metric!("event"="select_pattern", "p_id"="DictPattern", "coverage"=&coverage);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+

            $crate::__log::debug!("COLSHAPE_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Installs a global `env_logger` once per process. Later calls are no-ops.
///
/// When `log_file` is given, records are appended to that file instead of stderr.
/// A file that cannot be opened falls back to stderr with a warning.
pub fn init_logging(level: LevelFilter, log_file: Option<&str>) {
    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(level);

        // Just the level and the message.
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        let mut open_failure = None;
        if let Some(filename) = log_file {
            match OpenOptions::new().append(true).create(true).open(filename) {
                Ok(file) => {
                    builder.target(env_logger::Target::Pipe(Box::new(file)));
                }
                Err(e) => open_failure = Some(format!("{}: {}", filename, e)),
            }
        }

        let _ = builder.try_init();
        if let Some(msg) = open_failure {
            log::warn!("could not open log file {}, logging to stderr", msg);
        }
    });
}
