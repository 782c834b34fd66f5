//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the config has been resolved.  A bare
//! level applies to this crate only; dependencies (reqwest, rusqlite, …) log
//! at the separate `dependency_log_level`.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

const CRATE_TARGET: &str = "docgraph";

/// Filter directives for `level`.
///
/// A bare level such as `"debug"` becomes `"{dependency_level},docgraph=debug"`.
/// Anything that already looks like a directive list is used verbatim.
pub fn filter_directives(level: &str, dependency_level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    format!("{dependency_level},{CRATE_TARGET}={level}")
}

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` takes precedence when set; otherwise the directives built by
/// [`filter_directives`] are used.
pub fn init(level: &str, dependency_level: &str) -> Result<(), AppError> {
    let directives = filter_directives(level, dependency_level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directives))
        .map_err(|e| AppError::Logger(format!("invalid log filter '{directives}': {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(())
}

/// Parse a log level string into a [`LevelFilter`], returning an error on
/// unrecognised values.
pub fn parse_level(level: &str) -> Result<LevelFilter, AppError> {
    if level.is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Logger(format!("unrecognised log level: '{level}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_levels_parse() {
        for l in &["error", "warn", "info", "debug", "trace"] {
            assert!(parse_level(l).is_ok(), "expected '{l}' to be valid");
        }
    }

    #[test]
    fn invalid_level_errors() {
        assert!(parse_level("verbose").is_err());
        assert!(parse_level("").is_err());
    }

    #[test]
    fn bare_level_scopes_to_crate() {
        assert_eq!(filter_directives("debug", "warn"), "warn,docgraph=debug");
        assert_eq!(filter_directives("trace", "info"), "info,docgraph=trace");
    }

    #[test]
    fn directive_lists_pass_through() {
        assert_eq!(filter_directives("docgraph::wiki=trace", "warn"), "docgraph::wiki=trace");
        assert_eq!(filter_directives("info,hyper=off", "warn"), "info,hyper=off");
    }

    #[test]
    fn init_succeeds_or_already_init() {
        // Another test in the same process may have installed a subscriber first.
        match init("info", "warn") {
            Ok(()) => {}
            Err(AppError::Logger(msg)) if msg.contains("set subscriber") => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
