//! Tracing subscriber setup.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{GemError, Result};

/// Filter directive for a configured level raised by `-v` flags.
///
/// `-v` raises the global default to at least `debug`, `-vv` to at least
/// `trace`. Per-target directives such as `tokio=warn` are kept as given,
/// and a global level already more verbose is never lowered.
pub fn directive(level: &str, verbosity: u8) -> String {
    let floor = match verbosity {
        0 => return level.to_string(),
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let mut global = None;
    let mut targets = Vec::new();
    for part in level.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match part.parse::<LevelFilter>() {
            Ok(filter) => global = Some(filter),
            Err(_) => targets.push(part),
        }
    }

    // More verbose levels compare greater
    let global = global.map_or(floor, |configured| configured.max(floor));
    std::iter::once(global.to_string().to_lowercase())
        .chain(targets.into_iter().map(str::to_string))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global fmt subscriber. `RUST_LOG` takes precedence over
/// `level` and `verbosity`.
pub fn init(level: &str, verbosity: u8) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(directive(level, verbosity)).map_err(|e| {
            let reason = format!("Invalid log level '{}'", level);
            GemError::config_error_with_source(reason, Box::new(e))
        })?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .map_err(|e| GemError::config_error_with_source("Logging already initialised", Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(directive("warn", 0), "warn");
        assert_eq!(directive("gemnet=info", 0), "gemnet=info");
        assert_eq!(directive("warn", 1), "debug");
        assert_eq!(directive("warn", 2), "trace");
        assert_eq!(directive("warn", 9), "trace");
    }

    #[test]
    fn verbosity_never_lowers_configured_level() {
        assert_eq!(directive("trace", 1), "trace");
        assert_eq!(directive("TRACE", 1), "trace");
        assert_eq!(directive("debug", 1), "debug");
    }

    #[test]
    fn verbosity_keeps_target_directives() {
        assert_eq!(directive("gemnet=info,tokio=warn", 1), "debug,gemnet=info,tokio=warn");
        assert_eq!(directive("info, tokio=warn", 2), "trace,tokio=warn");
        assert_eq!(directive("trace,tokio=warn", 1), "trace,tokio=warn");

        let raised = directive("gemnet=info,tokio=warn", 1);
        assert!(EnvFilter::try_new(&raised).is_ok());
    }
}
