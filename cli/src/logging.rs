//! Tracing / logging initialisation.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging options taken from the command line.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default level: "trace" | "debug" | "info" | "warn" | "error"
    pub level: String,
    /// Emit JSON structured logs (true) or human-readable text (false)
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Directive string applied when `RUST_LOG` is unset.
    pub fn directives(&self) -> String {
        format!("{level},dapprpc_core={level},dapprpc_ws={level},dapprpc_http={level}", level = self.level)
    }
}

/// Initialise tracing. `RUST_LOG` wins over the configured level.
/// Should be called once at startup.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directives()))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_cover_workspace_crates() {
        let cfg = LogConfig {
            level: "debug".into(),
            json: false,
        };
        let d = cfg.directives();
        assert!(d.starts_with("debug,"));
        assert!(d.contains("dapprpc_ws=debug"));
        assert!(EnvFilter::try_new(d).is_ok());
    }

    #[test]
    fn default_level_passes_cli_warnings_only() {
        let filter = EnvFilter::new(LogConfig::default().directives());
        let subscriber = tracing_subscriber::registry().with(filter);
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(tracing::Level::WARN));
            assert!(!tracing::enabled!(tracing::Level::INFO));
        });
    }

    #[test]
    fn info_level_passes_cli_progress() {
        let cfg = LogConfig {
            level: "info".into(),
            json: true,
        };
        let subscriber = tracing_subscriber::registry().with(EnvFilter::new(cfg.directives()));
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(tracing::Level::INFO));
            assert!(!tracing::enabled!(tracing::Level::DEBUG));
        });
    }
}
