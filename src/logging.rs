use std::env;
use tracing::level_filters::LevelFilter;

/// Environment variable consulted when `--log-level` is absent.
pub const LOG_LEVEL_ENV: &str = "PRIME_REPL_LOG_LEVEL";

pub const DEFAULT_LEVEL: LevelFilter = LevelFilter::WARN;

/// The CLI value if given, else the environment, else [`DEFAULT_LEVEL`].
/// An unparsable environment value is ignored.
#[must_use]
pub fn resolve_level(cli: Option<LevelFilter>) -> LevelFilter {
    cli.or_else(|| {
        env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|value| value.parse::<LevelFilter>().ok())
    })
    .unwrap_or(DEFAULT_LEVEL)
}

/// Installs the stderr subscriber once. `RUST_LOG` directives win over
/// `level` when present.
pub fn init_logging(level: LevelFilter) {
    use std::io::IsTerminal;
    use std::sync::OnceLock;
    use tracing_subscriber::{fmt, EnvFilter};

    static INITIALISED: OnceLock<()> = OnceLock::new();

    let _ = INITIALISED.get_or_init(|| {
        let use_ansi = env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));
        let subscriber = fmt::fmt()
            .with_env_filter(filter)
            .with_ansi(use_ansi)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .compact()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_from_names() {
        assert_eq!("WARN".parse::<LevelFilter>().ok(), Some(LevelFilter::WARN));
        assert_eq!("off".parse::<LevelFilter>().ok(), Some(LevelFilter::OFF));
        assert!("loud".parse::<LevelFilter>().is_err());
        assert_eq!(LevelFilter::DEBUG.to_string(), "debug");
    }

    #[test]
    fn cli_level_wins() {
        assert_eq!(resolve_level(Some(LevelFilter::TRACE)), LevelFilter::TRACE);
    }
}
