use crate::{
    references::{EngineFetcher, StdlibFetcher},
    runtime::{
        invoker::DEFAULT_SLICE, state::INITIAL_CAPACITY, vm::DEFAULT_MAX_CALL_DEPTH,
        InvokeOptions,
    },
    session::{SessionOptions, DEFAULT_IMPLICIT_IMPORTS},
};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// Engine settings, usually read from `prime-repl.toml`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub references: ReferencesConfig,
    pub session: SessionConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReferencesConfig {
    /// Directory non-`std/` locations are read from. Relative paths are
    /// taken from the config file's directory.
    pub base: Option<PathBuf>,
    /// Library images to load, in order.
    pub locations: Vec<String>,
}

impl Default for ReferencesConfig {
    fn default() -> Self {
        Self {
            base: None,
            locations: StdlibFetcher::locations(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub imports: Vec<String>,
    pub initial_state_capacity: usize,
    pub max_call_depth: usize,
    pub timeout_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            imports: DEFAULT_IMPLICIT_IMPORTS.iter().map(|s| s.to_string()).collect(),
            initial_state_capacity: INITIAL_CAPACITY,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid setting `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&content).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        if let Some(base) = config.references.base.take() {
            let root = path.parent().unwrap_or_else(|| Path::new("."));
            config.references.base = Some(root.join(base));
        }
        tracing::debug!(target: "session", path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.max_call_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "session.max_call_depth",
                message: "must be at least 1".into(),
            });
        }
        if let Some(duplicate) = first_duplicate(&self.references.locations) {
            return Err(ConfigError::Invalid {
                key: "references.locations",
                message: format!("`{duplicate}` is listed twice"),
            });
        }
        if let Some(duplicate) = first_duplicate(&self.session.imports) {
            return Err(ConfigError::Invalid {
                key: "session.imports",
                message: format!("`{duplicate}` is listed twice"),
            });
        }
        Ok(())
    }

    pub fn fetcher(&self) -> EngineFetcher {
        EngineFetcher::new(self.references.base.clone())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            implicit_imports: self.session.imports.clone(),
            initial_state_capacity: self.session.initial_state_capacity,
            invoke: InvokeOptions {
                timeout: self.session.timeout_ms.map(Duration::from_millis),
                slice: DEFAULT_SLICE,
                max_call_depth: self.session.max_call_depth,
            },
        }
    }
}

fn first_duplicate(items: &[String]) -> Option<&str> {
    items
        .iter()
        .enumerate()
        .find(|(idx, item)| items[..*idx].contains(item))
        .map(|(_, item)| item.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_bundled_library() {
        let config = EngineConfig::parse("").expect("empty config");
        assert_eq!(
            config.references.locations,
            vec!["std/math.plib", "std/text.plib", "std/list.plib"]
        );
        assert_eq!(config.session.imports, vec!["math", "text", "list"]);
        assert_eq!(config.session.initial_state_capacity, 2);
    }

    #[test]
    fn reads_session_settings() {
        let config = EngineConfig::parse(
            r#"
            [session]
            imports = ["math"]
            timeout_ms = 250
            "#,
        )
        .expect("parses");
        let options = config.session_options();
        assert_eq!(options.implicit_imports, vec!["math"]);
        assert_eq!(options.invoke.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn rejects_unknown_keys_and_duplicates() {
        assert!(matches!(
            EngineConfig::parse("[session]\nimport = []"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            EngineConfig::parse("[session]\nimports = [\"math\", \"math\"]"),
            Err(ConfigError::Invalid { key: "session.imports", .. })
        ));
    }

    #[test]
    fn relative_base_follows_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prime-repl.toml");
        let mut file = fs::File::create(&path).expect("create");
        writeln!(file, "[references]\nbase = \"libs\"").expect("write");
        let config = EngineConfig::load(&path).expect("loads");
        assert_eq!(config.references.base, Some(dir.path().join("libs")));
    }
}
