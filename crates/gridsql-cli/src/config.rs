//! Configuration file loading

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Null sentinel shown in the grid
    pub null: Option<String>,
    pub spool_crlf: bool,
    /// Ask before rolling back a transaction left open on exit
    pub auto_commit_prompt: bool,
    pub log: LogConfig,
    /// Named connections usable in place of `<engine> <dsn>`
    pub connections: BTreeMap<String, ConnectionAlias>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when no environment variable is set
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ConnectionAlias {
    pub engine: String,
    pub dsn: String,
}

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .context("Could not determine config directory")
        .map(|p| p.join("gridsql"))
}

pub fn default_config_file() -> Result<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}

impl Config {
    /// Load `path`, or the default file when it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_file() {
                Ok(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::parse(&text).with_context(|| format!("Invalid config file: {:?}", path))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Replace a lone connection alias by its engine and DSN
    pub fn resolve_args(&self, args: &[String]) -> Vec<String> {
        if let [name] = args
            && let Some(alias) = self.connections.get(name)
        {
            tracing::debug!(alias = %name, engine = %alias.engine, "using connection alias");
            return vec![alias.engine.clone(), alias.dsn.clone()];
        }
        args.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full() {
        let config = Config::parse(indoc! {r#"
            null = "(null)"
            spool_crlf = true
            auto_commit_prompt = true

            [log]
            filter = "gridsql_edit=debug"

            [connections.local]
            engine = "sqlite3"
            dsn = "~/data/app.db"
        "#})
        .unwrap();
        assert_eq!(config.null.as_deref(), Some("(null)"));
        assert!(config.spool_crlf);
        assert!(config.auto_commit_prompt);
        assert_eq!(config.log.filter.as_deref(), Some("gridsql_edit=debug"));
        assert_eq!(
            config.connections["local"],
            ConnectionAlias {
                engine: "sqlite3".into(),
                dsn: "~/data/app.db".into(),
            }
        );
    }

    #[test]
    fn test_missing_sections_default() {
        let config = Config::parse("spool_crlf = true").unwrap();
        assert_eq!(
            config,
            Config {
                spool_crlf: true,
                ..Config::default()
            }
        );
    }

    #[test]
    fn test_resolve_args() {
        let mut config = Config::default();
        config.connections.insert(
            "mem".into(),
            ConnectionAlias {
                engine: "sqlite3".into(),
                dsn: ":memory:".into(),
            },
        );
        assert_eq!(config.resolve_args(&["mem".into()]), vec!["sqlite3", ":memory:"]);
        assert_eq!(config.resolve_args(&["sqlite3:x.db".into()]), vec!["sqlite3:x.db"]);
        assert_eq!(
            config.resolve_args(&["mem".into(), "x".into()]),
            vec!["mem", "x"]
        );
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "null = \"~\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.null.as_deref(), Some("~"));

        let missing = dir.path().join("missing.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "spool_crlf = \"yes\"\n").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().starts_with("Invalid config file"));
    }
}
