//! XDG-compliant path resolution for doc-oracle.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

const APP_DIR: &str = "doc-oracle";

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(oracle::paths::no_home),
        help("Set the HOME environment variable or pass `--config <path>` explicitly.")
    )]
    NoHome,
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Directories doc-oracle reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OraclePaths {
    /// `$XDG_CONFIG_HOME/doc-oracle/`
    pub config_dir: PathBuf,
}

impl OraclePaths {
    /// Resolve directories from the process environment.
    pub fn resolve() -> PathResult<Self> {
        Self::resolve_with(|var| std::env::var(var).ok())
    }

    /// Resolve directories reading variables through `lookup`.
    pub fn resolve_with(lookup: impl Fn(&str) -> Option<String>) -> PathResult<Self> {
        let config_base = match lookup("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => lookup("HOME")
                .filter(|v| !v.is_empty())
                .map(|home| PathBuf::from(home).join(".config"))
                .ok_or(PathError::NoHome)?,
        };

        Ok(Self {
            config_dir: config_base.join(APP_DIR),
        })
    }

    /// Path to the config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }
}
