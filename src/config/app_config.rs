use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::probe_config::FileConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML in config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Load the prober configuration.
/// The file is taken from `path` when given, otherwise from the `CONFIG_FILE`
/// environment variable. Without either the built-in defaults apply.
pub fn load_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let location = match path {
        Some(path) => path.to_path_buf(),
        None => match env::var_os("CONFIG_FILE") {
            Some(value) if !value.is_empty() => PathBuf::from(value),
            _ => {
                log::debug!("no config file given, using defaults");
                return Ok(FileConfig::default());
            }
        },
    };

    let config_str = std::fs::read_to_string(&location).map_err(|source| ConfigError::Read {
        path: location.clone(),
        source,
    })?;
    let config = parse_config(&config_str).map_err(|source| ConfigError::Yaml {
        path: location.clone(),
        source,
    })?;

    log::info!("Using config file: {}", location.display());
    Ok(config)
}

/// An empty document yields the defaults.
fn parse_config(config_str: &str) -> Result<FileConfig, serde_yaml::Error> {
    if config_str.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(config_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_from_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "probe:\n  retries: 3\ntargets: [\"10.0.0.1:30303\"]\n")
            .expect("write");

        let config = load_config(Some(&path)).expect("config");
        assert_eq!(config.probe.retries, 3);
        assert_eq!(config.targets, vec!["10.0.0.1:30303"]);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "\n").expect("write");

        assert_eq!(load_config(Some(&path)).expect("config"), FileConfig::default());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/config.yml"))).expect_err("missing");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "probe: [unclosed\n").expect("write");

        let err = load_config(Some(&path)).expect_err("invalid");
        assert!(matches!(err, ConfigError::Yaml { .. }));
        assert!(err.to_string().starts_with("invalid YAML in config file"));
    }
}
