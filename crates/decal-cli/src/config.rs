//! Locating and reading the CLI's TOML configuration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use thiserror::Error;

use decal::{DecalError, config::AppConfig};

/// Errors raised while locating or reading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML configuration in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Missing configuration file: {0}")]
    MissingFile(PathBuf),
}

impl From<ConfigError> for DecalError {
    fn from(err: ConfigError) -> Self {
        DecalError::config(err)
    }
}

/// Where a configuration file was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigSource {
    Explicit,
    Local,
    System,
}

const LOCAL_CONFIG: &str = "decal/config.toml";

/// Paths probed when no explicit configuration is given, in priority order.
fn implicit_candidates() -> Vec<(ConfigSource, PathBuf)> {
    let mut candidates = vec![(ConfigSource::Local, PathBuf::from(LOCAL_CONFIG))];
    match ProjectDirs::from("com", "decal", "decal") {
        Some(dirs) => candidates.push((
            ConfigSource::System,
            dirs.config_dir().join("config.toml"),
        )),
        None => debug!("No platform configuration directory"),
    }
    candidates
}

/// Loads the CLI configuration.
///
/// An explicit path must exist. Otherwise `decal/config.toml` in the working
/// directory is tried, then `config.toml` in the platform configuration
/// directory. With no file at all the defaults apply.
///
/// # Errors
///
/// Returns [`DecalError::Config`] if the explicit file is missing or a found
/// file is not valid configuration, and [`DecalError::Io`] if it cannot be
/// read.
pub fn load_config(explicit_path: Option<impl AsRef<Path>>) -> Result<AppConfig, DecalError> {
    if let Some(path) = explicit_path {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::MissingFile(path.to_path_buf()).into());
        }
        return read_config(ConfigSource::Explicit, path);
    }

    let found = implicit_candidates()
        .into_iter()
        .find(|(_, path)| path.is_file());
    match found {
        Some((source, path)) => read_config(source, &path),
        None => {
            debug!("No configuration file found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

fn read_config(source: ConfigSource, path: &Path) -> Result<AppConfig, DecalError> {
    info!(source:? = source, path:? = path; "Loading configuration");
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|err| {
        ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.message().to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = load_config(Some("/definitely/not/here/config.toml")).unwrap_err();
        assert!(matches!(err, DecalError::Config(_)));
        assert!(err.to_string().contains("Missing configuration file"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [customization]
            max_images = 2

            [resolver]
            fetch_timeout_ms = 500
            "#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.customization().max_images(), 2);
        assert_eq!(config.customization().max_text_length(), 100);
        assert_eq!(config.resolver().fetch_timeout(), Duration::from_millis(500));
        assert_eq!(config.resolver().proxy_path(), "/api/image-proxy");
        assert!((config.export().jpeg_quality() - 0.92).abs() < f32::EPSILON);
    }

    #[test]
    fn test_local_candidate_comes_first() {
        let candidates = implicit_candidates();
        assert_eq!(candidates[0], (ConfigSource::Local, PathBuf::from(LOCAL_CONFIG)));
        assert!(candidates.iter().skip(1).all(|(source, _)| *source == ConfigSource::System));
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[customization\nmax_images = ").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Failed to parse TOML configuration"));
        assert!(message.contains("config.toml"));
    }
}
