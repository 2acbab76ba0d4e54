//! Deployment configuration.
//!
//! Values come from an optional TOML file, then from overrides (CLI flags,
//! which clap also fills from `LOSTLENS_*` environment variables). The
//! coordinate convention has no default: it must be stated somewhere.
//!
//! ```toml
//! api_base_url = "http://127.0.0.1:5000"
//! convention = "pixel"
//! timeout_secs = 30
//!
//! [endpoints]
//! detect = "/api/upload-image"
//! save = "/api/lost_items"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::client::DEFAULT_TIMEOUT;
use crate::error::LostlensError;
use crate::geometry::CoordinateConvention;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_DETECT_PATH: &str = "/api/upload-image";
const DEFAULT_SAVE_PATH: &str = "/api/lost_items";
/// Upper bound on `timeout_secs`; one hour.
const MAX_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_base_url: Option<String>,
    convention: Option<CoordinateConvention>,
    timeout_secs: Option<u64>,
    endpoints: Option<EndpointsFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct EndpointsFile {
    detect: Option<String>,
    save: Option<String>,
}

/// Values that take precedence over the file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub api_base_url: Option<String>,
    pub convention: Option<CoordinateConvention>,
    pub timeout_secs: Option<u64>,
}

/// Resolved client settings.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    pub api_base_url: Url,
    pub detect_url: Url,
    pub save_url: Url,
    pub convention: CoordinateConvention,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Reads `path` (if any) and applies `overrides` on top.
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, LostlensError> {
        let file = match path {
            Some(path) => read_config_file(path)?,
            None => ConfigFile::default(),
        };
        Self::resolve(file, overrides)
    }

    /// Parses TOML text directly, for embedding and tests.
    pub fn from_toml_str(text: &str, overrides: ConfigOverrides) -> Result<Self, LostlensError> {
        let file: ConfigFile = toml::from_str(text).map_err(|source| LostlensError::ConfigParse {
            path: "<inline>".into(),
            source,
        })?;
        Self::resolve(file, overrides)
    }

    fn resolve(file: ConfigFile, overrides: ConfigOverrides) -> Result<Self, LostlensError> {
        let raw_base = overrides
            .api_base_url
            .filter(|url| !url.trim().is_empty())
            .or(file.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = Url::parse(raw_base.trim()).map_err(|err| {
            LostlensError::InvalidConfig(format!("api_base_url '{}': {}", raw_base, err))
        })?;

        let endpoints = file.endpoints.unwrap_or_default();
        let detect_url = join_endpoint(
            &api_base_url,
            endpoints.detect.as_deref().unwrap_or(DEFAULT_DETECT_PATH),
        )?;
        let save_url = join_endpoint(
            &api_base_url,
            endpoints.save.as_deref().unwrap_or(DEFAULT_SAVE_PATH),
        )?;

        let convention = overrides.convention.or(file.convention).ok_or_else(|| {
            LostlensError::InvalidConfig(
                "coordinate convention is not set; use --convention normalized|pixel \
                 or 'convention' in the config file"
                    .to_string(),
            )
        })?;

        let timeout = match overrides.timeout_secs.or(file.timeout_secs) {
            Some(0) => {
                return Err(LostlensError::InvalidConfig(
                    "timeout must be greater than zero".to_string(),
                ))
            }
            Some(secs) if secs > MAX_TIMEOUT_SECS => {
                return Err(LostlensError::InvalidConfig(format!(
                    "timeout of {}s exceeds the maximum of {}s",
                    secs, MAX_TIMEOUT_SECS
                )))
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            api_base_url,
            detect_url,
            save_url,
            convention,
            timeout,
        })
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, LostlensError> {
    let raw = std::fs::read_to_string(path)?;
    toml::from_str(&raw).map_err(|source| LostlensError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

fn join_endpoint(base: &Url, path: &str) -> Result<Url, LostlensError> {
    base.join(path)
        .map_err(|err| LostlensError::InvalidConfig(format!("endpoint '{}': {}", path, err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_are_used() {
        let config = ClientConfig::from_toml_str(
            r#"
            api_base_url = "https://lost.example.org"
            convention = "pixel"
            timeout_secs = 5

            [endpoints]
            detect = "/v2/detect"
            "#,
            ConfigOverrides::default(),
        )
        .unwrap();

        assert_eq!(config.convention, CoordinateConvention::Pixel);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.detect_url.as_str(), "https://lost.example.org/v2/detect");
        assert_eq!(
            config.save_url.as_str(),
            "https://lost.example.org/api/lost_items"
        );
    }

    #[test]
    fn overrides_win_over_file() {
        let config = ClientConfig::from_toml_str(
            r#"
            api_base_url = "https://lost.example.org"
            convention = "pixel"
            "#,
            ConfigOverrides {
                api_base_url: Some("http://localhost:8080".to_string()),
                convention: Some(CoordinateConvention::Normalized),
                timeout_secs: Some(2),
            },
        )
        .unwrap();

        assert_eq!(config.convention, CoordinateConvention::Normalized);
        assert_eq!(
            config.detect_url.as_str(),
            "http://localhost:8080/api/upload-image"
        );
        assert_eq!(config.timeout, Duration::from_secs(2));
    }

    #[test]
    fn missing_convention_is_an_error() {
        let err = ClientConfig::from_toml_str("", ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, LostlensError::InvalidConfig(_)));
        assert!(err.to_string().contains("convention"));
    }

    #[test]
    fn defaults_apply_when_only_convention_is_given() {
        let config = ClientConfig::from_toml_str(
            "",
            ConfigOverrides {
                convention: Some(CoordinateConvention::Normalized),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(
            config.detect_url.as_str(),
            "http://127.0.0.1:5000/api/upload-image"
        );
    }

    #[test]
    fn oversized_timeout_is_rejected() {
        let err = ClientConfig::from_toml_str(
            "convention = \"pixel\"",
            ConfigOverrides {
                timeout_secs: Some(u64::MAX),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, LostlensError::InvalidConfig(_)));
        assert!(err.to_string().contains("timeout"));

        let config = ClientConfig::from_toml_str(
            "convention = \"pixel\"\ntimeout_secs = 3600",
            ConfigOverrides::default(),
        )
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(3600));
    }

    #[test]
    fn unknown_keys_and_bad_urls_are_rejected() {
        assert!(matches!(
            ClientConfig::from_toml_str("convension = \"pixel\"", ConfigOverrides::default()),
            Err(LostlensError::ConfigParse { .. })
        ));
        assert!(matches!(
            ClientConfig::from_toml_str(
                "api_base_url = \"not a url\"\nconvention = \"pixel\"",
                ConfigOverrides::default()
            ),
            Err(LostlensError::InvalidConfig(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str(
                "convention = \"pixel\"\ntimeout_secs = 0",
                ConfigOverrides::default()
            ),
            Err(LostlensError::InvalidConfig(_))
        ));
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lostlens.toml");
        std::fs::write(&path, "convention = \"normalized\"\n").unwrap();

        let config = ClientConfig::load(Some(&path), ConfigOverrides::default()).unwrap();
        assert_eq!(config.convention, CoordinateConvention::Normalized);
    }
}
