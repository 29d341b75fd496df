//! JSON configuration file loading and validation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::defaults::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use super::region::{is_valid_region_name, Region};
use super::settings::DownloadSettings;
use crate::coord::{BoundingBox, MAX_ZOOM};
use crate::provider::{ServerEndpoint, UrlTemplate};

/// Errors raised while loading or validating configuration.
///
/// All of these are fatal before any tile is fetched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid region '{region}': {reason}")]
    InvalidRegion { region: String, reason: String },

    #[error("Invalid server '{server}': {reason}")]
    InvalidServer { server: String, reason: String },

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("No enabled tile servers configured")]
    NoServers,
}

/// Raw configuration as it appears on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub settings: DownloadSettings,

    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    /// Regions keyed by name.
    #[serde(default)]
    pub regions: BTreeMap<String, RegionConfig>,
}

/// One upstream server entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Display name; defaults to the URL host.
    #[serde(default)]
    pub name: Option<String>,

    /// URL template with `{z}`, `{x}` and `{y}` placeholders.
    pub url: String,

    #[serde(default = "default_weight")]
    pub weight: u32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Static request headers, e.g. `User-Agent`.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_weight() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

/// One region entry.
///
/// Zoom levels are given either as an explicit `zoom_levels` list or as an
/// inclusive `min_zoom`/`max_zoom` range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    /// `[min_lon, min_lat, max_lon, max_lat]`
    pub bbox: [f64; 4],

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub zoom_levels: Option<Vec<u8>>,

    #[serde(default)]
    pub min_zoom: Option<u8>,

    #[serde(default)]
    pub max_zoom: Option<u8>,
}

/// Configuration that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub settings: DownloadSettings,
    pub servers: Vec<ServerEndpoint>,
    pub regions: BTreeMap<String, Region>,
}

impl ConfigFile {
    /// Loads a configuration file from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Validates every section and builds the runtime types.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        self.settings.validate()?;

        let servers = self
            .servers
            .iter()
            .filter(|s| s.enabled)
            .map(ServerConfig::to_endpoint)
            .collect::<Result<Vec<_>, _>>()?;
        if servers.is_empty() {
            return Err(ConfigError::NoServers);
        }

        let regions = self
            .regions
            .iter()
            .map(|(name, region)| Ok((name.clone(), region.to_region(name)?)))
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;

        Ok(ValidatedConfig {
            settings: self.settings.clone(),
            servers,
            regions,
        })
    }
}

impl ServerConfig {
    fn to_endpoint(&self) -> Result<ServerEndpoint, ConfigError> {
        let label = self.name.clone().unwrap_or_else(|| self.url.clone());
        let invalid = |reason: String| ConfigError::InvalidServer {
            server: label.clone(),
            reason,
        };

        let template = UrlTemplate::parse(self.url.as_str()).map_err(|e| invalid(e.to_string()))?;
        if self.weight == 0 {
            return Err(invalid("weight must be at least 1".to_string()));
        }

        let mut endpoint = ServerEndpoint::new(template).with_weight(self.weight);
        if let Some(name) = &self.name {
            endpoint = endpoint.with_name(name.as_str());
        }
        for (key, value) in &self.headers {
            endpoint = endpoint.with_header(key.as_str(), value.as_str());
        }
        Ok(endpoint)
    }
}

impl RegionConfig {
    fn to_region(&self, name: &str) -> Result<Region, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidRegion {
            region: name.to_string(),
            reason,
        };

        if !is_valid_region_name(name) {
            return Err(invalid(
                "name must be a single non-empty path component".to_string(),
            ));
        }

        let bbox = BoundingBox::from_array(self.bbox).map_err(|e| invalid(e.to_string()))?;
        let zoom_levels = self.zoom_set().map_err(invalid)?;

        let mut region = Region::new(name, bbox, zoom_levels);
        if let Some(description) = &self.description {
            region = region.with_description(description.as_str());
        }
        Ok(region)
    }

    fn zoom_set(&self) -> Result<BTreeSet<u8>, String> {
        let zooms: BTreeSet<u8> = match (&self.zoom_levels, self.min_zoom, self.max_zoom) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err("use either zoom_levels or min_zoom/max_zoom, not both".to_string())
            }
            (Some(levels), None, None) => levels.iter().copied().collect(),
            (None, Some(min), Some(max)) => {
                if min > max {
                    return Err(format!("min_zoom {} is greater than max_zoom {}", min, max));
                }
                (min..=max).collect()
            }
            (None, _, _) => {
                return Err("zoom_levels or both min_zoom and max_zoom are required".to_string())
            }
        };

        if zooms.is_empty() {
            return Err("zoom_levels must not be empty".to_string());
        }
        if let Some(&z) = zooms.iter().find(|&&z| z > MAX_ZOOM) {
            return Err(format!("zoom level {} out of range 0-{}", z, MAX_ZOOM));
        }
        Ok(zooms)
    }
}

/// Resolves which config file to load.
///
/// An explicit path always wins. Otherwise `./config.json` is used if it
/// exists, then `{config_dir}/tilehoard/config.json`. Falls back to
/// `./config.json` so the error message names a sensible path.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }

    if let Some(dir) = dirs::config_dir() {
        let user = dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        if user.exists() {
            return user;
        }
    }

    local
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "settings": { "concurrency": 4, "output_dir": "out" },
        "servers": [
            { "name": "osm", "url": "https://tile.osm.test/{z}/{x}/{y}.png",
              "headers": { "User-Agent": "tilehoard-test" } },
            { "url": "https://b.tile.test/{z}/{x}/{y}.png", "weight": 2 },
            { "name": "off", "url": "https://off.test/{z}/{x}/{y}.png", "enabled": false }
        ],
        "regions": {
            "qatar": { "bbox": [50.0, 24.4, 52.0, 26.2], "zoom_levels": [6, 5],
                       "description": "Qatar peninsula" },
            "doha": { "bbox": [51.4, 25.2, 51.6, 25.4], "min_zoom": 10, "max_zoom": 12 }
        }
    }"#;

    #[test]
    fn test_sample_validates() {
        let config = ConfigFile::from_json(SAMPLE).unwrap().validate().unwrap();

        assert_eq!(config.settings.concurrency, 4);
        assert_eq!(config.settings.output_dir, PathBuf::from("out"));

        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].name(), "osm");
        assert_eq!(
            config.servers[0].headers(),
            &[("User-Agent".to_string(), "tilehoard-test".to_string())]
        );
        assert_eq!(config.servers[1].name(), "b.tile.test");
        assert_eq!(config.servers[1].weight(), 2);

        let qatar = &config.regions["qatar"];
        assert_eq!(qatar.zoom_levels().iter().copied().collect::<Vec<_>>(), vec![5, 6]);
        assert_eq!(qatar.description(), Some("Qatar peninsula"));

        let doha = &config.regions["doha"];
        assert_eq!(doha.zoom_levels().len(), 3);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = ConfigFile::load(file.path()).unwrap();
        assert_eq!(config.regions.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigFile::load(Path::new("/nonexistent/tilehoard/config.json"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ConfigFile::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_no_servers() {
        let config = ConfigFile::from_json(r#"{"regions": {}}"#).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::NoServers)));
    }

    #[test]
    fn test_bad_template() {
        let config = ConfigFile::from_json(
            r#"{"servers": [{"name": "broken", "url": "https://t.test/{z}/{x}.png"}]}"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidServer { server, .. }) if server == "broken"
        ));
    }

    fn with_region(region: &str) -> ConfigFile {
        ConfigFile::from_json(&format!(
            r#"{{"servers": [{{"url": "https://t.test/{{z}}/{{x}}/{{y}}.png"}}],
                "regions": {{ "r": {} }} }}"#,
            region
        ))
        .unwrap()
    }

    #[test]
    fn test_antimeridian_region_rejected() {
        let config = with_region(r#"{"bbox": [170.0, -20.0, -170.0, -10.0], "zoom_levels": [3]}"#);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRegion { region, .. }) if region == "r"
        ));
    }

    #[test]
    fn test_zoom_out_of_range_rejected() {
        let config = with_region(r#"{"bbox": [0.0, 0.0, 1.0, 1.0], "zoom_levels": [3, 23]}"#);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zoom_selection_required() {
        let config = with_region(r#"{"bbox": [0.0, 0.0, 1.0, 1.0]}"#);
        assert!(config.validate().is_err());

        let config =
            with_region(r#"{"bbox": [0.0, 0.0, 1.0, 1.0], "zoom_levels": [1], "min_zoom": 1}"#);
        assert!(config.validate().is_err());

        let config = with_region(r#"{"bbox": [0.0, 0.0, 1.0, 1.0], "min_zoom": 5, "max_zoom": 2}"#);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_region_name() {
        let config = ConfigFile::from_json(
            r#"{"servers": [{"url": "https://t.test/{z}/{x}/{y}.png"}],
                "regions": { "../etc": {"bbox": [0.0, 0.0, 1.0, 1.0], "zoom_levels": [1]} } }"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRegion { .. })
        ));
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = Path::new("/tmp/custom.json");
        assert_eq!(resolve_config_path(Some(path)), path.to_path_buf());
    }
}
