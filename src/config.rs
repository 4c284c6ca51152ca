use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::predict::{DetectorSettings, GroundStation};

/// Longest prediction window, in days.
pub const MAX_HORIZON_DAYS: u32 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracking: TrackingConfiguration,
    pub detector: DetectorConfig,
    pub elements: ElementsConfig,
    pub notify: NotifyConfig,
    pub web: WebConfig,
    pub api_keys: Vec<ApiKey>,
}

/// What is tracked, from where, and how far ahead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct TrackingConfiguration {
    /// Matched as a substring against element-set name lines.
    pub identifier: String,
    pub station: GroundStation,
    pub min_peak_elevation_deg: f64,
    pub lead_minutes: u32,
    pub horizon_days: u32,
    /// URL the element text is downloaded from.
    pub element_source: String,
}

impl Default for TrackingConfiguration {
    fn default() -> Self {
        Self {
            identifier: "CUBESX-HSE 3".to_string(),
            station: GroundStation::new(55.7558, 37.6173, 144.0),
            min_peak_elevation_deg: 15.0,
            lead_minutes: 15,
            horizon_days: 3,
            element_source: "http://celestrak.org/NORAD/elements/satnogs.txt".to_string(),
        }
    }
}

impl TrackingConfiguration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identifier.trim().is_empty() {
            return Err(ConfigError::invalid("identifier", "must not be empty"));
        }
        if !(-90.0..=90.0).contains(&self.station.latitude_deg) {
            return Err(ConfigError::invalid(
                "station latitude",
                format!("{} is outside [-90, 90]", self.station.latitude_deg),
            ));
        }
        if !(-180.0..=180.0).contains(&self.station.longitude_deg) {
            return Err(ConfigError::invalid(
                "station longitude",
                format!("{} is outside [-180, 180]", self.station.longitude_deg),
            ));
        }
        if !self.station.altitude_m.is_finite() {
            return Err(ConfigError::invalid("station altitude", "must be a number"));
        }
        if !(0.0..=90.0).contains(&self.min_peak_elevation_deg) {
            return Err(ConfigError::invalid(
                "minimum peak elevation",
                format!("{} is outside [0, 90]", self.min_peak_elevation_deg),
            ));
        }
        if !(1..=MAX_HORIZON_DAYS).contains(&self.horizon_days) {
            return Err(ConfigError::invalid(
                "horizon",
                format!("{} days is outside [1, {MAX_HORIZON_DAYS}]", self.horizon_days),
            ));
        }
        if !is_http_url(&self.element_source) {
            return Err(ConfigError::invalid(
                "element source",
                "must start with http:// or https://",
            ));
        }
        Ok(())
    }

    pub fn horizon(&self) -> Duration {
        Duration::days(i64::from(self.horizon_days))
    }

    /// Apply a partial update, returning the new configuration only if it validates.
    pub fn apply(&self, patch: &SettingsPatch) -> Result<Self, ConfigError> {
        let mut updated = self.clone();
        if let Some(identifier) = &patch.identifier {
            updated.identifier = identifier.trim().to_string();
        }
        if let Some(coordinates) = &patch.coordinates {
            let altitude = patch.altitude_m.unwrap_or(updated.station.altitude_m);
            updated.station = GroundStation::from_coordinates(coordinates, Some(altitude))
                .ok_or_else(|| {
                    ConfigError::invalid("station coordinates", "expected \"lat, lon\"")
                })?;
        }
        if let Some(latitude) = patch.latitude_deg {
            updated.station.latitude_deg = latitude;
        }
        if let Some(longitude) = patch.longitude_deg {
            updated.station.longitude_deg = longitude;
        }
        if let Some(altitude) = patch.altitude_m {
            updated.station.altitude_m = altitude;
        }
        if let Some(elevation) = patch.min_peak_elevation_deg {
            updated.min_peak_elevation_deg = elevation;
        }
        if let Some(lead) = patch.lead_minutes {
            updated.lead_minutes = lead;
        }
        if let Some(days) = patch.horizon_days {
            updated.horizon_days = days;
        }
        if let Some(source) = &patch.element_source {
            updated.element_source = source.trim().to_string();
        }
        updated.validate()?;
        Ok(updated)
    }
}

/// Partial update of [`TrackingConfiguration`]; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SettingsPatch {
    pub identifier: Option<String>,
    /// `"lat, lon"` in decimal degrees.
    pub coordinates: Option<String>,
    pub latitude_deg: Option<f64>,
    pub longitude_deg: Option<f64>,
    pub altitude_m: Option<f64>,
    pub min_peak_elevation_deg: Option<f64>,
    pub lead_minutes: Option<u32>,
    pub horizon_days: Option<u32>,
    pub element_source: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub step_seconds: u32,
    pub precision_ms: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            step_seconds: 30,
            precision_ms: 500,
        }
    }
}

impl DetectorConfig {
    pub fn settings(&self) -> DetectorSettings {
        DetectorSettings {
            step: Duration::seconds(i64::from(self.step_seconds.max(1))),
            precision: Duration::milliseconds(i64::from(self.precision_ms.max(1))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ElementsConfig {
    /// Local copy of the last downloaded element text.
    pub cache_file: PathBuf,
    pub refresh_on_start: bool,
}

impl Default for ElementsConfig {
    fn default() -> Self {
        Self {
            cache_file: PathBuf::from("tle.txt"),
            refresh_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Shell command run when a reminder fires.
    pub command: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub name: String,
    pub permissions: HashSet<Permission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    ViewPasses,
    ScheduleReminders,
    UpdateElements,
    ManageSettings,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.tracking.validate()?;
        Ok(config)
    }

    pub fn find_api_key(&self, key: &str) -> Option<&ApiKey> {
        self.api_keys.iter().find(|k| k.key == key)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.tracking, TrackingConfiguration::default());
        assert_eq!(config.tracking.identifier, "CUBESX-HSE 3");
        assert_eq!(config.detector.settings(), DetectorSettings::default());
        assert_eq!(config.elements.cache_file, PathBuf::from("tle.txt"));
        assert_eq!(config.web.bind, "0.0.0.0:8080");
        assert!(config.api_keys.is_empty());
    }

    #[test]
    fn parses_full_file() {
        let yaml = r#"
tracking:
  identifier: ISS (ZARYA)
  station:
    latitude_deg: 48.1
    longitude_deg: 11.6
  lead_minutes: 5
detector:
  step_seconds: 20
notify:
  command: notify-send "$PASSWATCH_OBJECT"
api_keys:
  - key: secret
    name: ops
    permissions: [view_passes, schedule_reminders]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.tracking.identifier, "ISS (ZARYA)");
        assert_eq!(config.tracking.station.altitude_m, 0.0);
        assert_eq!(config.tracking.lead_minutes, 5);
        assert_eq!(config.tracking.horizon_days, 3);
        assert_eq!(config.detector.settings().step, Duration::seconds(20));
        assert!(config.notify.command.is_some());

        let key = config.find_api_key("secret").unwrap();
        assert!(key.permissions.contains(&Permission::ScheduleReminders));
        assert!(!key.permissions.contains(&Permission::ManageSettings));
        assert!(config.find_api_key("other").is_none());
    }

    #[test]
    fn rejects_invalid_tracking_section() {
        let result = Config::from_yaml("tracking:\n  horizon_days: 0\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "horizon", .. })
        ));
        assert!(matches!(
            Config::from_yaml("tracking:\n  horizon_days: 31\n"),
            Err(ConfigError::Invalid { field: "horizon", .. })
        ));
        assert!(Config::from_yaml("tracking:\n  horizon_days: 30\n").is_ok());
        assert!(Config::from_yaml("tracking:\n  element_source: ftp://x\n").is_err());
        assert!(Config::from_yaml("tracking: [").is_err());
    }

    #[test]
    fn patch_updates_only_given_fields() {
        let current = TrackingConfiguration::default();
        let patch = SettingsPatch {
            coordinates: Some("59.93, 30.31".into()),
            lead_minutes: Some(30),
            ..Default::default()
        };
        let updated = current.apply(&patch).unwrap();
        assert_eq!(updated.station, GroundStation::new(59.93, 30.31, 144.0));
        assert_eq!(updated.lead_minutes, 30);
        assert_eq!(updated.identifier, current.identifier);
        assert_eq!(updated.horizon_days, current.horizon_days);
    }

    #[test]
    fn rejected_patch_leaves_configuration_untouched() {
        let current = TrackingConfiguration::default();
        for patch in [
            SettingsPatch {
                coordinates: Some("55.7".into()),
                ..Default::default()
            },
            SettingsPatch {
                latitude_deg: Some(91.0),
                ..Default::default()
            },
            SettingsPatch {
                identifier: Some("   ".into()),
                ..Default::default()
            },
            SettingsPatch {
                element_source: Some("celestrak.org".into()),
                ..Default::default()
            },
            SettingsPatch {
                horizon_days: Some(4_000_000_000),
                ..Default::default()
            },
        ] {
            assert!(current.apply(&patch).is_err(), "{patch:?}");
        }
        assert_eq!(current, TrackingConfiguration::default());
    }

    #[test]
    fn permissions_display_in_snake_case() {
        assert_eq!(Permission::ViewPasses.to_string(), "view_passes");
    }
}
