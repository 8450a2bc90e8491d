use std::path::Path;

use hg_match::RatioTest;
use hg_ransac::RansacConfig;
use serde::{Deserialize, Serialize};

use crate::{RegistrationError, RegistrationResult};

/// Settings of one registration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Nearest-neighbour distance ratio; lower is stricter
    pub ratio: f32,
    pub ransac: RansacConfig,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            ratio: 0.6,
            ransac: RansacConfig::default(),
        }
    }
}

impl RegistrationConfig {
    /// Default ratio combined with a named RANSAC preset
    pub fn preset(name: &str) -> Option<Self> {
        Some(Self {
            ransac: RansacConfig::preset(name)?,
            ..Self::default()
        })
    }

    pub fn with_ratio(mut self, ratio: f32) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn summary(&self) -> String {
        format!("RegistrationConfig: ratio={}, {}", self.ratio, self.ransac.summary())
    }

    pub fn validate(&self) -> RegistrationResult<()> {
        RatioTest::new(self.ratio)?;
        self.ransac.validate()?;
        Ok(())
    }

    /// Load from a `.json` or `.toml` file, chosen by extension
    pub fn load<P: AsRef<Path>>(path: P) -> RegistrationResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = match extension(path).as_deref() {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content).map_err(|e| RegistrationError::InvalidConfig(e.to_string()))?,
            _ => {
                return Err(RegistrationError::InvalidConfig(format!(
                    "unsupported config format: {}",
                    path.display()
                )));
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Save as `.json` or `.toml`, chosen by extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> RegistrationResult<()> {
        let path = path.as_ref();
        let content = match extension(path).as_deref() {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self).map_err(|e| RegistrationError::InvalidConfig(e.to_string()))?,
            _ => {
                return Err(RegistrationError::InvalidConfig(format!(
                    "unsupported config format: {}",
                    path.display()
                )));
            }
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let cfg = RegistrationConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.ratio, 0.6);
    }

    #[test]
    fn test_invalid_ratio() {
        let cfg = RegistrationConfig::default().with_ratio(0.0);
        assert!(matches!(cfg.validate(), Err(RegistrationError::Match(_))));
    }

    #[test]
    fn test_preset_lookup() {
        let cfg = RegistrationConfig::preset("precise").unwrap();
        assert_eq!(cfg.ransac, RansacConfig::precise_preset());
        assert!(RegistrationConfig::preset("unknown").is_none());
    }

    #[test]
    fn test_save_and_load_toml() {
        let path = std::env::temp_dir().join(format!("hg_config_{}.toml", std::process::id()));
        let cfg = RegistrationConfig::preset("fast").unwrap().with_ratio(0.75);

        cfg.save(&path).unwrap();
        let loaded = RegistrationConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let path = std::env::temp_dir().join(format!("hg_config_{}.json", std::process::id()));
        std::fs::write(&path, r#"{"ratio": 0.8, "ransac": {"seed": 3}}"#).unwrap();
        let loaded = RegistrationConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.ratio, 0.8);
        assert_eq!(loaded.ransac.seed, 3);
        assert_eq!(loaded.ransac.max_iters, RansacConfig::default().max_iters);
    }

    #[test]
    fn test_unknown_extension() {
        let result = RegistrationConfig::default().save("config.yaml");
        assert!(matches!(result, Err(RegistrationError::InvalidConfig(_))));
    }
}
