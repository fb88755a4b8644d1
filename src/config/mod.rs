pub mod switches;

pub use switches::StartupSwitches;

use crate::models::ShellConfig;
use ::config::{Config, Environment, File, FileFormat};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs;

/// Settings file name inside the configuration directory.
pub const SETTINGS_FILE_NAME: &str = "settings.yaml";

/// Prefix of environment variables overriding settings, e.g. `EMUSHELL__VIDEO__SCALE=3`.
pub const ENV_PREFIX: &str = "EMUSHELL";

/// Configuration manager for loading and saving the shell settings.
///
/// Settings are layered, later sources winning:
/// 1. `settings.yaml` in the configuration directory (optional)
/// 2. `EMUSHELL__*` environment variables
/// 3. Command-line overrides (`/video.scale=3`)
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    do_not_save: bool,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory holding `settings.yaml`, also the home folder for firmware
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join(SETTINGS_FILE_NAME),
            config_dir,
            do_not_save: false,
        })
    }

    /// Load the settings, applying environment and command-line overrides.
    ///
    /// # Returns
    /// The merged ShellConfig; defaults fill anything no layer provides
    pub fn load(&self, overrides: &IndexMap<String, String>) -> Result<ShellConfig> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
        }

        let mut builder = Config::builder()
            .add_source(
                File::from(self.settings_path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        for (key, value) in overrides {
            builder = builder
                .set_override(key.as_str(), value.as_str())
                .with_context(|| format!("Invalid setting override: {}={}", key, value))?;
        }

        let config: ShellConfig = builder
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(config)
    }

    /// Save the settings file, unless saving was disabled for this session.
    pub fn save(&self, config: &ShellConfig) -> Result<()> {
        if self.do_not_save {
            tracing::info!("Settings not saved (disabled for this session)");
            return Ok(());
        }

        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Disable [`save`](Self::save) for the rest of the session.
    pub fn set_do_not_save(&mut self, do_not_save: bool) {
        self.do_not_save = do_not_save;
    }

    pub fn do_not_save(&self) -> bool {
        self.do_not_save
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Region;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();
        let config = manager.load(&IndexMap::new()).unwrap();
        assert_eq!(config, ShellConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let (manager, _temp_dir) = create_test_config_manager();

        let mut config = ShellConfig::default();
        config.region = Region::Pal;
        config.emulation.speed = 200;
        manager.save(&config).unwrap();

        let loaded = manager.load(&IndexMap::new()).unwrap();
        assert_eq!(loaded.region, Region::Pal);
        assert_eq!(loaded.emulation.speed, 200);
    }

    #[test]
    fn test_override_wins_over_file() {
        let (manager, _temp_dir) = create_test_config_manager();
        let mut config = ShellConfig::default();
        config.video.scale = 2.0;
        manager.save(&config).unwrap();

        let mut overrides = IndexMap::new();
        overrides.insert("video.scale".to_string(), "4".to_string());

        let loaded = manager.load(&overrides).unwrap();
        assert_eq!(loaded.video.scale, 4.0);
    }

    #[test]
    fn test_do_not_save() {
        let (mut manager, _temp_dir) = create_test_config_manager();
        manager.set_do_not_save(true);
        manager.save(&ShellConfig::default()).unwrap();
        assert!(!manager.settings_path().exists());
    }
}
