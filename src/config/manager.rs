use crate::config::models::GlobalConfig;
use crate::constants;
use crate::descriptor::EndpointDescriptor;
use crate::error::Error;
use crate::fs::{FileSystem, OsFileSystem};
use std::path::{Path, PathBuf};

pub struct ConfigManager<F: FileSystem> {
    fs: F,
    config_dir: PathBuf,
}

impl ConfigManager<OsFileSystem> {
    /// Creates a new `ConfigManager` with the default filesystem and config directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn new() -> Result<Self, Error> {
        let config_dir = get_config_dir()?;
        Ok(Self {
            fs: OsFileSystem,
            config_dir,
        })
    }
}

impl<F: FileSystem> ConfigManager<F> {
    pub const fn with_fs(fs: F, config_dir: PathBuf) -> Self {
        Self { fs, config_dir }
    }

    /// Get the configuration directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }

    /// Loads `config.toml`, or the defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load_global_config(&self) -> Result<GlobalConfig, Error> {
        let config_path = self.config_path();
        if self.fs.exists(&config_path) {
            let content = self.fs.read_to_string(&config_path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(GlobalConfig::default())
        }
    }

    /// Saves the global configuration to `config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized or written.
    pub fn save_global_config(&self, config: &GlobalConfig) -> Result<(), Error> {
        self.fs.create_dir_all(&self.config_dir)?;

        let content = toml::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        self.fs.write_all(&self.config_path(), content.as_bytes())?;
        Ok(())
    }

    /// Names of the catalog endpoints, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded.
    pub fn list_endpoints(&self) -> Result<Vec<String>, Error> {
        Ok(self.load_global_config()?.endpoints.into_keys().collect())
    }

    /// The catalog as endpoint descriptors.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded.
    pub fn endpoint_descriptors(&self) -> Result<Vec<EndpointDescriptor>, Error> {
        Ok(self.load_global_config()?.endpoint_descriptors())
    }
}

/// Gets the configuration directory, honouring `TETHER_CONFIG_DIR`.
///
/// # Errors
///
/// Returns an error if no platform config directory can be determined.
pub fn get_config_dir() -> Result<PathBuf, Error> {
    if let Ok(dir) = std::env::var(constants::ENV_TETHER_CONFIG_DIR) {
        return Ok(PathBuf::from(dir));
    }
    let config_dir = dirs::config_dir()
        .ok_or_else(|| Error::Config("Cannot determine the configuration directory".to_string()))?;
    Ok(config_dir.join(constants::CONFIG_DIR_NAME))
}
