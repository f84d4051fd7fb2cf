use std::{fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::crypto::{KeyEncoding, PrincipalKeys, SignPrivateKey, WrapPrivateKey};

use crate::blobs::BlobStoreConfig;

pub const APP_NAME: &str = "custody";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "db.sqlite";
pub const WRAP_KEY_FILE_NAME: &str = "wrap.pem";
pub const SIGN_KEY_FILE_NAME: &str = "sign.pem";
pub const ARTIFACTS_DIR_NAME: &str = "artifacts";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Id this principal registers under
    pub principal_id: Uuid,
    /// Display name this principal registers under
    pub name: String,
    /// Port for the API server
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Default log level for the daemon
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for daemon log files (stdout only if not set)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Ciphertext backend; the `artifacts` directory under the custody
    /// directory if not set
    #[serde(default)]
    pub blob_store: Option<BlobStoreConfig>,
}

fn default_api_port() -> u16 {
    5001
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            principal_id: Uuid::new_v4(),
            name: name.into(),
            api_port: default_api_port(),
            log_level: default_log_level(),
            log_dir: None,
            blob_store: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the custody directory (~/.custody)
    pub custody_dir: PathBuf,
    /// Path to the SQLite database
    pub db_path: PathBuf,
    /// Path to the wrapping key PEM file
    pub wrap_key_path: PathBuf,
    /// Path to the signing key PEM file
    pub sign_key_path: PathBuf,
    /// Path to the artifact ciphertext directory
    pub artifacts_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

/// Write a private key readable by the current user only
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)?.write_all(contents.as_bytes())
}

impl AppState {
    /// Get the custody directory path (custom or default ~/.custody)
    pub fn custody_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new custody directory with a fresh pair of keypairs
    pub fn init(custom_path: Option<PathBuf>, config: AppConfig) -> Result<Self, StateError> {
        let custody_dir = Self::custody_dir(custom_path)?;

        if custody_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&custody_dir)?;

        let artifacts_path = custody_dir.join(ARTIFACTS_DIR_NAME);
        fs::create_dir_all(&artifacts_path)?;

        // Generate and save both keypairs
        let keys = PrincipalKeys::generate();
        let wrap_key_path = custody_dir.join(WRAP_KEY_FILE_NAME);
        write_private(&wrap_key_path, &keys.wrap.to_pem())?;
        let sign_key_path = custody_dir.join(SIGN_KEY_FILE_NAME);
        write_private(&sign_key_path, &keys.sign.to_pem())?;

        let config_path = custody_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        // Create empty database (just touch the file, it will be initialized by the service)
        let db_path = custody_dir.join(DB_FILE_NAME);
        fs::write(&db_path, "")?;

        Ok(Self {
            custody_dir,
            db_path,
            wrap_key_path,
            sign_key_path,
            artifacts_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the custody directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let custody_dir = Self::custody_dir(custom_path)?;

        if !custody_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let db_path = custody_dir.join(DB_FILE_NAME);
        let wrap_key_path = custody_dir.join(WRAP_KEY_FILE_NAME);
        let sign_key_path = custody_dir.join(SIGN_KEY_FILE_NAME);
        let artifacts_path = custody_dir.join(ARTIFACTS_DIR_NAME);
        let config_path = custody_dir.join(CONFIG_FILE_NAME);

        for (path, name) in [
            (&db_path, DB_FILE_NAME),
            (&wrap_key_path, WRAP_KEY_FILE_NAME),
            (&sign_key_path, SIGN_KEY_FILE_NAME),
            (&artifacts_path, ARTIFACTS_DIR_NAME),
            (&config_path, CONFIG_FILE_NAME),
        ] {
            if !path.exists() {
                return Err(StateError::MissingFile(name.to_string()));
            }
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            custody_dir,
            db_path,
            wrap_key_path,
            sign_key_path,
            artifacts_path,
            config_path,
            config,
        })
    }

    /// Load both private keys from their PEM files
    pub fn load_keys(&self) -> Result<PrincipalKeys, StateError> {
        let wrap = fs::read_to_string(&self.wrap_key_path)?;
        let sign = fs::read_to_string(&self.sign_key_path)?;
        Ok(PrincipalKeys {
            wrap: WrapPrivateKey::from_pem(&wrap)
                .map_err(|e| StateError::InvalidKey(e.to_string()))?,
            sign: SignPrivateKey::from_pem(&sign)
                .map_err(|e| StateError::InvalidKey(e.to_string()))?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("custody directory not initialized. Run 'custody init' first")]
    NotInitialized,

    #[error("custody directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("custody");

        let created = AppState::init(Some(dir.clone()), AppConfig::new("alice")).unwrap();
        let loaded = AppState::load(Some(dir.clone())).unwrap();
        assert_eq!(loaded.config.principal_id, created.config.principal_id);
        assert_eq!(loaded.config.api_port, 5001);

        let keys = loaded.load_keys().unwrap();
        assert_eq!(
            keys.public(),
            created.load_keys().unwrap().public(),
            "keys reload identically"
        );

        assert!(matches!(
            AppState::init(Some(dir), AppConfig::new("alice")),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_reports_missing_pieces() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppState::load(Some(tmp.path().join("nowhere"))),
            Err(StateError::NotInitialized)
        ));

        let dir = tmp.path().join("custody");
        AppState::init(Some(dir.clone()), AppConfig::new("bob")).unwrap();
        fs::remove_file(dir.join(SIGN_KEY_FILE_NAME)).unwrap();
        assert!(matches!(
            AppState::load(Some(dir)),
            Err(StateError::MissingFile(name)) if name == SIGN_KEY_FILE_NAME
        ));
    }

    #[test]
    fn test_config_defaults() {
        let config: AppConfig = toml::from_str(
            "principal_id = \"5f0f6f6e-3b6c-4d3e-9c55-0d7a3e1c2b11\"\nname = \"carol\"\n",
        )
        .unwrap();
        assert_eq!(config.api_port, 5001);
        assert_eq!(config.log_level, "info");
        assert!(config.log_dir.is_none());
        assert!(config.blob_store.is_none());

        let config: AppConfig = toml::from_str(
            "principal_id = \"5f0f6f6e-3b6c-4d3e-9c55-0d7a3e1c2b11\"\nname = \"carol\"\n\n[blob_store]\ntype = \"memory\"\n",
        )
        .unwrap();
        assert_eq!(config.blob_store, Some(BlobStoreConfig::Memory));
    }
}
