use std::{fs, path::PathBuf};

use common::crypto::SecretKey;
use common::session::{Identity, Session};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "vault";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const LEDGER_FILE_NAME: &str = "ledger.json";
pub const KEYS_DIR_NAME: &str = "keys";
pub const BLOBS_DIR_NAME: &str = "blobs";
pub const DEFAULT_IDENTITY: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default log level, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Upper bound on a single blob fetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub blob_store: BlobStoreConfig,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            blob_store: BlobStoreConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::WARN)
    }
}

/// Where blob data is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BlobStoreConfig {
    /// iroh FsStore under the vault directory
    #[default]
    Fs,
    /// Process-local store, gone when the command exits
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the vault directory (~/.vault)
    pub vault_dir: PathBuf,
    /// Path to the ledger snapshot
    pub ledger_path: PathBuf,
    /// Directory holding one PEM key per local identity
    pub keys_path: PathBuf,
    pub blobs_path: PathBuf,
    pub config_path: PathBuf,
    pub config: AppConfig,
}

impl AppState {
    /// Get the vault directory path (custom or default ~/.vault)
    pub fn vault_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    fn at(vault_dir: PathBuf, config: AppConfig) -> Self {
        Self {
            ledger_path: vault_dir.join(LEDGER_FILE_NAME),
            keys_path: vault_dir.join(KEYS_DIR_NAME),
            blobs_path: vault_dir.join(BLOBS_DIR_NAME),
            config_path: vault_dir.join(CONFIG_FILE_NAME),
            vault_dir,
            config,
        }
    }

    /// Initialize a new vault directory with a default identity
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let vault_dir = Self::vault_dir(custom_path)?;
        if vault_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        let state = Self::at(vault_dir, config.unwrap_or_default());
        fs::create_dir_all(&state.vault_dir)?;
        fs::create_dir_all(&state.keys_path)?;
        fs::create_dir_all(&state.blobs_path)?;

        let config_toml = toml::to_string_pretty(&state.config)?;
        fs::write(&state.config_path, config_toml)?;

        state.create_identity(DEFAULT_IDENTITY)?;
        Ok(state)
    }

    /// Load existing state from the vault directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let vault_dir = Self::vault_dir(custom_path)?;
        if !vault_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = vault_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }
        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        let state = Self::at(vault_dir, config);
        if !state.keys_path.exists() {
            return Err(StateError::MissingFile(format!("{}/", KEYS_DIR_NAME)));
        }
        if !state.blobs_path.exists() {
            return Err(StateError::MissingFile(format!("{}/", BLOBS_DIR_NAME)));
        }
        Ok(state)
    }

    fn key_path(&self, name: &str) -> Result<PathBuf, StateError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StateError::InvalidIdentityName(name.to_string()));
        }
        Ok(self.keys_path.join(format!("{}.pem", name)))
    }

    /// Generate and store a key for a new local identity
    pub fn create_identity(&self, name: &str) -> Result<Identity, StateError> {
        let key_path = self.key_path(name)?;
        if key_path.exists() {
            return Err(StateError::IdentityExists(name.to_string()));
        }
        let key = SecretKey::generate().map_err(|e| StateError::InvalidKey(e.to_string()))?;
        fs::write(&key_path, key.to_pem())?;
        Ok(Identity::from_public_key(&key.public()))
    }

    pub fn load_key(&self, name: &str) -> Result<SecretKey, StateError> {
        let key_path = self.key_path(name)?;
        if !key_path.exists() {
            return Err(StateError::UnknownIdentity(name.to_string()));
        }
        let pem = fs::read_to_string(&key_path)?;
        SecretKey::from_pem(&pem).map_err(|e| StateError::InvalidKey(e.to_string()))
    }

    /// A fresh session for the named local identity
    pub fn session(&self, name: &str) -> Result<Session, StateError> {
        Ok(Session::from_secret(self.load_key(name)?))
    }

    /// Local identities by name, sorted
    pub fn identities(&self) -> Result<Vec<(String, Identity)>, StateError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.keys_path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("pem") {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();

        names
            .into_iter()
            .map(|name| {
                let key = self.load_key(&name)?;
                Ok((name, Identity::from_public_key(&key.public())))
            })
            .collect()
    }

    /// Resolve either a `0x` identity or the name of a local identity
    pub fn resolve_identity(&self, value: &str) -> Result<Identity, StateError> {
        if value.starts_with("0x") {
            return value
                .parse()
                .map_err(|e: common::session::IdentityError| StateError::InvalidIdentity(e.to_string()));
        }
        Ok(*self.session(value)?.identity())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("vault directory not initialized. Run 'vault init' first")]
    NotInitialized,

    #[error("vault directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid identity name {0:?}: use letters, digits, '-' or '_'")]
    InvalidIdentityName(String),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("identity {0} already exists")]
    IdentityExists(String),

    #[error("no local identity named {0}")]
    UnknownIdentity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_then_load() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("vault");

        let state = AppState::init(Some(dir.clone()), None).unwrap();
        assert!(state.ledger_path.ends_with(LEDGER_FILE_NAME));
        assert!(state.keys_path.join("default.pem").exists());

        let loaded = AppState::load(Some(dir.clone())).unwrap();
        assert_eq!(loaded.config.fetch_timeout_secs, 30);
        assert_eq!(loaded.config.blob_store, BlobStoreConfig::Fs);

        assert!(matches!(
            AppState::init(Some(dir), None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_uninitialized() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            AppState::load(Some(temp.path().join("missing"))),
            Err(StateError::NotInitialized)
        ));
    }

    #[test]
    fn test_identities() {
        let temp = TempDir::new().unwrap();
        let state = AppState::init(Some(temp.path().join("vault")), None).unwrap();

        let bob = state.create_identity("bob").unwrap();
        assert!(matches!(
            state.create_identity("bob"),
            Err(StateError::IdentityExists(_))
        ));
        assert!(matches!(
            state.create_identity("../escape"),
            Err(StateError::InvalidIdentityName(_))
        ));

        let names: Vec<_> = state
            .identities()
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["bob", "default"]);

        assert_eq!(state.resolve_identity("bob").unwrap(), bob);
        assert_eq!(state.resolve_identity(&bob.to_string()).unwrap(), bob);
        assert!(matches!(
            state.resolve_identity("carol"),
            Err(StateError::UnknownIdentity(_))
        ));
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: AppConfig = toml::from_str("blob_store = \"memory\"").unwrap();
        assert_eq!(config.blob_store, BlobStoreConfig::Memory);
        assert_eq!(config.log_level(), tracing::Level::WARN);
        assert_eq!(config.fetch_timeout_secs, 30);
    }
}
