// Configuration loading and parsing (autoresponder.toml, credentials.toml).

use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Main settings file, relative to the config directory.
pub const SETTINGS_FILE: &str = "autoresponder.toml";
/// Optional secrets file, relative to the config directory.
pub const CREDENTIALS_FILE: &str = "credentials.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub poll: PollConfig,
    pub ledger: LedgerConfig,
    pub responder: ResponderConfig,
    pub wildberries: EndpointConfig,
    pub ozon: EndpointConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// autoresponder.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire autoresponder.toml file.
#[derive(Debug, Clone, Deserialize)]
struct SettingsFile {
    poll: PollConfig,
    ledger: LedgerConfig,
    responder: ResponderConfig,
    wildberries: EndpointConfig,
    ozon: EndpointConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    pub interval_secs: u64,
    /// How many accounts may be processed at the same time.
    #[serde(default = "default_max_concurrent_accounts")]
    pub max_concurrent_accounts: usize,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_max_concurrent_accounts() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponderConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    /// Overrides the built-in reply prompt when set.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Sent instead of a generated reply when a review has no text at all.
    pub fallback_reply: String,
}

/// Base URL and page size for one marketplace API.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    pub page_size: u32,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub wildberries: Vec<WildberriesCredentials>,
    #[serde(default)]
    pub ozon: Vec<OzonCredentials>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WildberriesCredentials {
    /// Account label used in logs and ledger keys.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct OzonCredentials {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub api_key: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/autoresponder.toml` and
/// (optionally) `config/credentials.toml`, both relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- autoresponder.toml (required) ---
    let settings_path = config_dir.join(SETTINGS_FILE);
    let settings_text = read_file(&settings_path)?;
    let settings: SettingsFile =
        toml::from_str(&settings_text).map_err(|e| ConfigError::ParseError {
            path: settings_path.clone(),
            source: e,
        })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join(CREDENTIALS_FILE);
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        poll: settings.poll,
        ledger: settings.ledger,
        responder: settings.responder,
        wildberries: settings.wildberries,
        ozon: settings.ozon,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Seed `config/` with every shipped file from `defaults/` that is not there
/// yet. Existing files are never touched and `*.example` templates are left
/// for the operator to copy by hand. Returns the paths that were created.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        // Nothing to seed from; an already populated config/ is fine.
        if config_dir.is_dir() {
            return Ok(Vec::new());
        }
        return Err(copy_error(format!(
            "no defaults/ or config/ directory under {}",
            base_dir.display()
        )));
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("cannot create {}: {e}", config_dir.display())))?;

    let entries = std::fs::read_dir(&defaults_dir)
        .map_err(|e| copy_error(format!("cannot list {}: {e}", defaults_dir.display())))?;

    let mut seeded = Vec::new();
    for entry in entries {
        let source = entry
            .map_err(|e| copy_error(format!("cannot list {}: {e}", defaults_dir.display())))?
            .path();
        let Some(file_name) = source.file_name().filter(|_| source.is_file()) else {
            continue;
        };
        if is_template(&source) {
            continue;
        }

        let target = config_dir.join(file_name);
        if seed_file(&source, &target)? {
            seeded.push(target);
        }
    }

    Ok(seeded)
}

/// Load configuration from the working directory, seeding defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    for path in ensure_config_files(&cwd)? {
        info!("Created {} from shipped defaults", path.display());
    }
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

fn is_template(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "example")
}

/// Copy `source` to `target` unless `target` already exists. Returns whether
/// a copy was made.
fn seed_file(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_error(format!("cannot create {}: {e}", target.display()))),
    };

    let content = std::fs::read(source)
        .map_err(|e| copy_error(format!("cannot read {}: {e}", source.display())))?;
    dest.write_all(&content)
        .map_err(|e| copy_error(format!("cannot write {}: {e}", target.display())))?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.poll.interval_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "poll.interval_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.poll.max_concurrent_accounts == 0 {
        return Err(ConfigError::ValidationError {
            field: "poll.max_concurrent_accounts".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.ledger.path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "ledger.path".into(),
            message: "must not be empty".into(),
        });
    }

    if config.responder.max_tokens == 0 {
        return Err(ConfigError::ValidationError {
            field: "responder.max_tokens".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.responder.fallback_reply.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "responder.fallback_reply".into(),
            message: "must not be empty".into(),
        });
    }

    let endpoints: &[(&str, &EndpointConfig)] =
        &[("wildberries", &config.wildberries), ("ozon", &config.ozon)];
    for (name, endpoint) in endpoints {
        if endpoint.page_size == 0 {
            return Err(ConfigError::ValidationError {
                field: format!("{name}.page_size"),
                message: "must be > 0".into(),
            });
        }
        if endpoint.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: format!("{name}.base_url"),
                message: "must not be empty".into(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
