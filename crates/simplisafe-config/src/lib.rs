//! Shared configuration for SimpliSafe tools.
//!
//! TOML profiles, credential resolution (token cache + env + plaintext),
//! the refresh-token cache (system keyring, or owner-only files), and
//! translation to
//! `simplisafe_core::ClientConfig`. Core never touches disk; everything
//! persistent lives here.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use simplisafe_core::{AuthCredentials, ClientConfig};

/// Environment variable consulted for the account password.
pub const PASSWORD_ENV: &str = "SIMPLISAFE_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found (available: {available})")]
    ProfileNotFound { name: String, available: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

/// Global tuning. Durations are in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// How long arm/disarm waits for the panel to confirm.
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Backing store for cached refresh tokens.
    #[serde(default)]
    pub token_store: TokenStore,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            confirm_timeout: default_confirm_timeout(),
            poll_interval: default_poll_interval(),
            token_store: TokenStore::default(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_confirm_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    2
}

/// A named SimpliSafe account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Account email.
    pub email: String,

    /// Password (plaintext; prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// REST base URL override, e.g. a staging host.
    pub base_url: Option<String>,

    /// Override the request timeout.
    pub timeout: Option<u64>,
}

impl Config {
    /// Refresh-token cache selected by `defaults.token_store`.
    pub fn token_cache(&self) -> TokenCache {
        TokenCache::new(self.defaults.token_store)
    }

    /// Name of the profile to use: the explicit one, else the configured
    /// default, else `"default"`.
    pub fn active_profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles.get(name).ok_or_else(|| {
            let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
            names.sort_unstable();
            ConfigError::ProfileNotFound {
                name: name.into(),
                available: if names.is_empty() {
                    "(none)".into()
                } else {
                    names.join(", ")
                },
            }
        })
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "simplisafe", "simplisafe")
}

fn home_fallback(kind: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(kind);
    p.push("simplisafe");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory holding one cached refresh token per profile.
pub fn token_cache_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".local/share").join("tokens"),
        |dirs| dirs.data_dir().join("tokens"),
    )
}

// ── Config loading / saving ─────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path`, layered over defaults and under
/// `SIMPLISAFE_*` environment overrides (`__` separates nested keys,
/// e.g. `SIMPLISAFE_DEFAULTS__TIMEOUT=10`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SIMPLISAFE_").split("__"));

    Ok(figment.extract()?)
}

/// Load config, returning a default if the file is missing or broken.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

// ── Refresh-token cache ─────────────────────────────────────────────

const KEYRING_SERVICE: &str = "simplisafe";

/// Where refresh tokens are kept between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStore {
    /// The platform credential store. Falls back to the token file when
    /// no credential service is reachable.
    #[default]
    Keyring,
    /// Owner-only files under the data directory.
    File,
}

/// Per-profile refresh-token cache.
#[derive(Debug, Clone)]
pub struct TokenCache {
    store: TokenStore,
    dir: PathBuf,
}

impl TokenCache {
    pub fn new(store: TokenStore) -> Self {
        Self::with_dir(store, token_cache_dir())
    }

    /// Cache whose token files live in `dir`.
    pub fn with_dir(store: TokenStore, dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            dir: dir.into(),
        }
    }

    pub fn store(&self) -> TokenStore {
        self.store
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The refresh token saved for `profile`, if any.
    pub fn load(&self, profile: &str) -> Result<Option<SecretString>, ConfigError> {
        let path = token_file(&self.dir, profile)?;

        if self.store == TokenStore::Keyring {
            match keyring_entry(profile).and_then(|entry| entry.get_password()) {
                Ok(token) if !token.is_empty() => return Ok(Some(SecretString::from(token))),
                Ok(_) | Err(keyring::Error::NoEntry) => {}
                Err(e) => warn!(profile, error = %e, "keyring unavailable, trying token file"),
            }
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(SecretString::from(token.to_owned())))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the latest refresh token for `profile`.
    pub fn save(&self, profile: &str, token: &SecretString) -> Result<(), ConfigError> {
        let path = token_file(&self.dir, profile)?;

        if self.store == TokenStore::Keyring {
            match keyring_entry(profile).and_then(|entry| entry.set_password(token.expose_secret()))
            {
                Ok(()) => {
                    // Drop any token file left by an earlier fallback.
                    remove_if_exists(&path)?;
                    debug!(profile, "refresh token stored in keyring");
                    return Ok(());
                }
                Err(e) => warn!(profile, error = %e, "keyring unavailable, using token file"),
            }
        }

        std::fs::create_dir_all(&self.dir)?;
        write_owner_only(&path, token.expose_secret())?;
        debug!(profile, path = %path.display(), "refresh token cached");
        Ok(())
    }

    /// Forget the cached refresh token, e.g. after it was revoked.
    pub fn clear(&self, profile: &str) -> Result<(), ConfigError> {
        let path = token_file(&self.dir, profile)?;

        if self.store == TokenStore::Keyring {
            match keyring_entry(profile).and_then(|entry| entry.delete_credential()) {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => warn!(profile, error = %e, "could not remove keyring entry"),
            }
        }

        remove_if_exists(&path)
    }
}

fn keyring_entry(profile: &str) -> keyring::Result<keyring::Entry> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile}/refresh-token"))
}

fn token_file(dir: &Path, profile: &str) -> Result<PathBuf, ConfigError> {
    if profile.is_empty()
        || !profile
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        || profile.starts_with('.')
    {
        return Err(ConfigError::Validation {
            field: "profile".into(),
            reason: format!("'{profile}' cannot be used as a token cache name"),
        });
    }
    Ok(dir.join(format!("{profile}.token")))
}

/// Write `contents` to a file only the owner can read. New files are
/// created with mode 0600; existing ones are narrowed before the write.
fn write_owner_only(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

fn remove_if_exists(path: &Path) -> Result<(), ConfigError> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the account password without consulting the token cache.
///
/// Order: `SIMPLISAFE_PASSWORD`, the profile's `password_env`, then the
/// plaintext `password`.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(pw));
    }

    if let Some(ref env_name) = profile.password_env {
        if let Ok(pw) = std::env::var(env_name) {
            return Ok(SecretString::from(pw));
        }
    }

    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve credentials for a profile: a cached refresh token wins,
/// otherwise email + password.
pub fn resolve_auth(
    tokens: &TokenCache,
    profile: &Profile,
    profile_name: &str,
) -> Result<AuthCredentials, ConfigError> {
    if let Some(token) = tokens.load(profile_name)? {
        debug!(profile = profile_name, "using cached refresh token");
        return Ok(AuthCredentials::RefreshToken(token));
    }

    let password = resolve_password(profile, profile_name)?;
    Ok(AuthCredentials::Credentials {
        username: profile.email.clone(),
        password,
    })
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ClientConfig` from global defaults and one profile.
pub fn to_client_config(defaults: &Defaults, profile: &Profile) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig {
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        confirm_timeout: Duration::from_secs(defaults.confirm_timeout),
        poll_interval: Duration::from_secs(defaults.poll_interval),
        ..ClientConfig::default()
    };

    if let Some(ref base_url) = profile.base_url {
        config = config
            .with_api_base_url(base_url)
            .map_err(|e| ConfigError::Validation {
                field: "base_url".into(),
                reason: e.to_string(),
            })?;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn profile() -> Profile {
        Profile {
            email: "user@example.com".into(),
            password: Some("hunter2".into()),
            password_env: None,
            base_url: None,
            timeout: None,
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = load_config_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.confirm_timeout, 30);
        assert_eq!(cfg.defaults.poll_interval, 2);
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn loads_profiles_and_partial_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "home"

[defaults]
confirm_timeout = 45

[profiles.home]
email = "me@example.com"
password_env = "HOME_SS_PASSWORD"
timeout = 10
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.active_profile_name(None), "home");
        assert_eq!(cfg.defaults.confirm_timeout, 45);
        assert_eq!(cfg.defaults.timeout, 30);

        let home = cfg.profile("home").unwrap();
        assert_eq!(home.email, "me@example.com");
        assert_eq!(home.timeout, Some(10));
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert("default".into(), profile());

        save_config_to(&path, &cfg).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profile("default").unwrap().email, "user@example.com");
    }

    #[test]
    fn unknown_profile_lists_available() {
        let mut cfg = Config::default();
        cfg.profiles.insert("cabin".into(), profile());
        cfg.profiles.insert("home".into(), profile());

        match cfg.profile("office") {
            Err(ConfigError::ProfileNotFound { name, available }) => {
                assert_eq!(name, "office");
                assert_eq!(available, "cabin, home");
            }
            other => panic!("expected ProfileNotFound, got {other:?}"),
        }
    }

    fn file_cache(dir: &TempDir) -> TokenCache {
        TokenCache::with_dir(TokenStore::File, dir.path())
    }

    #[test]
    fn token_store_defaults_to_keyring_and_reads_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(load_config_from(&path).unwrap().defaults.token_store, TokenStore::Keyring);

        std::fs::write(&path, "[defaults]\ntoken_store = \"file\"\n").unwrap();
        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.defaults.token_store, TokenStore::File);
        assert_eq!(cfg.token_cache().store(), TokenStore::File);
    }

    #[test]
    fn token_cache_roundtrip_and_clear() {
        let dir = TempDir::new().unwrap();
        let cache = file_cache(&dir);
        assert!(cache.load("home").unwrap().is_none());

        cache.save("home", &SecretString::from("r2".to_string())).unwrap();
        let token = cache.load("home").unwrap().unwrap();
        assert_eq!(token.expose_secret(), "r2");

        cache.clear("home").unwrap();
        assert!(cache.load("home").unwrap().is_none());
        cache.clear("home").unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        file_cache(&dir)
            .save("home", &SecretString::from("r".to_string()))
            .unwrap();
        let mode = std::fs::metadata(dir.path().join("home.token"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn overwriting_a_loose_token_file_narrows_it() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("home.token");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let cache = file_cache(&dir);
        cache.save("home", &SecretString::from("new".to_string())).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(cache.load("home").unwrap().unwrap().expose_secret(), "new");
    }

    #[test]
    fn token_cache_rejects_path_like_names() {
        let dir = TempDir::new().unwrap();
        let cache = file_cache(&dir);
        let token = SecretString::from("r".to_string());
        for bad in ["", "../escape", ".hidden", "a/b"] {
            assert!(matches!(
                cache.save(bad, &token),
                Err(ConfigError::Validation { .. })
            ));
            assert!(matches!(cache.load(bad), Err(ConfigError::Validation { .. })));
        }
    }

    #[test]
    fn cached_token_wins_over_password() {
        let dir = TempDir::new().unwrap();
        let cache = file_cache(&dir);
        cache
            .save("default", &SecretString::from("r9".to_string()))
            .unwrap();

        match resolve_auth(&cache, &profile(), "default").unwrap() {
            AuthCredentials::RefreshToken(token) => assert_eq!(token.expose_secret(), "r9"),
            other => panic!("expected refresh token, got {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_plaintext_password() {
        if std::env::var(PASSWORD_ENV).is_ok() {
            return;
        }
        let dir = TempDir::new().unwrap();
        match resolve_auth(&file_cache(&dir), &profile(), "default").unwrap() {
            AuthCredentials::Credentials { username, password } => {
                assert_eq!(username, "user@example.com");
                assert_eq!(password.expose_secret(), "hunter2");
            }
            other @ AuthCredentials::RefreshToken(_) => panic!("expected password, got {other:?}"),
        }
    }

    #[test]
    fn no_password_anywhere() {
        if std::env::var(PASSWORD_ENV).is_ok() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let bare = Profile {
            password: None,
            password_env: Some("SIMPLISAFE_TEST_UNSET_PASSWORD_VAR".into()),
            ..profile()
        };
        assert!(matches!(
            resolve_auth(&file_cache(&dir), &bare, "default"),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn client_config_applies_overrides() {
        let defaults = Defaults {
            confirm_timeout: 5,
            ..Defaults::default()
        };
        let custom = Profile {
            base_url: Some("http://127.0.0.1:9000/v1".into()),
            timeout: Some(7),
            ..profile()
        };

        let config = to_client_config(&defaults, &custom).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(7));
        assert_eq!(config.confirm_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.api_base_url.as_str(), "http://127.0.0.1:9000/v1/");
    }

    #[test]
    fn client_config_rejects_bad_base_url() {
        let broken = Profile {
            base_url: Some("not a url".into()),
            ..profile()
        };
        assert!(matches!(
            to_client_config(&Defaults::default(), &broken),
            Err(ConfigError::Validation { .. })
        ));
    }
}
