//! Configuration Vault – reads/writes `~/.jarvis/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use jarvis_memory::CapacityPolicy;
use jarvis_runtime::{CoordinatorConfig, RecallPolicy};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Persisted user configuration stored in `~/.jarvis/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the remote memory service.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token for the remote memory service.  Empty means anonymous.
    /// Stored as plain text; the file is created owner-only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auth_token: String,

    /// SQLite file holding the local knowledge store.
    #[serde(default = "default_memory_path")]
    pub memory_path: PathBuf,

    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,

    /// Ask the remote service for alternate speech phrasing.
    #[serde(default = "default_true")]
    pub synthesize_speech: bool,

    /// Cap on indexed pattern words.  Unset means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pattern_words: Option<usize>,

    /// Cap on retained conversation lines.  Unset means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_conversations: Option<usize>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field(
                "auth_token",
                if self.auth_token.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("memory_path", &self.memory_path)
            .field("remote_timeout_secs", &self.remote_timeout_secs)
            .field("synthesize_speech", &self.synthesize_speech)
            .field("max_pattern_words", &self.max_pattern_words)
            .field("max_conversations", &self.max_conversations)
            .finish()
    }
}

fn default_api_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_memory_path() -> PathBuf {
    jarvis_dir().join("memory.db")
}
fn default_remote_timeout_secs() -> u64 {
    10
}
fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            auth_token: String::new(),
            memory_path: default_memory_path(),
            remote_timeout_secs: default_remote_timeout_secs(),
            synthesize_speech: true,
            max_pattern_words: None,
            max_conversations: None,
        }
    }
}

impl Config {
    /// Wipe the stored token in place.
    pub fn clear_token(&mut self) {
        self.auth_token.zeroize();
    }

    /// Recall policy implied by the stored token.
    pub fn policy(&self) -> RecallPolicy {
        RecallPolicy::from_token(Some(&self.auth_token))
    }

    /// Unbounded unless at least one limit is configured; a missing limit
    /// is then treated as unlimited.
    pub fn capacity(&self) -> CapacityPolicy {
        match (self.max_pattern_words, self.max_conversations) {
            (None, None) => CapacityPolicy::Unbounded,
            (words, conversations) => CapacityPolicy::Bounded {
                max_pattern_words: words.unwrap_or(usize::MAX),
                max_conversations: conversations.unwrap_or(usize::MAX),
            },
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            remote_timeout: Duration::from_secs(self.remote_timeout_secs.max(1)),
            synthesize_speech: self.synthesize_speech,
        }
    }
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

/// `~/.jarvis`
pub fn jarvis_dir() -> PathBuf {
    PathBuf::from(home_dir()).join(".jarvis")
}

/// Return the path to `~/.jarvis/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".jarvis").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    let mut cfg = load_stored_from(path)?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Read the file as written, without `JARVIS_*` overrides.
pub(crate) fn load_stored_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Load `(stored, effective)`: the on-disk config (defaults when missing or
/// unreadable) and a copy with environment overrides applied.  Only `stored`
/// is ever written back.
pub fn load_layered() -> (Config, Config) {
    load_layered_from(&config_path())
}

pub(crate) fn load_layered_from(path: &Path) -> (Config, Config) {
    let stored = match load_stored_from(path) {
        Ok(Some(cfg)) => cfg,
        Ok(None) => Config::default(),
        Err(e) => {
            tracing::warn!(error = %e, "config unreadable; using defaults");
            Config::default()
        }
    };
    let mut effective = stored.clone();
    apply_env_overrides(&mut effective);
    (stored, effective)
}

/// Apply `JARVIS_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `JARVIS_API_URL` | `api_url` |
/// | `JARVIS_TOKEN` | `auth_token` |
/// | `JARVIS_MEMORY_PATH` | `memory_path` |
/// | `JARVIS_REMOTE_TIMEOUT_SECS` | `remote_timeout_secs` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("JARVIS_API_URL") {
        cfg.api_url = v;
    }
    if let Ok(v) = std::env::var("JARVIS_TOKEN") {
        cfg.auth_token = v;
    }
    if let Ok(v) = std::env::var("JARVIS_MEMORY_PATH") {
        cfg.memory_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("JARVIS_REMOTE_TIMEOUT_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.remote_timeout_secs = secs;
    }
}

/// Save the config to disk, creating `~/.jarvis/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_debug_redacts_token() {
        let cfg = Config {
            auth_token: "tok-super-secret".to_string(),
            ..Config::default()
        };
        let debug_str = format!("{:?}", cfg);
        assert!(!debug_str.contains("tok-super-secret"));
        assert!(debug_str.contains("<redacted>"));
    }

    #[test]
    fn config_debug_shows_not_set_for_empty_token() {
        let debug_str = format!("{:?}", Config::default());
        assert!(debug_str.contains("<not set>"));
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_config_with_limits() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config {
            api_url: "http://memory.local:5000".to_string(),
            max_pattern_words: Some(2000),
            ..Config::default()
        };
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.max_pattern_words, Some(2000));
        assert_eq!(loaded.max_conversations, None);
        assert_eq!(loaded.remote_timeout_secs, 10);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "remote_timeout_secs = 3\n").unwrap();
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.remote_timeout_secs, 3);
        assert!(loaded.synthesize_speech);
        assert!(loaded.memory_path.ends_with("memory.db"));
    }

    #[test]
    fn config_path_points_to_jarvis_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".jarvis"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn capacity_is_unbounded_without_limits() {
        assert_eq!(Config::default().capacity(), CapacityPolicy::Unbounded);
        let cfg = Config {
            max_conversations: Some(50),
            ..Config::default()
        };
        assert_eq!(
            cfg.capacity(),
            CapacityPolicy::Bounded {
                max_pattern_words: usize::MAX,
                max_conversations: 50,
            }
        );
    }

    #[test]
    fn policy_follows_token() {
        assert!(!Config::default().policy().is_authenticated());
        let cfg = Config {
            auth_token: "abc".to_string(),
            ..Config::default()
        };
        assert!(cfg.policy().is_authenticated());
    }

    #[test]
    fn clear_token_empties_token() {
        let mut cfg = Config {
            auth_token: "abc".to_string(),
            ..Config::default()
        };
        cfg.clear_token();
        assert!(cfg.auth_token.is_empty());
        assert!(!cfg.policy().is_authenticated());
    }

    #[test]
    fn coordinator_timeout_is_at_least_one_second() {
        let cfg = Config {
            remote_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(cfg.coordinator_config().remote_timeout, Duration::from_secs(1));
    }

    #[test]
    fn apply_env_overrides_changes_api_url() {
        // SAFETY: only this test touches JARVIS_API_URL.
        unsafe { std::env::set_var("JARVIS_API_URL", "http://memory-host:5000") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.api_url, "http://memory-host:5000");
        unsafe { std::env::remove_var("JARVIS_API_URL") };
    }

    #[test]
    fn env_token_stays_out_of_stored_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "remote_timeout_secs = 4\n").unwrap();

        // SAFETY: only this test touches JARVIS_TOKEN.
        unsafe { std::env::set_var("JARVIS_TOKEN", "env-secret") };
        let (stored, effective) = load_layered_from(&path);
        unsafe { std::env::remove_var("JARVIS_TOKEN") };

        assert_eq!(effective.auth_token, "env-secret");
        assert!(stored.auth_token.is_empty());
        assert_eq!(stored.remote_timeout_secs, 4);

        save_to(&stored, &path).expect("save");
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("env-secret"));
    }

    #[test]
    fn layered_load_defaults_when_file_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let (stored, _) = load_layered_from(&dir.path().join("config.toml"));
        assert_eq!(stored.api_url, default_api_url());
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_timeout() {
        // SAFETY: only this test touches JARVIS_REMOTE_TIMEOUT_SECS.
        unsafe { std::env::set_var("JARVIS_REMOTE_TIMEOUT_SECS", "soon") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.remote_timeout_secs, 10);
        unsafe { std::env::remove_var("JARVIS_REMOTE_TIMEOUT_SECS") };
    }
}
