//! Configuration Vault – reads/writes `~/.moskbridge/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use moskbridge_core::{AmbiguityPolicy, ModelProfile, profile::PRESET_NAMES};
use moskbridge_middleware::{DEFAULT_HOST, DEFAULT_PORT};
use moskbridge_types::JointSpace;

/// Persisted user configuration stored in `~/.moskbridge/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Counterpart address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Counterpart port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Preset name, or the `name` of `custom_profile`.
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Space requested with `setStreamingJointSpace` after the handshake.
    #[serde(default)]
    pub joint_space: JointSpace,

    /// Tie-break when several host nodes share a name.
    #[serde(default)]
    pub ambiguity: AmbiguityPolicy,

    /// TOML scene loaded into the simulated host rig.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_path: Option<PathBuf>,

    /// Inline profile, selected when `profile` equals its `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_profile: Option<ModelProfile>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_profile() -> String {
    "no-rig".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            profile: default_profile(),
            joint_space: JointSpace::default(),
            ambiguity: AmbiguityPolicy::default(),
            scene_path: None,
            custom_profile: None,
        }
    }
}

impl Config {
    /// `host:port` of the counterpart.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The profile named by `profile`: the inline custom profile when the
    /// names match, a built-in preset otherwise.
    pub fn resolve_profile(&self) -> Result<ModelProfile, String> {
        if let Some(custom) = &self.custom_profile
            && custom.name == self.profile
        {
            return Ok(custom.clone());
        }
        ModelProfile::preset(&self.profile).ok_or_else(|| {
            format!(
                "Unknown profile '{}' (built in: {})",
                self.profile,
                PRESET_NAMES.join(", ")
            )
        })
    }
}

/// Return the path to `~/.moskbridge/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".moskbridge").join("config.toml")
}

/// Load the config from disk and apply environment overrides.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let loaded = load_from(&config_path())?;
    Ok(loaded.map(|mut cfg| {
        apply_env_overrides(&mut cfg);
        cfg
    }))
}

pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `MOSKBRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `MOSKBRIDGE_HOST` | `host` |
/// | `MOSKBRIDGE_PORT` | `port` |
/// | `MOSKBRIDGE_PROFILE` | `profile` |
/// | `MOSKBRIDGE_SCENE` | `scene_path` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("MOSKBRIDGE_HOST") {
        cfg.host = v;
    }
    if let Ok(v) = std::env::var("MOSKBRIDGE_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.port = port;
    }
    if let Ok(v) = std::env::var("MOSKBRIDGE_PROFILE") {
        cfg.profile = v;
    }
    if let Ok(v) = std::env::var("MOSKBRIDGE_SCENE") {
        cfg.scene_path = (!v.is_empty()).then(|| PathBuf::from(v));
    }
}

/// Save the config to disk, creating `~/.moskbridge/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
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
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
