use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const APP_DIR: &str = "Pulsar";
const SETTINGS_FILE: &str = "settings.json";

/// Hosted login endpoints for the identity provider. Tokens themselves are
/// obtained outside this crate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub cognito_domain: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default = "AuthSettings::default_scope")]
    pub scope: String,
}

impl AuthSettings {
    pub(crate) fn default_scope() -> String { "openid email profile".to_string() }

    pub fn is_configured(&self) -> bool {
        !self.cognito_domain.is_empty() && !self.client_id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    // If None, use OS default autosave directory
    pub autosave_override: Option<PathBuf>,
    // If None, use OS temporary directory for exports
    #[serde(default)]
    pub export_override: Option<PathBuf>,
    // If None, server traffic logs go to OS temp dir
    #[serde(default)]
    pub api_log_override: Option<PathBuf>,
    #[serde(default = "AppSettings::default_debounce_ms")]
    pub autosave_debounce_ms: u64,
    // `pulsar serve` defaults
    #[serde(default = "AppSettings::default_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "AppSettings::default_port")]
    pub api_port: u16,
    // Base URL of the remote diagrams API; None disables cloud features
    #[serde(default)]
    pub cloud_api_url: Option<String>,
    #[serde(default)]
    pub auth: AuthSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            autosave_override: None,
            export_override: None,
            api_log_override: None,
            autosave_debounce_ms: Self::default_debounce_ms(),
            api_bind_addr: Self::default_bind_addr(),
            api_port: Self::default_port(),
            cloud_api_url: None,
            auth: AuthSettings::default(),
        }
    }
}

#[derive(Clone, Copy)]
enum UserDir {
    Config,
    State,
}

// Per-user base directory for `kind`, following each platform's convention.
fn user_dir(kind: UserDir) -> PathBuf {
    let var = |name: &str| std::env::var_os(name).map(PathBuf::from);
    let home = || var("HOME").unwrap_or_else(|| PathBuf::from("~"));
    if cfg!(target_os = "macos") {
        return home().join("Library").join("Application Support").join(APP_DIR);
    }
    if cfg!(target_os = "windows") {
        let base = match kind {
            UserDir::Config => var("APPDATA"),
            UserDir::State => var("LOCALAPPDATA").or_else(|| var("TEMP")),
        };
        return base.map(|b| b.join(APP_DIR)).unwrap_or_else(|| PathBuf::from(APP_DIR));
    }
    match kind {
        UserDir::Config => var("XDG_CONFIG_HOME").unwrap_or_else(|| home().join(".config")).join(APP_DIR),
        UserDir::State => var("XDG_STATE_HOME")
            .unwrap_or_else(|| home().join(".local").join("state"))
            .join("pulsar"),
    }
}

impl AppSettings {
    /// Read `settings.json` from the per-user config dir. Missing file means defaults.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::settings_dir())
    }

    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let mut s = String::new();
        fs::File::open(&path)?.read_to_string(&mut s)?;
        Ok(serde_json::from_str(&s)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::settings_dir())
    }

    pub fn save_to(&self, dir: &Path) -> anyhow::Result<()> {
        fs::create_dir_all(dir)?;
        let path = dir.join(SETTINGS_FILE);
        let s = serde_json::to_string_pretty(self)?;
        let mut f = fs::File::create(path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    pub fn autosave_dir(&self) -> PathBuf {
        if let Some(p) = &self.autosave_override { return p.clone(); }
        user_dir(UserDir::State).join("autosave")
    }

    /// Return the directory where the settings file (settings.json) is stored.
    pub fn settings_dir() -> PathBuf {
        user_dir(UserDir::Config)
    }

    /// Default export directory when no override is set: {temp_dir}/Pulsar/exports
    pub fn export_default_dir() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(APP_DIR);
        p.push("exports");
        p
    }

    pub fn export_dir(&self) -> PathBuf {
        if let Some(p) = &self.export_override { return p.clone(); }
        Self::export_default_dir()
    }

    pub(crate) fn default_debounce_ms() -> u64 { 500 }
    pub(crate) fn default_bind_addr() -> String { "127.0.0.1".to_string() }
    pub(crate) fn default_port() -> u16 { 8787 }

    pub fn autosave_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn api_endpoint(&self) -> String {
        format!("{}:{}", self.api_bind_addr, self.api_port)
    }

    /// Default API log directory when no override is set: {temp_dir}/Pulsar/api-logs
    pub fn api_log_default_dir() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(APP_DIR);
        p.push("api-logs");
        p
    }

    pub fn api_log_dir(&self) -> PathBuf {
        if let Some(p) = &self.api_log_override { return p.clone(); }
        Self::api_log_default_dir()
    }
}
