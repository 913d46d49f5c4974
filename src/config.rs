//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Directory name under the platform config dir
pub const APP_DIR: &str = "movos";

// Predefined user agents
pub const USER_AGENTS: &[(&str, &str)] = &[
    ("Chrome (Windows)", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36"),
    ("Firefox (Windows)", "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:140.0) Gecko/20100101 Firefox/140.0"),
    ("Safari (macOS)", "Mozilla/5.0 (Macintosh; Intel Mac OS X 15_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.4 Safari/605.1.15"),
    ("VLC", "VLC/3.0.16 LibVLC/3.0.16"),
    ("Kodi", "Kodi/20.2 (Linux; Android 13) Android/13 Sys_CPU/armv8a App_Bitness/64 Version/20.2"),
    ("IPTV Smarters Pro", "IPTVSmartersPro"),
    ("TiviMate", "TiviMate/4.7.0 (Linux; Android 13)"),
    ("OkHttp (IPTV)", "okhttp/4.9.3"),
    ("Lavf (FFmpeg)", "Lavf/60.3.100"),
];

/// Options handed to the adaptive decoder when a session opens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    #[serde(default = "default_true")]
    pub enable_worker: bool,
    #[serde(default = "default_true")]
    pub low_latency: bool,
    #[serde(default)]
    pub user_agent: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            enable_worker: true,
            low_latency: true,
            user_agent: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub selected_user_agent: usize,
    #[serde(default)]
    pub custom_user_agent: String,
    #[serde(default)]
    pub use_custom_user_agent: bool,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    // Listing window
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_reveal_threshold")]
    pub reveal_threshold: usize,
    #[serde(default = "default_debounce_ms")]
    pub search_debounce_ms: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    // Playback
    #[serde(default)]
    pub decoder: DecoderConfig,
    /// Give up on a source that is still loading after this long. Off when unset.
    #[serde(default)]
    pub load_timeout_secs: Option<u64>,
    /// Escalate after this many recoverable decoder errors in one session. Off when unset.
    #[serde(default)]
    pub max_recoverable_errors: Option<u32>,
    /// Overrides where credential/favorites/history records live
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_connect_timeout() -> u64 { 30 }
fn default_request_timeout() -> u64 { 120 }
fn default_page_size() -> usize { 50 }
fn default_reveal_threshold() -> usize { 10 }
fn default_debounce_ms() -> u64 { 500 }
fn default_history_limit() -> usize { 20 }
fn default_true() -> bool { true }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            selected_user_agent: 0,
            custom_user_agent: String::new(),
            use_custom_user_agent: false,
            connect_timeout_secs: 30,
            request_timeout_secs: 120,
            page_size: 50,
            reveal_threshold: 10,
            search_debounce_ms: 500,
            history_limit: 20,
            decoder: DecoderConfig::default(),
            load_timeout_secs: None,
            max_recoverable_errors: None,
            data_dir: None,
        }
    }
}

impl AppConfig {
    fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push("config.json");
        path
    }

    /// Load from the default location; absent or unreadable config means defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring malformed config");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read config");
                Self::default()
            }
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
    }

    /// Where the persisted records live
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
            path.push(APP_DIR);
            path
        })
    }

    pub fn effective_user_agent(&self) -> String {
        if self.use_custom_user_agent && !self.custom_user_agent.trim().is_empty() {
            self.custom_user_agent.trim().to_string()
        } else {
            USER_AGENTS
                .get(self.selected_user_agent)
                .unwrap_or(&USER_AGENTS[0])
                .1
                .to_string()
        }
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_secs.map(Duration::from_secs)
    }

    /// Decoder options with the configured user agent filled in
    pub fn decoder_config(&self) -> DecoderConfig {
        let mut decoder = self.decoder.clone();
        if decoder.user_agent.is_empty() {
            decoder.user_agent = self.effective_user_agent();
        }
        decoder
    }
}
