//! Data models for the MOVOS client core

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CredentialError;

/// Content kind. Category ids and item ids are only unique within one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Live,
    Video,
    Series,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Live, MediaKind::Video, MediaKind::Series];

    /// Path segment used in playable URLs
    pub fn path_segment(&self) -> &'static str {
        match self {
            MediaKind::Live => "live",
            MediaKind::Video => "movie",
            MediaKind::Series => "series",
        }
    }

    pub fn categories_action(&self) -> &'static str {
        match self {
            MediaKind::Live => "get_live_categories",
            MediaKind::Video => "get_vod_categories",
            MediaKind::Series => "get_series_categories",
        }
    }

    pub fn items_action(&self) -> &'static str {
        match self {
            MediaKind::Live => "get_live_streams",
            MediaKind::Video => "get_vod_streams",
            MediaKind::Series => "get_series",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MediaKind::Live => "live",
            MediaKind::Video => "video",
            MediaKind::Series => "series",
        })
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" | "tv" | "channels" => Ok(MediaKind::Live),
            "video" | "vod" | "movie" | "movies" => Ok(MediaKind::Video),
            "series" | "shows" => Ok(MediaKind::Series),
            other => Err(format!("unknown content kind '{}'", other)),
        }
    }
}

/// Provider login. The URL is normalized on construction and never changes afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    provider_url: String,
    username: String,
    password: String,
}

impl Credential {
    pub fn new(provider_url: &str, username: &str, password: &str) -> Result<Self, CredentialError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(CredentialError::EmptyUsername);
        }
        if password.is_empty() {
            return Err(CredentialError::EmptyPassword);
        }
        Ok(Self {
            provider_url: normalize_provider_url(provider_url)?,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn provider_url(&self) -> &str {
        &self.provider_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// `{url}/{kind path}/{user}/{pass}/{id}.{ext}`
    pub fn playback_url(&self, segment: &str, id: &str, ext: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}.{}",
            self.provider_url, segment, self.username, self.password, id, ext
        )
    }

    /// Hide the password in anything that is about to be logged
    pub fn redact(&self, text: &str) -> String {
        if self.password.is_empty() {
            return text.to_string();
        }
        text.replace(&self.password, "***")
    }
}

// Keep passwords out of `{:?}` output
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("provider_url", &self.provider_url)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Ensure the server has a protocol and no trailing slash
pub fn normalize_provider_url(raw: &str) -> Result<String, CredentialError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CredentialError::EmptyUrl);
    }

    let lower = trimmed.to_ascii_lowercase();
    let mut url = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };
    while url.ends_with('/') {
        url.pop();
    }

    let host = url
        .split_once("://")
        .map(|(_, rest)| rest.split('/').next().unwrap_or(""))
        .unwrap_or("");
    if host.is_empty() || host.starts_with(':') {
        return Err(CredentialError::MissingHost(raw.to_string()));
    }

    Ok(url)
}

/// Category, flat per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    /// Opaque, nesting is not interpreted
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Identity of a media item across kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaKey {
    pub kind: MediaKind,
    pub id: String,
}

/// Normalized catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub kind: MediaKind,
    pub title: String,
    pub year: i32,
    pub rating: f32,
    pub description: String,
    pub poster_url: String,
    pub backdrop_url: String,
    /// Resolved source; series are resolved per episode
    #[serde(default)]
    pub playback_url: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
}

impl MediaItem {
    pub fn key(&self) -> MediaKey {
        MediaKey {
            kind: self.kind,
            id: self.id.clone(),
        }
    }

    pub fn same_as(&self, other: &MediaItem) -> bool {
        self.kind == other.kind && self.id == other.id
    }
}

/// Series episode from `get_series_info`
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub season: i32,
    pub episode_num: i32,
    pub container_extension: String,
}

impl Episode {
    pub fn playback_url(&self, credential: &Credential) -> String {
        credential.playback_url(
            MediaKind::Series.path_segment(),
            &self.id,
            &self.container_extension,
        )
    }
}

/// User account information
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserInfo {
    pub username: String,
    pub status: String,
    pub max_connections: String,
    pub active_connections: String,
    pub is_trial: bool,
    pub expiry: String,
    pub message: Option<String>,
}

/// Server information
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerInfo {
    pub url: String,
    pub port: String,
    pub timezone: String,
}

/// What a successful authentication tells us about the account
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionInfo {
    pub user: UserInfo,
    pub server: ServerInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_scheme_and_strips_slash() {
        assert_eq!(
            normalize_provider_url(" example.com:8080/ ").unwrap(),
            "http://example.com:8080"
        );
        assert_eq!(
            normalize_provider_url("https://iptv.example.com//").unwrap(),
            "https://iptv.example.com"
        );
    }

    #[test]
    fn test_normalize_rejects_empty_and_hostless() {
        assert_eq!(normalize_provider_url("  "), Err(CredentialError::EmptyUrl));
        assert!(matches!(
            normalize_provider_url("http:///path"),
            Err(CredentialError::MissingHost(_))
        ));
    }

    #[test]
    fn test_credential_debug_hides_password() {
        let cred = Credential::new("example.com", "john", "s3cret").unwrap();
        let dbg = format!("{:?}", cred);
        assert!(!dbg.contains("s3cret"));
        assert_eq!(cred.redact("/live/john/s3cret/1.ts"), "/live/john/***/1.ts");
    }

    #[test]
    fn test_episode_url() {
        let cred = Credential::new("http://example.com/", "u", "p").unwrap();
        let ep = Episode {
            id: "77".into(),
            title: "Pilot".into(),
            season: 1,
            episode_num: 1,
            container_extension: "mkv".into(),
        };
        assert_eq!(ep.playback_url(&cred), "http://example.com/series/u/p/77.mkv");
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("VOD".parse::<MediaKind>(), Ok(MediaKind::Video));
        assert_eq!("live".parse::<MediaKind>(), Ok(MediaKind::Live));
        assert!("radio".parse::<MediaKind>().is_err());
    }
}
