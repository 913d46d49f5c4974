//! Xtream Codes API client
//!
//! Stateless: every call is exactly one HTTP request built from the credential it is
//! given. Retries, caching and ordering are the caller's business.

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{AuthError, NetworkError};
use crate::models::{Category, Credential, Episode, MediaKind, ServerInfo, SessionInfo, UserInfo};

/// Provider operations the catalog loader and app depend on.
///
/// Implemented by [`ProviderClient`]; tests plug in scripted providers.
pub trait Provider: Send + Sync {
    fn authenticate(&self, credential: &Credential) -> Result<SessionInfo, AuthError>;

    fn list_categories(
        &self,
        credential: &Credential,
        kind: MediaKind,
    ) -> Result<Vec<Category>, NetworkError>;

    fn list_items(
        &self,
        credential: &Credential,
        kind: MediaKind,
        category_id: Option<&str>,
    ) -> Result<Vec<RawRecord>, NetworkError>;

    /// Providers without series details report no episodes
    fn series_episodes(
        &self,
        _credential: &Credential,
        _series_id: &str,
    ) -> Result<Vec<Episode>, NetworkError> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Wire records
// ---------------------------------------------------------------------------

/// Accept strings, numbers, or null. Anything else reads as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_string(&value))
}

/// `backdrop_path` is a list on most panels and a bare string on some
fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.iter().filter_map(value_to_string).collect(),
        other => value_to_string(&other).into_iter().collect(),
    })
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim(), "1" | "true" | "TRUE" | "True"),
        _ => false,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LiveRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub stream_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub series_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub stream_icon: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub epg_channel_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub added: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub rating: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VodRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub stream_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub series_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub stream_icon: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub container_extension: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub rating: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub plot: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, rename = "releaseDate", deserialize_with = "lenient_string")]
    pub release_date: Option<String>,
    #[serde(default, rename = "release_date", deserialize_with = "lenient_string")]
    pub release_date_alt: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub added: Option<String>,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub backdrop_path: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SeriesRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub stream_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub series_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cover: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub plot: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub genre: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub rating: Option<String>,
    #[serde(default, rename = "releaseDate", deserialize_with = "lenient_string")]
    pub release_date: Option<String>,
    #[serde(default, rename = "release_date", deserialize_with = "lenient_string")]
    pub release_date_alt: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_modified: Option<String>,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub backdrop_path: Vec<String>,
}

/// One listing entry, tagged by the kind it was requested as
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Live(LiveRecord),
    Video(VodRecord),
    Series(SeriesRecord),
}

impl RawRecord {
    pub fn kind(&self) -> MediaKind {
        match self {
            RawRecord::Live(_) => MediaKind::Live,
            RawRecord::Video(_) => MediaKind::Video,
            RawRecord::Series(_) => MediaKind::Series,
        }
    }

    pub fn from_value(kind: MediaKind, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            MediaKind::Live => RawRecord::Live(serde_json::from_value(value)?),
            MediaKind::Video => RawRecord::Video(serde_json::from_value(value)?),
            MediaKind::Series => RawRecord::Series(serde_json::from_value(value)?),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireCategory {
    #[serde(default, deserialize_with = "lenient_string")]
    category_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    category_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    parent_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Payload interpretation
// ---------------------------------------------------------------------------

/// Elements of a listing array; a non-array body (some panels answer `{}` for an
/// empty category) is an empty listing.
fn array_elements(action: &str, body: Value) -> Result<Vec<Value>, NetworkError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        Value::Null => Ok(Vec::new()),
        other => Err(NetworkError::Decode {
            action: action.to_string(),
            reason: format!("expected a JSON array, got {}", json_type(&other)),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn parse_categories(
    kind: MediaKind,
    body: Value,
) -> Result<Vec<Category>, NetworkError> {
    let action = kind.categories_action();
    let mut categories = Vec::new();
    for element in array_elements(action, body)? {
        match serde_json::from_value::<WireCategory>(element) {
            Ok(WireCategory {
                category_id: Some(id),
                category_name,
                parent_id,
            }) => categories.push(Category {
                name: category_name.unwrap_or_else(|| id.clone()),
                id,
                parent_id,
            }),
            Ok(_) => warn!(action, "Skipping category without id"),
            Err(e) => warn!(action, error = %e, "Skipping malformed category"),
        }
    }
    Ok(categories)
}

pub(crate) fn parse_items(kind: MediaKind, body: Value) -> Result<Vec<RawRecord>, NetworkError> {
    let action = kind.items_action();
    let elements = array_elements(action, body)?;
    let mut records = Vec::with_capacity(elements.len());
    for element in elements {
        if !element.is_object() {
            warn!(action, "Skipping non-object listing entry");
            continue;
        }
        match RawRecord::from_value(kind, element) {
            Ok(record) => records.push(record),
            Err(e) => warn!(action, error = %e, "Skipping malformed listing entry"),
        }
    }
    Ok(records)
}

pub(crate) fn parse_auth(body: &Value) -> Result<SessionInfo, AuthError> {
    let user = match body.get("user_info") {
        Some(user) if user.is_object() => user,
        _ => return Err(AuthError::Rejected { message: None }),
    };

    let text = |v: &Value, key: &str| v.get(key).and_then(value_to_string);

    if !user.get("auth").map(is_truthy).unwrap_or(false) {
        return Err(AuthError::Rejected {
            message: text(user, "message"),
        });
    }

    let expiry = match text(user, "exp_date").and_then(|s| s.parse::<i64>().ok()) {
        Some(ts) => format_timestamp(ts),
        None => "Unlimited".to_string(),
    };

    let user_info = UserInfo {
        username: text(user, "username").unwrap_or_else(|| "Unknown".to_string()),
        status: text(user, "status").unwrap_or_else(|| "Unknown".to_string()),
        max_connections: text(user, "max_connections").unwrap_or_else(|| "Unlimited".to_string()),
        active_connections: text(user, "active_cons").unwrap_or_else(|| "0".to_string()),
        is_trial: user.get("is_trial").map(is_truthy).unwrap_or(false),
        expiry,
        message: text(user, "message"),
    };

    let server_info = body
        .get("server_info")
        .map(|srv| ServerInfo {
            url: text(srv, "url").unwrap_or_default(),
            port: text(srv, "port").unwrap_or_else(|| "80".to_string()),
            timezone: text(srv, "timezone").unwrap_or_else(|| "Unknown".to_string()),
        })
        .unwrap_or_default();

    Ok(SessionInfo {
        user: user_info,
        server: server_info,
    })
}

#[derive(Debug, Deserialize)]
struct WireEpisode {
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    episode_num: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    season: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    container_extension: Option<String>,
}

/// `episodes` is keyed by season number on most panels and a list of lists on others
pub(crate) fn parse_episodes(body: &Value) -> Vec<Episode> {
    let groups: Vec<(Option<i32>, &Value)> = match body.get("episodes") {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(season, eps)| (season.parse().ok(), eps))
            .collect(),
        Some(Value::Array(list)) => list.iter().map(|eps| (None, eps)).collect(),
        _ => Vec::new(),
    };

    let mut episodes = Vec::new();
    for (season_key, group) in groups {
        let Some(entries) = group.as_array() else {
            continue;
        };
        for entry in entries {
            let Ok(wire) = serde_json::from_value::<WireEpisode>(entry.clone()) else {
                continue;
            };
            let Some(id) = wire.id else {
                continue;
            };
            let episode_num = wire
                .episode_num
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            let season = wire
                .season
                .and_then(|s| s.parse().ok())
                .or(season_key)
                .unwrap_or(1);
            episodes.push(Episode {
                title: wire
                    .title
                    .unwrap_or_else(|| format!("Episode {}", episode_num)),
                id,
                season,
                episode_num,
                container_extension: wire
                    .container_extension
                    .unwrap_or_else(|| "mp4".to_string()),
            });
        }
    }

    episodes.sort_by_key(|e| (e.season, e.episode_num));
    episodes
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "Unlimited".to_string())
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Blocking player API client. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ProviderClient {
    agent: ureq::Agent,
    user_agent: String,
}

impl ProviderClient {
    pub fn new(config: &AppConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.request_timeout_secs)))
            .timeout_connect(Some(Duration::from_secs(config.connect_timeout_secs)))
            .max_idle_connections(4)
            .max_idle_connections_per_host(2)
            .build()
            .new_agent();

        Self {
            agent,
            user_agent: config.effective_user_agent(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn api_url(credential: &Credential) -> String {
        format!("{}/player_api.php", credential.provider_url())
    }

    fn get_json(
        &self,
        credential: &Credential,
        action: Option<&str>,
        params: &[(&str, &str)],
    ) -> Result<Value, NetworkError> {
        let label = action.unwrap_or("authenticate");
        let mut request = self
            .agent
            .get(&Self::api_url(credential))
            .query("username", credential.username())
            .query("password", credential.password());
        if let Some(action) = action {
            request = request.query("action", action);
        }
        for (name, value) in params {
            request = request.query(*name, *value);
        }

        debug!(action = label, server = credential.provider_url(), "Provider request");

        let mut response = request
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json")
            .call()
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => NetworkError::Status {
                    action: label.to_string(),
                    status,
                },
                other => NetworkError::Transport {
                    action: label.to_string(),
                    reason: credential.redact(&other.to_string()),
                },
            })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(NetworkError::Status {
                action: label.to_string(),
                status,
            });
        }

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| NetworkError::Transport {
                action: label.to_string(),
                reason: credential.redact(&e.to_string()),
            })?;

        // Some panels answer an empty body for an empty category
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| NetworkError::Decode {
            action: label.to_string(),
            reason: e.to_string(),
        })
    }

    /// Validate the credential against the provider.
    ///
    /// A successful HTTP exchange whose `user_info.auth` is not set is a rejection,
    /// not a network problem.
    pub fn authenticate(&self, credential: &Credential) -> Result<SessionInfo, AuthError> {
        let body = self.get_json(credential, None, &[])?;
        let session = parse_auth(&body)?;
        info!(
            server = credential.provider_url(),
            status = %session.user.status,
            expiry = %session.user.expiry,
            "Authenticated"
        );
        Ok(session)
    }

    pub fn list_categories(
        &self,
        credential: &Credential,
        kind: MediaKind,
    ) -> Result<Vec<Category>, NetworkError> {
        let body = self.get_json(credential, Some(kind.categories_action()), &[])?;
        parse_categories(kind, body)
    }

    pub fn list_items(
        &self,
        credential: &Credential,
        kind: MediaKind,
        category_id: Option<&str>,
    ) -> Result<Vec<RawRecord>, NetworkError> {
        let params: Vec<(&str, &str)> = category_id
            .map(|id| vec![("category_id", id)])
            .unwrap_or_default();
        let body = self.get_json(credential, Some(kind.items_action()), &params)?;
        parse_items(kind, body)
    }

    /// Episodes of one series, ordered by season then episode number
    pub fn series_episodes(
        &self,
        credential: &Credential,
        series_id: &str,
    ) -> Result<Vec<Episode>, NetworkError> {
        let body = self.get_json(
            credential,
            Some("get_series_info"),
            &[("series_id", series_id)],
        )?;
        Ok(parse_episodes(&body))
    }
}

impl Provider for ProviderClient {
    fn authenticate(&self, credential: &Credential) -> Result<SessionInfo, AuthError> {
        ProviderClient::authenticate(self, credential)
    }

    fn list_categories(
        &self,
        credential: &Credential,
        kind: MediaKind,
    ) -> Result<Vec<Category>, NetworkError> {
        ProviderClient::list_categories(self, credential, kind)
    }

    fn list_items(
        &self,
        credential: &Credential,
        kind: MediaKind,
        category_id: Option<&str>,
    ) -> Result<Vec<RawRecord>, NetworkError> {
        ProviderClient::list_items(self, credential, kind, category_id)
    }

    fn series_episodes(
        &self,
        credential: &Credential,
        series_id: &str,
    ) -> Result<Vec<Episode>, NetworkError> {
        ProviderClient::series_episodes(self, credential, series_id)
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
