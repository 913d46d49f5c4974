//! MOVOS - Xtream Codes client core
//!
//! Provider client, catalog normalization, filtered paging, favorites/history and an
//! adaptive playback controller, wired together by [`App`].

pub mod api;
pub mod app;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod normalize;
pub mod player;
pub mod store;

pub use api::{Provider, ProviderClient, RawRecord};
pub use app::App;
pub use catalog::{CatalogEvent, CatalogLoader, CatalogSnapshot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use error::{AuthError, Error, NetworkError, PlaybackError, Result, StoreError};
pub use filter::{FilterEngine, FilterOptions, FilterState};
pub use models::{Category, Credential, Episode, MediaItem, MediaKey, MediaKind, SessionInfo};
pub use player::{MediaSink, PlaybackController, PlaybackOptions, PlaybackStatus};
pub use store::{CredentialStore, FileStore, KeyValueStore, MemoryStore, PreferenceStore};
