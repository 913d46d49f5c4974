//! Application state shared by every front end
//!
//! `App` owns the logged-in credential, the catalog loader, the filter engine over the
//! current snapshot, the preference stores and the playback controller. A render
//! surface calls one method per user input and calls [`App::poll`] from its frame or
//! event loop to pick up finished loads, due search terms and playback events.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::api::Provider;
use crate::catalog::{CatalogEvent, CatalogLoader, CatalogSnapshot};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::error::{Error, NetworkError, Result};
use crate::filter::{FilterEngine, FilterOptions, FilterState};
use crate::models::{Category, Credential, Episode, MediaItem, MediaKind, SessionInfo};
use crate::player::{PlaybackController, PlaybackSession, PlaybackStatus, SessionId};
use crate::store::{CredentialStore, KeyValueStore, PreferenceStore};

pub struct App {
    config: AppConfig,
    provider: Arc<dyn Provider>,
    credentials: CredentialStore,
    preferences: PreferenceStore,
    credential: Option<Credential>,
    session_info: Option<SessionInfo>,
    loader: CatalogLoader,
    engine: FilterEngine,
    kind: MediaKind,
    last_error: Option<NetworkError>,
    player: PlaybackController,
}

impl App {
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn Provider>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        player: PlaybackController,
    ) -> Self {
        let kind = MediaKind::Live;
        let engine = FilterEngine::empty(kind, clock, FilterOptions::from(&config));
        Self {
            credentials: CredentialStore::new(Arc::clone(&store)),
            preferences: PreferenceStore::open(store, config.history_limit),
            loader: CatalogLoader::new(Arc::clone(&provider)),
            provider,
            credential: None,
            session_info: None,
            engine,
            kind,
            last_error: None,
            player,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// Pick up a stored login and start loading the current kind.
    /// Returns whether a credential was found.
    pub fn restore(&mut self) -> bool {
        match self.credentials.load() {
            Some(credential) => {
                info!(server = credential.provider_url(), "Restored saved login");
                self.credential = Some(credential);
                self.request_catalog();
                true
            }
            None => false,
        }
    }

    /// Authenticate, then persist the credential. Nothing is stored on failure.
    pub fn login(&mut self, url: &str, username: &str, password: &str) -> Result<&SessionInfo> {
        let credential = Credential::new(url, username, password)?;
        let session = self.provider.authenticate(&credential)?;
        self.credentials.save(&credential)?;

        info!(server = credential.provider_url(), user = credential.username(), "Logged in");
        self.loader.cancel();
        // Stream URLs embed the previous login
        self.player.close();
        self.credential = Some(credential);
        self.last_error = None;
        self.engine
            .replace_snapshot(Arc::new(CatalogSnapshot::empty(self.kind)));
        self.request_catalog();
        Ok(self.session_info.insert(session))
    }

    pub fn logout(&mut self) -> Result<()> {
        self.loader.cancel();
        self.player.close();
        self.credential = None;
        self.session_info = None;
        self.last_error = None;
        self.engine
            .replace_snapshot(Arc::new(CatalogSnapshot::empty(self.kind)));
        self.credentials.clear()?;
        info!("Logged out");
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.credential.is_some()
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Account details from the last successful login
    pub fn session_info(&self) -> Option<&SessionInfo> {
        self.session_info.as_ref()
    }

    fn require_credential(&self) -> Result<&Credential> {
        self.credential.as_ref().ok_or(Error::NotLoggedIn)
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    fn request_catalog(&mut self) {
        if let Some(credential) = self.credential.as_ref() {
            self.loader.request(credential, self.kind);
        }
    }

    /// Switch to another kind. The old kind's in-flight load is abandoned.
    pub fn select_kind(&mut self, kind: MediaKind) -> Result<()> {
        self.require_credential()?;
        if kind == self.kind && (self.loader.is_loading() || !self.engine.snapshot().is_empty()) {
            return Ok(());
        }
        self.kind = kind;
        self.last_error = None;
        self.engine
            .replace_snapshot(Arc::new(CatalogSnapshot::empty(kind)));
        self.request_catalog();
        Ok(())
    }

    /// Reload the current kind, keeping category and search
    pub fn refresh(&mut self) -> Result<()> {
        self.require_credential()?;
        self.request_catalog();
        Ok(())
    }

    /// Apply whatever is due. Returns true when the visible listing or playback changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        if let Some(event) = self.loader.poll() {
            self.apply_catalog(event);
            changed = true;
        }
        changed |= self.engine.tick();
        changed |= self.player.poll().is_some();
        changed
    }

    /// Block until the pending catalog load lands or `timeout` passes
    pub fn wait_for_catalog(&mut self, timeout: Duration) -> bool {
        match self.loader.wait(timeout) {
            Some(event) => {
                self.apply_catalog(event);
                true
            }
            None => false,
        }
    }

    fn apply_catalog(&mut self, event: CatalogEvent) {
        match event {
            CatalogEvent::Loaded(snapshot) => {
                self.last_error = None;
                self.engine.replace_snapshot(snapshot);
            }
            CatalogEvent::Failed { kind, error } => {
                // Keep the failure around for a retry prompt; show an empty listing
                self.engine
                    .replace_snapshot(Arc::new(CatalogSnapshot::empty(kind)));
                self.last_error = Some(error);
            }
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }

    /// Last catalog failure; cleared by the next successful load
    pub fn last_error(&self) -> Option<&NetworkError> {
        self.last_error.as_ref()
    }

    pub fn snapshot(&self) -> &Arc<CatalogSnapshot> {
        self.engine.snapshot()
    }

    pub fn categories(&self) -> &[Category] {
        self.engine.snapshot().categories()
    }

    // -----------------------------------------------------------------------
    // Filtering
    // -----------------------------------------------------------------------

    pub fn select_category(&mut self, category_id: Option<String>) {
        self.engine.set_category(category_id);
    }

    pub fn set_search(&mut self, term: &str) {
        self.engine.set_search_term(term);
    }

    /// Apply the typed search term without waiting for the debounce
    pub fn flush_search(&mut self) -> bool {
        self.engine.flush_search()
    }

    pub fn reveal_more(&mut self) -> bool {
        self.engine.reveal_more()
    }

    pub fn should_reveal_more(&self, last_shown_index: usize) -> bool {
        self.engine.should_reveal_more(last_shown_index)
    }

    pub fn visible(&self) -> Vec<&MediaItem> {
        self.engine.visible()
    }

    pub fn filtered_len(&self) -> usize {
        self.engine.filtered_len()
    }

    pub fn filter_state(&self) -> FilterState {
        self.engine.state()
    }

    // -----------------------------------------------------------------------
    // Preferences
    // -----------------------------------------------------------------------

    pub fn toggle_favorite(&mut self, item: &MediaItem) -> Result<bool> {
        Ok(self.preferences.toggle_favorite(item)?)
    }

    pub fn is_favorite(&self, item: &MediaItem) -> bool {
        self.preferences.is_favorite(item)
    }

    pub fn favorites(&self) -> &[MediaItem] {
        self.preferences.favorites()
    }

    pub fn history(&self) -> &[MediaItem] {
        self.preferences.history()
    }

    pub fn clear_history(&mut self) -> Result<()> {
        Ok(self.preferences.clear_history()?)
    }

    /// Select an item of the current kind: record the visit and hand the item back.
    /// Falls back to favorites and history so saved items open without a loaded catalog.
    pub fn open_item(&mut self, id: &str) -> Result<MediaItem> {
        let item = self
            .engine
            .snapshot()
            .item(id)
            .or_else(|| {
                self.preferences
                    .favorites()
                    .iter()
                    .chain(self.preferences.history())
                    .find(|i| i.kind == self.kind && i.id == id)
            })
            .cloned()
            .ok_or_else(|| Error::UnknownItem {
                kind: self.kind,
                id: id.to_string(),
            })?;

        if let Err(e) = self.preferences.record_visit(&item) {
            // A failed history write should not block playback
            warn!(error = %e, "Cannot record visit");
        }
        Ok(item)
    }

    /// Episodes of a series item
    pub fn series_episodes(&self, series_id: &str) -> Result<Vec<Episode>> {
        let credential = self.require_credential()?;
        Ok(self.provider.series_episodes(credential, series_id)?)
    }

    // -----------------------------------------------------------------------
    // Playback
    // -----------------------------------------------------------------------

    pub fn play(&mut self, item: &MediaItem) -> Result<SessionId> {
        let url = item
            .playback_url
            .as_deref()
            .ok_or_else(|| Error::NotPlayable(item.title.clone()))?;
        Ok(self.player.open(url))
    }

    pub fn play_episode(&mut self, episode: &Episode) -> Result<SessionId> {
        let url = episode.playback_url(self.require_credential()?);
        Ok(self.player.open(&url))
    }

    pub fn close_player(&mut self) {
        self.player.close();
    }

    pub fn playback_status(&self) -> PlaybackStatus {
        self.player.status()
    }

    pub fn playback(&self) -> Option<&PlaybackSession> {
        self.player.session()
    }

    pub fn player(&self) -> &PlaybackController {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut PlaybackController {
        &mut self.player
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
