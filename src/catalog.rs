//! Catalog snapshots and the background loader that produces them
//!
//! Fetches run on worker threads and report back over a channel, the same way the
//! UI thread never blocks on the provider. Every request is stamped with a
//! generation; only the newest generation is ever handed out, so a slow response for
//! a kind the user already left is dropped instead of merged.

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::api::Provider;
use crate::error::NetworkError;
use crate::models::{Category, Credential, MediaItem, MediaKind};
use crate::normalize::{current_year, normalize_all};

/// Every item and category of one kind. Never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSnapshot {
    kind: MediaKind,
    categories: Vec<Category>,
    items: Vec<MediaItem>,
}

impl CatalogSnapshot {
    pub fn new(kind: MediaKind, categories: Vec<Category>, items: Vec<MediaItem>) -> Self {
        Self {
            kind,
            categories,
            items,
        }
    }

    pub fn empty(kind: MediaKind) -> Self {
        Self::new(kind, Vec::new(), Vec::new())
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn item(&self, id: &str) -> Option<&MediaItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Outcome of the most recent request
#[derive(Debug, Clone)]
pub enum CatalogEvent {
    Loaded(Arc<CatalogSnapshot>),
    Failed { kind: MediaKind, error: NetworkError },
}

struct Completed {
    generation: u64,
    kind: MediaKind,
    result: Result<CatalogSnapshot, NetworkError>,
}

pub struct CatalogLoader {
    provider: Arc<dyn Provider>,
    sender: Sender<Completed>,
    receiver: Receiver<Completed>,
    generation: u64,
    pending: Option<MediaKind>,
}

impl CatalogLoader {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        let (sender, receiver) = channel();
        Self {
            provider,
            sender,
            receiver,
            generation: 0,
            pending: None,
        }
    }

    /// Start loading categories and items for `kind`. Supersedes any earlier request.
    pub fn request(&mut self, credential: &Credential, kind: MediaKind) -> u64 {
        self.generation += 1;
        self.pending = Some(kind);

        let generation = self.generation;
        let provider = Arc::clone(&self.provider);
        let credential = credential.clone();
        let sender = self.sender.clone();

        debug!(%kind, generation, "Catalog request");

        thread::spawn(move || {
            let result = fetch_snapshot(provider, &credential, kind);
            // Receiver gone means the loader was dropped; nothing to report to
            let _ = sender.send(Completed {
                generation,
                kind,
                result,
            });
        });

        generation
    }

    /// Forget the in-flight request; its result will be discarded when it lands
    pub fn cancel(&mut self) {
        if let Some(kind) = self.pending.take() {
            debug!(%kind, generation = self.generation, "Catalog request cancelled");
        }
        self.generation += 1;
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_kind(&self) -> Option<MediaKind> {
        self.pending
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Non-blocking: the current request's outcome if it has arrived
    pub fn poll(&mut self) -> Option<CatalogEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(done) => {
                    if let Some(event) = self.accept(done) {
                        return Some(event);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// Block up to `timeout` for the current request's outcome
    pub fn wait(&mut self, timeout: Duration) -> Option<CatalogEvent> {
        let deadline = Instant::now() + timeout;
        while self.pending.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(done) => {
                    if let Some(event) = self.accept(done) {
                        return Some(event);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
        None
    }

    fn accept(&mut self, done: Completed) -> Option<CatalogEvent> {
        if done.generation != self.generation {
            debug!(
                kind = %done.kind,
                generation = done.generation,
                current = self.generation,
                "Discarding stale catalog response"
            );
            return None;
        }
        self.pending = None;

        Some(match done.result {
            Ok(snapshot) => {
                info!(
                    kind = %done.kind,
                    items = snapshot.len(),
                    categories = snapshot.categories().len(),
                    "Catalog loaded"
                );
                CatalogEvent::Loaded(Arc::new(snapshot))
            }
            Err(error) => {
                warn!(kind = %done.kind, error = %error, "Catalog load failed");
                CatalogEvent::Failed {
                    kind: done.kind,
                    error,
                }
            }
        })
    }
}

/// Categories and items in parallel, then normalize
fn fetch_snapshot(
    provider: Arc<dyn Provider>,
    credential: &Credential,
    kind: MediaKind,
) -> Result<CatalogSnapshot, NetworkError> {
    let categories_handle = {
        let provider = Arc::clone(&provider);
        let credential = credential.clone();
        thread::spawn(move || provider.list_categories(&credential, kind))
    };

    let items = provider.list_items(credential, kind, None);

    let categories = categories_handle.join().unwrap_or_else(|_| {
        Err(NetworkError::Transport {
            action: kind.categories_action().to_string(),
            reason: "categories thread panicked".to_string(),
        })
    })?;
    let items = normalize_all(&items?, credential, current_year());

    Ok(CatalogSnapshot::new(kind, categories, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RawRecord;
    use crate::error::AuthError;
    use crate::models::SessionInfo;
    use serde_json::json;
    use std::sync::Mutex;

    /// Provider whose per-kind answers can be delayed to force reordering
    struct ScriptedProvider {
        delays: Mutex<Vec<(MediaKind, Duration)>>,
        fail: Option<MediaKind>,
    }

    impl ScriptedProvider {
        fn new() -> Self {
            Self {
                delays: Mutex::new(Vec::new()),
                fail: None,
            }
        }

        fn delay(self, kind: MediaKind, by: Duration) -> Self {
            self.delays.lock().unwrap().push((kind, by));
            self
        }

        fn failing(mut self, kind: MediaKind) -> Self {
            self.fail = Some(kind);
            self
        }

        fn delay_for(&self, kind: MediaKind) -> Duration {
            self.delays
                .lock()
                .unwrap()
                .iter()
                .find(|(k, _)| *k == kind)
                .map(|(_, d)| *d)
                .unwrap_or(Duration::ZERO)
        }
    }

    impl Provider for ScriptedProvider {
        fn authenticate(&self, _: &Credential) -> Result<SessionInfo, AuthError> {
            Ok(SessionInfo::default())
        }

        fn list_categories(
            &self,
            _: &Credential,
            kind: MediaKind,
        ) -> Result<Vec<Category>, NetworkError> {
            Ok(vec![Category {
                id: format!("{}-cat", kind),
                name: kind.to_string(),
                parent_id: None,
            }])
        }

        fn list_items(
            &self,
            _: &Credential,
            kind: MediaKind,
            _: Option<&str>,
        ) -> Result<Vec<RawRecord>, NetworkError> {
            thread::sleep(self.delay_for(kind));
            if self.fail == Some(kind) {
                return Err(NetworkError::Transport {
                    action: kind.items_action().to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            Ok(vec![RawRecord::from_value(
                kind,
                json!({ "stream_id": 1, "series_id": 1, "name": format!("{} item", kind) }),
            )
            .unwrap()])
        }
    }

    fn cred() -> Credential {
        Credential::new("example.com", "u", "p").unwrap()
    }

    #[test]
    fn test_loads_snapshot() {
        let mut loader = CatalogLoader::new(Arc::new(ScriptedProvider::new()));
        loader.request(&cred(), MediaKind::Live);
        assert!(loader.is_loading());

        match loader.wait(Duration::from_secs(5)) {
            Some(CatalogEvent::Loaded(snapshot)) => {
                assert_eq!(snapshot.kind(), MediaKind::Live);
                assert_eq!(snapshot.len(), 1);
                assert_eq!(snapshot.categories()[0].id, "live-cat");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!loader.is_loading());
    }

    #[test]
    fn test_late_response_for_abandoned_kind_is_discarded() {
        let provider = ScriptedProvider::new().delay(MediaKind::Live, Duration::from_millis(300));
        let mut loader = CatalogLoader::new(Arc::new(provider));

        loader.request(&cred(), MediaKind::Live);
        loader.request(&cred(), MediaKind::Video);

        match loader.wait(Duration::from_secs(5)) {
            Some(CatalogEvent::Loaded(snapshot)) => assert_eq!(snapshot.kind(), MediaKind::Video),
            other => panic!("unexpected {:?}", other),
        }

        // The live answer still arrives, but must never surface
        thread::sleep(Duration::from_millis(500));
        assert!(loader.poll().is_none());
    }

    #[test]
    fn test_failure_reports_kind() {
        let provider = ScriptedProvider::new().failing(MediaKind::Series);
        let mut loader = CatalogLoader::new(Arc::new(provider));
        loader.request(&cred(), MediaKind::Series);
        match loader.wait(Duration::from_secs(5)) {
            Some(CatalogEvent::Failed { kind, error }) => {
                assert_eq!(kind, MediaKind::Series);
                assert!(matches!(error, NetworkError::Transport { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cancel_discards_in_flight() {
        let provider = ScriptedProvider::new().delay(MediaKind::Live, Duration::from_millis(100));
        let mut loader = CatalogLoader::new(Arc::new(provider));
        loader.request(&cred(), MediaKind::Live);
        loader.cancel();
        assert!(!loader.is_loading());
        thread::sleep(Duration::from_millis(300));
        assert!(loader.poll().is_none());
    }
}
