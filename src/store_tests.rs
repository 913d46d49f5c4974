//! Tests for credential and preference persistence

use super::*;
use crate::models::MediaKind;

fn item(kind: MediaKind, id: &str) -> MediaItem {
    MediaItem {
        id: id.to_string(),
        kind,
        title: format!("Item {}", id),
        year: 2024,
        rating: 0.0,
        description: "No description".to_string(),
        poster_url: String::new(),
        backdrop_url: String::new(),
        playback_url: None,
        category_id: None,
    }
}

fn memory() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// Store whose writes always fail
struct ReadOnlyStore;

impl KeyValueStore for ReadOnlyStore {
    fn read(&self, _: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn write(&self, key: &str, _: &str) -> Result<(), StoreError> {
        Err(StoreError::Io {
            key: key.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }

    fn remove(&self, _: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

#[test]
fn test_toggle_favorite_is_involution() {
    let store = memory();
    let mut prefs = PreferenceStore::new(store.clone(), DEFAULT_HISTORY_LIMIT);
    prefs.toggle_favorite(&item(MediaKind::Live, "1")).unwrap();
    let original: Vec<MediaItem> = prefs.favorites().to_vec();

    let x = item(MediaKind::Video, "2");
    assert!(prefs.toggle_favorite(&x).unwrap());
    assert!(prefs.is_favorite(&x));
    assert!(!prefs.toggle_favorite(&x).unwrap());
    assert_eq!(prefs.favorites(), &original[..]);

    // Persisted state matches too
    let reloaded = PreferenceStore::open(store, DEFAULT_HISTORY_LIMIT);
    assert_eq!(reloaded.favorites(), &original[..]);
}

#[test]
fn test_favorites_keep_insertion_order() {
    let mut prefs = PreferenceStore::new(memory(), DEFAULT_HISTORY_LIMIT);
    for id in ["3", "1", "2"] {
        prefs.toggle_favorite(&item(MediaKind::Live, id)).unwrap();
    }
    let ids: Vec<&str> = prefs.favorites().iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["3", "1", "2"]);
}

#[test]
fn test_same_id_different_kind_are_distinct() {
    let mut prefs = PreferenceStore::new(memory(), DEFAULT_HISTORY_LIMIT);
    prefs.toggle_favorite(&item(MediaKind::Live, "7")).unwrap();
    prefs.toggle_favorite(&item(MediaKind::Video, "7")).unwrap();
    assert_eq!(prefs.favorites().len(), 2);
}

#[test]
fn test_record_visit_twice_moves_to_front() {
    let mut prefs = PreferenceStore::new(memory(), DEFAULT_HISTORY_LIMIT);
    prefs.record_visit(&item(MediaKind::Live, "a")).unwrap();
    prefs.record_visit(&item(MediaKind::Live, "b")).unwrap();
    let x = item(MediaKind::Live, "x");
    prefs.record_visit(&x).unwrap();
    let len = prefs.history().len();

    prefs.record_visit(&x).unwrap();
    assert_eq!(prefs.history().len(), len);
    assert!(prefs.history()[0].same_as(&x));

    prefs.record_visit(&item(MediaKind::Live, "a")).unwrap();
    let ids: Vec<&str> = prefs.history().iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "x", "b"]);
}

#[test]
fn test_history_is_bounded() {
    let mut prefs = PreferenceStore::new(memory(), DEFAULT_HISTORY_LIMIT);
    for i in 0..30 {
        prefs.record_visit(&item(MediaKind::Video, &i.to_string())).unwrap();
    }
    assert_eq!(prefs.history().len(), 20);
    assert_eq!(prefs.history()[0].id, "29");
    assert_eq!(prefs.history()[19].id, "10");
}

#[test]
fn test_malformed_records_load_empty() {
    let store = memory();
    store.write(FAVORITES_KEY, "{ definitely not json").unwrap();
    store.write(HISTORY_KEY, r#"{"unexpected": "shape"}"#).unwrap();
    store.write(CREDENTIAL_KEY, "[]").unwrap();

    let prefs = PreferenceStore::open(store.clone(), DEFAULT_HISTORY_LIMIT);
    assert!(prefs.favorites().is_empty());
    assert!(prefs.history().is_empty());
    assert!(CredentialStore::new(store).load().is_none());
}

#[test]
fn test_failed_write_rolls_back() {
    let mut prefs = PreferenceStore::new(Arc::new(ReadOnlyStore), DEFAULT_HISTORY_LIMIT);
    let x = item(MediaKind::Live, "1");
    assert!(prefs.toggle_favorite(&x).is_err());
    assert!(prefs.favorites().is_empty());
    assert!(prefs.record_visit(&x).is_err());
    assert!(prefs.history().is_empty());
}

#[test]
fn test_clear_history() {
    let store = memory();
    let mut prefs = PreferenceStore::new(store.clone(), DEFAULT_HISTORY_LIMIT);
    prefs.record_visit(&item(MediaKind::Live, "1")).unwrap();
    prefs.clear_history().unwrap();
    assert!(prefs.history().is_empty());
    assert!(PreferenceStore::open(store, DEFAULT_HISTORY_LIMIT).history().is_empty());
}

#[test]
fn test_credential_round_trip_and_clear() {
    let store = memory();
    let creds = CredentialStore::new(store.clone());
    assert!(creds.load().is_none());

    let credential = Credential::new("example.com/", "john", "secret").unwrap();
    creds.save(&credential).unwrap();
    assert_eq!(creds.load(), Some(credential));

    creds.clear().unwrap();
    assert!(creds.load().is_none());
    assert!(!store.contains(CREDENTIAL_KEY));
}

#[test]
fn test_file_store_replaces_whole_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("data"));
    assert_eq!(store.read("history").unwrap(), None);

    store.write("history", "[1,2,3]").unwrap();
    store.write("history", "[4]").unwrap();
    assert_eq!(store.read("history").unwrap().as_deref(), Some("[4]"));

    // No temp files left behind
    assert_eq!(file_names(store.dir()), vec!["history.json".to_string()]);

    store.remove("history").unwrap();
    store.remove("history").unwrap();
    assert_eq!(store.read("history").unwrap(), None);
}

fn file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_file_store_failed_replace_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());

    // A non-empty directory in the record's place makes the final rename fail
    let blocker = dir.path().join("favorites.json");
    std::fs::create_dir(&blocker).unwrap();
    std::fs::write(blocker.join("keep"), "x").unwrap();

    assert!(matches!(
        store.write("favorites", "[]"),
        Err(StoreError::Io { .. })
    ));
    assert_eq!(file_names(dir.path()), vec!["favorites.json".to_string()]);
}

#[test]
fn test_preferences_survive_reopen_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()));
    {
        let mut prefs = PreferenceStore::open(store.clone(), DEFAULT_HISTORY_LIMIT);
        prefs.toggle_favorite(&item(MediaKind::Series, "9")).unwrap();
        prefs.record_visit(&item(MediaKind::Live, "4")).unwrap();
    }
    let prefs = PreferenceStore::open(store, DEFAULT_HISTORY_LIMIT);
    assert_eq!(prefs.favorites().len(), 1);
    assert_eq!(prefs.favorites()[0].kind, MediaKind::Series);
    assert_eq!(prefs.history()[0].id, "4");
}
