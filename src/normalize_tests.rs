//! Tests for catalog normalization

use super::*;
use crate::api::RawRecord;
use serde_json::json;

fn cred() -> Credential {
    Credential::new("http://example.com:8080/", "john", "secret").unwrap()
}

fn raw(kind: MediaKind, value: serde_json::Value) -> RawRecord {
    RawRecord::from_value(kind, value).unwrap()
}

#[test]
fn test_live_url_uses_ts() {
    let rec = raw(MediaKind::Live, json!({ "stream_id": 42, "name": "CNN", "category_id": "7" }));
    let item = normalize(&rec, &cred(), 2024).unwrap();
    assert_eq!(item.id, "42");
    assert_eq!(item.kind, MediaKind::Live);
    assert_eq!(
        item.playback_url.as_deref(),
        Some("http://example.com:8080/live/john/secret/42.ts")
    );
    assert_eq!(item.category_id.as_deref(), Some("7"));
    assert_eq!(item.poster_url, PLACEHOLDER_POSTER);
    assert_eq!(item.backdrop_url, "");
}

#[test]
fn test_vod_url_uses_container_extension() {
    let rec = raw(
        MediaKind::Video,
        json!({ "stream_id": "9", "name": "Film", "container_extension": "mkv" }),
    );
    let item = normalize(&rec, &cred(), 2024).unwrap();
    assert_eq!(
        item.playback_url.as_deref(),
        Some("http://example.com:8080/movie/john/secret/9.mkv")
    );

    let rec = raw(MediaKind::Video, json!({ "stream_id": 9, "name": "Film" }));
    let item = normalize(&rec, &cred(), 2024).unwrap();
    assert!(item.playback_url.unwrap().ends_with("/9.mp4"));
}

#[test]
fn test_series_has_no_playback_url() {
    let rec = raw(
        MediaKind::Series,
        json!({ "series_id": 3, "name": "Show", "cover": "http://img/c.jpg", "plot": "Plot" }),
    );
    let item = normalize(&rec, &cred(), 2024).unwrap();
    assert_eq!(item.id, "3");
    assert_eq!(item.playback_url, None);
    assert_eq!(item.poster_url, "http://img/c.jpg");
    assert_eq!(item.backdrop_url, "http://img/c.jpg");
    assert_eq!(item.description, "Plot");
}

#[test]
fn test_description_falls_back_to_description_field() {
    let rec = raw(
        MediaKind::Video,
        json!({ "stream_id": 5, "name": "Film", "plot": "  ", "description": "From panel" }),
    );
    let item = normalize(&rec, &cred(), 2024).unwrap();
    assert_eq!(item.description, "From panel");
}

#[test]
fn test_missing_rating_defaults_to_zero() {
    for kind in MediaKind::ALL {
        let rec = raw(kind, json!({ "id": 1, "name": "Anything" }));
        let item = normalize(&rec, &cred(), 2024).unwrap();
        assert_eq!(item.rating, 0.0);
        assert_eq!(item.description, NO_DESCRIPTION);
    }
}

#[test]
fn test_unparsable_numbers_default() {
    let rec = raw(
        MediaKind::Video,
        json!({ "stream_id": 1, "name": "X", "rating": "N/A", "releaseDate": "unknown" }),
    );
    let item = normalize(&rec, &cred(), 2031).unwrap();
    assert_eq!(item.rating, 0.0);
    assert_eq!(item.year, 2031);
}

#[test]
fn test_year_sources() {
    let rec = raw(
        MediaKind::Video,
        json!({ "stream_id": 1, "name": "X", "releaseDate": "2019-05-01", "rating": "7.8" }),
    );
    let item = normalize(&rec, &cred(), 2024).unwrap();
    assert_eq!(item.year, 2019);
    assert!((item.rating - 7.8).abs() < 1e-6);

    // last_modified is a Unix timestamp, not a year
    let rec = raw(
        MediaKind::Series,
        json!({ "series_id": 1, "name": "X", "last_modified": "1612345678" }),
    );
    assert_eq!(normalize(&rec, &cred(), 2024).unwrap().year, 2021);
}

#[test]
fn test_live_year_from_added_timestamp() {
    let rec = raw(
        MediaKind::Live,
        json!({ "stream_id": 3, "name": "News", "added": "1612345678" }),
    );
    assert_eq!(normalize(&rec, &cred(), 2024).unwrap().year, 2021);

    // Without any timestamp the current year is used
    let rec = raw(MediaKind::Live, json!({ "stream_id": 3, "name": "News" }));
    assert_eq!(normalize(&rec, &cred(), 2024).unwrap().year, 2024);
}

#[test]
fn test_id_fallback_order() {
    let rec = raw(
        MediaKind::Video,
        json!({ "series_id": 5, "id": 6, "name": "X" }),
    );
    assert_eq!(normalize(&rec, &cred(), 2024).unwrap().id, "5");

    let rec = raw(MediaKind::Live, json!({ "id": 6, "title": "From title" }));
    let item = normalize(&rec, &cred(), 2024).unwrap();
    assert_eq!(item.id, "6");
    assert_eq!(item.title, "From title");
}

#[test]
fn test_missing_id_or_title_fails() {
    let rec = raw(MediaKind::Live, json!({ "name": "No id" }));
    assert_eq!(
        normalize(&rec, &cred(), 2024),
        Err(NormalizeError::MissingId { kind: MediaKind::Live })
    );

    let rec = raw(MediaKind::Video, json!({ "stream_id": 2, "name": "   " }));
    assert_eq!(
        normalize(&rec, &cred(), 2024),
        Err(NormalizeError::MissingTitle {
            kind: MediaKind::Video,
            id: "2".to_string()
        })
    );
}

#[test]
fn test_backdrop_prefers_backdrop_path() {
    let rec = raw(
        MediaKind::Video,
        json!({
            "stream_id": 1,
            "name": "X",
            "stream_icon": "http://img/icon.png",
            "backdrop_path": ["http://img/back1.jpg", "http://img/back2.jpg"]
        }),
    );
    let item = normalize(&rec, &cred(), 2024).unwrap();
    assert_eq!(item.poster_url, "http://img/icon.png");
    assert_eq!(item.backdrop_url, "http://img/back1.jpg");
}

#[test]
fn test_normalize_all_skips_bad_records() {
    let records = vec![
        raw(MediaKind::Live, json!({ "stream_id": 1, "name": "A" })),
        raw(MediaKind::Live, json!({ "name": "B" })),
        raw(MediaKind::Live, json!({ "stream_id": 3, "name": "C" })),
    ];
    let items = normalize_all(&records, &cred(), 2024);
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);
}

#[test]
fn test_normalize_is_deterministic() {
    let rec = raw(MediaKind::Video, json!({ "stream_id": 1, "name": "A", "rating": 5 }));
    assert_eq!(
        normalize(&rec, &cred(), 2024).unwrap(),
        normalize(&rec, &cred(), 2024).unwrap()
    );
}
