//! Tests for player API payload interpretation

use super::*;
use serde_json::json;

#[test]
fn test_auth_accepts_numeric_and_string_flags() {
    for flag in [json!(1), json!("1"), json!(true)] {
        let body = json!({
            "user_info": { "auth": flag, "username": "john", "status": "Active" },
            "server_info": { "url": "example.com", "port": "8080", "timezone": "UTC" }
        });
        let session = parse_auth(&body).unwrap();
        assert_eq!(session.user.username, "john");
        assert_eq!(session.user.status, "Active");
        assert_eq!(session.server.port, "8080");
    }
}

#[test]
fn test_auth_zero_is_rejection() {
    let body = json!({ "user_info": { "auth": 0, "message": "Invalid login" } });
    assert_eq!(
        parse_auth(&body),
        Err(AuthError::Rejected {
            message: Some("Invalid login".to_string())
        })
    );
}

#[test]
fn test_auth_missing_user_info_is_rejection() {
    assert!(matches!(parse_auth(&json!([])), Err(AuthError::Rejected { .. })));
    assert!(matches!(
        parse_auth(&json!({ "user_info": [] })),
        Err(AuthError::Rejected { .. })
    ));
}

#[test]
fn test_auth_account_details() {
    let body = json!({
        "user_info": {
            "auth": 1,
            "username": "john",
            "status": "Active",
            "exp_date": "1735689600",
            "is_trial": "0",
            "active_cons": 1,
            "max_connections": "2"
        }
    });
    let session = parse_auth(&body).unwrap();
    assert_eq!(session.user.expiry, "2025-01-01");
    assert!(!session.user.is_trial);
    assert_eq!(session.user.active_connections, "1");
    assert_eq!(session.user.max_connections, "2");
    assert_eq!(session.server, ServerInfo::default());

    let no_expiry = json!({ "user_info": { "auth": 1, "exp_date": null } });
    assert_eq!(parse_auth(&no_expiry).unwrap().user.expiry, "Unlimited");
}

#[test]
fn test_categories_accept_numeric_ids() {
    let body = json!([
        { "category_id": "1", "category_name": "Sports", "parent_id": 0 },
        { "category_id": 2, "category_name": "News" },
        { "category_name": "No id" }
    ]);
    let cats = parse_categories(MediaKind::Live, body).unwrap();
    assert_eq!(cats.len(), 2);
    assert_eq!(cats[0].id, "1");
    assert_eq!(cats[0].parent_id.as_deref(), Some("0"));
    assert_eq!(cats[1].id, "2");
    assert_eq!(cats[1].parent_id, None);
}

#[test]
fn test_items_skip_non_objects() {
    let body = json!([
        { "stream_id": 10, "name": "CNN", "category_id": "3" },
        "garbage",
        42,
        { "stream_id": "11", "name": "BBC" }
    ]);
    let items = parse_items(MediaKind::Live, body).unwrap();
    assert_eq!(items.len(), 2);
    match &items[0] {
        RawRecord::Live(rec) => {
            assert_eq!(rec.stream_id.as_deref(), Some("10"));
            assert_eq!(rec.category_id.as_deref(), Some("3"));
        }
        other => panic!("unexpected record {:?}", other),
    }
}

#[test]
fn test_items_empty_object_is_empty_listing() {
    assert!(parse_items(MediaKind::Video, json!({})).unwrap().is_empty());
    assert!(parse_items(MediaKind::Video, Value::Null).unwrap().is_empty());
    assert!(matches!(
        parse_items(MediaKind::Video, json!("nope")),
        Err(NetworkError::Decode { .. })
    ));
}

#[test]
fn test_vod_record_lenient_fields() {
    let body = json!([{
        "stream_id": 5,
        "name": "Movie",
        "rating": 7.5,
        "container_extension": "mkv",
        "backdrop_path": "http://img/b.jpg",
        "releaseDate": "2019-05-01",
        "tmdb_id": { "nested": true }
    }]);
    let items = parse_items(MediaKind::Video, body).unwrap();
    let RawRecord::Video(rec) = &items[0] else {
        panic!("expected vod record");
    };
    assert_eq!(rec.rating.as_deref(), Some("7.5"));
    assert_eq!(rec.backdrop_path, vec!["http://img/b.jpg".to_string()]);
    assert_eq!(rec.release_date.as_deref(), Some("2019-05-01"));
}

#[test]
fn test_series_episodes_by_season_map() {
    let body = json!({
        "episodes": {
            "2": [ { "id": "201", "episode_num": 1, "title": "S2E1", "container_extension": "mkv" } ],
            "1": [
                { "id": "102", "episode_num": "2", "title": "S1E2" },
                { "id": "101", "episode_num": 1, "title": "S1E1", "season": 1 }
            ]
        }
    });
    let eps = parse_episodes(&body);
    let ids: Vec<&str> = eps.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["101", "102", "201"]);
    assert_eq!(eps[2].season, 2);
    assert_eq!(eps[2].container_extension, "mkv");
    assert_eq!(eps[0].container_extension, "mp4");
}

#[test]
fn test_series_episodes_list_of_lists() {
    let body = json!({
        "episodes": [[ { "id": 9, "season": 3, "episode_num": 4 } ]]
    });
    let eps = parse_episodes(&body);
    assert_eq!(eps.len(), 1);
    assert_eq!(eps[0].id, "9");
    assert_eq!(eps[0].season, 3);
    assert_eq!(eps[0].title, "Episode 4");
}
