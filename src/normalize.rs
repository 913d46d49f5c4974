//! Raw provider records to `MediaItem`
//!
//! Upstream data is unreliable, so every optional field is defaulted rather than
//! rejected. Only a record without an identifier or a title is refused.

use chrono::Datelike;

use crate::api::{LiveRecord, RawRecord, SeriesRecord, VodRecord};
use crate::error::NormalizeError;
use crate::models::{Credential, MediaItem, MediaKind};

pub const NO_DESCRIPTION: &str = "No description";
pub const PLACEHOLDER_POSTER: &str = "https://via.placeholder.com/400x600?text=No+Image";
const DEFAULT_VOD_EXTENSION: &str = "mp4";
const LIVE_EXTENSION: &str = "ts";

/// Current calendar year, the fallback for records without a usable date
pub fn current_year() -> i32 {
    chrono::Utc::now().year()
}

/// Map one raw record. Pure: `current_year` is passed in.
pub fn normalize(
    raw: &RawRecord,
    credential: &Credential,
    current_year: i32,
) -> Result<MediaItem, NormalizeError> {
    match raw {
        RawRecord::Live(rec) => normalize_live(rec, credential, current_year),
        RawRecord::Video(rec) => normalize_vod(rec, credential, current_year),
        RawRecord::Series(rec) => normalize_series(rec, current_year),
    }
}

/// Normalize a whole listing, skipping (and logging) records that cannot be mapped
pub fn normalize_all(
    records: &[RawRecord],
    credential: &Credential,
    current_year: i32,
) -> Vec<MediaItem> {
    records
        .iter()
        .filter_map(|raw| match normalize(raw, credential, current_year) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping listing entry");
                None
            }
        })
        .collect()
}

fn pick_id(
    kind: MediaKind,
    stream_id: &Option<String>,
    series_id: &Option<String>,
    id: &Option<String>,
) -> Result<String, NormalizeError> {
    stream_id
        .as_deref()
        .or(series_id.as_deref())
        .or(id.as_deref())
        .map(str::to_string)
        .ok_or(NormalizeError::MissingId { kind })
}

fn pick_title(
    kind: MediaKind,
    id: &str,
    name: &Option<String>,
    title: &Option<String>,
) -> Result<String, NormalizeError> {
    name.as_deref()
        .or(title.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| NormalizeError::MissingTitle {
            kind,
            id: id.to_string(),
        })
}

fn parse_rating(raw: &Option<String>) -> f32 {
    raw.as_deref()
        .and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|r| r.is_finite())
        .unwrap_or(0.0)
}

/// Leading integer of a date-ish string: "2019-05-01" and "2019" both give 2019
fn leading_year(raw: &str) -> Option<i32> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.len() != 4 {
        return None;
    }
    digits.parse().ok().filter(|y| *y > 0)
}

/// Year of a Unix timestamp string
fn timestamp_year(raw: &str) -> Option<i32> {
    let ts = raw.trim().parse::<i64>().ok().filter(|ts| *ts > 0)?;
    chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.year())
}

fn resolve_year(dates: &[&Option<String>], timestamps: &[&Option<String>], current_year: i32) -> i32 {
    dates
        .iter()
        .filter_map(|d| d.as_deref())
        .find_map(leading_year)
        .or_else(|| {
            timestamps
                .iter()
                .filter_map(|t| t.as_deref())
                .find_map(timestamp_year)
        })
        .unwrap_or(current_year)
}

fn first_of(candidates: &[Option<&str>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn normalize_live(
    rec: &LiveRecord,
    credential: &Credential,
    current_year: i32,
) -> Result<MediaItem, NormalizeError> {
    let kind = MediaKind::Live;
    let id = pick_id(kind, &rec.stream_id, &rec.series_id, &rec.id)?;
    let title = pick_title(kind, &id, &rec.name, &rec.title)?;
    let icon = rec.stream_icon.as_deref();

    Ok(MediaItem {
        playback_url: Some(credential.playback_url(kind.path_segment(), &id, LIVE_EXTENSION)),
        year: resolve_year(&[], &[&rec.added], current_year),
        rating: parse_rating(&rec.rating),
        description: NO_DESCRIPTION.to_string(),
        poster_url: first_of(&[icon]).unwrap_or_else(|| PLACEHOLDER_POSTER.to_string()),
        backdrop_url: first_of(&[icon]).unwrap_or_default(),
        category_id: rec.category_id.clone(),
        id,
        kind,
        title,
    })
}

fn normalize_vod(
    rec: &VodRecord,
    credential: &Credential,
    current_year: i32,
) -> Result<MediaItem, NormalizeError> {
    let kind = MediaKind::Video;
    let id = pick_id(kind, &rec.stream_id, &rec.series_id, &rec.id)?;
    let title = pick_title(kind, &id, &rec.name, &rec.title)?;
    let ext = rec
        .container_extension
        .as_deref()
        .map(|e| e.trim().trim_start_matches('.'))
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_VOD_EXTENSION);
    let icon = rec.stream_icon.as_deref();
    let backdrop = rec.backdrop_path.first().map(String::as_str);

    Ok(MediaItem {
        playback_url: Some(credential.playback_url(kind.path_segment(), &id, ext)),
        year: resolve_year(
            &[&rec.release_date, &rec.release_date_alt, &rec.year],
            &[&rec.added],
            current_year,
        ),
        rating: parse_rating(&rec.rating),
        description: first_of(&[rec.plot.as_deref(), rec.description.as_deref()])
            .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        poster_url: first_of(&[icon]).unwrap_or_else(|| PLACEHOLDER_POSTER.to_string()),
        backdrop_url: first_of(&[backdrop, icon]).unwrap_or_default(),
        category_id: rec.category_id.clone(),
        id,
        kind,
        title,
    })
}

fn normalize_series(rec: &SeriesRecord, current_year: i32) -> Result<MediaItem, NormalizeError> {
    let kind = MediaKind::Series;
    let id = pick_id(kind, &rec.stream_id, &rec.series_id, &rec.id)?;
    let title = pick_title(kind, &id, &rec.name, &rec.title)?;
    let cover = rec.cover.as_deref();
    let backdrop = rec.backdrop_path.first().map(String::as_str);

    Ok(MediaItem {
        // Resolved per episode
        playback_url: None,
        year: resolve_year(
            &[&rec.release_date, &rec.release_date_alt],
            &[&rec.last_modified],
            current_year,
        ),
        rating: parse_rating(&rec.rating),
        description: first_of(&[rec.plot.as_deref(), rec.description.as_deref()])
            .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        poster_url: first_of(&[cover]).unwrap_or_else(|| PLACEHOLDER_POSTER.to_string()),
        backdrop_url: first_of(&[backdrop, cover]).unwrap_or_default(),
        category_id: rec.category_id.clone(),
        id,
        kind,
        title,
    })
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
