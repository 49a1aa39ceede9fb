//! Record normalizer
//!
//! Converts raw remote change records (underscore-separated field names, any
//! field optional or mistyped) into canonical entities. Normalization is total:
//! missing or invalid fields take their documented default and nothing here
//! returns an error. Every call builds a fresh value from the raw input.
//!
//! Defaults:
//!
//! | Field                         | Default            |
//! |-------------------------------|--------------------|
//! | dates                         | now (per call)     |
//! | strings                       | `""`               |
//! | lists                         | `[]`               |
//! | song `difficulty`             | 1 (clamped 1..=5)  |
//! | song `bpm` (remote `tempo`)   | 120                |
//! | song `confidence_level`       | 1                  |
//! | song `visibility`             | band               |
//! | `version`                     | 0                  |
//! | setlist `status`              | draft              |
//! | show `status`                 | upcoming           |
//! | show / practice `duration`    | 120 minutes        |
//! | practice `status`             | always scheduled   |

use bandsync_common::models::{
    PracticeSession, PracticeStatus, PracticeType, ReferenceLink, Setlist, SetlistItem,
    SetlistItemKind, SetlistStatus, Show, ShowStatus, Song, Visibility,
};
use bandsync_common::time::{self, parse_date, parse_optional_date};
use bandsync_common::values::{
    field, first_field, to_i64_or, to_optional_i64, to_optional_string, to_string_list,
    to_string_or_empty, to_value_list,
};
use bandsync_common::{Entity, EntityKind};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

const DEFAULT_DIFFICULTY: i64 = 1;
const DEFAULT_BPM: i64 = 120;
const DEFAULT_CONFIDENCE: i64 = 1;
const DEFAULT_SHOW_DURATION_MIN: i64 = 120;
const DEFAULT_PRACTICE_DURATION_MIN: i64 = 120;

/// Normalize a raw record of the given kind
pub fn normalize(kind: EntityKind, record: &Value) -> Entity {
    match kind {
        EntityKind::Song => Entity::Song(normalize_song(record)),
        EntityKind::Setlist => Entity::Setlist(normalize_setlist(record)),
        EntityKind::Show => Entity::Show(normalize_show(record)),
        EntityKind::PracticeSession => Entity::PracticeSession(normalize_practice_session(record)),
    }
}

/// Map a remote `songs` row to a [`Song`]
pub fn normalize_song(record: &Value) -> Song {
    let now = time::now();

    Song {
        id: text(record, "id"),
        title: text(record, "title"),
        artist: text(record, "artist"),
        album: optional_text(record, "album"),
        key: text(record, "key"),
        bpm: positive_or(record, "tempo", DEFAULT_BPM),
        duration: to_i64_or(field(record, "duration"), 0).max(0),
        difficulty: positive_or(record, "difficulty", DEFAULT_DIFFICULTY).clamp(1, 5),
        guitar_tuning: optional_text(record, "guitar_tuning"),
        lyrics: optional_text(record, "lyrics"),
        notes: text(record, "notes"),
        structure: to_string_list(field(record, "structure")),
        chords: to_string_list(field(record, "chords")),
        tags: to_string_list(field(record, "tags")),
        reference_links: reference_links(field(record, "reference_links")),
        created_date: date(record, "created_date", now),
        last_practiced: parse_optional_date(field(record, "last_practiced")),
        confidence_level: positive_or(record, "confidence_level", DEFAULT_CONFIDENCE),
        context_type: text(record, "context_type"),
        context_id: text(record, "context_id"),
        created_by: text(record, "created_by"),
        visibility: enum_or_default(record, "visibility", Visibility::parse),
        song_group_id: optional_text(record, "song_group_id"),
        linked_from_song_id: optional_text(record, "linked_from_song_id"),
        version: version(record),
        last_modified_by: optional_text(record, "last_modified_by"),
    }
}

/// Map a remote `setlists` row to a [`Setlist`]
///
/// `total_duration` is left at 0; callers recompute it against their song
/// catalog with [`Setlist::recompute_total_duration`].
pub fn normalize_setlist(record: &Value) -> Setlist {
    let now = time::now();

    Setlist {
        id: text(record, "id"),
        name: text(record, "name"),
        band_id: text(record, "band_id"),
        items: setlist_items(field(record, "items")),
        total_duration: 0,
        status: enum_or_default(record, "status", SetlistStatus::parse),
        notes: text(record, "notes"),
        created_date: date(record, "created_date", now),
        last_modified: date(record, "last_modified", now),
        version: version(record),
        last_modified_by: optional_text(record, "last_modified_by"),
    }
}

/// Map a remote `shows` row to a [`Show`]
pub fn normalize_show(record: &Value) -> Show {
    let now = time::now();

    Show {
        id: text(record, "id"),
        name: text(record, "name"),
        venue: text(record, "venue"),
        location: text(record, "location"),
        scheduled_date: date(record, "scheduled_date", now),
        duration: positive_or(record, "duration", DEFAULT_SHOW_DURATION_MIN),
        load_in_time: parse_optional_date(field(record, "load_in_time")),
        soundcheck_time: parse_optional_date(field(record, "soundcheck_time")),
        band_id: text(record, "band_id"),
        setlist_id: optional_text(record, "setlist_id"),
        status: enum_or_default(record, "status", ShowStatus::parse),
        notes: text(record, "notes"),
        created_date: date(record, "created_date", now),
        updated_date: date(record, "updated_date", now),
        version: version(record),
        last_modified_by: optional_text(record, "last_modified_by"),
    }
}

/// Map a remote `practice_sessions` row to a [`PracticeSession`]
///
/// The remote `status` is discarded: the local copy is always `Scheduled`.
pub fn normalize_practice_session(record: &Value) -> PracticeSession {
    let now = time::now();

    if let Some(status) = to_optional_string(field(record, "status")) {
        if PracticeStatus::parse(&status) != Some(PracticeStatus::Scheduled) {
            debug!(
                "Practice session {}: remote status '{}' replaced with 'scheduled'",
                text(record, "id"),
                status
            );
        }
    }

    PracticeSession {
        id: text(record, "id"),
        scheduled_date: date(record, "scheduled_date", now),
        start_time: parse_optional_date(field(record, "start_time")),
        end_time: parse_optional_date(field(record, "end_time")),
        duration: positive_or(record, "duration", DEFAULT_PRACTICE_DURATION_MIN),
        location: text(record, "location"),
        session_type: enum_or_default(record, "type", PracticeType::parse),
        status: PracticeStatus::Scheduled,
        objectives: to_string_list(field(record, "objectives")),
        completed_objectives: to_string_list(field(record, "completed_objectives")),
        songs: practice_song_ids(field(record, "songs")),
        band_id: text(record, "band_id"),
        setlist_id: optional_text(record, "setlist_id"),
        notes: text(record, "notes"),
        wrapup_notes: optional_text(record, "wrapup_notes"),
        attendees: to_string_list(field(record, "attendees")),
        created_date: date(record, "created_date", now),
        version: version(record),
        last_modified_by: optional_text(record, "last_modified_by"),
    }
}

fn text(record: &Value, name: &str) -> String {
    to_string_or_empty(field(record, name))
}

fn optional_text(record: &Value, name: &str) -> Option<String> {
    to_optional_string(field(record, name))
}

fn date(record: &Value, name: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    parse_date(field(record, name), Some(fallback))
}

fn version(record: &Value) -> i64 {
    to_i64_or(field(record, "version"), 0)
}

/// Zero and negative values are treated as absent
fn positive_or(record: &Value, name: &str, default: i64) -> i64 {
    match to_optional_i64(field(record, name)) {
        Some(n) if n > 0 => n,
        _ => default,
    }
}

fn enum_or_default<T: Default>(record: &Value, name: &str, parse: fn(&str) -> Option<T>) -> T {
    to_optional_string(field(record, name))
        .and_then(|raw| parse(&raw))
        .unwrap_or_default()
}

fn reference_links(value: Option<&Value>) -> Vec<ReferenceLink> {
    to_value_list(value)
        .iter()
        .filter_map(|link| match link {
            Value::String(url) if !url.trim().is_empty() => Some(ReferenceLink {
                link_type: "other".to_string(),
                url: url.clone(),
                description: None,
            }),
            Value::Object(_) => {
                let url = to_optional_string(field(link, "url"))?;
                Some(ReferenceLink {
                    link_type: to_optional_string(field(link, "type"))
                        .unwrap_or_else(|| "other".to_string()),
                    url,
                    description: to_optional_string(field(link, "description")),
                })
            }
            _ => None,
        })
        .collect()
}

fn setlist_items(value: Option<&Value>) -> Vec<SetlistItem> {
    let mut parsed: Vec<(Option<i64>, SetlistItem)> = to_value_list(value)
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| setlist_item(index, raw))
        .collect();

    // Positioned items first in position order; the rest keep input order
    parsed.sort_by_key(|(position, _)| (position.is_none(), position.unwrap_or(0)));

    parsed
        .into_iter()
        .enumerate()
        .map(|(index, (position, mut item))| {
            item.position = position.unwrap_or(index as i64 + 1);
            item
        })
        .collect()
}

fn setlist_item(index: usize, raw: &Value) -> Option<(Option<i64>, SetlistItem)> {
    if !raw.is_object() {
        debug!("Dropping setlist item {}: not an object", index);
        return None;
    }

    let item_type = to_string_or_empty(field(raw, "type"));
    let kind = match item_type.as_str() {
        "song" => SetlistItemKind::Song {
            song_id: to_string_or_empty(first_field(raw, &["song_id", "songId"])),
        },
        "break" => SetlistItemKind::Break {
            duration: to_i64_or(
                first_field(raw, &["break_duration", "breakDuration", "duration"]),
                0,
            )
            .max(0),
            break_notes: to_string_or_empty(first_field(raw, &["break_notes", "breakNotes"])),
        },
        "section" => SetlistItemKind::Section {
            title: to_string_or_empty(first_field(raw, &["section_title", "sectionTitle", "title"])),
        },
        other => {
            debug!("Dropping setlist item {}: unknown type '{}'", index, other);
            return None;
        }
    };

    let item = SetlistItem {
        id: to_optional_string(field(raw, "id")).unwrap_or_else(|| format!("item-{}", index + 1)),
        position: 0,
        kind,
        notes: to_optional_string(field(raw, "notes")),
    };

    Some((to_optional_i64(field(raw, "position")), item))
}

fn practice_song_ids(value: Option<&Value>) -> Vec<String> {
    to_value_list(value)
        .iter()
        .filter_map(|entry| match entry {
            Value::Object(_) => to_optional_string(first_field(entry, &["song_id", "songId", "id"])),
            other => to_optional_string(Some(other)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandsync_common::time::format_iso;
    use serde_json::json;

    #[test]
    fn test_empty_song_record_is_fully_defaulted() {
        let before = time::now();
        let song = normalize_song(&json!({}));

        assert_eq!(song.id, "");
        assert_eq!(song.title, "");
        assert_eq!(song.artist, "");
        assert_eq!(song.album, None);
        assert_eq!(song.key, "");
        assert_eq!(song.bpm, 120);
        assert_eq!(song.difficulty, 1);
        assert_eq!(song.confidence_level, 1);
        assert_eq!(song.visibility, Visibility::Band);
        assert_eq!(song.version, 0);
        assert_eq!(song.notes, "");
        assert!(song.structure.is_empty());
        assert!(song.chords.is_empty());
        assert!(song.tags.is_empty());
        assert!(song.reference_links.is_empty());
        assert!(song.created_date >= before);
        assert!(song.last_practiced.is_none());
    }

    #[test]
    fn test_empty_setlist_record_is_fully_defaulted() {
        let setlist = normalize_setlist(&json!({}));

        assert_eq!(setlist.name, "");
        assert_eq!(setlist.band_id, "");
        assert!(setlist.items.is_empty());
        assert_eq!(setlist.total_duration, 0);
        assert_eq!(setlist.status, SetlistStatus::Draft);
        assert_eq!(setlist.version, 0);
    }

    #[test]
    fn test_empty_show_record_is_fully_defaulted() {
        let show = normalize_show(&json!({}));

        assert_eq!(show.venue, "");
        assert_eq!(show.location, "");
        assert_eq!(show.duration, 120);
        assert_eq!(show.status, ShowStatus::Upcoming);
        assert!(show.setlist_id.is_none());
        assert!(show.load_in_time.is_none());
        assert_eq!(show.version, 0);
    }

    #[test]
    fn test_empty_practice_record_is_fully_defaulted() {
        let session = normalize_practice_session(&json!({}));

        assert_eq!(session.location, "");
        assert_eq!(session.session_type, PracticeType::Rehearsal);
        assert_eq!(session.status, PracticeStatus::Scheduled);
        assert!(session.objectives.is_empty());
        assert!(session.completed_objectives.is_empty());
        assert!(session.songs.is_empty());
        assert!(session.attendees.is_empty());
        assert!(session.wrapup_notes.is_none());
        assert_eq!(session.version, 0);
    }

    #[test]
    fn test_non_object_record_is_treated_as_empty() {
        let song = normalize_song(&json!(null));
        assert_eq!(song.bpm, 120);
        let show = normalize_show(&json!(["not", "a", "record"]));
        assert_eq!(show.duration, 120);
    }

    #[test]
    fn test_song_field_renaming() {
        let song = normalize_song(&json!({
            "id": "s1",
            "tempo": 87,
            "context_id": "band-1",
            "context_type": "band",
            "guitar_tuning": "Drop D",
            "song_group_id": "g1",
            "last_modified_by": "u2",
            "version": 4
        }));

        assert_eq!(song.bpm, 87);
        assert_eq!(song.context_id, "band-1");
        assert_eq!(song.context_type, "band");
        assert_eq!(song.guitar_tuning.as_deref(), Some("Drop D"));
        assert_eq!(song.song_group_id.as_deref(), Some("g1"));
        assert_eq!(song.last_modified_by.as_deref(), Some("u2"));
        assert_eq!(song.version, 4);
    }

    #[test]
    fn test_song_numeric_coercion() {
        let song = normalize_song(&json!({
            "tempo": "96",
            "difficulty": 9,
            "confidence_level": 0,
            "duration": "215"
        }));

        assert_eq!(song.bpm, 96);
        assert_eq!(song.difficulty, 5);
        assert_eq!(song.confidence_level, 1);
        assert_eq!(song.duration, 215);
    }

    #[test]
    fn test_song_dates_keep_full_precision() {
        let song = normalize_song(&json!({
            "created_date": "2024-02-10T18:45:12.345Z",
            "last_practiced": "2024-03-01"
        }));

        assert_eq!(format_iso(&song.created_date), "2024-02-10T18:45:12.345Z");
        assert_eq!(
            song.last_practiced.map(|d| format_iso(&d)).as_deref(),
            Some("2024-03-01T00:00:00.000Z")
        );
    }

    #[test]
    fn test_invalid_created_date_falls_back_to_now() {
        let before = time::now();
        let song = normalize_song(&json!({"created_date": "not-a-date"}));
        assert!(song.created_date >= before);
    }

    #[test]
    fn test_song_lists_and_links() {
        let song = normalize_song(&json!({
            "tags": ["rock", "cover"],
            "chords": ["G", "C", "D"],
            "structure": "verse,chorus",
            "reference_links": [
                {"type": "youtube", "url": "https://example.com/v", "description": "live"},
                {"type": "spotify"},
                "https://example.com/tab",
                42
            ],
            "visibility": "personal"
        }));

        assert_eq!(song.tags, vec!["rock", "cover"]);
        assert_eq!(song.chords, vec!["G", "C", "D"]);
        assert!(song.structure.is_empty());
        assert_eq!(song.reference_links.len(), 2);
        assert_eq!(song.reference_links[0].link_type, "youtube");
        assert_eq!(song.reference_links[0].description.as_deref(), Some("live"));
        assert_eq!(song.reference_links[1].link_type, "other");
        assert_eq!(song.reference_links[1].url, "https://example.com/tab");
        assert_eq!(song.visibility, Visibility::Personal);
    }

    #[test]
    fn test_unknown_enum_values_use_defaults() {
        let song = normalize_song(&json!({"visibility": "public"}));
        assert_eq!(song.visibility, Visibility::Band);
        let setlist = normalize_setlist(&json!({"status": "pending"}));
        assert_eq!(setlist.status, SetlistStatus::Draft);
        let show = normalize_show(&json!({"status": 3}));
        assert_eq!(show.status, ShowStatus::Upcoming);
    }

    #[test]
    fn test_setlist_items() {
        let setlist = normalize_setlist(&json!({
            "id": "sl1",
            "name": "Friday",
            "band_id": "b1",
            "status": "active",
            "items": [
                {"id": "c", "type": "section", "section_title": "Encore", "position": 3},
                {"id": "a", "type": "song", "song_id": "s1", "position": 1},
                {"type": "break", "break_duration": 15, "break_notes": "water", "position": 2},
                {"id": "x", "type": "interlude", "position": 4},
                "garbage",
                {"id": "d", "type": "song", "songId": "s9"}
            ]
        }));

        assert_eq!(setlist.status, SetlistStatus::Active);
        let ids: Vec<&str> = setlist.items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "item-3", "c", "d"]);
        assert_eq!(
            setlist.items.iter().map(|item| item.position).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(
            setlist.items[1].kind,
            SetlistItemKind::Break {
                duration: 15,
                break_notes: "water".to_string()
            }
        );
        assert_eq!(setlist.song_ids().collect::<Vec<_>>(), vec!["s1", "s9"]);
    }

    #[test]
    fn test_show_mapping() {
        let show = normalize_show(&json!({
            "id": "sh1",
            "name": "Release party",
            "venue": "The Loft",
            "scheduled_date": "2024-09-20T20:00:00Z",
            "duration": "90",
            "band_id": "b1",
            "setlist_id": "sl1",
            "status": "confirmed",
            "load_in_time": "2024-09-20T17:00:00Z"
        }));

        assert_eq!(show.venue, "The Loft");
        assert_eq!(format_iso(&show.scheduled_date), "2024-09-20T20:00:00.000Z");
        assert_eq!(show.duration, 90);
        assert_eq!(show.setlist_id.as_deref(), Some("sl1"));
        assert_eq!(show.status, ShowStatus::Confirmed);
        assert!(show.load_in_time.is_some());
        assert!(show.soundcheck_time.is_none());
    }

    #[test]
    fn test_practice_status_is_always_scheduled() {
        for remote in ["completed", "in-progress", "cancelled", "scheduled", ""] {
            let session = normalize_practice_session(&json!({"status": remote}));
            assert_eq!(session.status, PracticeStatus::Scheduled);
        }
    }

    #[test]
    fn test_practice_mapping() {
        let session = normalize_practice_session(&json!({
            "id": "p1",
            "scheduled_date": "2024-05-02T18:30:00.000Z",
            "type": "writing",
            "songs": ["s1", {"song_id": "s2", "status": "learned"}, {"id": "s3"}, null],
            "objectives": ["tighten outro", "new bridge"],
            "completed_objectives": ["tighten outro"],
            "attendees": ["u1", "u2"],
            "wrapup_notes": "good session",
            "setlist_id": ""
        }));

        assert_eq!(session.session_type, PracticeType::Writing);
        assert_eq!(session.songs, vec!["s1", "s2", "s3"]);
        assert_eq!(session.completed_objectives, vec!["tighten outro"]);
        assert_eq!(session.attendees, vec!["u1", "u2"]);
        assert_eq!(session.wrapup_notes.as_deref(), Some("good session"));
        assert!(session.setlist_id.is_none());
        assert_eq!(
            format_iso(&session.scheduled_date),
            "2024-05-02T18:30:00.000Z"
        );
    }

    #[test]
    fn test_normalize_dispatch() {
        let entity = normalize(EntityKind::Show, &json!({"id": "sh1", "version": 3}));
        assert_eq!(entity.kind(), EntityKind::Show);
        assert_eq!(entity.id(), "sh1");
        assert_eq!(entity.version(), 3);
    }

    #[test]
    fn test_normalizer_does_not_mutate_input() {
        let raw = json!({"id": "s1", "title": "Test"});
        let first = normalize_song(&raw);
        let second = normalize_song(&raw);
        assert_eq!(raw, json!({"id": "s1", "title": "Test"}));
        assert_eq!(first.title, second.title);
    }
}
