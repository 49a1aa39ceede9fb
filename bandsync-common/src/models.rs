//! Canonical entity models
//!
//! These are the fully-defaulted local representations the rest of the
//! application reads from the local store. Every date field is a parsed
//! timestamp and every list field is present (possibly empty).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Declares a lowercase string-backed enum with a default variant and a
/// lenient parser for remote values.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident,
        { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Parse a remote value (case-insensitive, surrounding whitespace ignored)
            pub fn parse(raw: &str) -> Option<Self> {
                let raw = raw.trim();
                $(
                    if raw.eq_ignore_ascii_case($text) {
                        return Some(Self::$variant);
                    }
                )+
                None
            }

            /// Wire form of the value
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Who can see a song
    Visibility, default = Band,
    { Personal => "personal", Band => "band" }
}

string_enum! {
    /// Setlist lifecycle
    SetlistStatus, default = Draft,
    {
        Draft => "draft",
        Active => "active",
        Archived => "archived",
        Performed => "performed",
        Rehearsed => "rehearsed",
    }
}

string_enum! {
    /// Show lifecycle
    ShowStatus, default = Upcoming,
    {
        Upcoming => "upcoming",
        Confirmed => "confirmed",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

string_enum! {
    /// Kind of practice session
    PracticeType, default = Rehearsal,
    {
        Rehearsal => "rehearsal",
        Writing => "writing",
        Recording => "recording",
        Audition => "audition",
        Lesson => "lesson",
    }
}

string_enum! {
    /// Practice session lifecycle
    PracticeStatus, default = Scheduled,
    {
        Scheduled => "scheduled",
        InProgress => "in-progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

/// External reference attached to a song (recording, tab, video)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceLink {
    #[serde(rename = "type")]
    pub link_type: String,
    pub url: String,
    pub description: Option<String>,
}

/// A song in a personal or band catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub key: String,
    /// Beats per minute
    pub bpm: i64,
    /// Duration in seconds
    pub duration: i64,
    /// 1 (easy) to 5 (hard)
    pub difficulty: i64,
    pub guitar_tuning: Option<String>,
    pub lyrics: Option<String>,
    pub notes: String,
    pub structure: Vec<String>,
    pub chords: Vec<String>,
    pub tags: Vec<String>,
    pub reference_links: Vec<ReferenceLink>,
    pub created_date: DateTime<Utc>,
    pub last_practiced: Option<DateTime<Utc>>,
    pub confidence_level: i64,
    pub context_type: String,
    pub context_id: String,
    pub created_by: String,
    pub visibility: Visibility,
    pub song_group_id: Option<String>,
    pub linked_from_song_id: Option<String>,
    pub version: i64,
    pub last_modified_by: Option<String>,
}

/// What a setlist slot holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum SetlistItemKind {
    /// Reference to a song by id (weak: the song may no longer exist)
    Song { song_id: String },
    /// Pause between songs
    Break {
        /// Minutes
        duration: i64,
        break_notes: String,
    },
    /// Named divider ("Encore", "Acoustic set")
    Section { title: String },
}

/// One ordered slot of a setlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetlistItem {
    pub id: String,
    pub position: i64,
    #[serde(flatten)]
    pub kind: SetlistItemKind,
    pub notes: Option<String>,
}

/// An ordered list of songs and markers for a band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setlist {
    pub id: String,
    pub name: String,
    pub band_id: String,
    pub items: Vec<SetlistItem>,
    /// Seconds; recomputed by the caller, see [`Setlist::recompute_total_duration`]
    pub total_duration: i64,
    pub status: SetlistStatus,
    pub notes: String,
    pub created_date: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub version: i64,
    pub last_modified_by: Option<String>,
}

impl Setlist {
    /// Recompute `total_duration` from song durations plus break lengths
    ///
    /// `song_duration` returns a song's duration in seconds, or `None` when
    /// the song is unknown locally (it then contributes nothing). The total
    /// saturates at `i64::MAX` rather than overflowing.
    pub fn recompute_total_duration<F>(&mut self, song_duration: F) -> i64
    where
        F: Fn(&str) -> Option<i64>,
    {
        self.total_duration = self
            .items
            .iter()
            .map(|item| match &item.kind {
                SetlistItemKind::Song { song_id } => song_duration(song_id).unwrap_or(0),
                SetlistItemKind::Break { duration, .. } => duration.saturating_mul(60),
                SetlistItemKind::Section { .. } => 0,
            })
            .fold(0i64, i64::saturating_add);
        self.total_duration
    }

    /// Song ids in play order
    pub fn song_ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match &item.kind {
            SetlistItemKind::Song { song_id } => Some(song_id.as_str()),
            _ => None,
        })
    }
}

/// A booked performance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Show {
    pub id: String,
    pub name: String,
    pub venue: String,
    pub location: String,
    pub scheduled_date: DateTime<Utc>,
    /// Minutes
    pub duration: i64,
    pub load_in_time: Option<DateTime<Utc>>,
    pub soundcheck_time: Option<DateTime<Utc>>,
    pub band_id: String,
    pub setlist_id: Option<String>,
    pub status: ShowStatus,
    pub notes: String,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
    pub version: i64,
    pub last_modified_by: Option<String>,
}

/// A scheduled band practice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSession {
    pub id: String,
    pub scheduled_date: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Minutes
    pub duration: i64,
    pub location: String,
    #[serde(rename = "type")]
    pub session_type: PracticeType,
    /// Always `Scheduled` after normalization
    pub status: PracticeStatus,
    pub objectives: Vec<String>,
    pub completed_objectives: Vec<String>,
    pub songs: Vec<String>,
    pub band_id: String,
    pub setlist_id: Option<String>,
    pub notes: String,
    pub wrapup_notes: Option<String>,
    pub attendees: Vec<String>,
    pub created_date: DateTime<Utc>,
    pub version: i64,
    pub last_modified_by: Option<String>,
}

/// Entity categories carried by the sync layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Song,
    Setlist,
    Show,
    PracticeSession,
}

impl EntityKind {
    /// Every kind, in dependency order (songs before things that reference them)
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Song,
        EntityKind::Setlist,
        EntityKind::Show,
        EntityKind::PracticeSession,
    ];

    /// Remote table name
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Song => "songs",
            EntityKind::Setlist => "setlists",
            EntityKind::Show => "shows",
            EntityKind::PracticeSession => "practice_sessions",
        }
    }

    /// Change notification topic for this kind
    pub fn topic(&self) -> &'static str {
        match self {
            EntityKind::Song => "songs:changed",
            EntityKind::Setlist => "setlists:changed",
            EntityKind::Show => "shows:changed",
            EntityKind::PracticeSession => "practice_sessions:changed",
        }
    }

    /// Human-readable singular label
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Song => "song",
            EntityKind::Setlist => "setlist",
            EntityKind::Show => "show",
            EntityKind::PracticeSession => "practice session",
        }
    }

    /// Map a remote table name to its kind
    pub fn from_table_name(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.table_name() == table)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Any canonical entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Entity {
    Song(Song),
    Setlist(Setlist),
    Show(Show),
    PracticeSession(PracticeSession),
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Entity::Song(song) => &song.id,
            Entity::Setlist(setlist) => &setlist.id,
            Entity::Show(show) => &show.id,
            Entity::PracticeSession(session) => &session.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Song(_) => EntityKind::Song,
            Entity::Setlist(_) => EntityKind::Setlist,
            Entity::Show(_) => EntityKind::Show,
            Entity::PracticeSession(_) => EntityKind::PracticeSession,
        }
    }

    /// Remote-assigned version used for conflict arbitration
    pub fn version(&self) -> i64 {
        match self {
            Entity::Song(song) => song.version,
            Entity::Setlist(setlist) => setlist.version,
            Entity::Show(show) => show.version,
            Entity::PracticeSession(session) => session.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, kind: SetlistItemKind) -> SetlistItem {
        SetlistItem {
            id: id.to_string(),
            position: 0,
            kind,
            notes: None,
        }
    }

    #[test]
    fn test_string_enum_parse() {
        assert_eq!(Visibility::parse("Personal"), Some(Visibility::Personal));
        assert_eq!(Visibility::parse(" band "), Some(Visibility::Band));
        assert_eq!(Visibility::parse("public"), None);
        assert_eq!(PracticeStatus::parse("in-progress"), Some(PracticeStatus::InProgress));
        assert_eq!(SetlistStatus::default(), SetlistStatus::Draft);
        assert_eq!(ShowStatus::default().as_str(), "upcoming");
    }

    #[test]
    fn test_entity_kind_tables_and_topics() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_table_name(kind.table_name()), Some(kind));
            assert!(kind.topic().starts_with(kind.table_name()));
        }
        assert_eq!(EntityKind::from_table_name("band_members"), None);
    }

    #[test]
    fn test_setlist_total_duration() {
        let mut setlist = Setlist {
            id: "sl1".to_string(),
            name: "Friday".to_string(),
            band_id: "b1".to_string(),
            items: vec![
                item("i1", SetlistItemKind::Song { song_id: "s1".to_string() }),
                item(
                    "i2",
                    SetlistItemKind::Break {
                        duration: 10,
                        break_notes: String::new(),
                    },
                ),
                item("i3", SetlistItemKind::Section { title: "Encore".to_string() }),
                item("i4", SetlistItemKind::Song { song_id: "missing".to_string() }),
            ],
            total_duration: 0,
            status: SetlistStatus::Draft,
            notes: String::new(),
            created_date: Utc::now(),
            last_modified: Utc::now(),
            version: 0,
            last_modified_by: None,
        };

        let total = setlist.recompute_total_duration(|id| (id == "s1").then_some(200));
        assert_eq!(total, 200 + 600);
        assert_eq!(setlist.total_duration, 800);
        assert_eq!(setlist.song_ids().collect::<Vec<_>>(), vec!["s1", "missing"]);
    }

    #[test]
    fn test_setlist_total_duration_saturates() {
        let mut setlist = Setlist {
            id: "sl1".to_string(),
            name: String::new(),
            band_id: String::new(),
            items: vec![
                item(
                    "i1",
                    SetlistItemKind::Break {
                        duration: i64::MAX / 2,
                        break_notes: String::new(),
                    },
                ),
                item("i2", SetlistItemKind::Song { song_id: "long".to_string() }),
                item("i3", SetlistItemKind::Song { song_id: "long".to_string() }),
            ],
            total_duration: 0,
            status: SetlistStatus::Draft,
            notes: String::new(),
            created_date: Utc::now(),
            last_modified: Utc::now(),
            version: 0,
            last_modified_by: None,
        };

        assert_eq!(setlist.recompute_total_duration(|_| Some(i64::MAX)), i64::MAX);
    }

    #[test]
    fn test_setlist_item_serialization_shape() {
        let json = serde_json::to_value(item(
            "i1",
            SetlistItemKind::Song { song_id: "s1".to_string() },
        ))
        .expect("item should serialize");
        assert_eq!(json["type"], "song");
        assert_eq!(json["songId"], "s1");
        assert_eq!(json["id"], "i1");
    }
}
