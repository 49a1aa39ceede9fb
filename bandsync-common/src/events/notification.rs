//! Change notification payloads
//!
//! A notification tells subscribers that some remote record changed, carrying
//! just enough metadata to decide relevance without fetching the record.

use serde::{Deserialize, Serialize};

/// Kind of change recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    #[serde(alias = "insert")]
    Insert,
    #[serde(alias = "update")]
    Update,
    #[serde(alias = "delete")]
    Delete,
}

impl ChangeAction {
    /// Parse a remote action name (case-insensitive)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Some(ChangeAction::Insert),
            "UPDATE" => Some(ChangeAction::Update),
            "DELETE" => Some(ChangeAction::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Insert => "INSERT",
            ChangeAction::Update => "UPDATE",
            ChangeAction::Delete => "DELETE",
        }
    }

    /// Past-tense verb for display ("added", "updated", "deleted")
    pub fn verb(&self) -> &'static str {
        match self {
            ChangeAction::Insert => "added",
            ChangeAction::Update => "updated",
            ChangeAction::Delete => "deleted",
        }
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload delivered with every change notification
///
/// Every field is optional. A missing `band_id` or `record_id` means the
/// change applies to everyone; a missing `user_id` means the originator is
/// unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ChangeAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ChangeNotification {
    pub fn with_band(mut self, band_id: impl Into<String>) -> Self {
        self.band_id = Some(band_id.into());
        self
    }

    pub fn with_record(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    pub fn with_action(mut self, action: ChangeAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// A notification together with the topic it was published on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub topic: String,
    pub notification: ChangeNotification,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl SyncEvent {
    pub fn new(topic: impl Into<String>, notification: ChangeNotification) -> Self {
        Self {
            topic: topic.into(),
            notification,
            timestamp: chrono::Utc::now(),
        }
    }
}
