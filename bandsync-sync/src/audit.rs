//! Audit-log entries
//!
//! The remote backend records every insert, update and delete on synced
//! tables as an ordered audit-log row carrying before/after snapshots.

use crate::item_name::extract_item_name;
use bandsync_common::values::{field, to_optional_string};
use bandsync_common::{ChangeAction, ChangeNotification, EntityKind, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::BufRead;

/// One row of the remote audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Monotonic sequence number; replay order
    pub id: i64,
    pub table_name: String,
    pub action: ChangeAction,
    pub record_id: String,
    #[serde(default)]
    pub band_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    pub changed_at: DateTime<Utc>,
    #[serde(default)]
    pub old_values: Option<Value>,
    #[serde(default)]
    pub new_values: Option<Value>,
}

impl AuditLogEntry {
    /// Entity kind for the table, if it is one the engine syncs
    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::from_table_name(&self.table_name)
    }

    /// Snapshot describing the record after (or, for deletes, before) the change
    pub fn values(&self) -> Option<&Value> {
        match self.action {
            ChangeAction::Delete => self.old_values.as_ref(),
            ChangeAction::Insert | ChangeAction::Update => self.new_values.as_ref(),
        }
    }

    /// Notification payload announcing this change
    ///
    /// The band comes from the entry itself, or failing that from the
    /// snapshot's `band_id`.
    pub fn notification(&self) -> ChangeNotification {
        let band_id = self
            .band_id
            .clone()
            .or_else(|| self.values().and_then(|values| to_optional_string(field(values, "band_id"))));

        ChangeNotification {
            band_id,
            record_id: Some(self.record_id.clone()),
            action: Some(self.action),
            user_id: self.user_id.clone(),
        }
    }

    pub fn item_name(&self) -> String {
        extract_item_name(
            &self.table_name,
            self.action,
            self.old_values.as_ref(),
            self.new_values.as_ref(),
        )
    }

    /// One-line summary, e.g. `alex updated song "Wonderwall"`
    pub fn describe(&self) -> String {
        let actor = self
            .user_name
            .as_deref()
            .or(self.user_id.as_deref())
            .unwrap_or("someone");
        let what = self
            .kind()
            .map(|kind| kind.label().to_string())
            .unwrap_or_else(|| self.table_name.clone());

        format!("{} {} {} \"{}\"", actor, self.action.verb(), what, self.item_name())
    }
}

/// Parse a JSON-lines audit log
///
/// Blank lines are skipped. A malformed line fails the whole parse with its
/// 1-based line number.
pub fn parse_audit_log<R: BufRead>(reader: R) -> Result<Vec<AuditLogEntry>> {
    let mut entries = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let entry = serde_json::from_str(&line)
            .map_err(|e| Error::InvalidInput(format!("audit log line {}: {}", index + 1, e)))?;
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(action: ChangeAction) -> AuditLogEntry {
        AuditLogEntry {
            id: 1,
            table_name: "songs".to_string(),
            action,
            record_id: "s1".to_string(),
            band_id: None,
            user_id: Some("u1".to_string()),
            user_name: Some("alex".to_string()),
            changed_at: Utc::now(),
            old_values: Some(json!({"title": "Before", "band_id": "b-old"})),
            new_values: Some(json!({"title": "After", "band_id": "b-new"})),
        }
    }

    #[test]
    fn test_notification_payload() {
        let notification = entry(ChangeAction::Update).notification();
        assert_eq!(notification.band_id.as_deref(), Some("b-new"));
        assert_eq!(notification.record_id.as_deref(), Some("s1"));
        assert_eq!(notification.action, Some(ChangeAction::Update));
        assert_eq!(notification.user_id.as_deref(), Some("u1"));

        let deleted = entry(ChangeAction::Delete).notification();
        assert_eq!(deleted.band_id.as_deref(), Some("b-old"));

        let mut explicit = entry(ChangeAction::Insert);
        explicit.band_id = Some("b-entry".to_string());
        assert_eq!(explicit.notification().band_id.as_deref(), Some("b-entry"));
    }

    #[test]
    fn test_describe() {
        assert_eq!(entry(ChangeAction::Update).describe(), "alex updated song \"After\"");
        assert_eq!(entry(ChangeAction::Delete).describe(), "alex deleted song \"Before\"");

        let mut anonymous = entry(ChangeAction::Insert);
        anonymous.user_name = None;
        anonymous.user_id = None;
        anonymous.table_name = "venues".to_string();
        anonymous.new_values = None;
        assert_eq!(anonymous.describe(), "someone added venues \"item\"");
    }

    #[test]
    fn test_parse_audit_log() {
        let log = concat!(
            r#"{"id":1,"table_name":"songs","action":"INSERT","record_id":"s1","changed_at":"2024-01-01T00:00:00Z","new_values":{"id":"s1","title":"A"}}"#,
            "\n\n",
            r#"{"id":2,"table_name":"songs","action":"delete","record_id":"s1","user_id":"u1","changed_at":"2024-01-01T00:01:00Z"}"#,
            "\n"
        );

        let entries = parse_audit_log(log.as_bytes()).expect("log parses");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind(), Some(EntityKind::Song));
        assert_eq!(entries[1].action, ChangeAction::Delete);
        assert!(entries[1].old_values.is_none());
    }

    #[test]
    fn test_parse_reports_line_number() {
        let log = "\n{\"id\": 1}\n";
        let err = parse_audit_log(log.as_bytes()).unwrap_err();
        match err {
            Error::InvalidInput(message) => assert!(message.starts_with("audit log line 2")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
