//! Display names for audit-log changes

use bandsync_common::values::{field, to_optional_string};
use bandsync_common::{ChangeAction, EntityKind};
use serde_json::Value;

/// Returned when no candidate field yields a name
pub const FALLBACK_ITEM_NAME: &str = "item";

/// Candidate name fields, tried in order, for a remote table
fn name_candidates(table_name: &str) -> &'static [&'static str] {
    match EntityKind::from_table_name(table_name) {
        Some(EntityKind::PracticeSession) => &["scheduled_date"],
        _ => &["title", "name"],
    }
}

/// Pick a human-readable name for a changed record
///
/// Deletions are named from `old_values`; inserts and updates from
/// `new_values`. The other value set is never consulted. Empty strings do
/// not count as names.
pub fn extract_item_name(
    table_name: &str,
    action: ChangeAction,
    old_values: Option<&Value>,
    new_values: Option<&Value>,
) -> String {
    let values = match action {
        ChangeAction::Delete => old_values,
        ChangeAction::Insert | ChangeAction::Update => new_values,
    };

    let Some(values) = values else {
        return FALLBACK_ITEM_NAME.to_string();
    };

    name_candidates(table_name)
        .iter()
        .find_map(|name| to_optional_string(field(values, name)))
        .unwrap_or_else(|| FALLBACK_ITEM_NAME.to_string())
}
