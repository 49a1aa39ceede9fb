//! Audit-log replay
//!
//! Applies remote audit-log entries, in id order, to a [`LocalStore`] and
//! announces each applied change on the notification hub so that any
//! [`ResyncCoordinator`](crate::coordinator::ResyncCoordinator) watching the
//! kind's topic refreshes.

use crate::audit::AuditLogEntry;
use crate::normalizer::normalize;
use crate::store::LocalStore;
use bandsync_common::values::to_optional_string;
use bandsync_common::{ChangeAction, Entity, EntityKind, EventBus, Result, SyncEvent};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Why an entry was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Entry id is at or below the cursor
    AlreadyApplied,
    /// Table is not one the engine syncs
    UnknownTable,
    /// Local copy carries a higher version than the entry
    Stale { local: i64, incoming: i64 },
    /// INSERT/UPDATE without `new_values`
    MissingValues,
}

/// Result of applying one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    Upserted,
    /// Carries whether a local copy existed
    Deleted(bool),
    Skipped(SkipReason),
}

/// Counts for a [`AuditReplayer::replay`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub deleted: usize,
    pub skipped: usize,
}

impl ReplaySummary {
    pub fn record(&mut self, outcome: ReplayOutcome) {
        match outcome {
            ReplayOutcome::Upserted => self.applied += 1,
            ReplayOutcome::Deleted(_) => self.deleted += 1,
            ReplayOutcome::Skipped(_) => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.applied + self.deleted + self.skipped
    }
}

/// Replays audit-log entries into a local store
pub struct AuditReplayer<S: LocalStore> {
    store: S,
    bus: EventBus,
    cursor: Option<i64>,
}

impl<S: LocalStore> AuditReplayer<S> {
    pub fn new(store: S, bus: EventBus) -> Self {
        Self {
            store,
            bus,
            cursor: None,
        }
    }

    /// Resume after a previously applied entry id
    pub fn with_cursor(mut self, cursor: i64) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Id of the last entry applied or skipped
    pub fn cursor(&self) -> Option<i64> {
        self.cursor
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Apply a single entry
    ///
    /// The cursor only advances once the entry has been handled. A store
    /// error leaves it in place so the entry is retried on the next run.
    pub fn apply(&mut self, entry: &AuditLogEntry) -> Result<ReplayOutcome> {
        if self.cursor.is_some_and(|cursor| entry.id <= cursor) {
            debug!("Replay: entry {} already applied", entry.id);
            return Ok(ReplayOutcome::Skipped(SkipReason::AlreadyApplied));
        }

        let outcome = match entry.kind() {
            None => {
                debug!("Replay: skipping entry {} for table {}", entry.id, entry.table_name);
                ReplayOutcome::Skipped(SkipReason::UnknownTable)
            }
            Some(kind) => self.apply_to(kind, entry)?,
        };

        self.cursor = Some(entry.id);

        if !matches!(outcome, ReplayOutcome::Skipped(_)) {
            if let Some(kind) = entry.kind() {
                self.bus.publish(SyncEvent::new(kind.topic(), entry.notification()));
            }
            debug!("Replay: {}", entry.describe());
        }

        Ok(outcome)
    }

    fn apply_to(&mut self, kind: EntityKind, entry: &AuditLogEntry) -> Result<ReplayOutcome> {
        match entry.action {
            ChangeAction::Delete => {
                let existed = self.store.delete(kind, &entry.record_id)?;
                Ok(ReplayOutcome::Deleted(existed))
            }
            ChangeAction::Insert | ChangeAction::Update => {
                let Some(values) = entry.new_values.as_ref() else {
                    warn!("Replay: entry {} has no new values", entry.id);
                    return Ok(ReplayOutcome::Skipped(SkipReason::MissingValues));
                };

                let mut entity = normalize(kind, &with_id_fallback(values, &entry.record_id));

                if let Some(local) = self.store.version_of(kind, entity.id())? {
                    let incoming = entity.version();
                    if local > incoming {
                        debug!(
                            "Replay: {} {} is at version {}, ignoring version {}",
                            kind,
                            entity.id(),
                            local,
                            incoming
                        );
                        return Ok(ReplayOutcome::Skipped(SkipReason::Stale { local, incoming }));
                    }
                }

                if let Entity::Setlist(setlist) = &mut entity {
                    let store = &self.store;
                    setlist.recompute_total_duration(|song_id| match store.get(EntityKind::Song, song_id) {
                        Ok(Some(Entity::Song(song))) => Some(song.duration),
                        _ => None,
                    });
                }

                self.store.upsert(entity)?;
                Ok(ReplayOutcome::Upserted)
            }
        }
    }

    /// Apply entries in id order
    ///
    /// Stops at the first store error; entries applied before it stay applied.
    pub fn replay<'a, I>(&mut self, entries: I) -> Result<ReplaySummary>
    where
        I: IntoIterator<Item = &'a AuditLogEntry>,
    {
        let mut ordered: Vec<&AuditLogEntry> = entries.into_iter().collect();
        ordered.sort_by_key(|entry| entry.id);

        let mut summary = ReplaySummary::default();
        for entry in ordered {
            summary.record(self.apply(entry)?);
        }

        info!(
            "Replay finished: {} applied, {} deleted, {} skipped",
            summary.applied, summary.deleted, summary.skipped
        );
        Ok(summary)
    }
}

/// Copy of `values` whose `id` falls back to the audit entry's record id
fn with_id_fallback(values: &Value, record_id: &str) -> Value {
    let mut values = values.clone();
    if let Value::Object(map) = &mut values {
        if to_optional_string(map.get("id")).is_none() {
            map.insert("id".to_string(), Value::String(record_id.to_string()));
        }
    }
    values
}
