use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::calc::DateRange;
use crate::model::{LogAction, LogEntity, LogEntry};

/// Append-only audit trail, newest entry first.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogFilter {
    pub username: Option<String>,
    pub action: Option<LogAction>,
    pub entity: Option<LogEntity>,
    pub start: Option<chrono::NaiveDate>,
    pub end: Option<chrono::NaiveDate>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl LogFilter {
    fn matches(&self, e: &LogEntry) -> bool {
        let range = DateRange {
            start: self.start,
            end: self.end,
        };
        if !range.contains(e.timestamp.date_naive()) {
            return false;
        }
        if self.username.as_deref().is_some_and(|u| u != e.username) {
            return false;
        }
        if self.action.is_some_and(|a| a != e.action) {
            return false;
        }
        if self.entity.is_some_and(|x| x != e.entity) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => {
                let q = q.to_lowercase();
                e.details.to_lowercase().contains(&q) || e.username.to_lowercase().contains(&q)
            }
            _ => true,
        }
    }
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a trail that was saved newest first.
    pub fn from_entries(entries: Vec<LogEntry>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Records one entry for `actor`. Does nothing without an actor.
    pub fn record(
        &mut self,
        actor: Option<&str>,
        action: LogAction,
        entity: LogEntity,
        details: impl Into<String>,
    ) -> Option<&LogEntry> {
        self.record_at(actor, action, entity, details, Utc::now())
    }

    pub fn record_at(
        &mut self,
        actor: Option<&str>,
        action: LogAction,
        entity: LogEntity,
        details: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Option<&LogEntry> {
        let actor = actor.map(str::trim).filter(|a| !a.is_empty())?;
        let entry = LogEntry {
            id: self.len() as u64 + 1,
            timestamp,
            username: actor.to_string(),
            action,
            entity,
            details: details.into(),
        };
        tracing::debug!(
            id = entry.id,
            actor = %entry.username,
            action = entry.action.as_str(),
            entity = entry.entity.as_str(),
            "activity recorded"
        );
        self.entries.push_front(entry);
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn query(&self, filter: &LogFilter) -> Vec<LogEntry> {
        let it = self.entries.iter().filter(|e| filter.matches(e)).cloned();
        match filter.limit {
            Some(n) => it.take(n).collect(),
            None => it.collect(),
        }
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn newest_first_with_sequential_ids() {
        let mut log = ActivityLog::new();
        log.record(Some("admin"), LogAction::Create, LogEntity::Classes, "a");
        log.record(Some("admin"), LogAction::Update, LogEntity::Classes, "b");
        log.record(Some("tds"), LogAction::Delete, LogEntity::Violations, "c");

        let ids: Vec<u64> = log.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(log.iter().next().map(|e| e.details.as_str()), Some("c"));
    }

    #[test]
    fn missing_actor_is_a_no_op() {
        let mut log = ActivityLog::new();
        assert!(log
            .record(None, LogAction::Logout, LogEntity::Auth, "x")
            .is_none());
        assert!(log
            .record(Some("  "), LogAction::Logout, LogEntity::Auth, "x")
            .is_none());
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn filter_by_fields_and_date() {
        let mut log = ActivityLog::new();
        let t1 = Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).single().expect("t1");
        let t2 = Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).single().expect("t2");
        log.record_at(Some("admin"), LogAction::Create, LogEntity::Users, "Added Jane", t1);
        log.record_at(Some("tds"), LogAction::Create, LogEntity::Violations, "Violation for Jane", t2);
        log.record_at(Some("admin"), LogAction::Export, LogEntity::Reports, "CSV", t2);

        let f = LogFilter {
            username: Some("admin".into()),
            ..Default::default()
        };
        assert_eq!(log.query(&f).len(), 2);

        let f = LogFilter {
            search: Some("jane".into()),
            start: t2.date_naive().into(),
            ..Default::default()
        };
        let hits = log.query(&f);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entity, LogEntity::Violations);

        let f = LogFilter {
            action: Some(LogAction::Create),
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(log.query(&f)[0].id, 2);
    }
}
