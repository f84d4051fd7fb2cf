use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::event::{AuditAction, AuditEvent};

/// Read-only selection over the audit log
///
/// All set criteria must match. Results are ordered by `seq`, ascending
/// unless `descending` is set, and truncated to `limit` after ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditFilter {
    /// Case-insensitive substring of the actor's name
    pub actor_name: Option<String>,
    pub action: Option<AuditAction>,
    pub subject: Option<Uuid>,
    /// Case-insensitive substring of the hex event hash
    pub hash: Option<String>,
    /// Inclusive lower bound on the timestamp
    #[serde(with = "time::serde::rfc3339::option")]
    pub since: Option<OffsetDateTime>,
    /// Inclusive upper bound on the timestamp
    #[serde(with = "time::serde::rfc3339::option")]
    pub until: Option<OffsetDateTime>,
    pub descending: bool,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(name) = &self.actor_name {
            if !event
                .actor_name
                .to_lowercase()
                .contains(&name.to_lowercase())
            {
                return false;
            }
        }
        if let Some(action) = self.action {
            if event.action != action {
                return false;
            }
        }
        if let Some(subject) = self.subject {
            if event.subject != subject {
                return false;
            }
        }
        if let Some(hash) = &self.hash {
            if !event.hash.to_hex().contains(&hash.to_lowercase()) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.timestamp > until {
                return false;
            }
        }
        true
    }

    /// Select, order and truncate `events`, which must be in `seq` order
    pub fn apply<'a, I>(&self, events: I) -> Vec<AuditEvent>
    where
        I: IntoIterator<Item = &'a AuditEvent>,
        I::IntoIter: DoubleEndedIterator,
    {
        let limit = self.limit.unwrap_or(usize::MAX);
        let events = events.into_iter();
        if self.descending {
            events
                .rev()
                .filter(|e| self.matches(e))
                .take(limit)
                .cloned()
                .collect()
        } else {
            events
                .filter(|e| self.matches(e))
                .take(limit)
                .cloned()
                .collect()
        }
    }
}
