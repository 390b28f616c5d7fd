use crate::models::category::CategoryId;
use crate::models::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub stage: usize,
    pub item_id: String,
    pub category: CategoryId,
    pub response: Response,
    pub delta: i64,
    pub answered_at: DateTime<Utc>,
}

/// Append-only record of answered linear items, in presentation order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResponseLog {
    entries: Vec<LogEntry>,
}

impl ResponseLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
