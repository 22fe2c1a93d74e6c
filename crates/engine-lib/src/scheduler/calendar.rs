//! Workshop calendars
//!
//! A calendar holds the committed intervals for one workshop. Intervals are
//! half-open `[start, end)`, so a booking ending at 10:00 never conflicts
//! with one starting at 10:00.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One committed interval on a workshop's calendar
#[derive(Debug, Clone)]
pub struct CalendarEntry {
    pub booking_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Committed intervals for a single workshop
#[derive(Debug, Default)]
pub struct Calendar {
    entries: Vec<CalendarEntry>,
}

impl Calendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `[start, end)` overlaps any committed interval
    pub fn conflicts(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.entries
            .iter()
            .any(|e| start < e.end && end > e.start)
    }

    /// Commit an interval. The caller must have verified it is conflict-free
    /// while holding the calendar lock.
    pub fn insert(&mut self, booking_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.entries.push(CalendarEntry {
            booking_id,
            start,
            end,
        });
    }

    /// Release the interval held by a booking, if present
    pub fn remove(&mut self, booking_id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.booking_id != booking_id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CalendarEntry] {
        &self.entries
    }
}
