//! Workshop directory
//!
//! Shared runtime registry of workshops, their calendars and committed
//! bookings. Lookups go through `DashMap`; each workshop's calendar sits
//! behind its own async mutex so slot search and commit for one workshop
//! are serialized without blocking the others.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{Booking, Workshop};
use crate::scheduler::calendar::Calendar;

/// A registered workshop and its calendar
pub struct WorkshopEntry {
    pub workshop: Workshop,
    pub calendar: Mutex<Calendar>,
}

/// Registry of workshops and committed bookings
#[derive(Default)]
pub struct WorkshopDirectory {
    workshops: DashMap<String, Arc<WorkshopEntry>>,
    bookings: DashMap<Uuid, Booking>,
}

impl WorkshopDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workshop, replacing any previous registration with the
    /// same id (the calendar starts empty either way)
    pub fn register(&self, workshop: Workshop) {
        let entry = Arc::new(WorkshopEntry {
            workshop: workshop.clone(),
            calendar: Mutex::new(Calendar::new()),
        });
        self.workshops.insert(workshop.id, entry);
    }

    pub fn get(&self, workshop_id: &str) -> Option<Arc<WorkshopEntry>> {
        self.workshops.get(workshop_id).map(|e| e.value().clone())
    }

    /// Snapshot of all registered workshop entries
    pub fn entries(&self) -> Vec<Arc<WorkshopEntry>> {
        self.workshops.iter().map(|e| e.value().clone()).collect()
    }

    pub fn workshop_count(&self) -> usize {
        self.workshops.len()
    }

    pub fn insert_booking(&self, booking: Booking) {
        self.bookings.insert(booking.id, booking);
    }

    pub fn booking(&self, id: Uuid) -> Option<Booking> {
        self.bookings.get(&id).map(|b| b.value().clone())
    }

    pub fn update_booking(&self, booking: Booking) {
        self.bookings.insert(booking.id, booking);
    }

    /// Committed bookings for one vehicle, newest first
    pub fn bookings_for_vehicle(&self, vehicle_id: &str) -> Vec<Booking> {
        let mut found: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| b.value().vehicle_id == vehicle_id)
            .map(|b| b.value().clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }
}
