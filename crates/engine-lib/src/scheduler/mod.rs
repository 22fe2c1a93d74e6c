//! Booking scheduler
//!
//! Turns booking requests into committed workshop bookings. Slot search
//! scans each eligible workshop's calendar inside the daily operating
//! window, scores candidates by delay and workshop rating, and commits the
//! winner under that workshop's calendar lock. A commit that loses a race
//! to a concurrent scheduler takes the next free slot at the winning
//! workshop, or retries the full search once when that workshop is full.

mod calendar;
mod directory;

pub use calendar::{Calendar, CalendarEntry};
pub use directory::{WorkshopDirectory, WorkshopEntry};

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::ScheduleError;
use crate::models::{Booking, BookingRequest, BookingStatus};

/// Candidate slot found during search, before commit
struct Candidate {
    entry: Arc<WorkshopEntry>,
    start: DateTime<Utc>,
    score: f64,
}

/// Schedules bookings against the workshop directory
pub struct BookingScheduler {
    directory: Arc<WorkshopDirectory>,
    config: SchedulerConfig,
}

impl BookingScheduler {
    pub fn new(directory: Arc<WorkshopDirectory>, config: SchedulerConfig) -> Self {
        Self { directory, config }
    }

    pub fn directory(&self) -> &Arc<WorkshopDirectory> {
        &self.directory
    }

    /// Find and commit the best available slot for a request.
    ///
    /// `now` is passed explicitly so callers (and tests) control the search
    /// origin; no slot in the past is ever returned.
    pub async fn schedule(
        &self,
        request: &BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking, ScheduleError> {
        let eligible = self.eligible_workshops(request)?;
        let max_delay = self.config.max_delay_for(request.priority);

        // Preferred window first, unrestricted search as fallback
        if let Some(window) = request.preferred_window {
            if let Some(booking) = self
                .search_and_commit(&eligible, request, now, max_delay, Some(window))
                .await
            {
                return Ok(booking);
            }
        }

        match self
            .search_and_commit(&eligible, request, now, max_delay, None)
            .await
        {
            Some(booking) => Ok(booking),
            None => Err(ScheduleError::NoAvailability {
                workshops_checked: eligible.len(),
                max_delay_hours: max_delay,
            }),
        }
    }

    /// Advance a booking's lifecycle status. Cancelling frees the booking's
    /// calendar interval.
    pub async fn update_status(
        &self,
        booking_id: Uuid,
        next: BookingStatus,
    ) -> Result<Booking, ScheduleError> {
        let mut booking = self
            .directory
            .booking(booking_id)
            .ok_or(ScheduleError::UnknownBooking(booking_id))?;

        if !booking.status.can_transition_to(next) {
            return Err(ScheduleError::InvalidTransition {
                from: booking.status,
                to: next,
            });
        }

        if next == BookingStatus::Cancelled {
            let entry = self
                .directory
                .get(&booking.workshop_id)
                .ok_or_else(|| ScheduleError::UnknownWorkshop(booking.workshop_id.clone()))?;
            let mut cal = entry.calendar.lock().await;
            cal.remove(booking.id);
        }

        booking.status = next;
        self.directory.update_booking(booking.clone());
        Ok(booking)
    }

    pub async fn cancel(&self, booking_id: Uuid) -> Result<Booking, ScheduleError> {
        self.update_status(booking_id, BookingStatus::Cancelled).await
    }

    /// Move a booking to the best currently-available slot. The new interval
    /// is committed before the old one is released; on failure the original
    /// booking is untouched.
    pub async fn reschedule(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Booking, ScheduleError> {
        let booking = self
            .directory
            .booking(booking_id)
            .ok_or(ScheduleError::UnknownBooking(booking_id))?;

        if booking.status.is_terminal() || booking.status == BookingStatus::InProgress {
            return Err(ScheduleError::InvalidTransition {
                from: booking.status,
                to: booking.status,
            });
        }

        let request = BookingRequest::new(
            booking.vehicle_id.clone(),
            booking.service_type,
            booking.priority,
        );
        let eligible = self.eligible_workshops(&request)?;
        let max_delay = self.config.max_delay_for(booking.priority);
        let duration = Duration::minutes(booking.duration_minutes);

        for _attempt in 0..2 {
            let Some(candidate) = self
                .best_candidate(&eligible, now, duration, max_delay, None)
                .await
            else {
                break;
            };

            let start = if candidate.entry.workshop.id == booking.workshop_id {
                // Same workshop: swap intervals under one lock, restoring
                // the original on a lost race
                let mut cal = candidate.entry.calendar.lock().await;
                cal.remove(booking.id);
                let start = if cal.conflicts(candidate.start, candidate.start + duration) {
                    self.find_slot(&cal, now, duration, max_delay, None)
                } else {
                    Some(candidate.start)
                };
                match start {
                    Some(start) => {
                        cal.insert(booking.id, start, start + duration);
                        start
                    }
                    None => {
                        cal.insert(booking.id, booking.start, booking.end());
                        continue;
                    }
                }
            } else {
                let mut cal = candidate.entry.calendar.lock().await;
                let start = if cal.conflicts(candidate.start, candidate.start + duration) {
                    self.find_slot(&cal, now, duration, max_delay, None)
                } else {
                    Some(candidate.start)
                };
                let Some(start) = start else {
                    continue;
                };
                cal.insert(booking.id, start, start + duration);
                drop(cal);

                // Release the old interval only after the new one is committed
                if let Some(old_entry) = self.directory.get(&booking.workshop_id) {
                    let mut old_cal = old_entry.calendar.lock().await;
                    old_cal.remove(booking.id);
                }
                start
            };

            let mut moved = booking.clone();
            moved.workshop_id = candidate.entry.workshop.id.clone();
            moved.start = start;
            self.directory.update_booking(moved.clone());
            return Ok(moved);
        }

        Err(ScheduleError::NoAvailability {
            workshops_checked: eligible.len(),
            max_delay_hours: max_delay,
        })
    }

    fn eligible_workshops(
        &self,
        request: &BookingRequest,
    ) -> Result<Vec<Arc<WorkshopEntry>>, ScheduleError> {
        let mut eligible: Vec<Arc<WorkshopEntry>> = self
            .directory
            .entries()
            .into_iter()
            .filter(|e| {
                e.workshop
                    .offers(request.service_type, self.config.wildcard_capability)
            })
            .collect();

        if eligible.is_empty() {
            return Err(ScheduleError::NoEligibleWorkshop {
                service: request.service_type,
            });
        }
        // Deterministic tie-breaking
        eligible.sort_by(|a, b| a.workshop.id.cmp(&b.workshop.id));
        Ok(eligible)
    }

    async fn search_and_commit(
        &self,
        eligible: &[Arc<WorkshopEntry>],
        request: &BookingRequest,
        now: DateTime<Utc>,
        max_delay_hours: i64,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Option<Booking> {
        let duration = Duration::minutes(request.duration_minutes());

        for _attempt in 0..2 {
            let candidate = self
                .best_candidate(eligible, now, duration, max_delay_hours, window)
                .await?;

            let mut cal = candidate.entry.calendar.lock().await;
            // Re-verify under the lock; if a concurrent commit took the slot,
            // fall back to the earliest slot still free at this workshop
            let start = if cal.conflicts(candidate.start, candidate.start + duration) {
                match self.find_slot(&cal, now, duration, max_delay_hours, window) {
                    Some(start) => start,
                    None => {
                        // This workshop is full; re-run the search elsewhere
                        drop(cal);
                        continue;
                    }
                }
            } else {
                candidate.start
            };

            let booking = Booking {
                id: Uuid::new_v4(),
                vehicle_id: request.vehicle_id.clone(),
                workshop_id: candidate.entry.workshop.id.clone(),
                service_type: request.service_type,
                start,
                duration_minutes: request.duration_minutes(),
                priority: request.priority,
                status: BookingStatus::Scheduled,
                created_at: now,
            };
            cal.insert(booking.id, start, start + duration);
            drop(cal);

            self.directory.insert_booking(booking.clone());
            return Some(booking);
        }

        None
    }

    /// Best slot across all eligible workshops:
    /// `score = delay_hours - rating_weight * rating`, lower wins, ties
    /// broken by workshop id.
    async fn best_candidate(
        &self,
        eligible: &[Arc<WorkshopEntry>],
        now: DateTime<Utc>,
        duration: Duration,
        max_delay_hours: i64,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;

        for entry in eligible {
            let cal = entry.calendar.lock().await;
            let Some(start) = self.find_slot(&cal, now, duration, max_delay_hours, window) else {
                continue;
            };
            drop(cal);

            let delay_hours = (start - now).num_minutes() as f64 / 60.0;
            let score = delay_hours - self.config.rating_weight * entry.workshop.rating;
            let candidate = Candidate {
                entry: entry.clone(),
                start,
                score,
            };
            // eligible is sorted by id, so strict less-than keeps the
            // lowest-id workshop on ties
            let better = match &best {
                Some(current) => candidate.score < current.score,
                None => true,
            };
            if better {
                best = Some(candidate);
            }
        }

        best
    }

    /// Earliest conflict-free slot start in a calendar, or `None` when the
    /// horizon and delay bound are exhausted.
    fn find_slot(
        &self,
        calendar: &Calendar,
        now: DateTime<Utc>,
        duration: Duration,
        max_delay_hours: i64,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Option<DateTime<Utc>> {
        let granularity = Duration::minutes(self.config.slot_granularity_minutes);
        let earliest = self.round_up(now);
        let deadline = now + Duration::hours(max_delay_hours);
        let window_hours =
            Duration::hours((self.config.day_end_hour - self.config.day_start_hour) as i64);

        for day in 0..self.config.horizon_days {
            let date = (now + Duration::days(day)).date_naive();
            let open_naive = date.and_hms_opt(self.config.day_start_hour, 0, 0)?;
            let day_open = Utc.from_utc_datetime(&open_naive);
            if day_open > deadline {
                break;
            }
            let day_close = day_open + window_hours;

            let mut slot = day_open;
            while slot < day_close {
                if slot > deadline {
                    return None;
                }
                if slot >= earliest {
                    let in_window = match window {
                        Some((from, to)) => slot >= from && slot < to,
                        None => true,
                    };
                    if in_window && !calendar.conflicts(slot, slot + duration) {
                        return Some(slot);
                    }
                }
                slot += granularity;
            }
        }

        None
    }

    /// Round up to the next slot-granularity boundary so slots in the past
    /// are never offered
    fn round_up(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.config.slot_granularity_minutes * 60;
        let ts = now.timestamp();
        let rem = ts.rem_euclid(step);
        let rounded = if rem == 0 { ts } else { ts + step - rem };
        DateTime::from_timestamp(rounded, 0).unwrap_or(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, ServiceType, Workshop};
    use chrono::TimeZone;

    fn workshop(id: &str, rating: f64, capabilities: Vec<ServiceType>) -> Workshop {
        Workshop {
            id: id.to_string(),
            name: format!("Workshop {}", id),
            location: "Test City".to_string(),
            capabilities,
            rating,
        }
    }

    fn scheduler_with(workshops: Vec<Workshop>) -> BookingScheduler {
        let directory = Arc::new(WorkshopDirectory::new());
        for ws in workshops {
            directory.register(ws);
        }
        BookingScheduler::new(directory, SchedulerConfig::default())
    }

    // 06:00 UTC, before the operating window opens
    fn morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_first_slot_is_window_open() {
        let scheduler = scheduler_with(vec![workshop(
            "ws_001",
            4.5,
            vec![ServiceType::Corrective],
        )]);
        let request = BookingRequest::new("EV001", ServiceType::Corrective, Priority::High);

        let booking = scheduler.schedule(&request, morning()).await.unwrap();
        assert_eq!(booking.workshop_id, "ws_001");
        assert_eq!(
            booking.start,
            Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap()
        );
        assert_eq!(booking.status, BookingStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_no_eligible_workshop() {
        let scheduler = scheduler_with(vec![workshop(
            "ws_001",
            4.5,
            vec![ServiceType::Inspection],
        )]);
        let request = BookingRequest::new("EV001", ServiceType::BatteryService, Priority::Normal);

        assert!(matches!(
            scheduler.schedule(&request, morning()).await,
            Err(ScheduleError::NoEligibleWorkshop { .. })
        ));
    }

    #[tokio::test]
    async fn test_wildcard_workshop_is_eligible() {
        let scheduler = scheduler_with(vec![workshop("ws_001", 4.0, vec![ServiceType::General])]);
        let request = BookingRequest::new("EV001", ServiceType::MotorService, Priority::Normal);

        assert!(scheduler.schedule(&request, morning()).await.is_ok());
    }

    #[tokio::test]
    async fn test_higher_rating_wins_same_slot() {
        let scheduler = scheduler_with(vec![
            workshop("ws_001", 3.0, vec![ServiceType::Corrective]),
            workshop("ws_002", 4.8, vec![ServiceType::Corrective]),
        ]);
        let request = BookingRequest::new("EV001", ServiceType::Corrective, Priority::High);

        let booking = scheduler.schedule(&request, morning()).await.unwrap();
        assert_eq!(booking.workshop_id, "ws_002");
    }

    #[tokio::test]
    async fn test_equal_score_ties_break_by_id() {
        let scheduler = scheduler_with(vec![
            workshop("ws_002", 4.0, vec![ServiceType::Corrective]),
            workshop("ws_001", 4.0, vec![ServiceType::Corrective]),
        ]);
        let request = BookingRequest::new("EV001", ServiceType::Corrective, Priority::High);

        let booking = scheduler.schedule(&request, morning()).await.unwrap();
        assert_eq!(booking.workshop_id, "ws_001");
    }

    #[tokio::test]
    async fn test_consecutive_bookings_do_not_overlap() {
        let scheduler = scheduler_with(vec![workshop(
            "ws_001",
            4.0,
            vec![ServiceType::Corrective],
        )]);
        let request = BookingRequest::new("EV001", ServiceType::Corrective, Priority::High);

        let first = scheduler.schedule(&request, morning()).await.unwrap();
        let second = scheduler.schedule(&request, morning()).await.unwrap();

        let no_overlap = second.start >= first.end() || second.end() <= first.start;
        assert!(no_overlap);
    }

    #[tokio::test]
    async fn test_critical_delay_bound_enforced() {
        let scheduler = scheduler_with(vec![workshop(
            "ws_001",
            4.0,
            vec![ServiceType::Emergency],
        )]);
        let now = morning();

        // Block most of the first-day window; the only free slots inside
        // the 24h critical bound are at the end of the day
        {
            let entry = scheduler.directory().get("ws_001").unwrap();
            let mut cal = entry.calendar.lock().await;
            let open = Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap();
            cal.insert(Uuid::new_v4(), open, open + Duration::hours(6));
        }

        let request = BookingRequest::new("EV003", ServiceType::Emergency, Priority::Critical);
        let booking = scheduler.schedule(&request, now).await.unwrap();

        assert_eq!(
            booking.start,
            Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap()
        );
        let delay = booking.start - now;
        assert!(delay <= Duration::hours(24), "delay {:?} exceeds bound", delay);
    }

    #[tokio::test]
    async fn test_no_availability_when_bound_exhausted() {
        let scheduler = scheduler_with(vec![workshop(
            "ws_001",
            4.0,
            vec![ServiceType::Emergency],
        )]);
        let now = morning();

        // Block both day windows reachable within the 24h critical bound
        {
            let entry = scheduler.directory().get("ws_001").unwrap();
            let mut cal = entry.calendar.lock().await;
            for day in 10..=11 {
                let open = Utc.with_ymd_and_hms(2026, 3, day, 8, 0, 0).unwrap();
                cal.insert(Uuid::new_v4(), open, open + Duration::hours(10));
            }
        }

        let request = BookingRequest::new("EV003", ServiceType::Emergency, Priority::Critical);
        assert!(matches!(
            scheduler.schedule(&request, now).await,
            Err(ScheduleError::NoAvailability { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_frees_slot() {
        let scheduler = scheduler_with(vec![workshop(
            "ws_001",
            4.0,
            vec![ServiceType::Corrective],
        )]);
        let request = BookingRequest::new("EV001", ServiceType::Corrective, Priority::High);

        let first = scheduler.schedule(&request, morning()).await.unwrap();
        let cancelled = scheduler.cancel(first.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        // The freed slot is offered again
        let second = scheduler.schedule(&request, morning()).await.unwrap();
        assert_eq!(second.start, first.start);
    }

    #[tokio::test]
    async fn test_invalid_transition_rejected() {
        let scheduler = scheduler_with(vec![workshop(
            "ws_001",
            4.0,
            vec![ServiceType::Corrective],
        )]);
        let request = BookingRequest::new("EV001", ServiceType::Corrective, Priority::High);
        let booking = scheduler.schedule(&request, morning()).await.unwrap();

        assert!(matches!(
            scheduler
                .update_status(booking.id, BookingStatus::Completed)
                .await,
            Err(ScheduleError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_status_walks_forward() {
        let scheduler = scheduler_with(vec![workshop(
            "ws_001",
            4.0,
            vec![ServiceType::Corrective],
        )]);
        let request = BookingRequest::new("EV001", ServiceType::Corrective, Priority::High);
        let booking = scheduler.schedule(&request, morning()).await.unwrap();

        for next in [
            BookingStatus::Confirmed,
            BookingStatus::InProgress,
            BookingStatus::Completed,
        ] {
            let updated = scheduler.update_status(booking.id, next).await.unwrap();
            assert_eq!(updated.status, next);
        }
    }

    #[tokio::test]
    async fn test_reschedule_moves_booking() {
        let scheduler = scheduler_with(vec![workshop(
            "ws_001",
            4.0,
            vec![ServiceType::Corrective],
        )]);
        let request = BookingRequest::new("EV001", ServiceType::Corrective, Priority::High);
        let booking = scheduler.schedule(&request, morning()).await.unwrap();

        // Rescheduling cannot land on its own committed interval
        let moved = scheduler.reschedule(booking.id, morning()).await.unwrap();
        assert_eq!(moved.id, booking.id);
        assert_ne!(moved.start, booking.start);

        // Old interval is released
        let entry = scheduler.directory().get("ws_001").unwrap();
        let cal = entry.calendar.lock().await;
        assert_eq!(cal.len(), 1);
    }

    #[tokio::test]
    async fn test_preferred_window_honored_when_free() {
        let scheduler = scheduler_with(vec![workshop(
            "ws_001",
            4.0,
            vec![ServiceType::Inspection],
        )]);
        let from = Utc.with_ymd_and_hms(2026, 3, 12, 8, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 3, 12, 18, 0, 0).unwrap();

        let mut request = BookingRequest::new("EV001", ServiceType::Inspection, Priority::Normal);
        request.preferred_window = Some((from, to));

        let booking = scheduler.schedule(&request, morning()).await.unwrap();
        assert!(booking.start >= from && booking.start < to);
    }
}
