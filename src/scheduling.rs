//! Slot-conflict scheduling for caregiver bookings.
//!
//! The working day is a fixed grid of eight one-hour slots. Bookings
//! are admitted against a `(caregiver, date, slot)` triple and the
//! scheduler guarantees at most one `scheduled` booking per triple by
//! serializing the conflict check and the insert on a per-triple lock.
//! Terminal rows (completed, cancelled, no-show) stay behind as history
//! and free the triple for rebooking.

use std::sync::{Arc, PoisonError};

use chrono::NaiveDate;
use serde::Serialize;

use crate::keyed_lock::KeyedLocks;
use crate::models::{Booking, BookingStatus, TimeSlot};
use crate::store::{RecordId, RecordStore, StoreError};

/// Cap on rows returned by `session_history`.
const HISTORY_LIMIT_DEFAULT: usize = 50;

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Caregiver not found")]
    CaregiverNotFound,
    #[error("Booking not found")]
    BookingNotFound,
    #[error("Slot {slot} on {date} is already booked for this caregiver")]
    SlotAlreadyBooked { date: NaiveDate, slot: TimeSlot },
    #[error("Booking is already {current} and cannot change")]
    BookingClosed { current: BookingStatus },
}

impl From<StoreError> for ScheduleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RecordNotFound(_) => ScheduleError::BookingNotFound,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Requests and views
// ═══════════════════════════════════════════════════════════

/// Input for a new booking.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub caregiver_id: RecordId,
    pub patient_id: RecordId,
    pub staff_id: RecordId,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub session_type: String,
    pub notes: Option<String>,
}

/// Who is busy in one slot of one day, practice-wide.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotOccupancy {
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub busy_caregiver_ids: Vec<RecordId>,
    pub busy_count: usize,
    pub total_caregivers: usize,
    pub free_count: usize,
}

/// One slot of one caregiver's day.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub slot: TimeSlot,
    pub free: bool,
}

/// Practice-wide caregiver roster statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStats {
    pub total: usize,
    pub available: usize,
    pub busy: usize,
    /// Mean rating across the whole roster; unrated caregivers count
    /// as zero. `None` on an empty roster.
    pub average_rating: Option<f32>,
    pub total_sessions: u64,
}

// ═══════════════════════════════════════════════════════════
// SlotScheduler
// ═══════════════════════════════════════════════════════════

/// Owns booking admission and the slot-uniqueness invariant.
pub struct SlotScheduler {
    store: Arc<RecordStore>,
    locks: KeyedLocks,
}

impl SlotScheduler {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Admit a booking if its `(caregiver, date, slot)` triple is free.
    ///
    /// Check and insert run under the triple's lock; two concurrent
    /// requests for the same triple resolve to one success and one
    /// `SlotAlreadyBooked`.
    pub fn book(&self, request: BookingRequest) -> Result<RecordId, ScheduleError> {
        let BookingRequest {
            caregiver_id,
            patient_id,
            staff_id,
            date,
            slot,
            session_type,
            notes,
        } = request;

        let cell = self.locks.acquire(&slot_lock_key(caregiver_id, date, slot));
        let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

        if self.store.caregivers.get(caregiver_id).is_none() {
            return Err(ScheduleError::CaregiverNotFound);
        }

        let conflict = self.store.bookings.find_one(|b| {
            b.caregiver_id == caregiver_id
                && b.date == date
                && b.slot == slot
                && b.status == BookingStatus::Scheduled
        });
        if conflict.is_some() {
            tracing::warn!(caregiver = %caregiver_id, %date, %slot, "slot conflict rejected");
            return Err(ScheduleError::SlotAlreadyBooked { date, slot });
        }

        let booking_id = self.store.bookings.insert(Booking {
            caregiver_id,
            patient_id,
            staff_id,
            date,
            slot,
            status: BookingStatus::Scheduled,
            session_type,
            notes,
            rating: None,
        });

        // Lifetime counter; monotonic, never unwound by cancellation.
        self.store
            .caregivers
            .patch(caregiver_id, |c| c.total_sessions += 1)
            .map_err(|_| ScheduleError::CaregiverNotFound)?;

        tracing::info!(booking = %booking_id, caregiver = %caregiver_id, %date, %slot, "booking admitted");
        Ok(booking_id)
    }

    /// Cancel a scheduled booking, recording the reason in its notes.
    pub fn cancel(&self, booking_id: RecordId, reason: &str) -> Result<(), ScheduleError> {
        self.transition(booking_id, BookingStatus::Cancelled, |b| {
            b.notes = Some(format!("Cancelled: {reason}"));
        })
    }

    /// Move a booking to a new status, optionally attaching notes and a
    /// patient rating. Terminal bookings never transition again.
    pub fn set_status(
        &self,
        booking_id: RecordId,
        status: BookingStatus,
        notes: Option<String>,
        rating: Option<u8>,
    ) -> Result<(), ScheduleError> {
        self.transition(booking_id, status, |b| {
            if let Some(notes) = notes {
                b.notes = Some(notes);
            }
            if let Some(rating) = rating {
                b.rating = Some(rating);
            }
        })
    }

    fn transition(
        &self,
        booking_id: RecordId,
        status: BookingStatus,
        apply: impl FnOnce(&mut Booking),
    ) -> Result<(), ScheduleError> {
        let cell = self.locks.acquire(&booking_lock_key(booking_id));
        let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self
            .store
            .bookings
            .get(booking_id)
            .ok_or(ScheduleError::BookingNotFound)?;
        if current.status.is_terminal() {
            return Err(ScheduleError::BookingClosed {
                current: current.status,
            });
        }

        self.store.bookings.patch(booking_id, |b| {
            b.status = status;
            apply(b);
        })?;

        tracing::info!(booking = %booking_id, from = %current.status, to = %status, "booking transitioned");
        Ok(())
    }

    /// Practice-wide busy/free picture for one slot of one day.
    ///
    /// Read-only snapshot; taken without locks, so a concurrent booking
    /// may or may not appear.
    pub fn slot_occupancy(&self, date: NaiveDate, slot: TimeSlot) -> SlotOccupancy {
        let busy_caregiver_ids: Vec<RecordId> = self
            .store
            .bookings
            .find(|b| b.date == date && b.slot == slot && b.status == BookingStatus::Scheduled)
            .into_iter()
            .map(|(_, b)| b.caregiver_id)
            .collect();
        let total_caregivers = self.store.caregivers.len();
        let busy_count = busy_caregiver_ids.len();
        SlotOccupancy {
            date,
            slot,
            busy_count,
            free_count: total_caregivers.saturating_sub(busy_count),
            busy_caregiver_ids,
            total_caregivers,
        }
    }

    /// Free/busy state of every slot in one caregiver's day.
    pub fn caregiver_availability(
        &self,
        caregiver_id: RecordId,
        date: NaiveDate,
    ) -> Result<Vec<SlotAvailability>, ScheduleError> {
        if self.store.caregivers.get(caregiver_id).is_none() {
            return Err(ScheduleError::CaregiverNotFound);
        }
        let busy: Vec<TimeSlot> = self
            .store
            .bookings
            .find(|b| {
                b.caregiver_id == caregiver_id
                    && b.date == date
                    && b.status == BookingStatus::Scheduled
            })
            .into_iter()
            .map(|(_, b)| b.slot)
            .collect();
        Ok(TimeSlot::ALL
            .iter()
            .map(|&slot| SlotAvailability {
                slot,
                free: !busy.contains(&slot),
            })
            .collect())
    }

    /// Roster-wide counts, lifetime session total, and mean rating.
    pub fn roster_stats(&self) -> RosterStats {
        let rows = self.store.caregivers.find(|_| true);
        let total = rows.len();
        let available = rows.iter().filter(|(_, c)| c.available).count();
        let total_sessions = rows.iter().map(|(_, c)| c.total_sessions).sum();
        let average_rating = if total == 0 {
            None
        } else {
            let sum: f32 = rows.iter().map(|(_, c)| c.rating.unwrap_or(0.0)).sum();
            Some(sum / total as f32)
        };
        RosterStats {
            total,
            available,
            busy: total - available,
            average_rating,
            total_sessions,
        }
    }

    /// A caregiver's bookings, newest date first, capped at `limit`
    /// (default 50). Includes terminal rows.
    pub fn session_history(
        &self,
        caregiver_id: RecordId,
        limit: Option<usize>,
    ) -> Result<Vec<(RecordId, Booking)>, ScheduleError> {
        if self.store.caregivers.get(caregiver_id).is_none() {
            return Err(ScheduleError::CaregiverNotFound);
        }
        let mut rows = self
            .store
            .bookings
            .find(|b| b.caregiver_id == caregiver_id);
        rows.sort_by(|(_, a), (_, b)| b.date.cmp(&a.date).then(b.slot.cmp(&a.slot)));
        rows.truncate(limit.unwrap_or(HISTORY_LIMIT_DEFAULT));
        Ok(rows)
    }
}

fn slot_lock_key(caregiver_id: RecordId, date: NaiveDate, slot: TimeSlot) -> String {
    format!("slot:{caregiver_id}:{date}:{slot}")
}

fn booking_lock_key(booking_id: RecordId) -> String {
    format!("booking:{booking_id}")
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
