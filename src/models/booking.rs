//! Caregivers and their slot bookings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{BookingStatus, TimeSlot};
use crate::store::RecordId;

/// A practice caregiver who can be booked into day slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caregiver {
    /// Backing user record, once the caregiver has signed in.
    pub user_id: Option<RecordId>,
    pub name: String,
    pub specialties: Vec<String>,
    pub available: bool,
    /// Lifetime booking count. Monotonic, denormalized statistic — it
    /// carries no invariant and is never decremented.
    pub total_sessions: u64,
    pub rating: Option<f32>,
}

/// One caregiver session booked for a patient.
///
/// Invariant (owned by the scheduler, not this struct): for a given
/// `(caregiver_id, date, slot)` at most one booking is `scheduled` at
/// any time. Terminal rows persist for history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub caregiver_id: RecordId,
    pub patient_id: RecordId,
    /// The staff member (doctor) who made the booking.
    pub staff_id: RecordId,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub status: BookingStatus,
    pub session_type: String,
    pub notes: Option<String>,
    pub rating: Option<u8>,
}
