//! Specialists, patients, and capacity-bounded assignments.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::AssignmentStatus;
use crate::store::RecordId;

/// A specialist with a bounded active-patient load.
///
/// Invariant (owned by the allocator): `current_load` equals the number
/// of this specialist's assignments with status `active`, and a new
/// active assignment is only admitted while `current_load < max_load`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Specialist {
    pub user_id: Option<RecordId>,
    pub name: String,
    pub specialties: Vec<String>,
    pub available: bool,
    pub max_load: u32,
    pub current_load: u32,
}

impl Specialist {
    /// Whether a new active assignment may be admitted.
    pub fn has_capacity(&self) -> bool {
        self.current_load < self.max_load
    }
}

/// A registered patient.
///
/// `assigned_specialist_id` is a denormalized back-reference kept in
/// step by the allocator for fast lookup; the assignment rows are the
/// source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub name: String,
    pub age: Option<u32>,
    pub health_goals: Vec<String>,
    /// The staff member (doctor) who registered the patient.
    pub staff_id: RecordId,
    pub assigned_specialist_id: Option<RecordId>,
    pub active: bool,
}

/// A patient attached to a specialist's active load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityAssignment {
    pub patient_id: RecordId,
    pub specialist_id: RecordId,
    pub staff_id: RecordId,
    pub assigned_on: NaiveDate,
    pub status: AssignmentStatus,
    /// Care-plan text produced by the plan collaborator. Orthogonal to
    /// `status`: an assignment is active with or without a plan.
    pub plan: Option<String>,
    pub notes: Option<String>,
}

/// Structured summary handed to the plan-generation collaborator.
///
/// Deliberately free of record ids — the generator sees clinical
/// context, never storage detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSummary {
    pub patient_name: String,
    pub age: Option<u32>,
    pub health_goals: Vec<String>,
    pub assignment_notes: Option<String>,
}
