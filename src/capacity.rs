//! Capacity-bounded patient assignment to specialists.
//!
//! Each specialist advertises a maximum concurrent patient load; the
//! allocator admits a new active assignment only while the specialist's
//! current load is below that ceiling. All mutations of one
//! specialist's load run under that specialist's lock, so the counter
//! stays equal to the number of active assignment rows.

use std::sync::{Arc, PoisonError};

use chrono::Utc;

use crate::keyed_lock::KeyedLocks;
use crate::models::{
    AssignmentStatus, CapacityAssignment, PatientSummary, Specialist,
};
use crate::store::{RecordId, RecordStore, StoreError};

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CapacityError {
    #[error("Specialist not found")]
    SpecialistNotFound,
    #[error("Patient not found")]
    PatientNotFound,
    #[error("Assignment not found")]
    AssignmentNotFound,
    #[error("Specialist is at capacity ({current_load}/{max_load})")]
    CapacityExceeded { current_load: u32, max_load: u32 },
    #[error("Assignment is already {status} and cannot change")]
    AssignmentClosed { status: AssignmentStatus },
    #[error("Care-plan generation failed: {0}")]
    PlanGeneration(String),
}

impl From<StoreError> for CapacityError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RecordNotFound(_) => CapacityError::AssignmentNotFound,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Plan generation — external collaborator
// ═══════════════════════════════════════════════════════════

/// Produces care-plan text from a patient summary.
///
/// The allocator treats this as a remote collaborator: a failure
/// surfaces as `PlanGeneration` and leaves the assignment untouched.
pub trait PlanGenerator: Send + Sync {
    fn generate(&self, summary: &PatientSummary) -> Result<String, String>;
}

/// Deterministic template generator used when no external service is
/// wired in.
pub struct TemplatePlanGenerator;

impl PlanGenerator for TemplatePlanGenerator {
    fn generate(&self, summary: &PatientSummary) -> Result<String, String> {
        let goals = if summary.health_goals.is_empty() {
            "general wellbeing".to_string()
        } else {
            summary.health_goals.join(", ")
        };
        let mut plan = format!(
            "Care plan for {name}\nFocus areas: {goals}\n\
             Week 1-2: baseline diet review and daily routine mapping.\n\
             Week 3-4: targeted adjustments with twice-weekly check-ins.",
            name = summary.patient_name,
        );
        if let Some(age) = summary.age {
            plan.push_str(&format!("\nAge-adjusted portions for {age} years."));
        }
        if let Some(notes) = &summary.assignment_notes {
            plan.push_str(&format!("\nReferral notes: {notes}"));
        }
        Ok(plan)
    }
}

// ═══════════════════════════════════════════════════════════
// Requests
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct AssignmentRequest {
    pub patient_id: RecordId,
    pub specialist_id: RecordId,
    pub staff_id: RecordId,
    pub notes: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// CapacityAllocator
// ═══════════════════════════════════════════════════════════

/// Owns assignment admission and the load-counter invariant.
pub struct CapacityAllocator {
    store: Arc<RecordStore>,
    locks: KeyedLocks,
}

impl CapacityAllocator {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Admit an active assignment if the specialist has headroom.
    ///
    /// Capacity check, row insert, counter increment, and the patient
    /// back-reference all run under the specialist's lock.
    pub fn assign(&self, request: AssignmentRequest) -> Result<RecordId, CapacityError> {
        let AssignmentRequest {
            patient_id,
            specialist_id,
            staff_id,
            notes,
        } = request;

        let cell = self.locks.acquire(&specialist_lock_key(specialist_id));
        let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

        let specialist = self
            .store
            .specialists
            .get(specialist_id)
            .ok_or(CapacityError::SpecialistNotFound)?;
        if !specialist.has_capacity() {
            tracing::warn!(
                specialist = %specialist_id,
                current = specialist.current_load,
                max = specialist.max_load,
                "assignment rejected at capacity"
            );
            return Err(CapacityError::CapacityExceeded {
                current_load: specialist.current_load,
                max_load: specialist.max_load,
            });
        }

        if self.store.patients.get(patient_id).is_none() {
            return Err(CapacityError::PatientNotFound);
        }

        let assignment_id = self.store.assignments.insert(CapacityAssignment {
            patient_id,
            specialist_id,
            staff_id,
            assigned_on: Utc::now().date_naive(),
            status: AssignmentStatus::Active,
            plan: None,
            notes,
        });
        self.store
            .specialists
            .patch(specialist_id, |s| s.current_load += 1)
            .map_err(|_| CapacityError::SpecialistNotFound)?;
        // Denormalized back-reference for fast patient lookup.
        self.store
            .patients
            .patch(patient_id, |p| p.assigned_specialist_id = Some(specialist_id))
            .map_err(|_| CapacityError::PatientNotFound)?;

        tracing::info!(assignment = %assignment_id, specialist = %specialist_id, patient = %patient_id, "assignment admitted");
        Ok(assignment_id)
    }

    /// Move an assignment to a new status.
    ///
    /// Closing an active assignment (completed or cancelled) releases
    /// one unit of the specialist's load, exactly once: the prior
    /// status is re-read under the specialist's lock, and terminal
    /// assignments refuse any further transition.
    pub fn update_status(
        &self,
        assignment_id: RecordId,
        status: AssignmentStatus,
        notes: Option<String>,
    ) -> Result<(), CapacityError> {
        // Resolve the specialist first so the lock key is known; the
        // authoritative status read happens again under the lock.
        let assignment = self
            .store
            .assignments
            .get(assignment_id)
            .ok_or(CapacityError::AssignmentNotFound)?;

        let cell = self
            .locks
            .acquire(&specialist_lock_key(assignment.specialist_id));
        let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

        let prior = self
            .store
            .assignments
            .get(assignment_id)
            .ok_or(CapacityError::AssignmentNotFound)?;
        if prior.status.is_terminal() {
            return Err(CapacityError::AssignmentClosed {
                status: prior.status,
            });
        }

        self.store.assignments.patch(assignment_id, |a| {
            a.status = status;
            if let Some(notes) = notes {
                a.notes = Some(notes);
            }
        })?;

        if prior.status == AssignmentStatus::Active && status.is_terminal() {
            self.store
                .specialists
                .patch(prior.specialist_id, |s| {
                    s.current_load = s.current_load.saturating_sub(1);
                })
                .map_err(|_| CapacityError::SpecialistNotFound)?;
            self.store
                .patients
                .patch(prior.patient_id, |p| {
                    if p.assigned_specialist_id == Some(prior.specialist_id) {
                        p.assigned_specialist_id = None;
                    }
                })
                .ok();
        }

        tracing::info!(assignment = %assignment_id, from = %prior.status, to = %status, "assignment transitioned");
        Ok(())
    }

    /// Attach care-plan text to an active assignment. Does not touch
    /// the status; a plan is content, not a state transition.
    pub fn set_plan(&self, assignment_id: RecordId, plan: String) -> Result<(), CapacityError> {
        let assignment = self
            .store
            .assignments
            .get(assignment_id)
            .ok_or(CapacityError::AssignmentNotFound)?;

        let cell = self
            .locks
            .acquire(&specialist_lock_key(assignment.specialist_id));
        let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self
            .store
            .assignments
            .get(assignment_id)
            .ok_or(CapacityError::AssignmentNotFound)?;
        if current.status.is_terminal() {
            return Err(CapacityError::AssignmentClosed {
                status: current.status,
            });
        }

        self.store
            .assignments
            .patch(assignment_id, |a| a.plan = Some(plan))?;
        tracing::info!(assignment = %assignment_id, "care plan attached");
        Ok(())
    }

    /// Build the plan-generator input for an assignment's patient.
    pub fn patient_summary(&self, assignment_id: RecordId) -> Result<PatientSummary, CapacityError> {
        let assignment = self
            .store
            .assignments
            .get(assignment_id)
            .ok_or(CapacityError::AssignmentNotFound)?;
        let patient = self
            .store
            .patients
            .get(assignment.patient_id)
            .ok_or(CapacityError::PatientNotFound)?;
        Ok(PatientSummary {
            patient_name: patient.name,
            age: patient.age,
            health_goals: patient.health_goals,
            assignment_notes: assignment.notes,
        })
    }

    /// Specialists currently able to take a new patient.
    pub fn available_specialists(&self) -> Vec<(RecordId, Specialist)> {
        let mut rows = self
            .store
            .specialists
            .find(|s| s.available && s.has_capacity());
        rows.sort_by(|(_, a), (_, b)| a.name.cmp(&b.name));
        rows
    }

    /// All registered specialists regardless of load.
    pub fn all_specialists(&self) -> Vec<(RecordId, Specialist)> {
        let mut rows = self.store.specialists.find(|_| true);
        rows.sort_by(|(_, a), (_, b)| a.name.cmp(&b.name));
        rows
    }

    /// One specialist's assignments, optionally filtered by status.
    pub fn assignments_for(
        &self,
        specialist_id: RecordId,
        status: Option<AssignmentStatus>,
    ) -> Result<Vec<(RecordId, CapacityAssignment)>, CapacityError> {
        if self.store.specialists.get(specialist_id).is_none() {
            return Err(CapacityError::SpecialistNotFound);
        }
        let mut rows = self.store.assignments.find(|a| {
            a.specialist_id == specialist_id && status.map_or(true, |s| a.status == s)
        });
        rows.sort_by(|(_, a), (_, b)| b.assigned_on.cmp(&a.assigned_on));
        Ok(rows)
    }
}

fn specialist_lock_key(specialist_id: RecordId) -> String {
    format!("specialist:{specialist_id}")
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Patient;

    fn allocator() -> (Arc<RecordStore>, CapacityAllocator) {
        let store = Arc::new(RecordStore::new());
        let allocator = CapacityAllocator::new(store.clone());
        (store, allocator)
    }

    fn specialist(store: &RecordStore, name: &str, max_load: u32) -> RecordId {
        store.specialists.insert(Specialist {
            user_id: None,
            name: name.into(),
            specialties: vec!["nutrition".into()],
            available: true,
            max_load,
            current_load: 0,
        })
    }

    fn patient(store: &RecordStore, name: &str) -> RecordId {
        store.patients.insert(Patient {
            name: name.into(),
            age: Some(41),
            health_goals: vec!["better sleep".into()],
            staff_id: RecordId::new(),
            assigned_specialist_id: None,
            active: true,
        })
    }

    fn request(patient_id: RecordId, specialist_id: RecordId) -> AssignmentRequest {
        AssignmentRequest {
            patient_id,
            specialist_id,
            staff_id: RecordId::new(),
            notes: None,
        }
    }

    #[test]
    fn assignment_increments_load_and_back_reference() {
        let (store, allocator) = allocator();
        let sp = specialist(&store, "Meera", 3);
        let pt = patient(&store, "Ravi");

        allocator.assign(request(pt, sp)).unwrap();

        assert_eq!(store.specialists.get(sp).unwrap().current_load, 1);
        assert_eq!(
            store.patients.get(pt).unwrap().assigned_specialist_id,
            Some(sp)
        );
    }

    #[test]
    fn assignment_at_ceiling_is_rejected() {
        let (store, allocator) = allocator();
        let sp = specialist(&store, "Meera", 2);

        allocator.assign(request(patient(&store, "A"), sp)).unwrap();
        allocator.assign(request(patient(&store, "B"), sp)).unwrap();

        let third = allocator.assign(request(patient(&store, "C"), sp));
        assert!(matches!(
            third,
            Err(CapacityError::CapacityExceeded {
                current_load: 2,
                max_load: 2
            })
        ));
        assert_eq!(store.specialists.get(sp).unwrap().current_load, 2);
    }

    #[test]
    fn completing_releases_exactly_one_unit() {
        let (store, allocator) = allocator();
        let sp = specialist(&store, "Meera", 1);
        let pt = patient(&store, "Ravi");
        let id = allocator.assign(request(pt, sp)).unwrap();

        allocator
            .update_status(id, AssignmentStatus::Completed, None)
            .unwrap();
        assert_eq!(store.specialists.get(sp).unwrap().current_load, 0);
        assert_eq!(store.patients.get(pt).unwrap().assigned_specialist_id, None);

        // The freed unit admits the next patient.
        allocator.assign(request(patient(&store, "Sita"), sp)).unwrap();
    }

    #[test]
    fn closed_assignment_refuses_further_transitions() {
        let (store, allocator) = allocator();
        let sp = specialist(&store, "Meera", 2);
        let id = allocator.assign(request(patient(&store, "Ravi"), sp)).unwrap();

        allocator
            .update_status(id, AssignmentStatus::Cancelled, Some("moved away".into()))
            .unwrap();
        assert_eq!(store.specialists.get(sp).unwrap().current_load, 0);

        // A second close must not decrement again.
        let again = allocator.update_status(id, AssignmentStatus::Completed, None);
        assert!(matches!(
            again,
            Err(CapacityError::AssignmentClosed {
                status: AssignmentStatus::Cancelled
            })
        ));
        assert_eq!(store.specialists.get(sp).unwrap().current_load, 0);

        // Nor may it be reactivated.
        let reopen = allocator.update_status(id, AssignmentStatus::Active, None);
        assert!(matches!(reopen, Err(CapacityError::AssignmentClosed { .. })));
    }

    #[test]
    fn plan_attaches_without_touching_status() {
        let (store, allocator) = allocator();
        let sp = specialist(&store, "Meera", 2);
        let id = allocator.assign(request(patient(&store, "Ravi"), sp)).unwrap();

        allocator.set_plan(id, "week one: kitchari".into()).unwrap();

        let row = store.assignments.get(id).unwrap();
        assert_eq!(row.status, AssignmentStatus::Active);
        assert_eq!(row.plan.as_deref(), Some("week one: kitchari"));
    }

    #[test]
    fn plan_is_refused_on_closed_assignment() {
        let (store, allocator) = allocator();
        let sp = specialist(&store, "Meera", 2);
        let id = allocator.assign(request(patient(&store, "Ravi"), sp)).unwrap();
        allocator
            .update_status(id, AssignmentStatus::Completed, None)
            .unwrap();

        let result = allocator.set_plan(id, "too late".into());
        assert!(matches!(result, Err(CapacityError::AssignmentClosed { .. })));
    }

    #[test]
    fn unknown_ids_are_reported() {
        let (store, allocator) = allocator();
        let missing = RecordId::new();

        let assign = allocator.assign(request(missing, missing));
        assert!(matches!(assign, Err(CapacityError::SpecialistNotFound)));

        let sp = specialist(&store, "Meera", 2);
        let assign = allocator.assign(request(missing, sp));
        assert!(matches!(assign, Err(CapacityError::PatientNotFound)));

        let status = allocator.update_status(missing, AssignmentStatus::Completed, None);
        assert!(matches!(status, Err(CapacityError::AssignmentNotFound)));
    }

    #[test]
    fn available_specialists_excludes_full_and_unavailable() {
        let (store, allocator) = allocator();
        let full = specialist(&store, "Full", 1);
        allocator.assign(request(patient(&store, "A"), full)).unwrap();
        let open = specialist(&store, "Open", 2);
        let away = specialist(&store, "Away", 2);
        store.specialists.patch(away, |s| s.available = false).unwrap();

        let available = allocator.available_specialists();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].0, open);
        assert_eq!(allocator.all_specialists().len(), 3);
    }

    #[test]
    fn assignment_listing_filters_by_status() {
        let (store, allocator) = allocator();
        let sp = specialist(&store, "Meera", 5);
        let a = allocator.assign(request(patient(&store, "A"), sp)).unwrap();
        let _b = allocator.assign(request(patient(&store, "B"), sp)).unwrap();
        allocator
            .update_status(a, AssignmentStatus::Completed, None)
            .unwrap();

        let all = allocator.assignments_for(sp, None).unwrap();
        assert_eq!(all.len(), 2);
        let active = allocator
            .assignments_for(sp, Some(AssignmentStatus::Active))
            .unwrap();
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn concurrent_assignment_never_exceeds_ceiling() {
        let (store, allocator) = allocator();
        let allocator = Arc::new(allocator);
        let sp = specialist(&store, "Meera", 3);
        let patients: Vec<RecordId> = (0..8).map(|i| patient(&store, &format!("P{i}"))).collect();

        let mut handles = Vec::new();
        for pt in patients {
            let allocator = allocator.clone();
            handles.push(std::thread::spawn(move || {
                allocator.assign(request(pt, sp)).is_ok()
            }));
        }
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 3);
        assert_eq!(store.specialists.get(sp).unwrap().current_load, 3);
    }

    #[test]
    fn template_generator_reflects_patient_context() {
        let (store, allocator) = allocator();
        let sp = specialist(&store, "Meera", 2);
        let pt = patient(&store, "Ravi");
        let id = allocator
            .assign(AssignmentRequest {
                patient_id: pt,
                specialist_id: sp,
                staff_id: RecordId::new(),
                notes: Some("post-operative".into()),
            })
            .unwrap();

        let summary = allocator.patient_summary(id).unwrap();
        let plan = TemplatePlanGenerator.generate(&summary).unwrap();
        assert!(plan.contains("Ravi"));
        assert!(plan.contains("better sleep"));
        assert!(plan.contains("post-operative"));
    }
}
