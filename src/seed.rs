//! Demo roster for local development.
//!
//! Inserted at startup when `VAIDYA_SEED_DEMO` is set, so the schedule
//! and capacity endpoints have something to work against before any
//! real registration flow runs.

use crate::models::{Caregiver, Patient, Specialist};
use crate::store::{RecordId, RecordStore};

pub fn seed_demo_roster(store: &RecordStore) {
    let staff_id = RecordId::new();

    for (name, specialties) in [
        ("Asha Nair", vec!["abhyanga", "shirodhara"]),
        ("Bimal Joshi", vec!["swedana"]),
        ("Chitra Rao", vec!["abhyanga", "nasya"]),
    ] {
        store.caregivers.insert(Caregiver {
            user_id: None,
            name: name.to_string(),
            specialties: specialties.into_iter().map(String::from).collect(),
            available: true,
            total_sessions: 0,
            rating: None,
        });
    }

    for (name, max_load) in [("Meera Kulkarni", 8), ("Devan Pillai", 6)] {
        store.specialists.insert(Specialist {
            user_id: None,
            name: name.to_string(),
            specialties: vec!["nutrition".into()],
            available: true,
            max_load,
            current_load: 0,
        });
    }

    for (name, age, goals) in [
        ("Ravi Menon", 52, vec!["joint mobility", "better sleep"]),
        ("Sita Iyer", 34, vec!["stress reduction"]),
    ] {
        store.patients.insert(Patient {
            name: name.to_string(),
            age: Some(age),
            health_goals: goals.into_iter().map(String::from).collect(),
            staff_id,
            assigned_specialist_id: None,
            active: true,
        });
    }

    tracing::info!(
        caregivers = store.caregivers.len(),
        specialists = store.specialists.len(),
        patients = store.patients.len(),
        "demo roster seeded"
    );
}
