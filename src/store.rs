//! In-process stand-in for the persistence collaborator.
//!
//! The record store offers exactly the contract the service layer is
//! allowed to rely on: get-by-id, predicate lookup, insert, partial
//! update, delete — each atomic for a single record, with **no**
//! multi-record transaction primitive. Every cross-record invariant
//! (one live code per identity, one scheduled booking per slot, load
//! under ceiling) therefore has to be enforced by the caller, which is
//! what [`crate::keyed_lock::KeyedLocks`] exists for.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Booking, Caregiver, CapacityAssignment, OtpSession, Patient, Specialist, User,
};

// ─── Record ids ───────────────────────────────────────────────────────────────

/// Opaque record identifier. One id type for every table; the field name
/// at the use site (`caregiver_id`, `patient_id`, …) carries the meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Errors from single-record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record {0} not found")]
    RecordNotFound(RecordId),
}

// ─── Generic table ────────────────────────────────────────────────────────────

/// A keyed table of cloneable rows.
///
/// All operations take `&self`; interior mutability via `RwLock`. A
/// poisoned lock is recovered with `into_inner` — the guarded map is
/// always left structurally consistent because `patch` closures are
/// required not to panic.
pub struct Table<T> {
    rows: RwLock<HashMap<RecordId, T>>,
}

impl<T: Clone> Table<T> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a row by id.
    pub fn get(&self, id: RecordId) -> Option<T> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Insert a new row under a fresh id. Returns the id.
    pub fn insert(&self, row: T) -> RecordId {
        let id = RecordId::new();
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, row);
        id
    }

    /// Apply a partial update to one row, atomically with respect to
    /// concurrent readers and other patches of the same table.
    pub fn patch<F>(&self, id: RecordId, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut T),
    {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let row = rows.get_mut(&id).ok_or(StoreError::RecordNotFound(id))?;
        apply(row);
        Ok(())
    }

    /// Delete a row. Returns `true` if it existed.
    pub fn delete(&self, id: RecordId) -> bool {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// All rows matching a predicate (indexed-lookup stand-in).
    pub fn find<P>(&self, pred: P) -> Vec<(RecordId, T)>
    where
        P: Fn(&T) -> bool,
    {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, row)| pred(row))
            .map(|(id, row)| (*id, row.clone()))
            .collect()
    }

    /// First row matching a predicate, if any.
    pub fn find_one<P>(&self, pred: P) -> Option<(RecordId, T)>
    where
        P: Fn(&T) -> bool,
    {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(_, row)| pred(row))
            .map(|(id, row)| (*id, row.clone()))
    }

    /// Number of rows in the table.
    pub fn len(&self) -> usize {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Typed store ──────────────────────────────────────────────────────────────

/// The full record store: one table per entity.
///
/// The store persists rows and nothing else — it enforces no cross-entity
/// consistency. Ownership of each table's invariant-bearing fields lies
/// with the subsystem that mutates them (auth, scheduling, capacity).
pub struct RecordStore {
    pub users: Table<User>,
    pub otp_sessions: Table<OtpSession>,
    pub caregivers: Table<Caregiver>,
    pub bookings: Table<Booking>,
    pub patients: Table<Patient>,
    pub specialists: Table<Specialist>,
    pub assignments: Table<CapacityAssignment>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            users: Table::new(),
            otp_sessions: Table::new(),
            caregivers: Table::new(),
            bookings: Table::new(),
            patients: Table::new(),
            specialists: Table::new(),
            assignments: Table::new(),
        }
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        label: String,
        count: u32,
    }

    fn row(label: &str) -> Row {
        Row {
            label: label.to_string(),
            count: 0,
        }
    }

    #[test]
    fn insert_then_get_roundtrips() {
        let table: Table<Row> = Table::new();
        let id = table.insert(row("a"));
        assert_eq!(table.get(id), Some(row("a")));
    }

    #[test]
    fn get_unknown_id_is_none() {
        let table: Table<Row> = Table::new();
        assert!(table.get(RecordId::new()).is_none());
    }

    #[test]
    fn patch_mutates_single_row() {
        let table: Table<Row> = Table::new();
        let a = table.insert(row("a"));
        let b = table.insert(row("b"));

        table.patch(a, |r| r.count += 1).unwrap();

        assert_eq!(table.get(a).unwrap().count, 1);
        assert_eq!(table.get(b).unwrap().count, 0);
    }

    #[test]
    fn patch_unknown_id_errors() {
        let table: Table<Row> = Table::new();
        let missing = RecordId::new();
        let result = table.patch(missing, |r| r.count += 1);
        match result {
            Err(StoreError::RecordNotFound(id)) => assert_eq!(id, missing),
            other => panic!("Expected RecordNotFound, got {other:?}"),
        }
    }

    #[test]
    fn delete_removes_row() {
        let table: Table<Row> = Table::new();
        let id = table.insert(row("a"));
        assert!(table.delete(id));
        assert!(!table.delete(id));
        assert!(table.get(id).is_none());
    }

    #[test]
    fn find_filters_by_predicate() {
        let table: Table<Row> = Table::new();
        table.insert(row("keep"));
        table.insert(row("keep"));
        table.insert(row("drop"));

        let kept = table.find(|r| r.label == "keep");
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn find_one_returns_some_match() {
        let table: Table<Row> = Table::new();
        let id = table.insert(row("only"));
        let (found_id, found) = table.find_one(|r| r.label == "only").unwrap();
        assert_eq!(found_id, id);
        assert_eq!(found.label, "only");
        assert!(table.find_one(|r| r.label == "missing").is_none());
    }

    #[test]
    fn record_id_parses_its_display_form() {
        let id = RecordId::new();
        let parsed: RecordId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn record_id_rejects_garbage() {
        assert!("not-a-record-id".parse::<RecordId>().is_err());
    }
}
