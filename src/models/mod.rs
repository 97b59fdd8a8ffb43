//! Domain entities and enumerations.

pub mod assignment;
pub mod booking;
pub mod enums;
pub mod identity;
pub mod session;

pub use assignment::{CapacityAssignment, Patient, PatientSummary, Specialist};
pub use booking::{Booking, Caregiver};
pub use enums::{AssignmentStatus, BookingStatus, InvalidEnum, Role, TimeSlot};
pub use identity::{IdentityKey, IdentityKeyError, User};
pub use session::OtpSession;
