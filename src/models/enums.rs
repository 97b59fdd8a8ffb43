//! Wire-string enums shared across the core.

use serde::{Deserialize, Serialize};

/// Raised when a wire string does not name a known enum variant.
#[derive(Debug, thiserror::Error)]
#[error("Invalid {field}: '{value}'")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Generate an enum whose serde and `FromStr` forms are the given wire
/// strings (not the Rust variant names).
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Role {
    Admin => "admin",
    Doctor => "doctor",
    Caregiver => "caregiver",
    Specialist => "specialist",
});

str_enum!(BookingStatus {
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
    NoShow => "no_show",
});

impl BookingStatus {
    /// Terminal with respect to slot occupancy: the slot is freed and
    /// the row is history.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Scheduled)
    }
}

str_enum!(AssignmentStatus {
    Active => "active",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl AssignmentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

str_enum!(TimeSlot {
    T0900 => "09:00-10:00",
    T1000 => "10:00-11:00",
    T1100 => "11:00-12:00",
    T1200 => "12:00-13:00",
    T1400 => "14:00-15:00",
    T1500 => "15:00-16:00",
    T1600 => "16:00-17:00",
    T1700 => "17:00-18:00",
});

impl TimeSlot {
    /// The fixed working-day roster of bookable slots, in clock order.
    pub const ALL: [TimeSlot; 8] = [
        TimeSlot::T0900,
        TimeSlot::T1000,
        TimeSlot::T1100,
        TimeSlot::T1200,
        TimeSlot::T1400,
        TimeSlot::T1500,
        TimeSlot::T1600,
        TimeSlot::T1700,
    ];
}
