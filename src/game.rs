//! Game value kinds exchanged with the remote authority.
//!
//! The runtime does not implement any game rules. These types exist so that
//! values crossing the wire keep their identity inside competitor programs:
//! - Directions and map locations
//! - Enumerations with a canonical wire ordering (team, unit type, trap type,
//!   game action exception kind)
//! - Sensing records returned by capability calls

/// Implements the canonical-ordering helpers shared by every wire enum.
macro_rules! ordinal_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Every member in canonical wire order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Position in the canonical ordering.
            #[must_use]
            pub fn ordinal(self) -> usize {
                Self::ALL.iter().position(|&v| v == self).unwrap_or_default()
            }

            /// Member at a canonical position.
            #[must_use]
            pub fn from_ordinal(index: usize) -> Option<Self> {
                Self::ALL.get(index).copied()
            }

            /// Member name as written in programs.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }

            /// Look up a member by its program-visible name.
            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.name() == name)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

pub(crate) use ordinal_enum;

mod kinds;
mod location;
mod records;

pub use kinds::{GameActionKind, Team, TrapStats, TrapType, UnitStats, UnitType};
pub use location::{Direction, MapLocation};
pub use records::{MapInfo, Message, RobotInfo};
