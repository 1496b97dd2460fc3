//! Target allocations: the only kind of instruction a strategy issues.

use serde::{Deserialize, Serialize};

/// Fraction of total portfolio value to hold in one symbol.
///
/// `1.0` is fully long, `-1.0` fully short, `0.0` flat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetAllocation(pub f64);

impl TargetAllocation {
    pub const FULL_LONG: Self = Self(1.0);
    pub const FULL_SHORT: Self = Self(-1.0);
    pub const FLAT: Self = Self(0.0);

    pub fn fraction(self) -> f64 {
        self.0
    }
}
