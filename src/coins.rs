use std::fmt;

use serde::{Deserialize, Serialize};

/// Whole-unit coin amount, stored as an unsigned integer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, Hash,
)]
#[serde(transparent)]
pub struct Coins(u64);

impl Coins {
    pub const ZERO: Coins = Coins(0);

    pub fn new(value: u64) -> Self {
        Coins(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `pct` percent of this amount, truncated toward zero.
    /// Widens internally so large sale amounts cannot overflow.
    pub fn percent(self, pct: u64) -> Coins {
        Coins((self.0 as u128 * pct as u128 / 100) as u64)
    }
}

impl From<u64> for Coins {
    fn from(value: u64) -> Self {
        Coins(value)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for Coins {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Coins(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Coins {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Coins {
    fn sub_assign(&mut self, rhs: Self) {
        // callers validate balance >= rhs before debiting
        self.0 -= rhs.0;
    }
}
