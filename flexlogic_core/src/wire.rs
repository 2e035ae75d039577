//! Five-valued lane logic and the driver resolution table.
//!
//! Every net is a bundle of `WIDTH` independent lanes. When one net drives
//! another, each target lane is resolved against the matching driver lane
//! through a fixed 5x5 table (the "Buckwell" table). The table has no
//! memory: the result depends only on the pair (target, driver).

use serde::{Deserialize, Serialize};

/// Number of lanes bundled into one net.
pub const WIDTH: usize = 32;

/// The value held by one lane.
///
/// Ordinals are table indices, not a logical ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WireState {
    DrivenLow = 0,
    DrivenHigh = 1,
    Conflict = 2,
    Floating = 3,
    #[default]
    Unknown = 4,
}

/// A full state vector, one entry per lane.
pub type StateVector = [WireState; WIDTH];

impl WireState {
    /// Number of states in the domain.
    pub const COUNT: usize = 5;

    /// All states in ordinal order.
    pub const ALL: [WireState; 5] = [
        WireState::DrivenLow,
        WireState::DrivenHigh,
        WireState::Conflict,
        WireState::Floating,
        WireState::Unknown,
    ];

    /// Returns the table ordinal.
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Converts an ordinal back into a state.
    ///
    /// Returns `None` for anything outside `0..=4`.
    pub fn from_ordinal(value: i64) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// True for `DrivenLow` and `DrivenHigh`.
    pub const fn is_driven(self) -> bool {
        matches!(self, WireState::DrivenLow | WireState::DrivenHigh)
    }

    /// Single-letter form used in logs: `0`, `1`, `x`, `z`, `u`.
    pub const fn symbol(self) -> char {
        match self {
            WireState::DrivenLow => '0',
            WireState::DrivenHigh => '1',
            WireState::Conflict => 'x',
            WireState::Floating => 'z',
            WireState::Unknown => 'u',
        }
    }
}

impl std::fmt::Display for WireState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl TryFrom<i32> for WireState {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_ordinal(i64::from(value)).ok_or(value)
    }
}

impl From<WireState> for u8 {
    fn from(state: WireState) -> Self {
        state.ordinal()
    }
}

use WireState::{Conflict as X, DrivenHigh as H, DrivenLow as L, Floating as Z, Unknown as U};

/// `TABLE[target * 5 + driver]`
#[rustfmt::skip]
const TABLE: [WireState; 25] = [
    // target DrivenLow
    L, X, X, L, U,
    // target DrivenHigh
    X, H, X, H, U,
    // target Conflict
    X, X, X, X, U,
    // target Floating
    L, H, X, Z, U,
    // target Unknown
    L, H, X, Z, U,
];

/// Resolves one target lane driven by one driver lane.
#[inline]
pub const fn resolve(target: WireState, driver: WireState) -> WireState {
    TABLE[target as usize * WireState::COUNT + driver as usize]
}

/// Drives `to` from `from`, lane by lane.
pub fn drive(from: &StateVector, to: &mut StateVector) {
    for (target, driver) in to.iter_mut().zip(from.iter()) {
        *target = resolve(*target, *driver);
    }
}

/// A vector with every lane set to `state`.
pub const fn uniform(state: WireState) -> StateVector {
    [state; WIDTH]
}

/// Packs the lanes holding `DrivenHigh` into a bit mask, lane 0 in bit 0.
pub fn value_bits(states: &StateVector) -> u32 {
    lane_mask(states, WireState::DrivenHigh)
}

/// Packs the lanes equal to `which` into a bit mask, lane 0 in bit 0.
pub fn lane_mask(states: &StateVector, which: WireState) -> u32 {
    states
        .iter()
        .enumerate()
        .filter(|(_, s)| **s == which)
        .fold(0u32, |mask, (lane, _)| mask | (1 << lane))
}

/// Builds a fully driven vector from a bit pattern, lane 0 from bit 0.
pub fn from_value_bits(bits: u32) -> StateVector {
    let mut states = uniform(WireState::DrivenLow);
    for (lane, state) in states.iter_mut().enumerate() {
        if (bits >> lane) & 1 == 1 {
            *state = WireState::DrivenHigh;
        }
    }
    states
}

/// Lane ordinals, for notifications and snapshots.
pub fn ordinals(states: &StateVector) -> Vec<u8> {
    states.iter().map(|s| s.ordinal()).collect()
}

/// Compact lane string, lane 0 first, e.g. `"01xzuuuu..."`.
pub fn format_lanes(states: &StateVector) -> String {
    states.iter().map(|s| s.symbol()).collect()
}
