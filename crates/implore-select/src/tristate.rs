//! Three-valued boolean logic
//!
//! Predicate results are `True`, `False`, or `Unknown` ("not decidable from the
//! data available at this evaluation point"). The tables follow Kleene logic, so
//! a definite `False` from an AND (or `True` from an OR) survives any unknown
//! operand.

use serde::{Deserialize, Serialize};

/// A boolean extended with an `Unknown` value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TriState {
    True,
    False,
    #[default]
    Unknown,
}

impl TriState {
    /// Conjunction: `False` dominates, then `Unknown`
    pub fn and(self, other: TriState) -> TriState {
        match (self, other) {
            (TriState::False, _) | (_, TriState::False) => TriState::False,
            (TriState::Unknown, _) | (_, TriState::Unknown) => TriState::Unknown,
            (TriState::True, TriState::True) => TriState::True,
        }
    }

    /// Disjunction: `True` dominates, then `Unknown`
    pub fn or(self, other: TriState) -> TriState {
        match (self, other) {
            (TriState::True, _) | (_, TriState::True) => TriState::True,
            (TriState::Unknown, _) | (_, TriState::Unknown) => TriState::Unknown,
            (TriState::False, TriState::False) => TriState::False,
        }
    }

    /// Negation; `Unknown` stays `Unknown`
    pub fn not(self) -> TriState {
        match self {
            TriState::True => TriState::False,
            TriState::False => TriState::True,
            TriState::Unknown => TriState::Unknown,
        }
    }

    /// True only for a definite `True`
    pub fn is_true(self) -> bool {
        self == TriState::True
    }

    /// True only for a definite `False`
    pub fn is_false(self) -> bool {
        self == TriState::False
    }

    /// Collapse to a bool for final inclusion: anything not disproven counts
    pub fn is_selected(self) -> bool {
        !self.is_false()
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value {
            TriState::True
        } else {
            TriState::False
        }
    }
}
