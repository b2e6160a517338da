use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of an order draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftState {
    /// Nothing selected yet
    Empty,
    Editing,
    /// Waiting on order storage
    Saving,
    /// Persisted; further edits return to Editing
    Saved,
}

impl fmt::Display for DraftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DraftState::Empty => "empty",
            DraftState::Editing => "editing",
            DraftState::Saving => "saving",
            DraftState::Saved => "saved",
        };
        write!(f, "{name}")
    }
}

/// Service for managing draft state transitions
pub struct DraftStateMachine;

impl DraftStateMachine {
    /// Check if a state transition is valid
    ///
    /// # Valid Transitions
    /// - Empty → Editing (first customer or item)
    /// - Editing → Saving (submit)
    /// - Saving → Saved (storage accepted), Editing (storage failed)
    /// - Saved → Editing (any edit), Saving (re-submit)
    /// - Any state → Same state (idempotent)
    pub fn is_valid_transition(from: DraftState, to: DraftState) -> bool {
        if from == to {
            return true;
        }

        matches!(
            (from, to),
            (DraftState::Empty, DraftState::Editing)
                | (DraftState::Editing, DraftState::Saving)
                | (DraftState::Saving, DraftState::Saved)
                | (DraftState::Saving, DraftState::Editing)
                | (DraftState::Saved, DraftState::Editing)
                | (DraftState::Saved, DraftState::Saving)
        )
    }

    /// Attempt to transition from one state to another
    ///
    /// # Returns
    /// `Ok(to)` if the transition is valid, `Err(message)` otherwise
    pub fn transition(from: DraftState, to: DraftState) -> Result<DraftState, String> {
        if Self::is_valid_transition(from, to) {
            Ok(to)
        } else {
            Err(format!("Invalid draft transition from {} to {}", from, to))
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn draft_state_strategy() -> impl Strategy<Value = DraftState> {
        prop_oneof![
            Just(DraftState::Empty),
            Just(DraftState::Editing),
            Just(DraftState::Saving),
            Just(DraftState::Saved),
        ]
    }

    #[test]
    fn prop_same_state_is_valid() {
        proptest!(|(state in draft_state_strategy())| {
            prop_assert!(DraftStateMachine::is_valid_transition(state, state));
        });
    }

    /// transition() and is_valid_transition() agree
    #[test]
    fn prop_transition_consistency() {
        proptest!(|(from in draft_state_strategy(), to in draft_state_strategy())| {
            let is_valid = DraftStateMachine::is_valid_transition(from, to);
            match DraftStateMachine::transition(from, to) {
                Ok(state) => {
                    prop_assert!(is_valid);
                    prop_assert_eq!(state, to);
                }
                Err(_) => prop_assert!(!is_valid),
            }
        });
    }
}
