//! Property-based invariants over the state machine, branch names, and
//! session persistence.

use std::collections::BTreeMap;

use chrono::Utc;
use proptest::prelude::*;

use shipline::machine::{self, ALL_STATES};
use shipline::model::session::WorkflowSession;
use shipline::{BranchName, WorkflowState, WorkflowType};

fn any_state() -> impl Strategy<Value = WorkflowState> {
    proptest::sample::select(ALL_STATES.to_vec())
}

fn any_workflow() -> impl Strategy<Value = WorkflowType> {
    proptest::sample::select(vec![
        WorkflowType::Launch,
        WorkflowType::Ship,
        WorkflowType::Hotfix,
    ])
}

proptest! {
    /// `can_transition` answers exactly what the table contains.
    #[test]
    fn transition_predicate_matches_table(
        workflow in any_workflow(),
        from in any_state(),
        to in any_state(),
    ) {
        let in_table = machine::transitions(workflow, from)
            .iter()
            .any(|(next, _)| *next == to);
        prop_assert_eq!(machine::can_transition(workflow, from, to), in_table);
        prop_assert_eq!(machine::transition_trigger(workflow, from, to).is_some(), in_table);
    }

    /// Terminal states never have outgoing transitions, for any family.
    #[test]
    fn terminal_states_are_sinks(workflow in any_workflow(), state in any_state()) {
        if state.is_terminal() {
            prop_assert!(machine::transitions(workflow, state).is_empty());
        }
    }

    /// Branch-name validation never panics and accepts exactly what it
    /// round-trips.
    #[test]
    fn branch_name_validation_is_total(raw in ".{0,64}") {
        if let Ok(name) = BranchName::new(&raw) {
            prop_assert_eq!(name.as_str(), raw.as_str());
            let json = serde_json::to_string(&name).expect("serialize");
            let back: BranchName = serde_json::from_str(&json).expect("deserialize");
            prop_assert_eq!(back, name);
        }
    }

    /// Sessions survive a JSON round-trip byte-for-byte, whatever the
    /// description and history metadata contain.
    #[test]
    fn session_round_trip_is_lossless(
        description in proptest::option::of(".{0,80}"),
        key in "[a-z_]{1,12}",
        value in ".{0,40}",
    ) {
        let mut session = WorkflowSession::new(
            BranchName::new("feature/prop").expect("valid"),
            WorkflowType::Launch,
            Utc::now(),
            30,
        );
        session.metadata.description = description;
        let mut metadata = BTreeMap::new();
        metadata.insert(key, value);
        session
            .transition_to(WorkflowState::BranchReady, Utc::now(), metadata)
            .expect("legal transition");

        let json = serde_json::to_string_pretty(&session).expect("serialize");
        let back: WorkflowSession = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(&back, &session);
        let json2 = serde_json::to_string_pretty(&back).expect("serialize");
        prop_assert_eq!(json2, json);
    }

    /// The suggestion generator always yields a name the probe accepts, and
    /// it never suggests the base name itself.
    #[test]
    fn suggestions_terminate_and_avoid_the_base(taken_count in 0usize..20) {
        let suggestion = shipline::validate::branch::suggest_name("feature/x", |candidate| {
            let n: usize = candidate
                .rsplit_once("-v")
                .and_then(|(_, n)| n.parse().ok())
                .unwrap_or(0);
            Ok(n < taken_count + 2)
        })
        .expect("suggestion");
        prop_assert!(suggestion.starts_with("feature/x-v"));
        prop_assert_ne!(suggestion, "feature/x");
    }
}
