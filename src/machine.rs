//! The workflow state machine.
//!
//! A pure, static transition table indexed by `(WorkflowType, from_state)`.
//! No runtime registration: the table is encoded as a `const` match, so the
//! set of legal transitions is fixed at compile time and exhaustively
//! testable.
//!
//! # Lifecycle
//!
//! ```text
//! standard:  Init → BranchReady → ChangesCommitted → Pushed → PrCreated
//!                → WaitingApproval → Merged → Complete
//!            side: Rebasing ⇄ ConflictResolution, Aborted
//!
//! hotfix:    HotfixInit → HotfixReady → HotfixCommitted → HotfixPushed
//!                → HotfixValidated → HotfixDeployed → HotfixCleanup
//!                → HotfixComplete
//!            side: Rollback, Aborted
//! ```
//!
//! `Aborted` is reachable from every non-terminal state of either family.
//! Terminal states (`Complete`, `HotfixComplete`, `Aborted`) have no
//! outgoing transitions.

use crate::model::types::{Trigger as T, WorkflowState as S, WorkflowType};

/// Allowed transitions out of `from` for the given workflow family.
///
/// Each entry pairs the target state with the trigger that legitimizes the
/// move. An empty slice means `from` is terminal (or foreign to the
/// family).
#[must_use]
pub const fn transitions(workflow: WorkflowType, from: S) -> &'static [(S, T)] {
    match workflow {
        WorkflowType::Launch | WorkflowType::Ship => standard_transitions(from),
        WorkflowType::Hotfix => hotfix_transitions(from),
    }
}

const fn standard_transitions(from: S) -> &'static [(S, T)] {
    match from {
        S::Init => &[(S::BranchReady, T::BranchCreated), (S::Aborted, T::AbortCommand)],
        S::BranchReady => &[
            (S::ChangesCommitted, T::CommitCommand),
            (S::Aborted, T::AbortCommand),
        ],
        S::ChangesCommitted => &[
            // Repeat commits accumulate without leaving the state.
            (S::ChangesCommitted, T::CommitCommand),
            (S::Pushed, T::PushCommand),
            (S::Rebasing, T::RebaseStarted),
            (S::Aborted, T::AbortCommand),
        ],
        S::Rebasing => &[
            (S::ChangesCommitted, T::RebaseCompleted),
            (S::ConflictResolution, T::ConflictDetected),
            (S::Aborted, T::AbortCommand),
        ],
        S::ConflictResolution => &[
            (S::Rebasing, T::ConflictResolved),
            (S::Aborted, T::AbortCommand),
        ],
        S::Pushed => &[
            (S::PrCreated, T::PrOpened),
            (S::ChangesCommitted, T::CommitCommand),
            (S::Aborted, T::AbortCommand),
        ],
        S::PrCreated => &[
            (S::WaitingApproval, T::ChecksPassed),
            (S::ChangesCommitted, T::CommitCommand),
            (S::ConflictResolution, T::ConflictDetected),
            (S::Aborted, T::AbortCommand),
        ],
        S::WaitingApproval => &[
            (S::Merged, T::MergeCommand),
            (S::ConflictResolution, T::ConflictDetected),
            (S::Aborted, T::AbortCommand),
        ],
        S::Merged => &[(S::Complete, T::CleanupDone), (S::Aborted, T::AbortCommand)],
        // Terminal, or belongs to the hotfix family.
        S::Complete
        | S::Aborted
        | S::HotfixInit
        | S::HotfixReady
        | S::HotfixCommitted
        | S::HotfixPushed
        | S::HotfixValidated
        | S::HotfixDeployed
        | S::HotfixCleanup
        | S::HotfixComplete
        | S::Rollback => &[],
    }
}

const fn hotfix_transitions(from: S) -> &'static [(S, T)] {
    match from {
        S::HotfixInit => &[
            (S::HotfixReady, T::BranchCreated),
            (S::Aborted, T::AbortCommand),
        ],
        S::HotfixReady => &[
            (S::HotfixCommitted, T::CommitCommand),
            (S::Aborted, T::AbortCommand),
        ],
        S::HotfixCommitted => &[
            (S::HotfixCommitted, T::CommitCommand),
            (S::HotfixPushed, T::PushCommand),
            (S::Aborted, T::AbortCommand),
        ],
        S::HotfixPushed => &[
            (S::HotfixValidated, T::ValidationPassed),
            (S::HotfixCommitted, T::CommitCommand),
            (S::Rollback, T::RollbackCommand),
            (S::Aborted, T::AbortCommand),
        ],
        S::HotfixValidated => &[
            (S::HotfixDeployed, T::DeployMarked),
            (S::Rollback, T::RollbackCommand),
            (S::Aborted, T::AbortCommand),
        ],
        S::HotfixDeployed => &[
            (S::HotfixCleanup, T::CleanupStarted),
            (S::Rollback, T::RollbackCommand),
            (S::Aborted, T::AbortCommand),
        ],
        S::HotfixCleanup => &[
            (S::HotfixComplete, T::CleanupDone),
            (S::Aborted, T::AbortCommand),
        ],
        S::Rollback => &[
            (S::HotfixReady, T::RollbackCompleted),
            (S::Aborted, T::AbortCommand),
        ],
        // Terminal, or belongs to the standard family.
        S::HotfixComplete
        | S::Aborted
        | S::Init
        | S::BranchReady
        | S::ChangesCommitted
        | S::Pushed
        | S::PrCreated
        | S::WaitingApproval
        | S::Merged
        | S::Complete
        | S::Rebasing
        | S::ConflictResolution => &[],
    }
}

/// Whether `from → to` is a legal transition for the workflow family.
#[must_use]
pub fn can_transition(workflow: WorkflowType, from: S, to: S) -> bool {
    transitions(workflow, from).iter().any(|(next, _)| *next == to)
}

/// The trigger that legitimizes `from → to`, if the transition is legal.
#[must_use]
pub fn transition_trigger(workflow: WorkflowType, from: S, to: S) -> Option<T> {
    transitions(workflow, from)
        .iter()
        .find(|(next, _)| *next == to)
        .map(|(_, trigger)| *trigger)
}

/// Whether `state` is terminal for the workflow family.
///
/// Terminal states have no outgoing transitions regardless of family.
#[must_use]
pub fn is_terminal(workflow: WorkflowType, state: S) -> bool {
    transitions(workflow, state).is_empty() && state.is_terminal()
}

/// The state a freshly created session of this family starts in.
#[must_use]
pub const fn initial_state(workflow: WorkflowType) -> S {
    match workflow {
        WorkflowType::Launch | WorkflowType::Ship => S::Init,
        WorkflowType::Hotfix => S::HotfixInit,
    }
}

/// Every state, for table-coverage tests and listings.
pub const ALL_STATES: [S; 20] = [
    S::Init,
    S::BranchReady,
    S::ChangesCommitted,
    S::Pushed,
    S::PrCreated,
    S::WaitingApproval,
    S::Merged,
    S::Complete,
    S::Rebasing,
    S::ConflictResolution,
    S::Aborted,
    S::HotfixInit,
    S::HotfixReady,
    S::HotfixCommitted,
    S::HotfixPushed,
    S::HotfixValidated,
    S::HotfixDeployed,
    S::HotfixCleanup,
    S::HotfixComplete,
    S::Rollback,
];

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
