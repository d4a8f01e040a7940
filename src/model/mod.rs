//! Session data model: identifiers, states, triggers, and the persisted
//! [`WorkflowSession`] entity.

pub mod session;
pub mod types;

pub use session::{
    BranchRecord, PrRecord, SessionMetadata, StateTransition, WorkflowSession,
};
pub use types::{BranchName, SessionId, Trigger, WorkflowState, WorkflowType};
