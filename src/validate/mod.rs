//! Branch-reuse and PR-conflict validators.
//!
//! Both validators only classify — the orchestrator decides what a BLOCK
//! means for the operation at hand, and the check layer renders the
//! classification for the user.

pub mod branch;
pub mod pr;

pub use branch::{BranchReuse, BranchValidator};
pub use pr::{classify_pr_action, PrAction};
