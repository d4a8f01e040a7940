//! Git abstraction layer for shipline.
//!
//! The orchestration core interacts with the local repository exclusively
//! through the [`GitPort`] trait. The trait is object-safe so callers can
//! hold `Box<dyn GitPort>` and tests can substitute in-memory fakes.
//!
//! The production backend is [`GixGit`], backed by
//! [gix](https://github.com/GitoxideLabs/gitoxide) for everything local —
//! status, branches, checkout, commits, stash. Only the network operations
//! (push and friends) shell out to the `git` binary, because gix does not
//! yet provide a high-level push API. No gix types leak through the
//! boundary.
//!
//! # Crate layout
//!
//! - [`port`] — the [`GitPort`] trait definition.
//! - [`types`] — value types used in trait signatures ([`BranchName`],
//!   [`CommitId`], [`WorktreeStatus`], ...).
//! - [`error`] — the [`GitError`] enum returned by all trait methods.

pub mod error;
pub mod port;
pub mod types;

mod branch_impl;
mod checkout_impl;
mod commit_impl;
mod gix_repo;
mod merge_impl;
mod remote_impl;
mod stash_impl;
mod status_impl;

pub use error::GitError;
pub use gix_repo::GixGit;
pub use port::GitPort;
pub use types::{
    BranchName, BranchNameError, BranchStatus, CommitId, CommitOptions, StashRef, WorktreeStatus,
};
