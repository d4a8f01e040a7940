//! shipline library crate — the workflow orchestration core.
//!
//! The primary interface is the `shipline` CLI binary; the library exposes
//! the orchestrator and its collaborators so embeddings and integration
//! tests can assemble them with their own port implementations.

pub mod audit;
pub mod cancel;
pub mod checks;
pub mod config;
pub mod error;
pub mod format;
pub mod machine;
pub mod model;
pub mod orchestrator;
pub mod result;
pub mod store;
pub mod telemetry;
pub mod validate;

pub use cancel::CancelToken;
pub use config::ShiplineConfig;
pub use error::WorkflowError;
pub use model::{BranchName, SessionId, WorkflowSession, WorkflowState, WorkflowType};
pub use orchestrator::Orchestrator;
pub use result::{ForgeToolResult, QueryToolResult, SessionToolResult, ToolResult};
pub use store::SessionStore;
