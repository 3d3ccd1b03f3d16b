//! Error types for consensus validation
//!
//! These are failures of the engine itself. A transaction that breaks a
//! consensus rule is not an error: it is recorded as
//! [`ValidationOutcome::Failed`](crate::types::ValidationOutcome).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("Script execution failed: {0}")]
    ScriptExecution(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Ledger contract violation: {0}")]
    ContractViolation(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
