use thiserror::Error;
use wizard_spec::{SchemaError, StepId};

use crate::completion::CompletionError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid wizard schema")]
    Schema(#[from] SchemaError),
    #[error("failed to parse engine config")]
    Config(#[source] serde_json::Error),
    #[error("step {0} does not exist")]
    UnknownStep(StepId),
    #[error("the wizard is already complete")]
    Completed,
    #[error("a submission is in flight")]
    Busy,
    #[error("step {0} is not the last visible step")]
    NotFinalStep(StepId),
    #[error("completion handler rejected the submission")]
    Completion(#[source] CompletionError),
}

/// Failure of a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed")]
    Io(#[from] std::io::Error),
    #[error("store lock poisoned")]
    Lock,
}
