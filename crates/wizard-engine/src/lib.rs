//! Onboarding wizard engine.
//!
//! [`FormEngine`] owns the wizard state and interprets intents against a
//! [`wizard_spec::StepTable`]. Drafts are mirrored into an injected
//! [`PersistenceAdapter`] and the finished record goes to a
//! [`CompletionHandler`] exactly once.

pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod navigation;
pub mod persistence;
pub mod state;

pub use completion::{CompletionError, CompletionHandler, FnCompletion, completion_fn};
pub use config::{DEFAULT_NAMESPACE, EngineConfig, SubmitPolicy};
pub use engine::{EngineBuilder, FormEngine};
pub use error::{EngineError, StoreError};
pub use persistence::{FileStore, MemoryStore, PersistenceAdapter, Snapshot};
pub use state::{FormState, Intent, Outcome, StepView};
