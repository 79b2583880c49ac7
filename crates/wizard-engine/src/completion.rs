use std::future::Future;

use async_trait::async_trait;
use wizard_spec::FormData;

pub type CompletionError = Box<dyn std::error::Error + Send + Sync>;

/// Accepts the finished record. Called at most once per successful wizard.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionHandler: Send + Sync {
    async fn complete(&self, data: &FormData) -> Result<(), CompletionError>;
}

/// Adapts an async closure taking an owned copy of the record.
pub struct FnCompletion<F> {
    func: F,
}

pub fn completion_fn<F, Fut>(func: F) -> FnCompletion<F>
where
    F: Fn(FormData) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), CompletionError>> + Send + 'static,
{
    FnCompletion { func }
}

#[async_trait]
impl<F, Fut> CompletionHandler for FnCompletion<F>
where
    F: Fn(FormData) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), CompletionError>> + Send + 'static,
{
    async fn complete(&self, data: &FormData) -> Result<(), CompletionError> {
        (self.func)(data.clone()).await
    }
}
