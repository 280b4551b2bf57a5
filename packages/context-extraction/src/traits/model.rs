//! Language model trait.
//!
//! The pipeline needs exactly one capability from a model: submit a
//! prompt, get text back. Prompting and response recovery live in the
//! agents, so implementations stay thin and interchangeable.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

/// Opaque "prompt in, text out" collaborator.
///
/// Implementations must be stateless (or internally synchronized): one
/// handle is shared by every concurrent run. Timeouts are the
/// implementation's job and surface as an `Err`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Submit a prompt and await the full response text.
    async fn submit(&self, prompt: &str) -> Result<String>;

    /// Get the model name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<M: LanguageModel + ?Sized> LanguageModel for Arc<M> {
    async fn submit(&self, prompt: &str) -> Result<String> {
        (**self).submit(prompt).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_model_is_object_safe() {
        fn _assert_model<T: LanguageModel>() {}

        _assert_model::<Arc<dyn LanguageModel>>();
        _assert_model::<crate::testing::MockModel>();
    }
}
