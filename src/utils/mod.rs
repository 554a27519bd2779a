//! Utility modules.

pub mod retry;
pub mod text;

pub use retry::{RetryPolicy, RetryResult, Retryable, with_retry};
pub use text::{estimate_tokens, has_text};
