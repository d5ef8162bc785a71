//! Small shared helpers

pub mod retry;

pub use retry::RetryPolicy;
