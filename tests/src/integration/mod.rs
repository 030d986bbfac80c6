//! Cross-crate integration tests.

pub mod dispatch;
pub mod lifecycle;
pub mod properties;
