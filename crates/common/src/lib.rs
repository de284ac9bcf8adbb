//! Shared types for the session generator workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
