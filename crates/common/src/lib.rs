//! Common utilities and types shared across hubwatch components.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
