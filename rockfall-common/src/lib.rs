//! # Rockfall Common Library
//!
//! Shared code for the rockfall risk workspace including:
//! - Error and result types
//! - Configuration file discovery and TOML loading
//! - Pipeline event types and the `EventBus`
//! - Time helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
