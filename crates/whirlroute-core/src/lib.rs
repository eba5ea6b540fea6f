//! whirlroute-core: Shared types, errors, collaborator traits, and configuration
//!
//! This crate provides the foundational types used across the Whirlroute workspace.

pub mod config;
pub mod errors;
pub mod source;
pub mod types;

pub use config::*;
pub use errors::*;
pub use source::*;
pub use types::*;
