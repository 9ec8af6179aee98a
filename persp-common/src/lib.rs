//! # Perspective Common Library
//!
//! Shared code for managing CloudHealth perspectives including:
//! - Configuration model (groups, rules, conditions, server-computed entries)
//! - Perspective codec (model <-> server JSON)
//! - Reference-identifier allocation
//! - Bootstrap configuration loading
//! - Intent loading, computed-field merge and drift detection

pub mod codec;
pub mod config;
pub mod error;
pub mod intent;
pub mod model;

pub use codec::{decode, encode};
pub use error::{Error, Result};
pub use model::{Condition, DynamicGroup, Group, GroupKind, OtherGroupEntry, Perspective, Rule};
