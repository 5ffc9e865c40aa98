//! Recall Core: shared error taxonomy.
//!
//! This crate has no internal Recall dependencies (dependency level 0).
//! Every other Recall crate reports failures through [`Error`] so that
//! callers can match on a single taxonomy regardless of which vector
//! backend produced the failure.
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias

pub mod error;

pub use error::{Error, Result};
