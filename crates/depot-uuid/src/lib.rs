//! File identifiers and sharded-path utilities.
//!
//! Every tracked file gets a [`FileId`] when its record is first persisted. The identifier uses
//! a *canonical* representation: **32 lowercase hexadecimal characters** (no hyphens), the
//! same value produced by `Uuid::new_v4().simple().to_string()`.
//!
//! Externally supplied identifiers (CLI arguments, URL path segments) must already be
//! canonical. Use [`FileId::parse`] to validate them; uppercase or hyphenated forms are
//! rejected rather than normalised.
//!
//! ## Sharded directory layout
//! Record stores that keep one directory per file place it under:
//! `parent_dir/<id[0..2]>/<id[2..4]>/<id>/`
//!
//! Example:
//! `depot_data/records/55/0e/550e8400e29b41d4a716446655440000/`

mod id;

pub use id::{FileId, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
