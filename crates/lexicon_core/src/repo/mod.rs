//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for dictionary content,
//!   bookmarks and persisted browse settings.
//! - Isolate SQLite query details from the browse pipeline.
//!
//! # Invariants
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod bookmark_repo;
pub mod dictionary_repo;
pub mod settings_repo;
