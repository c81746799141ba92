//! Dictionary domain model.
//!
//! # Responsibility
//! - Define canonical records for lexemes, categories, properties and views.
//! - Define read models returned by entry detail and paging APIs.
//!
//! # Invariants
//! - Ids come from the imported source and are stable across re-imports of
//!   the same dictionary version.
//! - A lexeme never names itself as its base form.

pub mod entry;
pub mod lexeme;
