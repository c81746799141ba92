//! Flutter-facing bindings for the Lexicon core.

pub mod api;
