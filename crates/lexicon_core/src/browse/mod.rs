//! Entry retrieval and paging pipeline.
//!
//! # Responsibility
//! - Materialize the filtered/sorted entry order into `entry_cache`.
//! - Serve bounded windows of that cache to list UIs.
//! - Keep the cache in step with debounced search input and settings.
//!
//! # Invariants
//! - Cache positions are dense, 0-based and ordered.
//! - Every rebuild or import bumps `cache_state.generation`; paging sources
//!   bound to an older generation report `LoadResult::Invalid`.

pub mod cache;
pub mod paging;
pub mod pipeline;
