//! Eviction policy implementations (replacers).
//!
//! Currently implements:
//! - [`LruReplacer`] - Least Recently Used over unpinned, materialized pages

mod lru;

pub use lru::LruReplacer;
