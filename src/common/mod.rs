//! Common types and utilities shared across the buffer pool.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration ([`BufferConfig`])
//! - Error types
//! - Identifiers ([`PageKey`], [`FrameId`])

pub mod config;
pub mod error;
mod frame_id;
mod page_key;

pub use config::BufferConfig;
pub use error::{Error, Result};
pub use frame_id::FrameId;
pub use page_key::PageKey;
