//! Video Importer Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, content hashing, and logging setup for the video importer.
//!
//! # Overview
//!
//! This crate provides the pieces used by every part of the importer:
//!
//! - **Content keys**: streaming SHA-256 identity of a file's bytes
//! - **Types**: the persisted [`FileRecord`] and its timestamp helpers
//! - **Logging**: `tracing` subscriber configuration
//!
//! # Example
//!
//! ```no_run
//! use vimport_common::checksum::compute_content_key;
//!
//! fn main() -> vimport_common::Result<()> {
//!     let key = compute_content_key("/videos/front-door-1489000000.mp4")?;
//!     println!("content key: {}", key);
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use types::{FileRecord, Location, ShardAssignment};
