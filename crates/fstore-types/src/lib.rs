//! Foundation types for the file store.
//!
//! Every other crate in the workspace depends on `fstore-types` for the
//! shapes that cross crate and wire boundaries.
//!
//! # Key Types
//!
//! - [`Digest`]: SHA-256 content identity, the dedup key for blobs
//! - [`FileRecord`] / [`Listing`]: results of listing stored files
//! - [`WordFrequency`] / [`Order`]: word statistics and their presentation order

pub mod digest;
pub mod error;
pub mod file;
pub mod stats;

pub use digest::{Digest, DIGEST_LEN};
pub use error::TypeError;
pub use file::{FileRecord, Listing};
pub use stats::{Order, WordFrequency};
