//! The ingestor's message-processing core.
//!
//! [`process::process_message`] is the pure per-message step (lookup,
//! decode, validate, normalize); [`metadata`] owns the topic→sensor cache it
//! reads from and the background refresh that keeps the cache current. All
//! broker and database I/O stays with the callers.

pub mod metadata;
pub mod process;

pub use metadata::{MetadataCache, MetadataService};
pub use process::{process_message, ProcessError};
