//! TraceVault - ingestion, time-alignment and snapshot storage core for
//! automotive sensor logs.
//!
//! The pipeline takes one flat semicolon-delimited log interleaving many
//! channels, reconstructs one series per channel, aligns everything onto a
//! shared time base, and persists the result as an immutable import that
//! named snapshots can reference later. Rendering and interaction live in a
//! separate presentation layer that only talks to the types in this crate.
//!
//! ## Module Structure
//!
//! - [`state`] - Core data types and constants
//! - [`error`] - Error taxonomy (typed absences, I/O context, parse fatals)
//! - [`splitter`] - Channel Splitter: flat log → per-channel series
//! - [`align`] - Time-Base Aligner: union grid + interpolation accessors
//! - [`store`] - Channel Store: durable, transactional import persistence
//! - [`snapshot`] - Snapshot Registry: named views with two-phase load
//! - [`recovery`] - File Relocation Recovery for missing source files
//! - [`sanitize`] - Channel-name sanitization for filesystem artifacts

pub mod align;
pub mod error;
pub mod recovery;
pub mod sanitize;
pub mod snapshot;
pub mod splitter;
pub mod state;
pub mod store;
