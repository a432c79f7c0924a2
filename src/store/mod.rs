//! Channel Store: durable persistence of imports.
//!
//! The store is the only I/O boundary in the pipeline. The contract is
//! storage-engine-agnostic: [`ChannelStore`] is the narrow seam the rest of
//! the system (and the presentation layer) talks to, [`fs::FsChannelStore`]
//! is the filesystem JSON backend shipped with the crate.

pub mod fs;

pub use fs::FsChannelStore;

use crate::error::StoreResult;
use crate::state::{AlignedChannelSet, Import};

/// Caller-supplied metadata for a new import.
#[derive(Clone, Debug, Default)]
pub struct NewImport {
    /// Display name.
    pub name: String,
    /// Path of the source log file.
    pub original_filename: String,
}

/// Durable storage of imports, keyed by identifier.
///
/// `create` is transactional: either the import record and all its channel
/// data are stored, or none of it is — a partial write is never observable.
/// Implementations must serialize writers per import identifier; readers are
/// always safe once a write has committed, and there is no cross-import
/// locking. Transient I/O failures are retried with bounded backoff;
/// logical failures (not-found) are never retried.
pub trait ChannelStore {
    /// Persist a new import owning `channels`. The recorded channel count and
    /// total size are taken from `channels` at this moment and are
    /// authoritative from then on.
    fn create(&self, new: NewImport, channels: AlignedChannelSet) -> StoreResult<Import>;

    /// Fetch the import record.
    fn get(&self, id: &str) -> StoreResult<Import>;

    /// Fetch the channel data owned by the import. Consumers get a read-only
    /// copy; the stored data never changes after create.
    fn get_channels(&self, id: &str) -> StoreResult<AlignedChannelSet>;

    /// All import records, ordered by creation time (ties broken by id).
    fn list(&self) -> StoreResult<Vec<Import>>;

    /// Hard-delete the import and all channel data it owns. Snapshots
    /// referencing the id are untouched; they discover the dangling
    /// reference lazily at load time.
    fn delete(&self, id: &str) -> StoreResult<()>;
}
