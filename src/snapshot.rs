//! Snapshot Registry: named views over one or more imports.
//!
//! A snapshot persists only import identifiers plus per-import display
//! state (time window, channel visibility, color) — never a copy of the
//! channel data. Loading is two-phase: resolve every referenced import
//! through the channel store, then hand back a structured list of the
//! references that failed to resolve instead of failing the whole load.
//! The caller drives relocation ([`crate::recovery`]) for those.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::state::{
    AlignedChannelSet, Import, Snapshot, SnapshotEntry, DISPLAY_COLORS, RESERVED_NAME_CHARS,
};
use crate::store::ChannelStore;

const SNAPSHOTS_DIR: &str = "snapshots";

/// Caller-supplied content for a new snapshot.
#[derive(Clone, Debug, Default)]
pub struct NewSnapshot {
    pub name: String,
    /// Ordered import references with display state. Entries without a
    /// color are assigned one from the palette by position.
    pub entries: Vec<SnapshotEntry>,
}

/// One import reference fully resolved during load.
#[derive(Clone, Debug)]
pub struct ResolvedImport {
    pub import: Import,
    pub channels: AlignedChannelSet,
    /// The snapshot's display state for this import.
    pub entry: SnapshotEntry,
}

/// A reference that failed to resolve: the import was deleted, or its
/// stored data can no longer be read.
#[derive(Clone, Debug, PartialEq)]
pub struct MissingReference {
    pub import_id: String,
    /// Source file the import was originally created from, when the import
    /// record still exists. `None` when the import is fully gone.
    pub original_filename: Option<String>,
}

/// Result of the two-phase snapshot load. Never silently drops data: every
/// referenced id is either in `resolved` or in `missing`.
#[derive(Clone, Debug)]
pub struct SnapshotLoad {
    pub snapshot: Snapshot,
    pub resolved: Vec<ResolvedImport>,
    pub missing: Vec<MissingReference>,
}

impl SnapshotLoad {
    /// True when every reference resolved and the view is ready as-is.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Reject names carrying characters reserved by common filesystems.
fn validate_name(name: &str) -> StoreResult<()> {
    if let Some(reserved) = name.chars().find(|c| RESERVED_NAME_CHARS.contains(c)) {
        return Err(StoreError::InvalidName {
            name: name.to_string(),
            reserved,
        });
    }
    Ok(())
}

/// Filesystem-backed registry of snapshots, one JSON file per snapshot
/// under `<root>/snapshots/`.
pub struct SnapshotRegistry {
    dir: PathBuf,
}

impl SnapshotRegistry {
    /// Open (creating the directory as needed) a registry rooted at `root`.
    /// `root` is typically the same directory the channel store uses.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = root.into().join(SNAPSHOTS_DIR);
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            operation: "create snapshots directory",
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    fn snapshot_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Persist a new snapshot. Entries without a display color get one from
    /// the palette by position, so a reopened view draws the same colors.
    pub fn create_snapshot(&self, new: NewSnapshot) -> StoreResult<Snapshot> {
        validate_name(&new.name)?;
        if self
            .list_snapshots()?
            .iter()
            .any(|s| s.name == new.name)
        {
            return Err(StoreError::DuplicateName(new.name));
        }

        let mut entries = new.entries;
        for (idx, entry) in entries.iter_mut().enumerate() {
            if entry.color.is_none() {
                entry.color = Some(DISPLAY_COLORS[idx % DISPLAY_COLORS.len()]);
            }
        }

        let snapshot = Snapshot {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            created_at: Utc::now(),
            entries,
        };
        self.write_atomic(&snapshot)?;
        tracing::info!(
            snapshot_id = %snapshot.id,
            name = %snapshot.name,
            imports = snapshot.entries.len(),
            "Snapshot created"
        );
        Ok(snapshot)
    }

    /// Atomic write: temp file then rename, so a crash mid-save never
    /// corrupts an existing snapshot file.
    fn write_atomic(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let path = self.snapshot_path(&snapshot.id);
        let json = serde_json::to_vec_pretty(snapshot)?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &json).map_err(|source| StoreError::Io {
            operation: "write snapshot",
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            StoreError::Io {
                operation: "commit snapshot",
                path: path.clone(),
                source,
            }
        })
    }

    pub fn get_snapshot(&self, id: &str) -> StoreResult<Snapshot> {
        let path = self.snapshot_path(id);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::SnapshotNotFound(id.to_string()))
            }
            Err(source) => {
                return Err(StoreError::Io {
                    operation: "read snapshot",
                    path,
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { path, source })
    }

    /// All snapshots, ordered by creation time (ties broken by id).
    pub fn list_snapshots(&self) -> StoreResult<Vec<Snapshot>> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            operation: "list snapshots",
            path: self.dir.clone(),
            source,
        })?;

        let mut snapshots = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read(&path) {
                Ok(bytes) => match serde_json::from_slice::<Snapshot>(&bytes) {
                    Ok(snapshot) => snapshots.push(snapshot),
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Skipping corrupt snapshot file in list"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Skipping unreadable snapshot file in list"
                    );
                }
            }
        }
        snapshots.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(snapshots)
    }

    /// Delete a snapshot. Imports it referenced are untouched.
    pub fn delete_snapshot(&self, id: &str) -> StoreResult<()> {
        let path = self.snapshot_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(snapshot_id = %id, "Snapshot deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::SnapshotNotFound(id.to_string()))
            }
            Err(source) => Err(StoreError::Io {
                operation: "delete snapshot",
                path,
                source,
            }),
        }
    }

    /// Two-phase load: fetch the snapshot, then resolve every referenced
    /// import through `store`. Dangling or unreadable references land in
    /// `missing` — the load itself only fails on registry-level errors.
    pub fn load_snapshot(
        &self,
        id: &str,
        store: &dyn ChannelStore,
    ) -> StoreResult<SnapshotLoad> {
        let snapshot = self.get_snapshot(id)?;

        let mut resolved = Vec::new();
        let mut missing = Vec::new();
        for entry in &snapshot.entries {
            match store.get(&entry.import_id) {
                Ok(import) => match store.get_channels(&entry.import_id) {
                    Ok(channels) => resolved.push(ResolvedImport {
                        import,
                        channels,
                        entry: entry.clone(),
                    }),
                    // Record exists but its data is unreadable: recoverable by
                    // re-importing from the (possibly relocated) source file.
                    Err(StoreError::NotFound(_) | StoreError::Corrupt { .. }) => {
                        missing.push(MissingReference {
                            import_id: entry.import_id.clone(),
                            original_filename: Some(import.original_filename.clone()),
                        })
                    }
                    Err(e) => return Err(e),
                },
                Err(StoreError::NotFound(_) | StoreError::Corrupt { .. }) => {
                    missing.push(MissingReference {
                        import_id: entry.import_id.clone(),
                        original_filename: None,
                    })
                }
                Err(e) => return Err(e),
            }
        }

        if !missing.is_empty() {
            tracing::warn!(
                snapshot_id = %snapshot.id,
                missing = missing.len(),
                resolved = resolved.len(),
                "Snapshot references imports that no longer resolve"
            );
        }
        Ok(SnapshotLoad {
            snapshot,
            resolved,
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ChannelSeries, TimeWindow};
    use crate::store::{FsChannelStore, NewImport};
    use tempfile::TempDir;

    fn sample_set() -> AlignedChannelSet {
        AlignedChannelSet {
            grid: vec![0.0, 1.0],
            channels: vec![ChannelSeries {
                channel_id: "RPM".to_string(),
                unit: "rpm".to_string(),
                samples: vec![[0.0, 800.0], [1.0, 1200.0]],
            }],
        }
    }

    fn store_with_import(dir: &TempDir, name: &str) -> (FsChannelStore, Import) {
        let store = FsChannelStore::open(dir.path()).unwrap();
        let import = store
            .create(
                NewImport {
                    name: name.to_string(),
                    original_filename: format!("/logs/{name}.csv"),
                },
                sample_set(),
            )
            .unwrap();
        (store, import)
    }

    #[test]
    fn test_create_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let registry = SnapshotRegistry::open(dir.path()).unwrap();

        let mut entry = SnapshotEntry::new("some-import-id");
        entry.window = Some(TimeWindow {
            start: 0.5,
            end: 9.5,
        });
        entry.visibility.insert("RPM".to_string(), false);

        let created = registry
            .create_snapshot(NewSnapshot {
                name: "qualifying laps".to_string(),
                entries: vec![entry],
            })
            .unwrap();
        let fetched = registry.get_snapshot(&created.id).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.entries[0].window.unwrap().end, 9.5);
        assert_eq!(fetched.entries[0].visibility.get("RPM"), Some(&false));
        // Palette color assigned since none was given.
        assert_eq!(fetched.entries[0].color, Some(DISPLAY_COLORS[0]));
    }

    #[test]
    fn test_reserved_characters_in_name_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = SnapshotRegistry::open(dir.path()).unwrap();
        for bad in ["a/b", "a\\b", "a:b", "a*b", "a?b", "a\"b", "a<b", "a>b", "a|b"] {
            let err = registry
                .create_snapshot(NewSnapshot {
                    name: bad.to_string(),
                    entries: Vec::new(),
                })
                .unwrap_err();
            assert!(matches!(err, StoreError::InvalidName { .. }), "{bad}");
        }
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = SnapshotRegistry::open(dir.path()).unwrap();
        let new = || NewSnapshot {
            name: "same".to_string(),
            entries: Vec::new(),
        };
        registry.create_snapshot(new()).unwrap();
        assert!(matches!(
            registry.create_snapshot(new()),
            Err(StoreError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_delete_snapshot_leaves_imports_alone() {
        let dir = TempDir::new().unwrap();
        let (store, import) = store_with_import(&dir, "kept");
        let registry = SnapshotRegistry::open(dir.path()).unwrap();
        let snapshot = registry
            .create_snapshot(NewSnapshot {
                name: "view".to_string(),
                entries: vec![SnapshotEntry::new(&import.id)],
            })
            .unwrap();

        registry.delete_snapshot(&snapshot.id).unwrap();
        assert!(matches!(
            registry.get_snapshot(&snapshot.id),
            Err(StoreError::SnapshotNotFound(_))
        ));
        // The referenced import is untouched.
        assert!(store.get(&import.id).is_ok());
    }

    #[test]
    fn test_load_resolves_all_references() {
        let dir = TempDir::new().unwrap();
        let (store, import) = store_with_import(&dir, "complete");
        let registry = SnapshotRegistry::open(dir.path()).unwrap();
        let snapshot = registry
            .create_snapshot(NewSnapshot {
                name: "view".to_string(),
                entries: vec![SnapshotEntry::new(&import.id)],
            })
            .unwrap();

        let load = registry.load_snapshot(&snapshot.id, &store).unwrap();
        assert!(load.is_complete());
        assert_eq!(load.resolved.len(), 1);
        assert_eq!(load.resolved[0].import.id, import.id);
        assert_eq!(load.resolved[0].channels, sample_set());
    }

    #[test]
    fn test_load_reports_deleted_import_as_missing() {
        let dir = TempDir::new().unwrap();
        let store = FsChannelStore::open(dir.path()).unwrap();
        let keep = store
            .create(
                NewImport {
                    name: "keep".to_string(),
                    original_filename: "/logs/keep.csv".to_string(),
                },
                sample_set(),
            )
            .unwrap();
        let drop = store
            .create(
                NewImport {
                    name: "drop".to_string(),
                    original_filename: "/logs/drop.csv".to_string(),
                },
                sample_set(),
            )
            .unwrap();

        let registry = SnapshotRegistry::open(dir.path()).unwrap();
        let snapshot = registry
            .create_snapshot(NewSnapshot {
                name: "two imports".to_string(),
                entries: vec![SnapshotEntry::new(&keep.id), SnapshotEntry::new(&drop.id)],
            })
            .unwrap();

        store.delete(&drop.id).unwrap();

        let load = registry.load_snapshot(&snapshot.id, &store).unwrap();
        assert!(!load.is_complete());
        assert_eq!(load.resolved.len(), 1);
        assert_eq!(load.resolved[0].import.id, keep.id);
        assert_eq!(load.missing.len(), 1);
        assert_eq!(load.missing[0].import_id, drop.id);
        assert_eq!(load.missing[0].original_filename, None);
    }

    #[test]
    fn test_load_reports_unreadable_channel_data_with_source_path() {
        let dir = TempDir::new().unwrap();
        let (store, import) = store_with_import(&dir, "torn");
        let registry = SnapshotRegistry::open(dir.path()).unwrap();
        let snapshot = registry
            .create_snapshot(NewSnapshot {
                name: "view".to_string(),
                entries: vec![SnapshotEntry::new(&import.id)],
            })
            .unwrap();

        // Corrupt the stored channel data while keeping the import record.
        let channels_file = dir
            .path()
            .join("imports")
            .join(&import.id)
            .join("channels.json");
        fs::write(&channels_file, b"{ broken").unwrap();

        let load = registry.load_snapshot(&snapshot.id, &store).unwrap();
        assert_eq!(load.resolved.len(), 0);
        assert_eq!(load.missing.len(), 1);
        assert_eq!(
            load.missing[0].original_filename.as_deref(),
            Some("/logs/torn.csv")
        );
    }

    /// Full recovery loop: a missing reference's source path goes through a
    /// relocation session, and re-ingesting from the replacement path makes
    /// the view whole again.
    #[test]
    fn test_missing_reference_recovered_via_relocation_and_reimport() {
        use crate::align::align;
        use crate::recovery::RelocationSession;
        use crate::splitter::split_log;

        let dir = TempDir::new().unwrap();
        let (store, import) = store_with_import(&dir, "lost");
        let registry = SnapshotRegistry::open(dir.path()).unwrap();
        let snapshot = registry
            .create_snapshot(NewSnapshot {
                name: "view".to_string(),
                entries: vec![SnapshotEntry::new(&import.id)],
            })
            .unwrap();

        // Corrupt the stored data so the load reports the source path.
        let channels_file = dir
            .path()
            .join("imports")
            .join(&import.id)
            .join("channels.json");
        fs::write(&channels_file, b"{").unwrap();
        let load = registry.load_snapshot(&snapshot.id, &store).unwrap();
        let missing_path = PathBuf::from(load.missing[0].original_filename.clone().unwrap());

        // The user locates the moved file.
        let relocated_file = dir.path().join("relocated.csv");
        fs::write(
            &relocated_file,
            "timestamp;channel;value;unit\n0.0;RPM;800;rpm\n1.0;RPM;1200;rpm\n",
        )
        .unwrap();
        let mut session = RelocationSession::new([missing_path.clone()]);
        assert!(session.relocate(&missing_path, relocated_file));
        let outcome = session.finish();
        assert!(outcome.skipped.is_empty());

        // The caller re-runs ingestion with the substituted path.
        let new_path = &outcome.relocated[&missing_path];
        let contents = fs::read_to_string(new_path).unwrap();
        let reimported = store
            .create(
                NewImport {
                    name: "lost (recovered)".to_string(),
                    original_filename: new_path.display().to_string(),
                },
                align(split_log(&contents).unwrap().channels),
            )
            .unwrap();
        assert_eq!(reimported.channel_count, 1);
        assert!(store.get_channels(&reimported.id).is_ok());
    }

    #[test]
    fn test_list_orders_by_creation_time() {
        let dir = TempDir::new().unwrap();
        let registry = SnapshotRegistry::open(dir.path()).unwrap();
        registry
            .create_snapshot(NewSnapshot {
                name: "one".to_string(),
                entries: Vec::new(),
            })
            .unwrap();
        registry
            .create_snapshot(NewSnapshot {
                name: "two".to_string(),
                entries: Vec::new(),
            })
            .unwrap();

        let listed = registry.list_snapshots().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at <= listed[1].created_at);
    }
}
