//! File Relocation Recovery: substitute new paths for missing source files.
//!
//! When a snapshot load reports missing references, the caller walks the
//! affected source-file paths one by one: locate a replacement for this
//! one, skip that one, change your mind, repeat. This module is the state
//! machine for that interaction. It never touches the channel store — the
//! outcome is a transient path-substitution map the caller feeds back into
//! the ingestion path to re-create the missing imports. Nothing here is
//! ever persisted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Original path → replacement path. Transient; built during one recovery
/// interaction and discarded after use.
pub type RelocationMap = BTreeMap<PathBuf, PathBuf>;

/// Final result of a recovery interaction. Paths the user never settled
/// are folded into `skipped`: recovery never blocks forward progress.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelocationOutcome {
    pub relocated: RelocationMap,
    pub skipped: Vec<PathBuf>,
}

/// Interactive recovery session over a set of missing source-file paths.
///
/// Every path is in exactly one of three states: unresolved, relocated, or
/// skipped. Relocating a path removes it from skipped and vice versa, so
/// the user can change their mind until [`RelocationSession::finish`].
#[derive(Clone, Debug, Default)]
pub struct RelocationSession {
    /// Paths not yet acted on, in presentation order.
    unresolved: Vec<PathBuf>,
    relocated: RelocationMap,
    /// Explicitly skipped paths, in the order they were skipped.
    skipped: Vec<PathBuf>,
}

impl RelocationSession {
    /// Start a session over the given missing paths (duplicates collapsed,
    /// order preserved).
    pub fn new(missing: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut unresolved: Vec<PathBuf> = Vec::new();
        for path in missing {
            if !unresolved.contains(&path) {
                unresolved.push(path);
            }
        }
        Self {
            unresolved,
            relocated: RelocationMap::new(),
            skipped: Vec::new(),
        }
    }

    /// Paths still awaiting a decision.
    pub fn unresolved(&self) -> &[PathBuf] {
        &self.unresolved
    }

    /// Paths relocated so far.
    pub fn relocated(&self) -> &RelocationMap {
        &self.relocated
    }

    /// Paths explicitly skipped so far.
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    /// True once every path has been either relocated or skipped.
    pub fn is_settled(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Record a replacement for `original`. Works from the unresolved and
    /// the skipped state; returns `false` for a path this session does not
    /// know about.
    pub fn relocate(&mut self, original: &Path, replacement: PathBuf) -> bool {
        if !self.knows(original) {
            return false;
        }
        self.unresolved.retain(|p| p != original);
        self.skipped.retain(|p| p != original);
        self.relocated.insert(original.to_path_buf(), replacement);
        true
    }

    /// Mark `original` as skipped. Undoes a previous relocation of the same
    /// path; returns `false` for an unknown path.
    pub fn skip(&mut self, original: &Path) -> bool {
        if !self.knows(original) {
            return false;
        }
        self.unresolved.retain(|p| p != original);
        self.relocated.remove(original);
        if !self.skipped.iter().any(|p| p == original) {
            self.skipped.push(original.to_path_buf());
        }
        true
    }

    fn knows(&self, path: &Path) -> bool {
        self.unresolved.iter().any(|p| p == path)
            || self.skipped.iter().any(|p| p == path)
            || self.relocated.contains_key(path)
    }

    /// Close the session. Paths never acted on count as skipped, so the
    /// caller can always continue with a partial relocation.
    pub fn finish(self) -> RelocationOutcome {
        let mut skipped = self.skipped;
        skipped.extend(self.unresolved);
        RelocationOutcome {
            relocated: self.relocated,
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn test_relocate_one_skip_one_are_disjoint() {
        let mut session = RelocationSession::new([p("/old/a.csv"), p("/old/b.csv")]);
        assert!(session.relocate(&p("/old/a.csv"), p("/new/a.csv")));
        assert!(session.skip(&p("/old/b.csv")));
        assert!(session.is_settled());

        let outcome = session.finish();
        assert_eq!(outcome.relocated.len(), 1);
        assert_eq!(outcome.relocated[&p("/old/a.csv")], p("/new/a.csv"));
        assert_eq!(outcome.skipped, vec![p("/old/b.csv")]);
        assert!(!outcome.skipped.contains(&p("/old/a.csv")));
    }

    #[test]
    fn test_states_are_mutually_exclusive() {
        let mut session = RelocationSession::new([p("/old/a.csv")]);

        session.skip(&p("/old/a.csv"));
        assert_eq!(session.skipped().len(), 1);
        assert!(session.relocated().is_empty());

        // Changing one's mind: relocating removes the path from skipped.
        session.relocate(&p("/old/a.csv"), p("/new/a.csv"));
        assert!(session.skipped().is_empty());
        assert_eq!(session.relocated().len(), 1);

        // And back again.
        session.skip(&p("/old/a.csv"));
        assert_eq!(session.skipped().len(), 1);
        assert!(session.relocated().is_empty());
    }

    #[test]
    fn test_unsettled_paths_fold_into_skipped_on_finish() {
        let mut session =
            RelocationSession::new([p("/old/a.csv"), p("/old/b.csv"), p("/old/c.csv")]);
        session.relocate(&p("/old/a.csv"), p("/new/a.csv"));
        assert!(!session.is_settled());

        let outcome = session.finish();
        assert_eq!(outcome.relocated.len(), 1);
        assert_eq!(outcome.skipped, vec![p("/old/b.csv"), p("/old/c.csv")]);
    }

    #[test]
    fn test_unknown_paths_are_rejected() {
        let mut session = RelocationSession::new([p("/old/a.csv")]);
        assert!(!session.relocate(&p("/elsewhere.csv"), p("/new.csv")));
        assert!(!session.skip(&p("/elsewhere.csv")));
    }

    #[test]
    fn test_duplicate_missing_paths_collapse() {
        let session = RelocationSession::new([p("/old/a.csv"), p("/old/a.csv")]);
        assert_eq!(session.unresolved().len(), 1);
    }

    #[test]
    fn test_relocating_again_updates_the_replacement() {
        let mut session = RelocationSession::new([p("/old/a.csv")]);
        session.relocate(&p("/old/a.csv"), p("/wrong.csv"));
        session.relocate(&p("/old/a.csv"), p("/right.csv"));
        let outcome = session.finish();
        assert_eq!(outcome.relocated[&p("/old/a.csv")], p("/right.csv"));
    }

    #[test]
    fn test_empty_session_is_settled_immediately() {
        let session = RelocationSession::new(Vec::new());
        assert!(session.is_settled());
        let outcome = session.finish();
        assert!(outcome.relocated.is_empty());
        assert!(outcome.skipped.is_empty());
    }
}
