//! Versioned contents of a single view.

use crate::entry::RegistryEntry;
use crate::types::SequenceNumber;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Version {
    seq: SequenceNumber,
    entry: RegistryEntry,
}

/// Name -> version history, plus the sequence the view's root was created at.
///
/// Versions per name are kept in ascending sequence order.
#[derive(Debug, Default)]
pub(crate) struct ViewTable {
    root: Option<SequenceNumber>,
    entries: HashMap<String, Vec<Version>>,
}

impl ViewTable {
    pub(crate) fn has_root(&self) -> bool {
        self.root.is_some()
    }

    /// Records the root. Returns false if it already existed.
    pub(crate) fn create_root(&mut self, seq: SequenceNumber) -> bool {
        if self.root.is_some() {
            return false;
        }
        self.root = Some(seq);
        true
    }

    /// Entry visible at `snapshot`. A root created after the snapshot hides
    /// the whole view.
    pub(crate) fn get_at(&self, name: &str, snapshot: SequenceNumber) -> Option<&RegistryEntry> {
        match self.root {
            Some(root) if root <= snapshot => {}
            _ => return None,
        }
        self.entries
            .get(name)?
            .iter()
            .rev()
            .find(|v| v.seq <= snapshot)
            .map(|v| &v.entry)
    }

    pub(crate) fn latest(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)?.last().map(|v| &v.entry)
    }

    /// Installs `entry` at `seq`. Returns false, installing nothing, when
    /// the latest version already holds identical content.
    pub(crate) fn install(&mut self, seq: SequenceNumber, entry: RegistryEntry) -> bool {
        let versions = self.entries.entry(entry.name().to_string()).or_default();
        if versions.last().is_some_and(|v| v.entry == entry) {
            return false;
        }
        versions.push(Version { seq, entry });
        true
    }

    /// Drops versions of `name` no snapshot at or above `horizon` can see.
    pub(crate) fn prune(&mut self, name: &str, horizon: SequenceNumber) {
        let Some(versions) = self.entries.get_mut(name) else {
            return;
        };
        let visible_from = versions
            .iter()
            .rposition(|v| v.seq <= horizon)
            .unwrap_or(0);
        if visible_from > 0 {
            versions.drain(..visible_from);
        }
    }

    /// Latest entries visible at `snapshot`, sorted by name.
    pub(crate) fn entries_at(&self, snapshot: SequenceNumber) -> Vec<RegistryEntry> {
        let mut out: Vec<RegistryEntry> = self
            .entries
            .keys()
            .filter_map(|name| self.get_at(name, snapshot).cloned())
            .collect();
        out.sort_by(|a, b| a.name().cmp(b.name()));
        out
    }

    #[cfg(test)]
    pub(crate) fn version_count(&self, name: &str) -> usize {
        self.entries.get(name).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, greeting: &str) -> RegistryEntry {
        RegistryEntry::new(name, greeting).unwrap()
    }

    fn seq(n: u64) -> SequenceNumber {
        SequenceNumber::new(n)
    }

    #[test]
    fn no_root_hides_everything() {
        let mut table = ViewTable::default();
        table.install(seq(1), entry("a", "x"));
        assert!(table.get_at("a", seq(5)).is_none());

        table.create_root(seq(3));
        assert!(table.get_at("a", seq(2)).is_none());
        assert_eq!(table.get_at("a", seq(3)).unwrap().greeting(), "x");
    }

    #[test]
    fn snapshot_picks_newest_visible_version() {
        let mut table = ViewTable::default();
        table.create_root(seq(1));
        table.install(seq(2), entry("a", "one"));
        table.install(seq(4), entry("a", "two"));

        assert!(table.get_at("a", seq(1)).is_none());
        assert_eq!(table.get_at("a", seq(3)).unwrap().greeting(), "one");
        assert_eq!(table.get_at("a", seq(4)).unwrap().greeting(), "two");
        assert_eq!(table.latest("a").unwrap().greeting(), "two");
    }

    #[test]
    fn identical_install_is_noop() {
        let mut table = ViewTable::default();
        assert!(table.install(seq(1), entry("a", "x")));
        assert!(!table.install(seq(2), entry("a", "x")));
        assert_eq!(table.version_count("a"), 1);
        assert!(table.install(seq(3), entry("a", "y")));
        assert_eq!(table.version_count("a"), 2);
    }

    #[test]
    fn prune_keeps_newest_below_horizon() {
        let mut table = ViewTable::default();
        table.create_root(seq(1));
        for (n, g) in [(2, "a"), (3, "b"), (4, "c"), (6, "d")] {
            table.install(seq(n), entry("k", g));
        }

        table.prune("k", seq(5));
        assert_eq!(table.version_count("k"), 2);
        assert_eq!(table.get_at("k", seq(5)).unwrap().greeting(), "c");
        assert_eq!(table.get_at("k", seq(6)).unwrap().greeting(), "d");
    }

    #[test]
    fn root_only_created_once() {
        let mut table = ViewTable::default();
        assert!(table.create_root(seq(1)));
        assert!(!table.create_root(seq(2)));
        assert!(table.has_root());
    }

    #[test]
    fn entries_sorted_by_name() {
        let mut table = ViewTable::default();
        table.create_root(seq(1));
        table.install(seq(2), entry("b", "2"));
        table.install(seq(3), entry("a", "1"));
        let names: Vec<_> = table
            .entries_at(seq(3))
            .into_iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(table.entries_at(seq(2)).len(), 1);
    }
}
