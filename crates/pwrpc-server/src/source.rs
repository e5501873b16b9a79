//! Metric-Name Index Sources
//!
//! The snapshot cache is fed by a [`NameSource`]: the host process's
//! equivalent of "give me a full copy of the metric name index, with the
//! last-update time of each entry". The call may be slow; the cache never
//! holds its lock across it.
//!
//! Metric names have the shape `host/plugin[-instance]/type[-instance]`.
//! Only the segment before the first `/` is the host identifier.
//!
//! [`FsNameSource`] is the standalone implementation: it derives the index
//! from the data directory hierarchy `<datadir>/<host>/<plugin>/<type>`,
//! using file modification times as last-update times. An embedding host
//! process substitutes its own in-memory index instead.

use pwrpc_common::protocol::Result;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// A point-in-time copy of the metric name index.
///
/// `names` and `times` are parallel: `times[i]` is the last-update time of
/// `names[i]` in UNIX seconds. Once handed to the cache the index is never
/// mutated.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NameIndex {
    pub names: Vec<String>,
    pub times: Vec<u64>,
}

impl NameIndex {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate over `(name, time)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (&str, u64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.times.iter().copied())
    }
}

/// The `get_names` contract of the host process.
pub trait NameSource: Send + Sync {
    /// Produce a fresh copy of the metric name index.
    ///
    /// May block; callers must not hold the snapshot-table lock across
    /// this call.
    fn get_names(&self) -> Result<NameIndex>;
}

/// Name source backed by the data directory hierarchy.
///
/// Walks `<datadir>/<host>/<plugin>/<type>` and emits one
/// `host/plugin/type` name per type entry, timestamped with the entry's
/// mtime. Unreadable subtrees are skipped rather than failing the whole
/// walk.
pub struct FsNameSource {
    data_dir: PathBuf,
}

impl FsNameSource {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }
}

impl NameSource for FsNameSource {
    fn get_names(&self) -> Result<NameIndex> {
        let mut index = NameIndex::default();

        for host in read_names(&self.data_dir)? {
            let host_path = self.data_dir.join(&host);
            let Ok(plugins) = read_names(&host_path) else {
                continue;
            };
            for plugin in plugins {
                let plugin_path = host_path.join(&plugin);
                let Ok(types) = read_names(&plugin_path) else {
                    continue;
                };
                for type_name in types {
                    let mtime = std::fs::metadata(plugin_path.join(&type_name))
                        .and_then(|m| m.modified())
                        .ok()
                        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                        .map(|d| d.as_secs())
                        .unwrap_or(0);
                    index.names.push(format!("{host}/{plugin}/{type_name}"));
                    index.times.push(mtime);
                }
            }
        }

        Ok(index)
    }
}

fn read_names(path: &std::path::Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Return the current wall-clock time in UNIX seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_index_entries() {
        let index = NameIndex {
            names: vec!["a/cpu/idle".into(), "b/cpu/idle".into()],
            times: vec![10, 20],
        };
        let entries: Vec<_> = index.entries().collect();
        assert_eq!(entries, vec![("a/cpu/idle", 10), ("b/cpu/idle", 20)]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_fs_source_walks_three_levels() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("hosta/cpu")).unwrap();
        std::fs::write(dir.path().join("hosta/cpu/idle"), b"").unwrap();
        std::fs::write(dir.path().join("hosta/cpu/user"), b"").unwrap();
        std::fs::create_dir_all(dir.path().join("hostb/load")).unwrap();
        std::fs::write(dir.path().join("hostb/load/load"), b"").unwrap();

        let source = FsNameSource::new(dir.path().to_path_buf());
        let index = source.get_names().unwrap();

        let mut names = index.names.clone();
        names.sort();
        assert_eq!(
            names,
            vec!["hosta/cpu/idle", "hosta/cpu/user", "hostb/load/load"]
        );
        assert_eq!(index.names.len(), index.times.len());
        assert!(index.times.iter().all(|&t| t > 0));
    }

    #[test]
    fn test_fs_source_missing_dir_fails() {
        let source = FsNameSource::new(PathBuf::from("/nonexistent/pwrpc-test"));
        assert!(source.get_names().is_err());
    }

    #[test]
    fn test_fs_source_ignores_stray_files() {
        // A plain file at host level has no plugin subtree; skip it.
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README"), b"").unwrap();
        std::fs::create_dir_all(dir.path().join("hosta/cpu")).unwrap();
        std::fs::write(dir.path().join("hosta/cpu/idle"), b"").unwrap();

        let source = FsNameSource::new(dir.path().to_path_buf());
        let index = source.get_names().unwrap();
        assert_eq!(index.names, vec!["hosta/cpu/idle"]);
    }
}
