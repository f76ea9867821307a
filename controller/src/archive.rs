//! Zip archives browsed as directories.
//!
//! Zip entries are a flat namespace (`"a/b/c.txt"`). A prefix ending in `/`
//! is treated as a virtual directory whose children are the next path
//! component of every entry under it, whether or not the archive carries an
//! explicit directory entry for it.

use std::{
    collections::BTreeMap,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};
use zip::{result::ZipError, ZipArchive};

use crate::error::ResultsError;

pub fn is_archive_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("zip"))
}

/// Upper bound on the buffer preallocated for an entry read.
const READ_HINT_CAP: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IndexedEntry {
    index: usize,
    size: u64,
}

/// One immediate child of a virtual archive directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveChild {
    Directory(String),
    File { name: String, size_bytes: u64 },
}

impl ArchiveChild {
    pub fn name(&self) -> &str {
        match self {
            ArchiveChild::Directory(name) => name,
            ArchiveChild::File { name, .. } => name,
        }
    }
}

/// An opened zip file, scoped to a single request.
///
/// Closing happens on drop; handles are never shared between requests.
pub struct ArchiveHandle {
    path: PathBuf,
    archive: ZipArchive<File>,
    /// Keyed by full internal name. Directory entries keep their trailing `/`.
    entries: BTreeMap<String, IndexedEntry>,
}

impl std::fmt::Debug for ArchiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveHandle")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ArchiveHandle {
    pub fn open(path: &Path) -> Result<Self, ResultsError> {
        let file = File::open(path)?;
        let corrupt = |source: ZipError| ResultsError::ArchiveCorrupt {
            path: path.to_path_buf(),
            source,
        };

        let mut archive = ZipArchive::new(file).map_err(corrupt)?;
        let mut entries = BTreeMap::new();

        for index in 0..archive.len() {
            let entry = archive.by_index(index).map_err(corrupt)?;
            let name = entry.name().to_string();
            if !is_safe_entry_name(&name) {
                warn!("skipping unsafe archive entry {:?} in {}", name, path.display());
                continue;
            }
            entries.insert(
                name,
                IndexedEntry {
                    index,
                    size: entry.size(),
                },
            );
        }

        debug!("opened archive {} ({} entries)", path.display(), entries.len());

        Ok(ArchiveHandle {
            path: path.to_path_buf(),
            archive,
            entries,
        })
    }

    /// Immediate children of the virtual directory `prefix` (`""` or `"a/b/"`),
    /// sorted by name.
    pub fn children(&self, prefix: &str) -> Vec<ArchiveChild> {
        let mut found: BTreeMap<&str, ArchiveChild> = BTreeMap::new();

        for (key, entry) in self.entries_under(prefix) {
            let rest = &key[prefix.len()..];
            match rest.split_once('/') {
                Some((head, _)) => {
                    found.insert(head, ArchiveChild::Directory(head.to_string()));
                }
                None if !rest.is_empty() => {
                    found.entry(rest).or_insert_with(|| ArchiveChild::File {
                        name: rest.to_string(),
                        size_bytes: entry.size,
                    });
                }
                None => {}
            }
        }

        found.into_values().collect()
    }

    /// A single named child of `prefix`, if present.
    pub fn child(&self, prefix: &str, name: &str) -> Option<ArchiveChild> {
        let full = format!("{}{}", prefix, name);
        let dir_prefix = format!("{}/", full);

        if self.entries.contains_key(&dir_prefix) || self.entries_under(&dir_prefix).next().is_some() {
            return Some(ArchiveChild::Directory(name.to_string()));
        }

        self.entries.get(&full).map(|entry| ArchiveChild::File {
            name: name.to_string(),
            size_bytes: entry.size,
        })
    }

    /// Decompresses one file entry in full.
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, ResultsError> {
        let index = match self.entries.get(name) {
            Some(entry) => entry.index,
            None => {
                return Err(ResultsError::ArchiveCorrupt {
                    path: self.path.clone(),
                    source: ZipError::FileNotFound,
                })
            }
        };

        let path = self.path.clone();
        let corrupt = |source: ZipError| ResultsError::ArchiveCorrupt { path, source };

        let mut entry = match self.archive.by_index(index) {
            Ok(entry) => entry,
            Err(err) => return Err(corrupt(err)),
        };

        // The header size is untrusted; only use it as a bounded hint.
        let hint = usize::try_from(entry.size()).unwrap_or(0).min(READ_HINT_CAP);
        let mut buf = Vec::with_capacity(hint);
        match entry.read_to_end(&mut buf) {
            Ok(_) => Ok(buf),
            Err(err) => Err(corrupt(ZipError::Io(err))),
        }
    }

    fn entries_under<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a IndexedEntry)> + 'a {
        self.entries
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(key, _)| key.starts_with(prefix))
            .filter(move |(key, _)| key.len() > prefix.len())
    }
}

/// Rejects absolute names, empty components and `.`/`..` components.
fn is_safe_entry_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('/') || name.contains('\\') {
        return false;
    }
    let trimmed = name.strip_suffix('/').unwrap_or(name);
    trimmed
        .split('/')
        .all(|part| !part.is_empty() && part != "." && part != "..")
}
