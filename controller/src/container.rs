use std::{fs, io, path::PathBuf};
use tracing::debug;

use crate::{
    archive::{ArchiveChild, ArchiveHandle},
    storage::{is_hidden, is_plain_segment},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File { size_bytes: u64 },
}

/// A visible, immediate child of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
}

/// A directory the resolver can stand in: either a real directory on disk or
/// a virtual directory inside an opened archive.
///
/// Both variants answer the same questions, so resolution and listing are
/// written once against this type.
#[derive(Debug)]
pub enum Container {
    Filesystem(PathBuf),
    Archive {
        archive: ArchiveHandle,
        /// `""` for the archive root, otherwise `"a/b/"`.
        prefix: String,
    },
}

impl Container {
    /// Visible children, sorted by name.
    pub fn entries(&self) -> io::Result<Vec<Entry>> {
        match self {
            Container::Filesystem(dir) => {
                let mut entries = Vec::new();
                for dirent in fs::read_dir(dir)? {
                    let dirent = dirent?;
                    let name = match dirent.file_name().into_string() {
                        Ok(name) => name,
                        Err(raw) => {
                            debug!("skipping non-utf8 entry {:?} in {}", raw, dir.display());
                            continue;
                        }
                    };
                    if is_hidden(&name) {
                        continue;
                    }
                    if let Some(kind) = disk_kind(&dir.join(&name)) {
                        entries.push(Entry { name, kind });
                    }
                }
                entries.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(entries)
            }
            Container::Archive { archive, prefix } => Ok(archive
                .children(prefix)
                .into_iter()
                .filter(|child| !is_hidden(child.name()))
                .map(Entry::from)
                .collect()),
        }
    }

    /// The child called exactly `name`. Hidden names never match.
    pub fn find_child(&self, name: &str) -> Option<Entry> {
        if !is_plain_segment(name) {
            return None;
        }

        match self {
            Container::Filesystem(dir) => {
                // Scan instead of joining so case-insensitive filesystems
                // cannot answer for a differently cased name.
                let present = fs::read_dir(dir)
                    .ok()?
                    .filter_map(Result::ok)
                    .any(|dirent| dirent.file_name() == name);
                if !present {
                    return None;
                }
                disk_kind(&dir.join(name)).map(|kind| Entry {
                    name: name.to_string(),
                    kind,
                })
            }
            Container::Archive { archive, prefix } => archive.child(prefix, name).map(Entry::from),
        }
    }

    /// Whether the child directory `name` has at least one visible entry.
    ///
    /// Looks exactly one level down.
    pub fn has_visible_children(&self, name: &str) -> bool {
        match self {
            Container::Filesystem(dir) => {
                let sub = dir.join(name);
                match fs::read_dir(&sub) {
                    // Same filter as `entries`, so the flag never disagrees
                    // with the listing of the child.
                    Ok(iter) => iter.filter_map(Result::ok).any(|dirent| {
                        dirent.file_name().to_str().map_or(false, |child| {
                            !is_hidden(child) && disk_kind(&sub.join(child)).is_some()
                        })
                    }),
                    Err(_) => false,
                }
            }
            Container::Archive { archive, prefix } => archive
                .children(&format!("{}{}/", prefix, name))
                .iter()
                .any(|child| !is_hidden(child.name())),
        }
    }

    /// Moves into the child directory `name`.
    pub fn descend(self, name: &str) -> Container {
        match self {
            Container::Filesystem(dir) => Container::Filesystem(dir.join(name)),
            Container::Archive { archive, prefix } => Container::Archive {
                archive,
                prefix: format!("{}{}/", prefix, name),
            },
        }
    }
}

impl From<ArchiveChild> for Entry {
    fn from(child: ArchiveChild) -> Self {
        match child {
            ArchiveChild::Directory(name) => Entry {
                name,
                kind: EntryKind::Directory,
            },
            ArchiveChild::File { name, size_bytes } => Entry {
                name,
                kind: EntryKind::File { size_bytes },
            },
        }
    }
}

/// Follows symlinks; anything unreadable is treated as absent.
fn disk_kind(path: &std::path::Path) -> Option<EntryKind> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Some(EntryKind::Directory),
        Ok(meta) => Some(EntryKind::File {
            size_bytes: meta.len(),
        }),
        Err(err) => {
            debug!("cannot stat {}: {}", path.display(), err);
            None
        }
    }
}
