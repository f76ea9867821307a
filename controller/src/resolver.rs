//! Path resolution below a recording's results prefix.
//!
//! Walks the requested path one segment at a time, matching names exactly and
//! crossing into zip archives when a segment names one and more segments
//! follow.

use std::path::PathBuf;
use tracing::debug;

use crate::{
    archive::{is_archive_name, ArchiveHandle},
    container::{Container, EntryKind},
    error::ResultsError,
    mime,
    storage::{ResultsLocation, StorageRoots},
};

/// What the caller wants back when a path ends exactly on an archive.
///
/// Only consulted at that one point; every other path resolves the same way
/// regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Raw bytes of the archive file.
    Content,
    /// The archive's internal root, listed as a directory.
    Listing,
}

#[derive(Debug)]
pub struct DirectoryNode {
    /// Requested segments joined with `/`; empty for the prefix itself.
    pub canonical_path: String,
    pub name: String,
    pub container: Container,
}

#[derive(Debug)]
pub enum FileSource {
    Disk(PathBuf),
    Archive { archive: ArchiveHandle, entry: String },
}

#[derive(Debug)]
pub struct FileNode {
    pub canonical_path: String,
    pub name: String,
    pub size_bytes: u64,
    pub mime: String,
    pub source: FileSource,
}

#[derive(Debug)]
pub enum ResolvedNode {
    Directory(DirectoryNode),
    File(FileNode),
    NotFound { attempted_path: String },
}

/// Splits on `/` and drops empty segments, so `""` and `"a//b/"` are fine.
pub fn split_segments(relative_path: &str) -> Vec<&str> {
    relative_path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Resolves `relative_path` below `location` in the first matching root.
///
/// Misses of every kind come back as `ResolvedNode::NotFound`. Errors are
/// reserved for archives that exist but cannot be read.
pub fn resolve(
    roots: &StorageRoots,
    location: &ResultsLocation,
    relative_path: &str,
    representation: Representation,
) -> Result<ResolvedNode, ResultsError> {
    let segments = split_segments(relative_path);
    let attempted_path = segments.join("/");
    let not_found = || {
        debug!("results path {:?} not found", attempted_path);
        Ok(ResolvedNode::NotFound {
            attempted_path: attempted_path.clone(),
        })
    };

    let base = match roots.locate(location) {
        Some(base) => base,
        None => return not_found(),
    };

    let mut name = location
        .script
        .clone()
        .unwrap_or_else(|| location.recording_uuid.to_lowercase());
    let mut container = Container::Filesystem(base);

    for (i, segment) in segments.iter().enumerate() {
        if *segment == "." || *segment == ".." {
            return not_found();
        }

        let entry = match container.find_child(segment) {
            Some(entry) => entry,
            None => return not_found(),
        };
        let remaining = segments.len() - i - 1;

        match entry.kind {
            EntryKind::Directory => {
                container = container.descend(segment);
            }
            EntryKind::File { size_bytes } => {
                let disk_archive = match &container {
                    Container::Filesystem(dir) if is_archive_name(segment) => {
                        Some(dir.join(segment))
                    }
                    _ => None,
                };

                match disk_archive {
                    Some(path) if remaining > 0 || representation == Representation::Listing => {
                        container = Container::Archive {
                            archive: ArchiveHandle::open(&path)?,
                            prefix: String::new(),
                        };
                    }
                    _ if remaining > 0 => return not_found(),
                    _ => {
                        return Ok(ResolvedNode::File(FileNode {
                            canonical_path: attempted_path.clone(),
                            name: segment.to_string(),
                            size_bytes,
                            mime: mime::lookup(segment),
                            source: file_source(container, segment),
                        }))
                    }
                }
            }
        }

        name = segment.to_string();
    }

    Ok(ResolvedNode::Directory(DirectoryNode {
        canonical_path: attempted_path,
        name,
        container,
    }))
}

fn file_source(container: Container, name: &str) -> FileSource {
    match container {
        Container::Filesystem(dir) => FileSource::Disk(dir.join(name)),
        Container::Archive { archive, prefix } => FileSource::Archive {
            archive,
            entry: format!("{}{}", prefix, name),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JobId;
    use std::{fs, fs::File, io::Write};
    use tempfile::TempDir;
    use zip::write::FileOptions;

    const UUID: &str = "1bd0d668-1471-4396-adc3-09ccd8fe949a";

    struct Fixture {
        _root: TempDir,
        roots: StorageRoots,
        base: PathBuf,
    }

    fn fixture() -> Fixture {
        let root = TempDir::new().unwrap();
        let base = root
            .path()
            .join("12")
            .join(&UUID[..2])
            .join(UUID)
            .join("Towsey.Acoustic");
        fs::create_dir_all(base.join("Test1/Test2")).unwrap();
        fs::write(base.join("Test1/Test2/test-CASE.csv"), b"header1,header2\r\n").unwrap();
        fs::write(base.join(".test-dot-file"), b"hidden").unwrap();

        let mut zip = zip::ZipWriter::new(File::create(base.join("Towsey.Acoustic.zip")).unwrap());
        zip.start_file("Indices/ACI.csv", FileOptions::default()).unwrap();
        zip.write_all(b"aci").unwrap();
        zip.start_file("readme.txt", FileOptions::default()).unwrap();
        zip.write_all(b"hello").unwrap();
        zip.finish().unwrap();

        Fixture {
            roots: StorageRoots::new(vec![root.path().to_path_buf()]),
            _root: root,
            base,
        }
    }

    fn location() -> ResultsLocation {
        ResultsLocation {
            job: JobId::Numbered(12),
            recording_uuid: UUID.into(),
            script: Some("Towsey.Acoustic".into()),
        }
    }

    fn resolve_content(fx: &Fixture, path: &str) -> ResolvedNode {
        resolve(&fx.roots, &location(), path, Representation::Content).unwrap()
    }

    #[test]
    fn empty_path_resolves_to_prefix_directory() {
        let fx = fixture();
        for path in ["", "/", "//"] {
            match resolve_content(&fx, path) {
                ResolvedNode::Directory(dir) => {
                    assert_eq!(dir.canonical_path, "");
                    assert_eq!(dir.name, "Towsey.Acoustic");
                    assert!(matches!(dir.container, Container::Filesystem(ref p) if *p == fx.base));
                }
                other => panic!("expected directory, got {:?}", other),
            }
        }
    }

    #[test]
    fn nested_directory_and_file() {
        let fx = fixture();

        match resolve_content(&fx, "Test1/Test2/") {
            ResolvedNode::Directory(dir) => {
                assert_eq!(dir.canonical_path, "Test1/Test2");
                assert_eq!(dir.name, "Test2");
            }
            other => panic!("expected directory, got {:?}", other),
        }

        match resolve_content(&fx, "Test1/Test2/test-CASE.csv") {
            ResolvedNode::File(file) => {
                assert_eq!(file.name, "test-CASE.csv");
                assert_eq!(file.size_bytes, 17);
                assert_eq!(file.mime, "text/csv");
                assert!(matches!(file.source, FileSource::Disk(_)));
            }
            other => panic!("expected file, got {:?}", other),
        }
    }

    #[test]
    fn case_mismatch_is_not_found() {
        let fx = fixture();
        for path in ["Test1/TEST2", "test1/Test2", "Test1/Test2/test-case.csv"] {
            assert!(
                matches!(resolve_content(&fx, path), ResolvedNode::NotFound { .. }),
                "{} should not resolve",
                path
            );
        }
    }

    #[test]
    fn dot_segments_never_navigate() {
        let fx = fixture();
        for path in ["./Test1", "Test1/..", "Test1/../Test1", "Test1/./Test2", ".."] {
            match resolve_content(&fx, path) {
                ResolvedNode::NotFound { attempted_path } => {
                    assert_eq!(attempted_path, split_segments(path).join("/"))
                }
                other => panic!("{} resolved to {:?}", path, other),
            }
        }
    }

    #[test]
    fn hidden_entries_are_unreachable() {
        let fx = fixture();
        assert!(matches!(
            resolve_content(&fx, ".test-dot-file"),
            ResolvedNode::NotFound { .. }
        ));
    }

    #[test]
    fn cannot_descend_into_plain_file() {
        let fx = fixture();
        assert!(matches!(
            resolve_content(&fx, "Test1/Test2/test-CASE.csv/more"),
            ResolvedNode::NotFound { .. }
        ));
    }

    #[test]
    fn missing_prefix_is_not_found() {
        let fx = fixture();
        let mut loc = location();
        loc.script = Some("Other.Script".into());
        assert!(matches!(
            resolve(&fx.roots, &loc, "", Representation::Content).unwrap(),
            ResolvedNode::NotFound { .. }
        ));
    }

    #[test]
    fn archive_root_depends_on_representation() {
        let fx = fixture();

        match resolve_content(&fx, "Towsey.Acoustic.zip") {
            ResolvedNode::File(file) => {
                assert_eq!(file.mime, "application/zip");
                assert!(matches!(file.source, FileSource::Disk(_)));
            }
            other => panic!("expected file, got {:?}", other),
        }

        match resolve(&fx.roots, &location(), "Towsey.Acoustic.zip", Representation::Listing)
            .unwrap()
        {
            ResolvedNode::Directory(dir) => {
                assert_eq!(dir.name, "Towsey.Acoustic.zip");
                assert!(matches!(dir.container, Container::Archive { ref prefix, .. } if prefix.is_empty()));
            }
            other => panic!("expected directory, got {:?}", other),
        }
    }

    #[test]
    fn resolves_inside_archive() {
        let fx = fixture();

        match resolve_content(&fx, "Towsey.Acoustic.zip/Indices") {
            ResolvedNode::Directory(dir) => {
                assert_eq!(dir.name, "Indices");
                assert!(matches!(dir.container, Container::Archive { ref prefix, .. } if prefix == "Indices/"));
            }
            other => panic!("expected directory, got {:?}", other),
        }

        match resolve_content(&fx, "Towsey.Acoustic.zip/Indices/ACI.csv") {
            ResolvedNode::File(file) => {
                assert_eq!(file.size_bytes, 3);
                assert!(matches!(file.source, FileSource::Archive { ref entry, .. } if entry == "Indices/ACI.csv"));
            }
            other => panic!("expected file, got {:?}", other),
        }

        assert!(matches!(
            resolve_content(&fx, "Towsey.Acoustic.zip/indices/ACI.csv"),
            ResolvedNode::NotFound { .. }
        ));
        assert!(matches!(
            resolve_content(&fx, "Towsey.Acoustic.zip/Indices/../readme.txt"),
            ResolvedNode::NotFound { .. }
        ));
    }
}
