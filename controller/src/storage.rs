use std::{fmt, fs, path::PathBuf};
use tracing::debug;

// -------------------------------------------
// Identifiers
// -------------------------------------------

/// Analysis job identifier as it appears in routes and on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobId {
    /// The standing job every recording belongs to.
    System,
    Numbered(u64),
}

impl JobId {
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == "system" {
            return Some(JobId::System);
        }
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        raw.parse().ok().map(JobId::Numbered)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobId::System => f.write_str("system"),
            JobId::Numbered(id) => write!(f, "{}", id),
        }
    }
}

/// True for names the service never lists or resolves.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// A name that can stand alone as one path component below a storage root.
pub fn is_plain_segment(name: &str) -> bool {
    !name.is_empty()
        && !is_hidden(name)
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// Where one recording's output for one script lives, relative to a root.
#[derive(Debug, Clone)]
pub struct ResultsLocation {
    pub job: JobId,
    pub recording_uuid: String,
    /// `None` addresses the recording directory that holds every script.
    pub script: Option<String>,
}

impl ResultsLocation {
    /// `job / uu / uuid [/ script]`, with the uuid lowercased.
    ///
    /// Returns `None` when the uuid or script could escape the prefix.
    pub fn relative_prefix(&self) -> Option<PathBuf> {
        let uuid = self.recording_uuid.to_lowercase();
        if uuid.len() < 2 || !uuid.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return None;
        }

        let mut prefix = PathBuf::from(self.job.to_string());
        prefix.push(&uuid[..2]);
        prefix.push(&uuid);

        if let Some(script) = &self.script {
            if !is_plain_segment(script) {
                return None;
            }
            prefix.push(script);
        }

        Some(prefix)
    }
}

// -------------------------------------------
// Storage roots
// -------------------------------------------

/// Ordered candidate base directories for job output.
///
/// Probed in order; the first root holding the canonical prefix serves the
/// whole request. Nothing is merged across roots.
#[derive(Debug, Clone, Default)]
pub struct StorageRoots {
    roots: Vec<PathBuf>,
}

impl StorageRoots {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        StorageRoots { roots }
    }

    /// Absolute directory for `location` in the first root where it exists.
    pub fn locate(&self, location: &ResultsLocation) -> Option<PathBuf> {
        let relative = location.relative_prefix()?;

        for root in &self.roots {
            let candidate = root.join(&relative);
            match fs::metadata(&candidate) {
                Ok(meta) if meta.is_dir() => return Some(candidate),
                _ => debug!("no results prefix under {}", root.display()),
            }
        }

        None
    }
}
