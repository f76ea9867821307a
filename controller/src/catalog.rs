use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};

use crate::storage::JobId;

/// Audio recording identity: the route id and the uuid used on disk.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Recording {
    pub id: u64,
    pub uuid: String,
}

/// Which recordings exist and which jobs they belong to.
///
/// Owned by the surrounding application; this service only reads it.
pub trait RecordingCatalog: Send + Sync {
    /// The recording, if it exists and is part of `job`.
    fn recording_in_job(&self, job: &JobId, recording_id: u64) -> Option<Recording>;

    /// Every recording of `job`, or `None` when the job is unknown.
    fn recordings_for_job(&self, job: &JobId) -> Option<Vec<Recording>>;
}

/// Catalog held in memory, loaded from a JSON document:
///
/// ```json
/// { "recordings": [{ "id": 1, "uuid": "..." }], "jobs": { "12": [1] } }
/// ```
///
/// The `system` job always contains every recording.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct StaticCatalog {
    #[serde(default)]
    recordings: Vec<Recording>,
    #[serde(default)]
    jobs: HashMap<String, Vec<u64>>,
}

impl StaticCatalog {
    pub fn new(recordings: Vec<Recording>, jobs: HashMap<u64, Vec<u64>>) -> Self {
        StaticCatalog {
            recordings,
            jobs: jobs
                .into_iter()
                .map(|(job, ids)| (job.to_string(), ids))
                .collect(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading recording catalog {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing recording catalog {}", path.display()))
    }

    fn find(&self, id: u64) -> Option<&Recording> {
        self.recordings.iter().find(|r| r.id == id)
    }
}

impl RecordingCatalog for StaticCatalog {
    fn recording_in_job(&self, job: &JobId, recording_id: u64) -> Option<Recording> {
        let member = match job {
            JobId::System => true,
            JobId::Numbered(_) => self
                .jobs
                .get(&job.to_string())
                .map_or(false, |ids| ids.contains(&recording_id)),
        };

        if member {
            self.find(recording_id).cloned()
        } else {
            None
        }
    }

    fn recordings_for_job(&self, job: &JobId) -> Option<Vec<Recording>> {
        match job {
            JobId::System => Some(self.recordings.clone()),
            JobId::Numbered(_) => {
                let ids = self.jobs.get(&job.to_string())?;
                Some(ids.iter().filter_map(|id| self.find(*id)).cloned().collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(
            vec![
                Recording {
                    id: 1,
                    uuid: "aaaa-1".into(),
                },
                Recording {
                    id: 2,
                    uuid: "bbbb-2".into(),
                },
            ],
            HashMap::from([(12, vec![2])]),
        )
    }

    #[test]
    fn system_job_contains_everything() {
        let c = catalog();
        assert_eq!(c.recordings_for_job(&JobId::System).unwrap().len(), 2);
        assert!(c.recording_in_job(&JobId::System, 1).is_some());
        assert!(c.recording_in_job(&JobId::System, 3).is_none());
    }

    #[test]
    fn numbered_job_membership() {
        let c = catalog();
        let job = JobId::Numbered(12);
        assert_eq!(c.recording_in_job(&job, 2).unwrap().uuid, "bbbb-2");
        assert!(c.recording_in_job(&job, 1).is_none());
        assert!(c.recordings_for_job(&JobId::Numbered(99)).is_none());
    }

    #[test]
    fn loads_from_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"{"recordings":[{"id":7,"uuid":"cccc-7"}],"jobs":{"3":[7]}}"#,
        )
        .unwrap();

        let c = StaticCatalog::load(&path).unwrap();
        assert_eq!(
            c.recording_in_job(&JobId::Numbered(3), 7),
            Some(Recording {
                id: 7,
                uuid: "cccc-7".into()
            })
        );
    }
}
