use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::store::{path_component, ProjectKey};
use crate::map::MapConfiguration;

/// Which copy won when a local draft met the stored map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DraftChoice {
    NoDraft,
    Draft,
    Stored,
}

/// Pick between the stored map and a local draft: the higher version wins;
/// on a version tie the later `updated_at` wins; otherwise the stored copy.
pub fn reconcile(
    stored: MapConfiguration,
    draft: Option<MapConfiguration>,
) -> (MapConfiguration, DraftChoice) {
    let Some(draft) = draft else {
        return (stored, DraftChoice::NoDraft);
    };
    let draft_wins = match draft.version.cmp(&stored.version) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => match (draft.updated_at, stored.updated_at) {
            (Some(d), Some(s)) => d > s,
            (Some(_), None) => true,
            _ => false,
        },
    };
    if draft_wins {
        (draft, DraftChoice::Draft)
    } else {
        (stored, DraftChoice::Stored)
    }
}

/// Local drafts of unsaved maps, bincode-encoded, one file per project.
///
/// Every failure here is logged and swallowed: a missing draft only means
/// falling back to the stored copy.
#[derive(Clone, Debug)]
pub struct DraftCache {
    dir: PathBuf,
}

/// Default draft directory under the platform cache directory.
pub fn default_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "hexboard").map(|dirs| dirs.cache_dir().join("drafts"))
}

impl DraftCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &ProjectKey) -> PathBuf {
        // `.` never appears in an encoded component
        self.dir.join(format!(
            "{}.{}.draft",
            path_component(&key.owner_id),
            path_component(&key.project_id)
        ))
    }

    /// Store `config` as the draft, stamped with the current time so an
    /// unsaved edit outranks the stored copy it was based on.
    pub fn store(&self, key: &ProjectKey, config: &MapConfiguration) {
        let mut draft = config.clone();
        draft.updated_at = Some(Utc::now());
        let bytes = match bincode::serialize(&draft) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Failed to encode draft for {key}: {e}");
                return;
            }
        };
        if let Err(e) = fs::create_dir_all(&self.dir) {
            log::warn!("Failed to create draft directory: {e}");
            return;
        }
        if let Err(e) = fs::write(self.path(key), bytes) {
            log::warn!("Failed to write draft for {key}: {e}");
        }
    }

    pub fn load(&self, key: &ProjectKey) -> Option<MapConfiguration> {
        let path = self.path(key);
        let bytes = fs::read(&path).ok()?;
        match bincode::deserialize(&bytes) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Discarding unreadable draft for {key}: {e}");
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    pub fn clear(&self, key: &ProjectKey) {
        match fs::remove_file(self.path(key)) {
            Ok(()) => log::debug!("cleared draft for {key}"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to clear draft for {key}: {e}"),
        }
    }
}
