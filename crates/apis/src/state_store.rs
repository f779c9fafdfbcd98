use std::{collections::HashMap, fs, io::ErrorKind, path::PathBuf};

use anyhow::{bail, Context};
use tracing::info;

use utility::{here, streams::VideoRecord};

/// Durable storage for the video index: a flat JSON mapping from video ID
/// to its record, rewritten atomically after every poll cycle.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> anyhow::Result<HashMap<String, VideoRecord>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => match e.kind() {
                ErrorKind::NotFound => {
                    info!(
                        path = %self.path.display(),
                        "No previous state file found, starting with an empty index."
                    );
                    return Ok(HashMap::new());
                }
                _ => bail!(
                    "Could not open state file at {}: {}",
                    self.path.display(),
                    e
                ),
            },
        };

        serde_json::from_str(&raw).context(here!())
    }

    /// Writes the index to a sibling temp file and renames it into place, so
    /// a crash mid-write leaves the previous state intact.
    pub fn save(&self, index: &HashMap<String, VideoRecord>) -> anyhow::Result<()> {
        let serialized = serde_json::to_string_pretty(index).context(here!())?;

        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        fs::write(&tmp_path, serialized).context(here!())?;
        fs::rename(&tmp_path, &self.path).context(here!())?;

        Ok(())
    }
}
