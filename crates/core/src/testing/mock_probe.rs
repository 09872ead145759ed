//! Mock media probe for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::media::{MediaProbe, ProbeError};

/// Mock implementation of the MediaProbe trait.
///
/// Returns configured durations per path, `NotFound` for paths marked
/// missing, and a default duration for everything else.
#[derive(Debug)]
pub struct MockProbe {
    default_secs: f64,
    durations: RwLock<HashMap<PathBuf, f64>>,
    missing: RwLock<HashSet<PathBuf>>,
}

impl MockProbe {
    pub fn new(default_secs: f64) -> Self {
        Self {
            default_secs,
            durations: RwLock::new(HashMap::new()),
            missing: RwLock::new(HashSet::new()),
        }
    }

    /// Set the duration reported for `path`.
    pub fn set_duration(&self, path: impl AsRef<Path>, secs: f64) {
        if let Ok(mut durations) = self.durations.write() {
            durations.insert(path.as_ref().to_path_buf(), secs);
        }
    }

    /// Report `path` as not found.
    pub fn set_missing(&self, path: impl AsRef<Path>) {
        if let Ok(mut missing) = self.missing.write() {
            missing.insert(path.as_ref().to_path_buf());
        }
    }
}

#[async_trait]
impl MediaProbe for MockProbe {
    async fn duration_secs(&self, path: &Path) -> Result<f64, ProbeError> {
        let missing = self
            .missing
            .read()
            .map(|m| m.contains(path))
            .unwrap_or(false);
        if missing {
            return Err(ProbeError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let configured = self
            .durations
            .read()
            .ok()
            .and_then(|d| d.get(path).copied());
        Ok(configured.unwrap_or(self.default_secs))
    }
}
