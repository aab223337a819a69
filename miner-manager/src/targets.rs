//! File-backed list of device addresses.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use miner_manager_common::Result;
use parking_lot::Mutex;
use tracing::{debug, info};

/// Ordered list of device addresses persisted as one address per line.
///
/// Reads always go to disk so edits made through the web form (or by hand)
/// are picked up by the next scrape.
pub struct TargetStore {
    path: PathBuf,
    /// Serializes writers; readers only ever see a whole file.
    write_lock: Mutex<()>,
}

/// Shareable target store handle.
pub type SharedTargetStore = Arc<TargetStore>;

impl TargetStore {
    /// Open the store, creating the file (and its directory) seeded with
    /// `defaults` if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>, defaults: &[String]) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        if !path.exists() {
            let mut content = defaults.join("\n");
            if !content.is_empty() {
                content.push('\n');
            }
            std::fs::write(&path, content)?;
            info!(
                path = %path.display(),
                count = defaults.len(),
                "Created target list with default addresses"
            );
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current addresses: trimmed, blank lines dropped, order and duplicates kept.
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(parse_targets(&self.raw()?))
    }

    /// The file's text exactly as stored.
    pub fn raw(&self) -> Result<String> {
        Ok(std::fs::read_to_string(&self.path)?)
    }

    /// Overwrite the file with `text` verbatim.
    pub fn replace(&self, text: &str) -> Result<()> {
        let _guard = self.write_lock.lock();

        // Write to a sibling file first so a concurrent scrape never reads
        // a half-written list.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(
            path = %self.path.display(),
            count = parse_targets(text).len(),
            "Target list replaced"
        );
        Ok(())
    }
}

/// Split target-file text into addresses.
pub fn parse_targets(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
