//! # Path Resolution
//!
//! A table file is addressed by `(name, source_path, slot)`. The slot is a
//! storage-device index that only means something on devices with several
//! removable volumes; everywhere else it is `NO_SLOT` (`-1`) and ignored.
//!
//! Resolution is a strategy injected into `CachedFile` at creation rather
//! than a process-wide lookup table:
//!
//! | Resolver      | Slot handling                                   |
//! |---------------|-------------------------------------------------|
//! | `DirResolver` | Ignored. Path is `source_path/name`.            |
//! | `SlotTable`   | Slot selects a volume root registered at runtime |
//!
//! ```text
//! SlotTable
//! ├── slot 0 -> /media/card0
//! ├── slot 1 -> /media/card1
//! └── NO_SLOT -> source_path/name (no volume)
//!
//! resolve("users.db", "app/data", 1) = /media/card1/app/data/users.db
//! ```

use std::fmt;
use std::path::{Component, Path, PathBuf};

use eyre::{bail, ensure, Result};
use parking_lot::RwLock;

use crate::config::NO_SLOT;

/// Where a file lives, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLocation {
    pub name: String,
    pub source_path: PathBuf,
    pub slot: i32,
}

impl FileLocation {
    pub fn new(name: impl Into<String>, source_path: impl Into<PathBuf>, slot: i32) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
            slot,
        }
    }
}

/// Strategy that turns a `FileLocation` into a native path.
pub trait PathResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, location: &FileLocation) -> Result<PathBuf>;
}

/// Joins `source_path` and `name`; the slot is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirResolver;

impl PathResolver for DirResolver {
    fn resolve(&self, location: &FileLocation) -> Result<PathBuf> {
        validate_name(&location.name)?;
        Ok(location.source_path.join(&location.name))
    }
}

/// Maps slot indices to volume roots.
///
/// Volumes can be mounted and unmounted while handles are open; resolution
/// only happens at create and rename time.
#[derive(Debug, Default)]
pub struct SlotTable {
    volumes: RwLock<Vec<Option<PathBuf>>>,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&self, slot: i32, root: impl Into<PathBuf>) -> Result<()> {
        ensure!(slot >= 0, "cannot mount a volume at slot {}", slot);

        let idx = slot as usize;
        let mut volumes = self.volumes.write();
        if volumes.len() <= idx {
            volumes.resize(idx + 1, None);
        }
        volumes[idx] = Some(root.into());
        Ok(())
    }

    pub fn unmount(&self, slot: i32) -> Option<PathBuf> {
        if slot < 0 {
            return None;
        }
        self.volumes
            .write()
            .get_mut(slot as usize)
            .and_then(Option::take)
    }

    pub fn volume(&self, slot: i32) -> Option<PathBuf> {
        if slot < 0 {
            return None;
        }
        self.volumes.read().get(slot as usize).cloned().flatten()
    }
}

impl PathResolver for SlotTable {
    fn resolve(&self, location: &FileLocation) -> Result<PathBuf> {
        validate_name(&location.name)?;

        if location.slot == NO_SLOT {
            return Ok(location.source_path.join(&location.name));
        }

        let Some(mut path) = self.volume(location.slot) else {
            bail!(
                "no volume mounted at slot {} for '{}'",
                location.slot,
                location.name
            );
        };

        let relative: PathBuf = location
            .source_path
            .components()
            .filter(|c| matches!(c, Component::Normal(_) | Component::CurDir))
            .collect();

        path.push(relative);
        path.push(&location.name);
        Ok(path)
    }
}

fn validate_name(name: &str) -> Result<()> {
    ensure!(!name.is_empty(), "file name cannot be empty");
    ensure!(
        !name.contains('/') && !name.contains('\\'),
        "file name '{}' cannot contain path separators",
        name
    );
    ensure!(
        !name.contains(".."),
        "file name '{}' cannot contain parent directory references",
        name
    );
    ensure!(
        name.chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.'),
        "file name '{}' can only contain alphanumeric characters, underscores, hyphens and dots",
        name
    );
    Ok(())
}

/// Resolved location of a file, for diagnostics.
pub(crate) fn display_name(path: &Path) -> String {
    path.display().to_string()
}
