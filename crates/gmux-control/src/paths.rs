//! Virtual to physical path mapping.
//!
//! Clients and the firmware address files with virtual paths under `0:/`
//! (`0:/gcodes/part.g`); on disk everything lives below
//! [`Settings::base_directory`]. Bare names resolve into a caller-chosen
//! default directory from the model's directory table.

use crate::model::Directories;
use crate::Settings;
use std::path::{Path, PathBuf};

/// Default directory used when resolving a bare file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownDirectory {
    /// Job files.
    GCodes,
    /// System files.
    System,
    /// Macro files.
    Macros,
    /// Filament presets.
    Filaments,
    /// Web assets.
    Web,
    /// Scanner output.
    Scans,
    /// Firmware binaries.
    Firmware,
}

impl KnownDirectory {
    fn virtual_dir(self, dirs: &Directories) -> &str {
        match self {
            Self::GCodes => &dirs.gcodes,
            Self::System => &dirs.system,
            Self::Macros => &dirs.macros,
            Self::Filaments => &dirs.filaments,
            Self::Web => &dirs.web,
            Self::Scans => &dirs.scans,
            Self::Firmware => &dirs.firmware,
        }
    }
}

/// Path mapping helpers.
pub struct FilePath;

impl FilePath {
    /// Maps an absolute virtual path (`0:/sys/config.g` or `/sys/config.g`)
    /// to its physical location.
    #[must_use]
    pub fn to_physical(virtual_path: &str, settings: &Settings) -> PathBuf {
        let relative = virtual_path
            .strip_prefix("0:/")
            .or_else(|| virtual_path.strip_prefix('/'))
            .unwrap_or(virtual_path);
        settings.base_directory.join(relative)
    }

    /// Resolves a file name against a default directory.
    ///
    /// Absolute virtual paths are mapped directly; anything else (including
    /// names with subdirectories) is looked up below the default directory.
    #[must_use]
    pub fn resolve(
        name: &str,
        directory: KnownDirectory,
        dirs: &Directories,
        settings: &Settings,
    ) -> PathBuf {
        if name.starts_with("0:/") || name.starts_with('/') {
            Self::to_physical(name, settings)
        } else {
            let base = Self::to_physical(directory.virtual_dir(dirs), settings);
            base.join(name)
        }
    }

    /// Maps a physical path back to its virtual form, if it lies below the
    /// base directory.
    #[must_use]
    pub fn to_virtual(physical: &Path, settings: &Settings) -> String {
        match physical.strip_prefix(&settings.base_directory) {
            Ok(relative) => format!("0:/{}", relative.display()),
            Err(_) => physical.display().to_string(),
        }
    }
}
