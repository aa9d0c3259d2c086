//! The monitors file on disk
//!
//! Saving never loses the previous file: it is renamed to the backup path
//! before the new content is written, and renamed back if the write fails.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::config::Configuration;
use super::matching;
use super::xml;
use crate::error::{RandrError, Result};

const FILE_NAME: &str = "monitors.xml";
const BACKUP_SUFFIX: &str = ".backup";

/// `$XDG_CONFIG_HOME/monitors.xml`
pub fn intended_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(FILE_NAME))
}

/// `$XDG_CONFIG_HOME/monitors.xml.backup`
pub fn backup_path() -> Option<PathBuf> {
    intended_path().map(|path| backup_path_for(&path))
}

/// Backup location for an arbitrary monitors file
pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Read every configuration stored in `path`
///
/// # Errors
///
/// `Io` when the file cannot be read, `Parse` when it is not a monitors
/// document.
pub fn load_all(path: &Path) -> Result<Vec<Configuration>> {
    let document = std::fs::read_to_string(path).map_err(|e| RandrError::io(path, e))?;
    let configs = xml::parse(&document).map_err(|e| RandrError::parse(path, e))?;
    debug!("Loaded {} configurations from {}", configs.len(), path.display());
    Ok(configs)
}

/// Store `config` in `path`, replacing any configuration for the same monitors
///
/// An unreadable existing file counts as empty.
pub fn save(config: &Configuration, path: &Path) -> Result<()> {
    save_with(config, path, write_atomically)
}

fn save_with<W>(config: &Configuration, path: &Path, write: W) -> Result<()>
where
    W: FnOnce(&Path, &str) -> std::io::Result<()>,
{
    let existing = match load_all(path) {
        Ok(configs) => configs,
        Err(e) => {
            debug!("Starting a new monitors file: {e}");
            Vec::new()
        }
    };

    let kept: Vec<&Configuration> = existing
        .iter()
        .filter(|stored| !matching::matches(stored, config))
        .collect();
    let replaced = existing.len() - kept.len();
    let document = xml::serialize(kept.into_iter().chain(std::iter::once(config)));

    let backup = backup_path_for(path);
    if let Err(e) = std::fs::rename(path, &backup) {
        debug!("No previous monitors file to back up: {e}");
    }

    if let Err(e) = write(path, &document) {
        if let Err(restore) = std::fs::rename(&backup, path) {
            warn!("Could not restore {} from backup: {restore}", path.display());
        }
        return Err(RandrError::io(path, e));
    }

    info!(
        "Saved display configuration to {} ({} replaced)",
        path.display(),
        replaced
    );
    Ok(())
}

fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
