use std::fs;
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::DysonError;

/// Unpacks every entry under `target_dir` and returns the extracted file paths
/// relative to it.
pub fn extract_zip<R: Read + Seek>(
    reader: R,
    target_dir: &Path,
) -> Result<Vec<PathBuf>, DysonError> {
    let mut archive =
        ZipArchive::new(reader).map_err(|err| DysonError::CorruptArchive(err.to_string()))?;

    let mut extracted = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| DysonError::CorruptArchive(err.to_string()))?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            DysonError::CorruptArchive(format!("entry escapes archive root: {}", entry.name()))
        })?;
        let entry_path = target_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| DysonError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| DysonError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| DysonError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| DysonError::Filesystem(err.to_string()))?;
        extracted.push(relative);
    }
    Ok(extracted)
}

/// Moves the directory at `from` to `to` unless `to` already exists. Returns
/// `false` and leaves both untouched when another writer got there first.
pub fn rename_dir_if_absent(from: &Path, to: &Path) -> io::Result<bool> {
    if to.exists() {
        return Ok(false);
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(true),
        // rename(2) refuses a non-empty target directory.
        Err(_) if to.is_dir() => Ok(false),
        Err(err) => Err(err),
    }
}
