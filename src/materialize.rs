use std::fs;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::Builder;
use tracing::{debug, info};

use crate::composite::{load_band, merge_bands, write_png};
use crate::domain::DocumentId;
use crate::error::DysonError;
use crate::fetch::ArchiveFetcher;
use crate::fs_util::{extract_zip, rename_dir_if_absent};

/// Band suffixes in the order they become red, green and blue.
pub const BANDS: [&str; 3] = ["red", "green", "blue"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Materialized {
    pub id: DocumentId,
    pub image: String,
    pub skipped: bool,
}

/// Turns a download url into `{root}/{id}/` (the unpacked archive) and
/// `{root}/{id}.png` (the RGB composite).
///
/// The archive is unpacked into a staging directory and the composite is
/// written to a temporary file. The composite is renamed into place first and
/// the staging directory last, so an existing `{id}/` always has its image.
/// An `{id}/` created by another writer meanwhile is left as it is.
pub struct ArchiveMaterializer<'f, F: ArchiveFetcher> {
    fetcher: &'f F,
    root: PathBuf,
}

impl<'f, F: ArchiveFetcher> ArchiveMaterializer<'f, F> {
    pub fn new(fetcher: &'f F, root: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_materialized(&self, id: &DocumentId) -> bool {
        self.root.join(id.as_str()).is_dir()
    }

    pub fn materialize(&self, url: &str) -> Result<Materialized, DysonError> {
        let id = DocumentId::from_download_url(url)?;
        let image = id.image_name();

        if self.is_materialized(&id) {
            debug!(id = %id, "already materialized");
            return Ok(Materialized {
                id,
                image,
                skipped: true,
            });
        }

        fs::create_dir_all(&self.root).map_err(|err| DysonError::Filesystem(err.to_string()))?;

        let mut archive = Builder::new()
            .prefix(&format!(".{id}-"))
            .suffix(".zip")
            .tempfile_in(&self.root)
            .map_err(|err| DysonError::Filesystem(err.to_string()))?;
        let bytes = self.fetcher.fetch(url, archive.as_file_mut())?;
        debug!(id = %id, bytes, "archive downloaded");
        archive
            .as_file_mut()
            .rewind()
            .map_err(|err| DysonError::Filesystem(err.to_string()))?;

        let staging = Builder::new()
            .prefix(&format!(".{id}-extract"))
            .tempdir_in(&self.root)
            .map_err(|err| DysonError::Filesystem(err.to_string()))?;
        let entries = extract_zip(archive.as_file(), staging.path())?;
        check_band_ids(&id, &entries)?;

        let composite = self.composite(&id, staging.path())?;
        let mut png = Builder::new()
            .prefix(&format!(".{id}-"))
            .suffix(".png.tmp")
            .tempfile_in(&self.root)
            .map_err(|err| DysonError::Filesystem(err.to_string()))?;
        {
            let mut writer = BufWriter::new(png.as_file_mut());
            write_png(&composite, &mut writer)?;
            writer
                .flush()
                .map_err(|err| DysonError::Filesystem(err.to_string()))?;
        }
        png.persist(self.root.join(&image))
            .map_err(|err| DysonError::Filesystem(err.to_string()))?;

        let moved = rename_dir_if_absent(staging.path(), &self.root.join(id.as_str()))
            .map_err(|err| DysonError::Filesystem(err.to_string()))?;
        archive
            .close()
            .map_err(|err| DysonError::Filesystem(err.to_string()))?;

        if !moved {
            debug!(id = %id, "materialized concurrently by another writer");
            return Ok(Materialized {
                id,
                image,
                skipped: true,
            });
        }

        info!(id = %id, image = %image, "materialized composite");
        Ok(Materialized {
            id,
            image,
            skipped: false,
        })
    }

    fn composite(&self, id: &DocumentId, dir: &Path) -> Result<image::DynamicImage, DysonError> {
        let mut bands = Vec::with_capacity(BANDS.len());
        for band in BANDS {
            let path = dir.join(id.band_file_name(band));
            if !path.is_file() {
                return Err(DysonError::MissingBand {
                    id: id.to_string(),
                    path,
                });
            }
            bands.push(load_band(&path)?);
        }
        let [red, green, blue]: [image::DynamicImage; 3] = bands
            .try_into()
            .map_err(|_| DysonError::BandMismatch("expected three bands".to_string()))?;
        merge_bands(red, green, blue)
    }
}

/// Every raster in the archive must carry the url's document id.
fn check_band_ids(id: &DocumentId, entries: &[PathBuf]) -> Result<(), DysonError> {
    for entry in entries {
        let Some(name) = entry.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !name.ends_with(".tif") {
            continue;
        }
        let prefix = name.split('.').next().unwrap_or_default();
        if prefix != id.as_str() {
            return Err(DysonError::DocumentIdMismatch {
                expected: id.to_string(),
                found: prefix.to_string(),
            });
        }
    }
    Ok(())
}
