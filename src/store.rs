use std::collections::BTreeMap;
use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{DocumentId, Feature, Geometry, Properties};
use crate::error::DysonError;

pub const RECORD_FILE: &str = "meta.json";
pub const MANIFEST_FILE: &str = "dataset.json";
pub const SITE_FILE: &str = "index.html";

/// Metadata for one materialized feature, stored at `{root}/{id}/meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub category: String,
    pub geometry: Geometry,
    pub properties: Properties,
    pub img: String,
}

impl MaterializedRecord {
    pub fn new(id: &DocumentId, category: &str, feature: Feature, img: String) -> Self {
        Self {
            id: id.to_string(),
            category: category.to_string(),
            geometry: feature.geometry,
            properties: feature.properties,
            img,
        }
    }
}

/// Document id to record. Always derived from the record files on disk.
pub type Manifest = BTreeMap<String, MaterializedRecord>;

/// Layout of the data root:
///
/// ```text
/// {root}/{id}/          unpacked archive + meta.json
/// {root}/{id}.png       composite
/// {root}/dataset.json   manifest
/// {root}/index.html     gallery
/// ```
#[derive(Debug, Clone)]
pub struct DataStore {
    root: Utf8PathBuf,
}

impl DataStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn record_dir(&self, id: &DocumentId) -> Utf8PathBuf {
        self.root.join(id.as_str())
    }

    pub fn record_path(&self, id: &DocumentId) -> Utf8PathBuf {
        self.record_dir(id).join(RECORD_FILE)
    }

    pub fn image_path(&self, id: &DocumentId) -> Utf8PathBuf {
        self.root.join(id.image_name())
    }

    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn site_path(&self) -> Utf8PathBuf {
        self.root.join(SITE_FILE)
    }

    pub fn ensure_root(&self) -> Result<(), DysonError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| DysonError::Filesystem(err.to_string()))
    }

    pub fn has_record(&self, id: &DocumentId) -> bool {
        self.record_path(id).as_std_path().is_file()
    }

    /// Writes the record next to its unpacked archive. Rewriting a record with
    /// the same content leaves the file unchanged.
    pub fn write_record(&self, record: &MaterializedRecord) -> Result<Utf8PathBuf, DysonError> {
        let id: DocumentId = record.id.parse()?;
        let path = self.record_path(&id);
        write_json_atomic(&path, record)?;
        debug!(id = %id, path = %path, "record written");
        Ok(path)
    }

    pub fn read_record(&self, id: &DocumentId) -> Result<MaterializedRecord, DysonError> {
        read_json(&self.record_path(id))
    }

    /// Folds every `{root}/*/meta.json` into a manifest. Records that do not
    /// parse, or whose id does not match their directory, are left out.
    pub fn aggregate(&self) -> Result<Manifest, DysonError> {
        let mut manifest = Manifest::new();
        if !self.root.as_std_path().is_dir() {
            return Ok(manifest);
        }

        let entries = fs::read_dir(self.root.as_std_path())
            .map_err(|err| DysonError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| DysonError::Filesystem(err.to_string()))?;
            let dir = entry.path();
            let record_path = dir.join(RECORD_FILE);
            if !dir.is_dir() || !record_path.is_file() {
                continue;
            }
            let record_path = Utf8PathBuf::from_path_buf(record_path).map_err(|path| {
                DysonError::Filesystem(format!("non UTF-8 path {}", path.display()))
            })?;
            let record: MaterializedRecord = match read_json(&record_path) {
                Ok(record) => record,
                Err(DysonError::RecordParse { message, .. }) => {
                    warn!(path = %record_path, %message, "skipping malformed record");
                    continue;
                }
                Err(err) => return Err(err),
            };
            let dir_name = entry.file_name();
            if dir_name.to_str() != Some(record.id.as_str()) {
                warn!(path = %record_path, id = %record.id, "record id does not match its directory");
                continue;
            }
            manifest.insert(record.id.clone(), record);
        }
        Ok(manifest)
    }

    /// Rebuilds `dataset.json` from the records on disk, replacing any prior
    /// manifest.
    pub fn rebuild_manifest(&self) -> Result<Manifest, DysonError> {
        let manifest = self.aggregate()?;
        self.ensure_root()?;
        write_json_atomic(&self.manifest_path(), &manifest)?;
        info!(entries = manifest.len(), path = %self.manifest_path(), "manifest rebuilt");
        Ok(manifest)
    }

    pub fn load_manifest(&self) -> Result<Manifest, DysonError> {
        read_json(&self.manifest_path())
    }
}

fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, DysonError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| DysonError::Filesystem(format!("read {path}: {err}")))?;
    serde_json::from_str(&content).map_err(|err| DysonError::RecordParse {
        path: path.as_std_path().to_path_buf(),
        message: err.to_string(),
    })
}

/// Serializes into a temporary sibling and renames it over `path`.
pub fn write_json_atomic<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), DysonError> {
    let content =
        serde_json::to_vec_pretty(value).map_err(|err| DysonError::Filesystem(err.to_string()))?;
    write_bytes_atomic(path, &content)
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), DysonError> {
    let parent = path
        .parent()
        .ok_or_else(|| DysonError::Filesystem(format!("invalid destination path {path}")))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| DysonError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".dyson-write")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| DysonError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| DysonError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| DysonError::Filesystem(err.to_string()))?;
    Ok(())
}
