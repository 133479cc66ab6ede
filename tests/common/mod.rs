#![allow(dead_code)]

use std::fs::File;
use std::io::{Cursor, Write};
use std::sync::Mutex;

use image::{GrayImage, ImageFormat, Luma};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use dyson::domain::{DocumentId, Feature, Geometry, Properties, RegionWindow};
use dyson::engine::{ImageHandle, RegionService, Visualization};
use dyson::error::DysonError;
use dyson::features::{FeatureCollection, FeatureSource};
use dyson::fetch::ArchiveFetcher;

/// Deterministic 8-bit value for band `band` at `(x, y)`.
pub fn band_value(band: usize, x: u32, y: u32) -> u8 {
    match band {
        0 => (x * 10 + y) as u8,
        1 => (100 + x) as u8,
        _ => (200 + y) as u8,
    }
}

/// Zip with one single-band TIFF per entry of `bands`, named like the engine
/// names them.
pub fn band_archive(id: &str, width: u32, height: u32, bands: &[&str]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut cursor);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for band in bands {
            let index = match *band {
                "red" => 0,
                "green" => 1,
                _ => 2,
            };
            let image = GrayImage::from_fn(width, height, |x, y| Luma([band_value(index, x, y)]));
            let mut tif = Cursor::new(Vec::new());
            image.write_to(&mut tif, ImageFormat::Tiff).unwrap();
            writer
                .start_file(format!("{id}.vis-{band}.tif"), options)
                .unwrap();
            writer.write_all(tif.get_ref()).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

pub fn point_feature(lng: f64, lat: f64, description: &str) -> Feature {
    Feature {
        geometry: Geometry::Point([lng, lat]),
        properties: Properties {
            description: vec![description.to_string()],
            extra: Default::default(),
        },
    }
}

pub fn collection(category: &str, size: usize) -> FeatureCollection {
    FeatureCollection {
        category: category.to_string(),
        features: (0..size)
            .map(|i| point_feature(27.0 + i as f64 * 0.1, -10.0, &format!("site {i}")))
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Region(String),
    Url(String),
}

/// Engine whose download urls carry `docid={prefix}{n}` for the n-th region
/// request.
pub struct MockEngine {
    pub prefix: String,
    pub calls: Mutex<Vec<EngineCall>>,
    pub windows: Mutex<Vec<RegionWindow>>,
    pub fail_on_url: Option<usize>,
}

impl MockEngine {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            calls: Mutex::new(Vec::new()),
            windows: Mutex::new(Vec::new()),
            fail_on_url: None,
        }
    }

    pub fn failing_on_url(prefix: &str, index: usize) -> Self {
        Self {
            fail_on_url: Some(index),
            ..Self::new(prefix)
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn region_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, EngineCall::Region(_)))
            .count()
    }
}

impl RegionService for MockEngine {
    fn request_region(
        &self,
        source: &str,
        _feature: &Feature,
        visualization: &Visualization,
    ) -> Result<ImageHandle, DysonError> {
        assert_eq!(source, "test/l8-masked");
        assert_eq!(visualization.bands, vec!["red", "green", "blue"]);
        let mut calls = self.calls.lock().unwrap();
        let n = calls
            .iter()
            .filter(|call| matches!(call, EngineCall::Region(_)))
            .count();
        let handle = format!("{}{n}", self.prefix);
        calls.push(EngineCall::Region(handle.clone()));
        Ok(ImageHandle(handle))
    }

    fn download_url(
        &self,
        image: &ImageHandle,
        window: &RegionWindow,
        scale: f64,
    ) -> Result<String, DysonError> {
        assert_eq!(scale, 30.0);
        let mut calls = self.calls.lock().unwrap();
        let issued = calls
            .iter()
            .filter(|call| matches!(call, EngineCall::Url(_)))
            .count();
        if self.fail_on_url == Some(issued) {
            return Err(DysonError::EngineStatus {
                status: 503,
                message: "engine busy".to_string(),
            });
        }
        calls.push(EngineCall::Url(image.as_str().to_string()));
        self.windows.lock().unwrap().push(*window);
        Ok(format!(
            "https://engine.test/v1/thumbnails:download?docid={}&token=t0k3n",
            image.as_str()
        ))
    }
}

/// Serves a generated band archive for whatever document id the url names.
pub struct MockFetcher {
    pub calls: Mutex<usize>,
    pub bands: Vec<&'static str>,
    pub width: u32,
    pub height: u32,
    pub archive_id: Option<String>,
    pub fail: bool,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self {
            calls: Mutex::new(0),
            bands: vec!["red", "green", "blue"],
            width: 4,
            height: 3,
            archive_id: None,
            fail: false,
        }
    }
}

impl MockFetcher {
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl ArchiveFetcher for MockFetcher {
    fn fetch(&self, url: &str, destination: &mut File) -> Result<u64, DysonError> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(DysonError::DownloadHttp("connection reset".to_string()));
        }
        let id = DocumentId::from_download_url(url)?;
        let archive_id = self.archive_id.clone().unwrap_or_else(|| id.to_string());
        let data = band_archive(&archive_id, self.width, self.height, &self.bands);
        destination.write_all(&data).unwrap();
        Ok(data.len() as u64)
    }
}

/// Wraps a collection and records every size query and slice.
pub struct CountingSource {
    pub inner: FeatureCollection,
    pub size_calls: Mutex<usize>,
    pub slices: Mutex<Vec<(usize, usize, usize)>>,
}

impl CountingSource {
    pub fn new(inner: FeatureCollection) -> Self {
        Self {
            inner,
            size_calls: Mutex::new(0),
            slices: Mutex::new(Vec::new()),
        }
    }
}

impl FeatureSource for CountingSource {
    fn category(&self) -> &str {
        self.inner.category()
    }

    fn size(&self) -> Result<usize, DysonError> {
        *self.size_calls.lock().unwrap() += 1;
        self.inner.size()
    }

    fn slice(&self, offset: usize, count: usize) -> Result<Vec<Feature>, DysonError> {
        let features = self.inner.slice(offset, count)?;
        self.slices
            .lock()
            .unwrap()
            .push((offset, count, features.len()));
        Ok(features)
    }
}
