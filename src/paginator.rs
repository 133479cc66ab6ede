use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{Feature, RegionWindow};
use crate::engine::{RegionService, Visualization};
use crate::error::DysonError;
use crate::features::FeatureSource;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_RADIUS: f64 = 0.02;
pub const DEFAULT_SCALE: f64 = 30.0;

/// Per-run acquisition parameters. Radius and scale apply to every feature.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionOptions {
    pub source: String,
    pub radius: f64,
    pub scale: f64,
    pub batch_size: usize,
    pub visualization: Visualization,
}

impl RegionOptions {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            radius: DEFAULT_RADIUS,
            scale: DEFAULT_SCALE,
            batch_size: DEFAULT_BATCH_SIZE,
            visualization: Visualization::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionDownload {
    pub url: String,
    pub feature: Feature,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub index: usize,
    pub offset: usize,
    pub downloads: Vec<RegionDownload>,
}

/// Number of batches needed to cover `total` items.
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    total.div_ceil(batch_size)
}

/// Walks a feature collection in fixed-size batches so that at most
/// `batch_size` region computations are outstanding on the engine at once.
pub struct ChunkedPaginator<'s, S: RegionService> {
    service: &'s S,
    options: RegionOptions,
}

impl<'s, S: RegionService> ChunkedPaginator<'s, S> {
    pub fn new(service: &'s S, options: RegionOptions) -> Result<Self, DysonError> {
        if options.batch_size == 0 {
            return Err(DysonError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(Self { service, options })
    }

    pub fn options(&self) -> &RegionOptions {
        &self.options
    }

    /// Queries the collection size once and yields one batch per step.
    /// After the first error the iterator is exhausted.
    pub fn batches<'p, C: FeatureSource>(
        &'p self,
        collection: &'p C,
    ) -> Result<Batches<'p, 's, S, C>, DysonError> {
        let total = collection.size()?;
        let count = batch_count(total, self.options.batch_size);
        info!(
            category = collection.category(),
            features = total,
            batches = count,
            "paginating feature collection"
        );
        Ok(Batches {
            paginator: self,
            collection,
            count,
            next: 0,
        })
    }

    /// Every (url, feature) pair of the collection, in collection order.
    pub fn collect<C: FeatureSource>(
        &self,
        collection: &C,
    ) -> Result<Vec<RegionDownload>, DysonError> {
        let mut downloads = Vec::new();
        for batch in self.batches(collection)? {
            downloads.extend(batch?.downloads);
        }
        Ok(downloads)
    }

    fn fetch_batch<C: FeatureSource>(
        &self,
        collection: &C,
        index: usize,
    ) -> Result<Batch, DysonError> {
        let offset = index * self.options.batch_size;
        let features = collection.slice(offset, self.options.batch_size)?;

        let images = features
            .iter()
            .map(|feature| {
                self.service.request_region(
                    &self.options.source,
                    feature,
                    &self.options.visualization,
                )
            })
            .collect::<Result<Vec<_>, DysonError>>()?;

        let mut downloads = Vec::with_capacity(features.len());
        for (feature, image) in features.into_iter().zip(images) {
            let center = feature.geometry.representative_point().ok_or_else(|| {
                DysonError::InvalidGeometry(format!(
                    "{} in {} has no coordinates",
                    feature.geometry.kind(),
                    collection.category()
                ))
            })?;
            let window = RegionWindow::around(center, self.options.radius);
            let url = self
                .service
                .download_url(&image, &window, self.options.scale)?;
            debug!(image = image.as_str(), "download url issued");
            downloads.push(RegionDownload { url, feature });
        }

        debug!(
            category = collection.category(),
            batch = index,
            size = downloads.len(),
            "batch complete"
        );
        Ok(Batch {
            index,
            offset,
            downloads,
        })
    }
}

pub struct Batches<'p, 's, S: RegionService, C: FeatureSource> {
    paginator: &'p ChunkedPaginator<'s, S>,
    collection: &'p C,
    count: usize,
    next: usize,
}

impl<S: RegionService, C: FeatureSource> Batches<'_, '_, S, C> {
    pub fn batch_count(&self) -> usize {
        self.count
    }
}

impl<S: RegionService, C: FeatureSource> Iterator for Batches<'_, '_, S, C> {
    type Item = Result<Batch, DysonError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let index = self.next;
        let result = self.paginator.fetch_batch(self.collection, index);
        self.next = if result.is_ok() { index + 1 } else { self.count };
        Some(result)
    }
}
