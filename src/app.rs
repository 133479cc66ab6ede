use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::DocumentId;
use crate::engine::RegionService;
use crate::error::DysonError;
use crate::features::FeatureSource;
use crate::fetch::ArchiveFetcher;
use crate::materialize::ArchiveMaterializer;
use crate::paginator::{ChunkedPaginator, RegionOptions};
use crate::site;
use crate::store::{DataStore, MaterializedRecord};

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub items: Vec<FetchItemResult>,
    pub manifest_entries: Option<usize>,
}

impl FetchResult {
    pub fn count(&self, action: &str) -> usize {
        self.items.iter().filter(|item| item.action == action).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchItemResult {
    pub category: String,
    pub id: String,
    pub action: String,
    pub image: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub entries: usize,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteResult {
    pub path: String,
    pub categories: usize,
    pub records: usize,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// The acquisition pipeline: paginate each collection, materialize every
/// download not yet recorded, write its record, then rebuild the manifest.
pub struct App<E: RegionService, F: ArchiveFetcher> {
    store: DataStore,
    engine: E,
    fetcher: F,
}

impl<E: RegionService, F: ArchiveFetcher> App<E, F> {
    pub fn new(store: DataStore, engine: E, fetcher: F) -> Self {
        Self {
            store,
            engine,
            fetcher,
        }
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn fetch<C: FeatureSource>(
        &self,
        collections: &[C],
        region: RegionOptions,
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, DysonError> {
        if !options.dry_run {
            self.store.ensure_root()?;
        }

        let paginator = ChunkedPaginator::new(&self.engine, region)?;
        let materializer = ArchiveMaterializer::new(&self.fetcher, self.store.root().as_std_path());
        let mut items = Vec::new();

        for collection in collections {
            let category = collection.category();
            let started = Instant::now();
            let batches = paginator.batches(collection)?;
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Resolve; {category}: {} batches",
                    batches.batch_count()
                ),
                elapsed: None,
            });

            for batch in batches {
                let batch = batch?;
                sink.event(ProgressEvent {
                    message: format!(
                        "phase=Fetch; {category} batch {} ({} features)",
                        batch.index + 1,
                        batch.downloads.len()
                    ),
                    elapsed: Some(started.elapsed()),
                });

                for download in batch.downloads {
                    let id = DocumentId::from_download_url(&download.url)?;

                    if options.dry_run {
                        items.push(FetchItemResult {
                            category: category.to_string(),
                            id: id.to_string(),
                            action: "planned".to_string(),
                            image: None,
                            url: Some(download.url),
                        });
                        continue;
                    }

                    if self.store.has_record(&id) {
                        debug!(id = %id, "record present, skipping");
                        items.push(FetchItemResult {
                            category: category.to_string(),
                            id: id.to_string(),
                            action: "skipped".to_string(),
                            image: Some(id.image_name()),
                            url: None,
                        });
                        continue;
                    }

                    let materialized = materializer.materialize(&download.url)?;
                    let record = MaterializedRecord::new(
                        &materialized.id,
                        category,
                        download.feature,
                        materialized.image.clone(),
                    );
                    self.store.write_record(&record)?;
                    let action = if materialized.skipped {
                        "recorded"
                    } else {
                        "materialized"
                    };
                    items.push(FetchItemResult {
                        category: category.to_string(),
                        id: materialized.id.to_string(),
                        action: action.to_string(),
                        image: Some(materialized.image),
                        url: None,
                    });
                }
            }

            sink.event(ProgressEvent {
                message: format!("phase=Store; {category} done"),
                elapsed: Some(started.elapsed()),
            });
        }

        let manifest_entries = if options.dry_run {
            None
        } else {
            Some(self.store.rebuild_manifest()?.len())
        };
        info!(items = items.len(), ?manifest_entries, "fetch finished");

        Ok(FetchResult {
            items,
            manifest_entries,
        })
    }
}

/// Rebuilds the manifest from the records on disk.
pub fn aggregate(store: &DataStore, sink: &dyn ProgressSink) -> Result<AggregateResult, DysonError> {
    sink.event(ProgressEvent {
        message: format!("phase=Store; scanning {}", store.root()),
        elapsed: None,
    });
    let manifest = store.rebuild_manifest()?;
    Ok(AggregateResult {
        entries: manifest.len(),
        manifest_path: store.manifest_path().to_string(),
    })
}

/// Renders the gallery page from the current manifest.
pub fn build_site(store: &DataStore, sink: &dyn ProgressSink) -> Result<SiteResult, DysonError> {
    sink.event(ProgressEvent {
        message: format!("phase=Render; reading {}", store.manifest_path()),
        elapsed: None,
    });
    let manifest = store.load_manifest()?;
    let categories = site::write_site(store, &manifest)?;
    Ok(SiteResult {
        path: store.site_path().to_string(),
        categories,
        records: manifest.len(),
    })
}
