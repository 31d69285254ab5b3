//! Offline vehicle catalog — nested year → make → models document.
//!
//! Loaded at most once per process; concurrent first callers share the one
//! in-flight fetch.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::LookupError;

/// Immutable year → make → ordered model list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleCatalog {
    years: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl VehicleCatalog {
    /// Parse the catalog document, rejecting keys that are not 4-digit years
    /// and documents with no years at all.
    pub fn from_json(bytes: &[u8]) -> Result<Self, LookupError> {
        let catalog: Self = serde_json::from_slice(bytes)?;
        if let Some(bad) = catalog
            .years
            .keys()
            .find(|y| y.len() != 4 || !y.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(LookupError::InvalidResponse {
                service: "catalog".into(),
                reason: format!("{bad:?} is not a 4-digit year"),
            });
        }
        if catalog.is_empty() {
            return Err(LookupError::CatalogUnavailable(
                "document lists no model years".into(),
            ));
        }
        Ok(catalog)
    }

    /// Years in ascending order.
    pub fn years(&self) -> Vec<String> {
        self.years.keys().cloned().collect()
    }

    /// Makes available for `year`, alphabetical. Unknown year → empty.
    pub fn makes(&self, year: &str) -> Vec<String> {
        self.years
            .get(year)
            .map(|makes| makes.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Models for `year`/`make` in document order. Unknown pair → empty.
    pub fn models(&self, year: &str, make: &str) -> Vec<String> {
        self.years
            .get(year)
            .and_then(|makes| makes.get(make))
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

impl FromIterator<(String, String, Vec<String>)> for VehicleCatalog {
    fn from_iter<I: IntoIterator<Item = (String, String, Vec<String>)>>(iter: I) -> Self {
        let mut years: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        for (year, make, models) in iter {
            years.entry(year).or_default().insert(make, models);
        }
        Self { years }
    }
}

/// Where the catalog document comes from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self) -> Result<VehicleCatalog, LookupError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Catalog read from a local JSON file.
pub struct FileCatalogSource {
    path: PathBuf,
}

impl FileCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    async fn fetch(&self) -> Result<VehicleCatalog, LookupError> {
        let bytes = tokio::fs::read(&self.path).await?;
        VehicleCatalog::from_json(&bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Catalog served as a static document over HTTP.
pub struct HttpCatalogSource {
    client: reqwest::Client,
    url: String,
}

impl HttpCatalogSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self) -> Result<VehicleCatalog, LookupError> {
        let failed = |reason: String| LookupError::RequestFailed {
            service: "catalog".into(),
            reason,
        };
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(failed(format!("status {}", resp.status())));
        }
        let bytes = resp.bytes().await.map_err(|e| failed(e.to_string()))?;
        VehicleCatalog::from_json(&bytes)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Pick a source from a config string: URLs are fetched, anything else is
/// read from disk.
pub fn catalog_source(location: &str, client: reqwest::Client) -> Arc<dyn CatalogSource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Arc::new(HttpCatalogSource::new(client, location))
    } else {
        Arc::new(FileCatalogSource::new(location))
    }
}

/// Memoized catalog loader.
///
/// A failed load is cached as an empty catalog: the catalog is fetched once
/// per process and never invalidated, and dependent steps just see no
/// options.
pub struct CatalogLoader {
    source: Arc<dyn CatalogSource>,
    cell: OnceCell<Arc<VehicleCatalog>>,
    fetches: AtomicUsize,
}

impl CatalogLoader {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            cell: OnceCell::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// The catalog, fetching it on first use.
    pub async fn load(&self) -> Arc<VehicleCatalog> {
        self.cell
            .get_or_init(|| async {
                self.fetches.fetch_add(1, Ordering::SeqCst);
                match self.source.fetch().await {
                    Ok(catalog) => {
                        info!(
                            source = %self.source.describe(),
                            years = catalog.years.len(),
                            "Vehicle catalog loaded"
                        );
                        Arc::new(catalog)
                    }
                    Err(e) => {
                        warn!(
                            source = %self.source.describe(),
                            error = %e,
                            "Vehicle catalog unavailable, continuing without it"
                        );
                        Arc::new(VehicleCatalog::default())
                    }
                }
            })
            .await
            .clone()
    }

    /// The catalog if it has already been loaded.
    pub fn cached(&self) -> Option<Arc<VehicleCatalog>> {
        self.cell.get().cloned()
    }

    /// How many times the underlying source has been hit.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}
