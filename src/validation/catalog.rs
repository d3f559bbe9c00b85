//! Adapter catalog loading and validation.
//!
//! Catalogs are JSON documents grouping adapters under their trackers:
//!
//! ```json
//! {"trackers": [{"slug": "t", "name": "T", "adapters": [
//!     {"slug": "a", "endpointUrls": ["https://t.example/c"],
//!      "decodingSteps": [...], "containedDataPaths": {...}}
//! ]}]}
//! ```
//!
//! Paths, patterns and steps are compiled at load time. Catalog order is
//! document order, which decides matching precedence.

use std::collections::HashSet;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::CatalogError;
use crate::model::{Adapter, DataPath, DecodingStep, EndpointMatcher, Property, RequestPredicate, Tracker};

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    trackers: Vec<TrackerDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackerDocument {
    slug: String,
    name: String,
    #[serde(default)]
    datenanfragen_slug: Option<String>,
    #[serde(default)]
    exodus_id: Option<u32>,
    #[serde(default)]
    adapters: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdapterDocument {
    slug: String,
    #[serde(default)]
    tracker: Option<String>,
    endpoint_urls: Vec<EndpointMatcher>,
    #[serde(default, rename = "match")]
    predicate: Option<RequestPredicate>,
    #[serde(default)]
    decoding_steps: Vec<DecodingStep>,
    #[serde(default)]
    contained_data_paths: Map<String, Value>,
}

/// Ordered, validated set of adapters.
#[derive(Debug, Clone, Default)]
pub struct AdapterCatalog {
    trackers: Vec<Arc<Tracker>>,
    adapters: Vec<Adapter>,
}

impl AdapterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let document: Value = serde_json::from_str(json)?;
        Self::from_value(document)
    }

    pub fn from_value(document: Value) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_value(document)?;
        let mut catalog = Self::new();

        for tracker_doc in document.trackers {
            let tracker = Arc::new(Tracker {
                slug: tracker_doc.slug,
                name: tracker_doc.name,
                datenanfragen_slug: tracker_doc.datenanfragen_slug,
                exodus_id: tracker_doc.exodus_id,
            });

            for adapter_value in tracker_doc.adapters {
                let adapter = build_adapter(&tracker, adapter_value)?;
                catalog.push(adapter)?;
            }
            if !catalog.trackers.iter().any(|t| Arc::ptr_eq(t, &tracker)) {
                catalog.trackers.push(tracker);
            }
        }

        Ok(catalog)
    }

    /// Append an adapter, rejecting duplicate ids.
    pub fn push(&mut self, adapter: Adapter) -> Result<(), CatalogError> {
        let id = adapter.id();
        if self.adapters.iter().any(|existing| existing.id() == id) {
            return Err(CatalogError::DuplicateAdapter(id));
        }
        if !self.trackers.iter().any(|t| **t == *adapter.tracker) {
            self.trackers.push(Arc::clone(&adapter.tracker));
        }
        self.adapters.push(adapter);
        Ok(())
    }

    /// Append all of `other` after this catalog's adapters. Nothing is added
    /// if any id collides.
    pub fn merge(&mut self, other: AdapterCatalog) -> Result<usize, CatalogError> {
        let existing: HashSet<String> = self.adapters.iter().map(Adapter::id).collect();
        if let Some(duplicate) = other.adapters.iter().map(Adapter::id).find(|id| existing.contains(id)) {
            return Err(CatalogError::DuplicateAdapter(duplicate));
        }

        let added = other.adapters.len();
        for tracker in other.trackers {
            if !self.trackers.iter().any(|t| **t == *tracker) {
                self.trackers.push(tracker);
            }
        }
        self.adapters.extend(other.adapters);
        Ok(added)
    }

    pub fn adapters(&self) -> &[Adapter] {
        &self.adapters
    }

    pub fn trackers(&self) -> &[Arc<Tracker>] {
        &self.trackers
    }

    pub fn get(&self, id: &str) -> Option<&Adapter> {
        self.adapters.iter().find(|adapter| adapter.id() == id)
    }

    pub fn adapter_ids(&self) -> Vec<String> {
        self.adapters.iter().map(Adapter::id).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn clear(&mut self) {
        self.trackers.clear();
        self.adapters.clear();
    }
}

fn build_adapter(tracker: &Arc<Tracker>, value: Value) -> Result<Adapter, CatalogError> {
    let slug = value.get("slug").and_then(Value::as_str).unwrap_or("<unnamed>");
    let id = format!("{}/{}", tracker.slug, slug);
    let invalid = |message: String| CatalogError::InvalidAdapter {
        adapter: id.clone(),
        message,
    };

    let document: AdapterDocument = serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;

    if let Some(declared) = &document.tracker {
        if *declared != tracker.slug {
            return Err(CatalogError::TrackerMismatch {
                adapter: id.clone(),
                declared: declared.clone(),
                enclosing: tracker.slug.clone(),
            });
        }
    }
    if document.endpoint_urls.is_empty() {
        return Err(invalid("no endpointUrls".to_string()));
    }

    let mut contained_data_paths = Vec::with_capacity(document.contained_data_paths.len());
    for (name, paths) in document.contained_data_paths {
        let property = name
            .parse::<Property>()
            .map_err(|e| invalid(format!("containedDataPaths: {e}")))?;
        let paths: Vec<DataPath> = match paths {
            Value::Array(_) => serde_json::from_value(paths),
            single => serde_json::from_value(single).map(|path| vec![path]),
        }
        .map_err(|e| invalid(format!("containedDataPaths.{property}: {e}")))?;
        contained_data_paths.push((property, paths));
    }

    Ok(Adapter {
        tracker: Arc::clone(tracker),
        slug: document.slug,
        endpoint_urls: document.endpoint_urls,
        predicate: document.predicate,
        decoding_steps: document.decoding_steps,
        contained_data_paths,
    })
}

// Global catalog with thread-safe access
lazy_static! {
    static ref CATALOG_CACHE: RwLock<AdapterCatalog> = RwLock::new(AdapterCatalog::new());
}

/// Get a read-only reference to the global catalog.
pub fn get_catalog() -> RwLockReadGuard<'static, AdapterCatalog> {
    CATALOG_CACHE.read()
}

/// Get a mutable reference to the global catalog.
pub fn get_catalog_mut() -> RwLockWriteGuard<'static, AdapterCatalog> {
    CATALOG_CACHE.write()
}

/// Parse a catalog document and append it to the global catalog.
///
/// Returns the number of adapters added. On error the global catalog is left
/// untouched.
pub fn load_catalog_json(json: &str) -> Result<usize, CatalogError> {
    let catalog = AdapterCatalog::from_json(json)?;
    let mut cache = get_catalog_mut();
    let added = cache.merge(catalog)?;

    log::info!(
        "CATALOG_LOADED added={} adapters={} trackers={}",
        added,
        cache.len(),
        cache.trackers().len()
    );

    Ok(added)
}

/// Empty the global catalog.
pub fn clear_catalog() {
    get_catalog_mut().clear();
    log::info!("CATALOG_CLEARED");
}

/// Ids of all adapters in the global catalog, in catalog order.
pub fn loaded_adapter_ids() -> Vec<String> {
    get_catalog().adapter_ids()
}
