use crate::error::CacheError;
use crate::host::HostDocument;
use crate::results::Dataset;
use crate::store::{KeyValueStore, StoredAudit};

/// Where a cached dataset was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    HostDocument,
    Store,
}

/// A dataset restored from an earlier session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAudit {
    pub dataset: Dataset,
    /// Last viewed page, if one was recorded
    pub page: Option<usize>,
    pub source: CacheSource,
}

/// Reads the namespace record from the store. Missing records are empty.
pub fn load_stored<S: KeyValueStore + ?Sized>(
    store: &S,
    namespace: &str,
) -> Result<StoredAudit, CacheError> {
    match store.get(namespace) {
        Some(value) => serde_json::from_value(value).map_err(|reason| CacheError::Corrupt {
            source_name: "store",
            reason,
        }),
        None => Ok(StoredAudit::default()),
    }
}

/// Looks for a previously saved dataset, first in the host document, then in
/// the store. Only parseability is checked.
pub fn read_cached<S: KeyValueStore + ?Sized>(
    host: Option<&HostDocument>,
    store: &S,
    namespace: &str,
) -> Result<Option<CachedAudit>, CacheError> {
    if let Some(table) = host.and_then(|host| host.cached_table.as_deref()) {
        let dataset: Dataset =
            serde_json::from_str(table).map_err(|reason| CacheError::Corrupt {
                source_name: "host document",
                reason,
            })?;
        ::log::info!(
            "Using audit data embedded in the host document ({} pages)",
            dataset.total_pages()
        );
        return Ok(Some(CachedAudit {
            dataset,
            page: host.and_then(|host| host.cached_page),
            source: CacheSource::HostDocument,
        }));
    }

    let stored = load_stored(store, namespace)?;
    Ok(stored.data.map(|dataset| {
        ::log::info!(
            "Using stored audit data for {} ({} pages)",
            namespace,
            dataset.total_pages()
        );
        CachedAudit {
            dataset,
            page: stored.page,
            source: CacheSource::Store,
        }
    }))
}
