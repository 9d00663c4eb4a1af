/// Process-wide cache of parsed forecast tables
///
/// The source workbook does not change during a session, so each distinct
/// (file, sheet, layout) is parsed once. Entries are keyed by the canonical path
/// plus the parse settings and carry a fingerprint of the file's modification time
/// and length; a changed fingerprint triggers a reload on the next request.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::SystemTime;
use tracing::{debug, info, instrument};

use crate::forecast::{EmptyAuthorityPolicy, ForecastTable};
use crate::importers::{ForecastLoadError, WorkbookLoader};

static GLOBAL_CACHE: OnceLock<Arc<ForecastCache>> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: PathBuf,
    sheet_name: String,
    block_width: usize,
    empty_authority: EmptyAuthorityPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SourceFingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

#[derive(Debug)]
struct CacheEntry {
    fingerprint: SourceFingerprint,
    table: Arc<ForecastTable>,
}

#[derive(Debug, Default)]
pub struct ForecastCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl ForecastCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every service in this process
    pub fn global() -> Arc<ForecastCache> {
        GLOBAL_CACHE
            .get_or_init(|| Arc::new(ForecastCache::new()))
            .clone()
    }

    /// Return the cached table for `loader`'s source, parsing it if absent or stale
    ///
    /// The lock is held across the parse so concurrent first requests parse once.
    /// Failed loads are not cached.
    #[instrument(skip(self, loader), fields(path = %loader.workbook_path().display()))]
    pub fn get_or_load(
        &self,
        loader: &WorkbookLoader,
    ) -> Result<Arc<ForecastTable>, ForecastLoadError> {
        let (key, fingerprint) = source_identity(loader)?;
        let mut entries = self.lock();

        if let Some(entry) = entries.get(&key) {
            if entry.fingerprint == fingerprint {
                debug!("Cache hit for {}", key.path.display());
                return Ok(Arc::clone(&entry.table));
            }
            info!("Source {} changed on disk, reloading", key.path.display());
        }

        let table = Arc::new(loader.load()?);
        entries.insert(
            key,
            CacheEntry {
                fingerprint,
                table: Arc::clone(&table),
            },
        );

        Ok(table)
    }

    /// Drop every entry for `path`, returning how many were removed
    pub fn invalidate(&self, path: &Path) -> usize {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| key.path != path);

        let removed = before - entries.len();
        debug!("Invalidated {} cache entries for {}", removed, path.display());
        removed
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        // Entries are replaced whole, so a poisoned map is still consistent
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn source_identity(
    loader: &WorkbookLoader,
) -> Result<(CacheKey, SourceFingerprint), ForecastLoadError> {
    let source_error = |source| ForecastLoadError::Source {
        path: loader.workbook_path().display().to_string(),
        source,
    };

    let path = fs::canonicalize(loader.workbook_path()).map_err(source_error)?;
    let metadata = fs::metadata(&path).map_err(source_error)?;

    let key = CacheKey {
        path,
        sheet_name: loader.sheet_name().to_string(),
        block_width: loader.parser().block_width(),
        empty_authority: loader.parser().empty_authority_policy(),
    };
    let fingerprint = SourceFingerprint {
        modified: metadata.modified().ok(),
        len: metadata.len(),
    };

    Ok((key, fingerprint))
}
