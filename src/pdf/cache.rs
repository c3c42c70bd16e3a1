//! LRU cache for rendered page rasters

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::request::RenderParams;
use super::types::PageRaster;

/// Cache key for rendered pages
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Generation of the document buffer
    pub generation: u64,
    /// Page number (1-based)
    pub page: usize,
    /// Scale factor (stored as millionths for stable hashing)
    pub scale_millionths: u32,
}

impl CacheKey {
    /// Create a cache key from render parameters
    #[must_use]
    pub fn from_params(generation: u64, params: &RenderParams) -> Self {
        Self {
            generation,
            page: params.page,
            scale_millionths: (params.scale * 1_000_000.0) as u32,
        }
    }
}

/// LRU cache for rendered page data
pub struct PageCache {
    cache: LruCache<CacheKey, Arc<PageRaster>>,
}

impl PageCache {
    /// Create a new cache with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get a cached page, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<PageRaster>> {
        self.cache.get(key).cloned()
    }

    /// Check if a key is in the cache without promoting it
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert a page into the cache, returning an Arc to the data
    pub fn insert(&mut self, key: CacheKey, data: PageRaster) -> Arc<PageRaster> {
        let arc = Arc::new(data);
        self.cache.put(key, arc.clone());
        arc
    }

    /// Drop every entry rendered from a generation older than `generation`
    pub fn retain_generation(&mut self, generation: u64) {
        let stale: Vec<_> = self
            .cache
            .iter()
            .filter(|(k, _)| k.generation < generation)
            .map(|(k, _)| k.clone())
            .collect();

        for key in stale {
            self.cache.pop(&key);
        }
    }

    /// Number of cached pages
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
