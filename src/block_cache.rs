//! Process-wide block cache (ambient stack, SPEC_FULL.md §10.2).
//!
//! A fixed-size-block, LRU-bounded cache keyed by `(backing object identity,
//! block id)`, exactly as the teacher repo builds it: `lru` + `spin::RwLock`
//! + `lazy_static`. The FAT cluster-map cache (`fat.rs`) and the directory
//! buffer (`dirbuf.rs`) both sit above this for their sector-granularity
//! disk access; their own dirty-line/dirty-bitmap bookkeeping in §3.4/§3.5
//! remains the authority for flush ordering, not this cache's eviction.

use crate::device::BackingStore;
use crate::BLOCK_CACHE_LIMIT;

use alloc::sync::Arc;
use alloc::vec::Vec;
use lazy_static::lazy_static;
use lru::LruCache;
use spin::RwLock;

/// Identity of a backing object for cache-key purposes: the data pointer of
/// the `Arc<dyn BackingStore>`, which is stable for the object's lifetime.
pub type StoreId = usize;

pub fn store_id(store: &Arc<dyn BackingStore>) -> StoreId {
    Arc::as_ptr(store) as *const () as usize
}

pub struct BlockCache {
    data: Vec<u8>,
    store: Arc<dyn BackingStore>,
    block_id: u64,
    block_size: u32,
    modified: bool,
}

impl BlockCache {
    fn load(
        store: Arc<dyn BackingStore>,
        block_id: u64,
        block_size: u32,
    ) -> Result<Self, crate::device::DeviceError> {
        let mut data = alloc::vec![0u8; block_size as usize];
        store.read_at(block_id * block_size as u64, &mut data)?;
        Ok(Self {
            data,
            store,
            block_id,
            block_size,
            modified: false,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.modified = true;
        &mut self.data
    }

    pub fn sync(&mut self) -> Result<(), crate::device::DeviceError> {
        if self.modified {
            self.store
                .write_at(self.block_id * self.block_size as u64, &self.data)?;
            self.modified = false;
        }
        Ok(())
    }
}

impl Drop for BlockCache {
    fn drop(&mut self) {
        let _ = self.sync();
    }
}

type CacheKey = (StoreId, u64);

pub struct BlockCacheManager {
    lru: LruCache<CacheKey, Arc<RwLock<BlockCache>>>,
}

impl BlockCacheManager {
    pub fn new() -> Self {
        Self {
            lru: LruCache::unbounded(),
        }
    }

    pub fn get_block_cache(
        &mut self,
        store: &Arc<dyn BackingStore>,
        block_id: u64,
        block_size: u32,
    ) -> Result<Arc<RwLock<BlockCache>>, crate::device::DeviceError> {
        let key = (store_id(store), block_id);
        if let Some(hit) = self.lru.get(&key) {
            return Ok(Arc::clone(hit));
        }
        if self.lru.len() >= BLOCK_CACHE_LIMIT {
            if let Some((_, victim)) = self.lru.peek_lru() {
                if Arc::strong_count(victim) == 1 {
                    self.lru.pop_lru();
                }
            }
        }
        let cache = Arc::new(RwLock::new(BlockCache::load(
            Arc::clone(store),
            block_id,
            block_size,
        )?));
        self.lru.put(key, Arc::clone(&cache));
        Ok(cache)
    }

    pub fn clear(&mut self) {
        self.lru.clear();
    }
}

impl Default for BlockCacheManager {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    pub static ref BLOCK_CACHE_MANAGER: RwLock<BlockCacheManager> =
        RwLock::new(BlockCacheManager::new());
}

pub fn get_block_cache(
    store: &Arc<dyn BackingStore>,
    block_id: u64,
    block_size: u32,
) -> Result<Arc<RwLock<BlockCache>>, crate::device::DeviceError> {
    BLOCK_CACHE_MANAGER
        .write()
        .get_block_cache(store, block_id, block_size)
}

pub fn sync_all() {
    let mut mgr = BLOCK_CACHE_MANAGER.write();
    for (_, cache) in mgr.lru.iter() {
        let _ = cache.write().sync();
    }
    mgr.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryBackingStore;

    #[test]
    fn reads_populate_and_writes_stick() {
        let store: Arc<dyn BackingStore> = Arc::new(MemoryBackingStore::new(4096));
        let cache = get_block_cache(&store, 1, 512).unwrap();
        cache.write().data_mut()[0] = 0xAB;
        cache.write().sync().unwrap();
        let mut check = [0u8; 1];
        store.read_at(512, &mut check).unwrap();
        assert_eq!(check[0], 0xAB);
    }

    #[test]
    fn distinct_stores_do_not_alias() {
        let a: Arc<dyn BackingStore> = Arc::new(MemoryBackingStore::new(512));
        let b: Arc<dyn BackingStore> = Arc::new(MemoryBackingStore::new(512));
        assert_ne!(store_id(&a), store_id(&b));
    }
}
