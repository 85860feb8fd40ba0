//! File I/O (component H data path, SPEC_FULL.md §4.7): read, write and
//! set_size over an open file's cluster chain. These are free functions
//! rather than methods on a file type because they need no private state
//! of their own beyond the chain, size and [`FatCache`] the VFS layer
//! ([`crate::vfs`]) already holds via [`crate::shared::Shared`].

use alloc::vec::Vec;

use crate::chain::ClusterChain;
use crate::device::BackingStore;
use crate::error::{Corruption, Error, Result};
use crate::fat::FatCache;

/// FAT's absolute ceiling on one file's length: the 32-bit size field in
/// its directory entry can't express more.
pub const MAX_FILE_SIZE: u64 = u32::MAX as u64;

/// Read up to `buf.len()` bytes starting at `offset`, stopping at `size`
/// (the file's current length) even if the chain has more clusters than
/// that. Returns the number of bytes actually read.
pub fn read(
    store: &dyn BackingStore,
    cluster_offset: impl Fn(u32) -> u64 + Copy,
    chain: &ClusterChain,
    size: u32,
    offset: u64,
    buf: &mut [u8],
) -> Result<usize> {
    if offset >= size as u64 || buf.is_empty() {
        return Ok(0);
    }
    let want = core::cmp::min(buf.len() as u64, size as u64 - offset) as usize;
    let cluster_size = chain.cluster_size() as u64;
    let mut done = 0usize;
    while done < want {
        let file_off = offset + done as u64;
        let disk_off = chain
            .file_offset_to_disk(file_off, cluster_offset)
            .ok_or(Error::Corruption(Corruption::BogusOffset))?;
        let within = file_off % cluster_size;
        let take = core::cmp::min((want - done) as u64, cluster_size - within) as usize;
        store.read_at(disk_off, &mut buf[done..done + take])?;
        done += take;
    }
    Ok(done)
}

/// Write `buf` at `offset`, extending the chain (and `size`, if the write
/// reaches past the current end) as needed. Never shrinks the chain --
/// use [`set_size`] to truncate.
pub fn write(
    store: &dyn BackingStore,
    fat: &mut FatCache,
    cluster_offset: impl Fn(u32) -> u64 + Copy,
    chain: &mut ClusterChain,
    size: &mut u32,
    offset: u64,
    buf: &[u8],
) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }
    let end = offset + buf.len() as u64;
    if end > MAX_FILE_SIZE {
        return Err(Error::FileTooBig);
    }
    let cluster_size = chain.cluster_size() as u64;
    let needed_clusters = end.div_ceil(cluster_size) as usize;
    while chain.len() < needed_clusters {
        let prev = chain.last_cluster();
        let new_cluster = fat.allocate(prev)?;
        chain.append(new_cluster);
    }

    let mut done = 0usize;
    while done < buf.len() {
        let file_off = offset + done as u64;
        let disk_off = chain
            .file_offset_to_disk(file_off, cluster_offset)
            .ok_or(Error::Corruption(Corruption::BogusOffset))?;
        let within = file_off % cluster_size;
        let take = core::cmp::min((buf.len() - done) as u64, cluster_size - within) as usize;
        store.write_at(disk_off, &buf[done..done + take])?;
        done += take;
    }

    if end > *size as u64 {
        *size = end as u32;
    }
    Ok(done)
}

/// Grow or shrink the file to exactly `new_size` bytes, allocating or
/// freeing whole clusters as needed. Shrinking to 0 leaves the chain
/// empty, which the caller (`Shared::flush_to_parent`) records as first
/// cluster 0 in the directory entry.
pub fn set_size(fat: &mut FatCache, chain: &mut ClusterChain, size: &mut u32, new_size: u32) -> Result<()> {
    let cluster_size = chain.cluster_size() as u64;
    let needed_clusters = (new_size as u64).div_ceil(cluster_size) as usize;

    if needed_clusters < chain.len() {
        let freed: Vec<u32> = (needed_clusters..chain.len()).filter_map(|i| chain.get(i)).collect();
        fat.free_clusters(freed)?;
        if needed_clusters > 0 {
            if let Some(last) = chain.get(needed_clusters - 1) {
                fat.set_cluster(last, fat.fat_type().eoc_marker())?;
            }
        }
        chain.shrink_to(needed_clusters);
    } else if needed_clusters > chain.len() {
        while chain.len() < needed_clusters {
            let prev = chain.last_cluster();
            let new_cluster = fat.allocate(prev)?;
            chain.append(new_cluster);
        }
    }
    *size = new_size;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryBackingStore;
    use crate::fat::FatType;
    use alloc::sync::Arc;

    fn setup() -> (Arc<dyn BackingStore>, FatCache) {
        let store: Arc<dyn BackingStore> = Arc::new(MemoryBackingStore::new(1 << 20));
        let fat = FatCache::new(store.clone(), FatType::Fat12, alloc::vec![512], 512, 100, 512, true, 0).unwrap();
        (store, fat)
    }

    fn offset_fn() -> impl Fn(u32) -> u64 + Copy {
        |c: u32| 4096 + (c as u64) * 512
    }

    #[test]
    fn write_then_read_round_trips() {
        let (store, mut fat) = setup();
        let mut chain = ClusterChain::new(512);
        let mut size = 0u32;
        let payload = alloc::vec![0xABu8; 700];
        let written = write(&*store, &mut fat, offset_fn(), &mut chain, &mut size, 0, &payload).unwrap();
        assert_eq!(written, 700);
        assert_eq!(size, 700);
        assert_eq!(chain.len(), 2);

        let mut out = alloc::vec![0u8; 700];
        let read_n = read(&*store, offset_fn(), &chain, size, 0, &mut out).unwrap();
        assert_eq!(read_n, 700);
        assert_eq!(out, payload);
    }

    #[test]
    fn read_past_size_is_clamped() {
        let (store, mut fat) = setup();
        let mut chain = ClusterChain::new(512);
        let mut size = 0u32;
        write(&*store, &mut fat, offset_fn(), &mut chain, &mut size, 0, &[1, 2, 3, 4]).unwrap();
        let mut out = alloc::vec![0u8; 100];
        let n = read(&*store, offset_fn(), &chain, size, 0, &mut out).unwrap();
        assert_eq!(n, 4);
    }

    #[test]
    fn set_size_zero_frees_every_cluster() {
        let (store, mut fat) = setup();
        let mut chain = ClusterChain::new(512);
        let mut size = 0u32;
        write(&*store, &mut fat, offset_fn(), &mut chain, &mut size, 0, &alloc::vec![0u8; 1500]).unwrap();
        assert!(chain.len() > 0);
        set_size(&mut fat, &mut chain, &mut size, 0).unwrap();
        assert_eq!(chain.len(), 0);
        assert_eq!(size, 0);
    }

    #[test]
    fn set_size_grow_allocates_new_clusters() {
        let (_store, mut fat) = setup();
        let mut chain = ClusterChain::new(512);
        let mut size = 0u32;
        set_size(&mut fat, &mut chain, &mut size, 2000).unwrap();
        assert_eq!(size, 2000);
        assert_eq!(chain.len(), 4);
    }
}
