//! Cluster chain (component C): the ordered list of clusters backing one
//! open file or directory.
//!
//! The original source threads each chain through a circular intrusive
//! list; here it is a flat list of fixed-size parts. 252 clusters per part
//! is not load-bearing (see Design Notes in SPEC_FULL.md) -- it only keeps
//! `append` amortized O(1) without reallocating the whole chain on growth.

use alloc::vec::Vec;

/// Clusters held in one part of the chain.
const PART_LEN: usize = 252;

#[derive(Clone)]
pub struct ClusterChain {
    parts: Vec<Vec<u32>>,
    count: usize,
    cluster_size: u32,
    cluster_shift: u32,
}

impl ClusterChain {
    pub fn new(cluster_size: u32) -> Self {
        assert!(cluster_size.is_power_of_two());
        Self {
            parts: Vec::new(),
            count: 0,
            cluster_size,
            cluster_shift: cluster_size.trailing_zeros(),
        }
    }

    pub fn from_clusters(cluster_size: u32, clusters: &[u32]) -> Self {
        let mut chain = Self::new(cluster_size);
        for &c in clusters {
            chain.append(c);
        }
        chain
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn byte_len(&self) -> u64 {
        (self.count as u64) << self.cluster_shift
    }

    pub fn cluster_size(&self) -> u32 {
        self.cluster_size
    }

    /// Append a cluster to the end of the chain. Amortized O(1): only
    /// allocates a new part every `PART_LEN` clusters.
    pub fn append(&mut self, cluster: u32) {
        if self.count % PART_LEN == 0 {
            self.parts.push(Vec::with_capacity(PART_LEN));
        }
        self.parts.last_mut().unwrap().push(cluster);
        self.count += 1;
    }

    /// Truncate the chain to `count` clusters, dropping (but not freeing in
    /// the FAT -- that's the caller's job) the tail.
    pub fn shrink_to(&mut self, count: usize) {
        if count >= self.count {
            return;
        }
        let full_parts = count / PART_LEN;
        let rem = count % PART_LEN;
        self.parts.truncate(full_parts + if rem > 0 { 1 } else { 0 });
        if rem > 0 {
            if let Some(last) = self.parts.last_mut() {
                last.truncate(rem);
            }
        }
        self.count = count;
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        if index >= self.count {
            return None;
        }
        let part = index / PART_LEN;
        let within = index % PART_LEN;
        self.parts.get(part).and_then(|p| p.get(within)).copied()
    }

    pub fn first_cluster(&self) -> Option<u32> {
        self.get(0)
    }

    pub fn last_cluster(&self) -> Option<u32> {
        if self.count == 0 {
            return None;
        }
        self.get(self.count - 1)
    }

    /// True if every cluster in the chain is numerically adjacent to its
    /// predecessor -- i.e. the chain occupies one contiguous disk extent.
    pub fn is_contiguous(&self) -> bool {
        if self.count < 2 {
            return true;
        }
        let mut prev = None;
        for part in &self.parts {
            for &c in part {
                if let Some(p) = prev {
                    if c != p + 1 {
                        return false;
                    }
                }
                prev = Some(c);
            }
        }
        true
    }

    /// Disk byte offset (relative to the volume's first-cluster-offset) for
    /// `off`, given the per-cluster disk offset function `cluster_offset`.
    /// Undefined (returns `None`) past the end of the chain.
    pub fn file_offset_to_disk(
        &self,
        off: u64,
        cluster_offset: impl Fn(u32) -> u64,
    ) -> Option<u64> {
        if off >= self.byte_len() {
            return None;
        }
        let idx = (off >> self.cluster_shift) as usize;
        let within = off & (self.cluster_size as u64 - 1);
        self.get(idx).map(|c| cluster_offset(c) + within)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.parts.iter().flatten().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_get() {
        let mut chain = ClusterChain::new(4096);
        for c in 2..10 {
            chain.append(c);
        }
        assert_eq!(chain.len(), 8);
        assert_eq!(chain.first_cluster(), Some(2));
        assert_eq!(chain.last_cluster(), Some(9));
        assert_eq!(chain.get(3), Some(5));
        assert_eq!(chain.byte_len(), 8 * 4096);
    }

    #[test]
    fn spans_multiple_parts() {
        let mut chain = ClusterChain::new(512);
        for c in 0..600 {
            chain.append(c as u32);
        }
        assert_eq!(chain.len(), 600);
        assert_eq!(chain.get(599), Some(599));
        assert_eq!(chain.get(600), None);
    }

    #[test]
    fn shrink_drops_tail() {
        let mut chain = ClusterChain::new(512);
        for c in 0..10 {
            chain.append(c);
        }
        chain.shrink_to(3);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.last_cluster(), Some(2));
    }

    #[test]
    fn contiguity_check() {
        let contiguous = ClusterChain::from_clusters(512, &[5, 6, 7, 8]);
        assert!(contiguous.is_contiguous());
        let scattered = ClusterChain::from_clusters(512, &[5, 7, 8]);
        assert!(!scattered.is_contiguous());
    }

    #[test]
    fn offset_mapping() {
        let chain = ClusterChain::from_clusters(512, &[10, 20, 30]);
        let off = |c: u32| (c as u64) * 512;
        assert_eq!(chain.file_offset_to_disk(0, off), Some(10 * 512));
        assert_eq!(chain.file_offset_to_disk(511, off), Some(10 * 512 + 511));
        assert_eq!(chain.file_offset_to_disk(512, off), Some(20 * 512));
        assert_eq!(chain.file_offset_to_disk(3 * 512, off), None);
    }
}
