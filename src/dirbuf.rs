//! Directory buffering (component E, SPEC_FULL.md §3.5/§4.4).
//!
//! A directory's bytes either come from a cluster chain (every directory
//! except the FAT12/16 root) or from the fixed linear root region. Either
//! way the content is read and written through one of two strategies:
//!
//! - "full": the whole directory is buffered in RAM with a per-sector dirty
//!   bitmap. Requires the backing extent be contiguous on disk and no
//!   larger than 64 KiB. The FAT12/16 root is always contiguous by
//!   construction and always uses this mode -- it has no cluster chain to
//!   fall back to a sliding window over.
//! - "simple": a single sliding one-sector window. Used for cluster-chain
//!   directories that are too large or too fragmented for full buffering.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::chain::ClusterChain;
use crate::device::BackingStore;
use crate::error::{Error, Result};

const FULL_MODE_LIMIT: u64 = 64 * 1024;

/// Where a directory's bytes live on disk.
pub enum DirExtent {
    Chain(ClusterChain),
    FixedRegion { offset: u64, len: u64 },
}

impl DirExtent {
    fn byte_len(&self) -> u64 {
        match self {
            DirExtent::Chain(c) => c.byte_len(),
            DirExtent::FixedRegion { len, .. } => *len,
        }
    }

    fn is_contiguous(&self) -> bool {
        match self {
            DirExtent::Chain(c) => c.is_contiguous(),
            DirExtent::FixedRegion { .. } => true,
        }
    }

    fn disk_offset(
        &self,
        file_offset: u64,
        cluster_offset: &dyn Fn(u32) -> u64,
    ) -> Option<u64> {
        match self {
            DirExtent::Chain(c) => c.file_offset_to_disk(file_offset, cluster_offset),
            DirExtent::FixedRegion { offset, len } => {
                if file_offset >= *len {
                    None
                } else {
                    Some(offset + file_offset)
                }
            }
        }
    }

    fn base_disk_offset(&self, cluster_offset: &dyn Fn(u32) -> u64) -> Option<u64> {
        match self {
            DirExtent::Chain(c) => c.first_cluster().map(|cl| cluster_offset(cl)),
            DirExtent::FixedRegion { offset, .. } => Some(*offset),
        }
    }
}

enum Mode {
    Full {
        data: Vec<u8>,
        dirty: Vec<bool>,
        base_offset: u64,
    },
    Simple {
        window_index: Option<u64>,
        data: Vec<u8>,
        dirty: bool,
    },
}

/// Buffers one directory's on-disk bytes, choosing full or simple mode
/// based on the extent's size and contiguity.
pub struct DirBuffer {
    store: Arc<dyn BackingStore>,
    extent: DirExtent,
    sector_size: u32,
    cluster_offset: Box<dyn Fn(u32) -> u64 + Send + Sync>,
    mode: Mode,
}

impl DirBuffer {
    pub fn new(
        store: Arc<dyn BackingStore>,
        extent: DirExtent,
        sector_size: u32,
        cluster_offset: Box<dyn Fn(u32) -> u64 + Send + Sync>,
    ) -> Result<Self> {
        let full_eligible = extent.byte_len() <= FULL_MODE_LIMIT && extent.is_contiguous();
        let is_fixed_region = matches!(extent, DirExtent::FixedRegion { .. });

        let mode = if full_eligible || is_fixed_region {
            match Self::load_full(&store, &extent, sector_size, &*cluster_offset) {
                Ok(m) => m,
                Err(e) if is_fixed_region => return Err(e),
                Err(_) => Self::simple_mode(),
            }
        } else {
            Self::simple_mode()
        };

        Ok(Self {
            store,
            extent,
            sector_size,
            cluster_offset,
            mode,
        })
    }

    fn simple_mode() -> Mode {
        Mode::Simple {
            window_index: None,
            data: Vec::new(),
            dirty: false,
        }
    }

    fn load_full(
        store: &Arc<dyn BackingStore>,
        extent: &DirExtent,
        sector_size: u32,
        cluster_offset: &dyn Fn(u32) -> u64,
    ) -> Result<Mode> {
        let base_offset = extent
            .base_disk_offset(cluster_offset)
            .ok_or(Error::Corruption(crate::error::Corruption::BogusOffset))?;
        let len = extent.byte_len() as usize;
        let mut data = alloc::vec![0u8; len];
        if len > 0 {
            store.read_at(base_offset, &mut data)?;
        }
        let sector_count = (len as u64).div_ceil(sector_size as u64) as usize;
        Ok(Mode::Full {
            data,
            dirty: alloc::vec![false; sector_count],
            base_offset,
        })
    }

    pub fn len(&self) -> u64 {
        self.extent.byte_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn window_for(&self, offset: u64) -> u64 {
        offset / self.sector_size as u64
    }

    fn ensure_window(&mut self, index: u64) -> Result<()> {
        if let Mode::Simple {
            window_index,
            data,
            dirty,
        } = &mut self.mode
        {
            if *window_index == Some(index) {
                return Ok(());
            }
            if *dirty {
                if let Some(prev) = *window_index {
                    let disk_off = self
                        .extent
                        .disk_offset(prev * self.sector_size as u64, &*self.cluster_offset)
                        .ok_or(Error::Corruption(crate::error::Corruption::BogusOffset))?;
                    self.store.write_at(disk_off, data)?;
                }
                *dirty = false;
            }
            let disk_off = self
                .extent
                .disk_offset(index * self.sector_size as u64, &*self.cluster_offset)
                .ok_or(Error::Corruption(crate::error::Corruption::BogusOffset))?;
            let mut buf = alloc::vec![0u8; self.sector_size as usize];
            self.store.read_at(disk_off, &mut buf)?;
            *data = buf;
            *window_index = Some(index);
        }
        Ok(())
    }

    /// Read `len` bytes starting at `offset` (relative to the directory).
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        match &self.mode {
            Mode::Full { data, .. } => {
                let start = offset as usize;
                let end = start + len;
                if end > data.len() {
                    return Err(Error::Corruption(crate::error::Corruption::LengthMismatch));
                }
                Ok(data[start..end].to_vec())
            }
            Mode::Simple { .. } => {
                let mut out = Vec::with_capacity(len);
                let mut remaining = len;
                let mut off = offset;
                while remaining > 0 {
                    let idx = self.window_for(off);
                    self.ensure_window(idx)?;
                    let within = (off % self.sector_size as u64) as usize;
                    let take = core::cmp::min(remaining, self.sector_size as usize - within);
                    if let Mode::Simple { data, .. } = &self.mode {
                        out.extend_from_slice(&data[within..within + take]);
                    }
                    off += take as u64;
                    remaining -= take;
                }
                Ok(out)
            }
        }
    }

    /// Write `bytes` at `offset` (relative to the directory).
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        match &mut self.mode {
            Mode::Full {
                data,
                dirty,
                ..
            } => {
                let start = offset as usize;
                let end = start + bytes.len();
                if end > data.len() {
                    return Err(Error::Corruption(crate::error::Corruption::LengthMismatch));
                }
                data[start..end].copy_from_slice(bytes);
                let sector_size = self.sector_size as usize;
                let first = start / sector_size;
                let last = (end - 1) / sector_size;
                for s in first..=last {
                    if let Some(flag) = dirty.get_mut(s) {
                        *flag = true;
                    }
                }
                Ok(())
            }
            Mode::Simple { .. } => {
                let mut written = 0;
                while written < bytes.len() {
                    let off = offset + written as u64;
                    let idx = self.window_for(off);
                    self.ensure_window(idx)?;
                    let within = (off % self.sector_size as u64) as usize;
                    let take = core::cmp::min(bytes.len() - written, self.sector_size as usize - within);
                    if let Mode::Simple { data, dirty, .. } = &mut self.mode {
                        data[within..within + take].copy_from_slice(&bytes[written..written + take]);
                        *dirty = true;
                    }
                    written += take;
                }
                Ok(())
            }
        }
    }

    /// Grow a full-mode buffer after the caller has extended the
    /// underlying chain by one cluster (or the root region, which never
    /// grows). No-op in simple mode, where reads/writes address the extent
    /// directly.
    pub fn grow_full_by(&mut self, additional_bytes: usize) {
        if let Mode::Full { data, dirty, .. } = &mut self.mode {
            data.extend(core::iter::repeat(0u8).take(additional_bytes));
            let sector_count = (data.len() as u64).div_ceil(self.sector_size as u64) as usize;
            dirty.resize(sector_count, false);
        }
    }

    pub fn set_extent(&mut self, extent: DirExtent) {
        self.extent = extent;
    }

    /// True if this buffer backs the FAT12/16 fixed-size root region, which
    /// has no cluster chain to extend (SPEC_FULL.md §4.6.6).
    pub fn is_fixed_region(&self) -> bool {
        matches!(self.extent, DirExtent::FixedRegion { .. })
    }

    /// Disk byte offset of `cluster`, widened to `u64` through the stored
    /// cluster-offset function. Used by the directory engine to zero-fill
    /// a freshly allocated directory cluster before linking it in.
    pub fn cluster_disk_offset(&self, cluster: u32) -> u64 {
        (self.cluster_offset)(cluster)
    }

    /// The chain's last cluster, or `None` for the fixed root region or an
    /// as-yet-empty chain.
    pub fn last_cluster(&self) -> Option<u32> {
        match &self.extent {
            DirExtent::Chain(c) => c.last_cluster(),
            DirExtent::FixedRegion { .. } => None,
        }
    }

    /// Zero-fill a freshly allocated cluster directly on disk, ahead of
    /// linking it into the chain with [`DirBuffer::append_cluster`].
    pub fn zero_fill_cluster(&self, cluster: u32, cluster_size: u32) -> Result<()> {
        let offset = (self.cluster_offset)(cluster);
        let zeros = alloc::vec![0u8; cluster_size as usize];
        self.store.write_at(offset, &zeros)
    }

    /// Append one cluster to the chain backing this directory and grow the
    /// in-memory image to match (no-op for simple mode, which reads
    /// whatever window it needs directly from disk). Returns an error for
    /// the fixed-size root region, which cannot grow.
    pub fn append_cluster(&mut self, cluster: u32) -> Result<()> {
        match &mut self.extent {
            DirExtent::Chain(chain) => {
                chain.append(cluster);
                let cluster_size = chain.cluster_size() as usize;
                self.grow_full_by(cluster_size);
                Ok(())
            }
            DirExtent::FixedRegion { .. } => Err(Error::NotSupported),
        }
    }

    /// Write every dirty sector back to disk.
    pub fn flush(&mut self) -> Result<()> {
        match &mut self.mode {
            Mode::Full {
                data,
                dirty,
                base_offset,
            } => {
                let sector_size = self.sector_size as usize;
                let mut i = 0;
                while i < dirty.len() {
                    if !dirty[i] {
                        i += 1;
                        continue;
                    }
                    let run_start = i;
                    while i < dirty.len() && dirty[i] {
                        i += 1;
                    }
                    let byte_start = run_start * sector_size;
                    let byte_end = core::cmp::min(i * sector_size, data.len());
                    self.store
                        .write_at(*base_offset + byte_start as u64, &data[byte_start..byte_end])?;
                }
                for d in dirty.iter_mut() {
                    *d = false;
                }
                Ok(())
            }
            Mode::Simple {
                window_index,
                data,
                dirty,
            } => {
                if *dirty {
                    if let Some(idx) = *window_index {
                        let disk_off = self
                            .extent
                            .disk_offset(idx * self.sector_size as u64, &*self.cluster_offset)
                            .ok_or(Error::Corruption(crate::error::Corruption::BogusOffset))?;
                        self.store.write_at(disk_off, data)?;
                    }
                    *dirty = false;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryBackingStore;

    fn fixed_region_buffer() -> DirBuffer {
        let store: Arc<dyn BackingStore> = Arc::new(MemoryBackingStore::new(8192));
        DirBuffer::new(
            store,
            DirExtent::FixedRegion { offset: 1024, len: 512 },
            512,
            Box::new(|_| 0),
        )
        .unwrap()
    }

    #[test]
    fn full_mode_round_trip_and_flush() {
        let mut buf = fixed_region_buffer();
        buf.write_at(0, &[1, 2, 3, 4]).unwrap();
        assert_eq!(buf.read_at(0, 4).unwrap(), alloc::vec![1, 2, 3, 4]);
        buf.flush().unwrap();
        assert!(matches!(buf.mode, Mode::Full { .. }));
    }

    #[test]
    fn simple_mode_for_large_fragmented_chain() {
        let store: Arc<dyn BackingStore> = Arc::new(MemoryBackingStore::new(1 << 20));
        let scattered: Vec<u32> = (0..200).map(|i| i * 2).collect();
        let chain = ClusterChain::from_clusters(512, &scattered);
        let mut buf = DirBuffer::new(
            store,
            DirExtent::Chain(chain),
            512,
            Box::new(|c| c as u64 * 512),
        )
        .unwrap();
        assert!(matches!(buf.mode, Mode::Simple { .. }));
        buf.write_at(0, b"hello").unwrap();
        assert_eq!(&buf.read_at(0, 5).unwrap(), b"hello");
        buf.write_at(600, b"world").unwrap();
        assert_eq!(&buf.read_at(600, 5).unwrap(), b"world");
    }
}
