//! Shared FAT objects (component G, SPEC_FULL.md §4.5): per-object state
//! kept alive across multiple open handles, so that two opens of the
//! same file observe one another's writes instead of racing two
//! independent in-memory copies.
//!
//! The original source refcounts objects by hand and flushes them on the
//! last release. Here, a child holds a strong [`Arc`] to the `Shared` of
//! its containing directory -- so that directory's in-memory buffer
//! survives as long as any entry inside it is open, and dropping the
//! child can write its size/cluster back into that buffer -- while the
//! per-volume [`Registry`] is what makes an already-open object
//! *findable* again from a fresh lookup, rather than a parent-held list
//! of child pointers. `Arc`'s reference count and [`Drop`] impl replace
//! the manual bookkeeping entirely.

use alloc::collections::BTreeMap;
use alloc::sync::{Arc, Weak};

use log::warn;
use spin::{Mutex, RwLock};

use crate::chain::ClusterChain;
use crate::dir::DirEngine;
use crate::error::Result;

/// Identifies one directory entry uniquely within a volume: the cluster
/// of the directory that contains it (cluster numbers are never reused
/// while the object they belong to is live) plus the entry's own byte
/// offset inside that directory's listing. The volume root is a
/// singleton outside this space -- it has no containing directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeId {
    Root,
    Entry { dir_cluster: u32, sde_offset: u64 },
}

/// The directory- or file-specific payload of a [`Shared`] object.
pub enum NodeBody {
    Dir {
        engine: DirEngine,
        /// `None` for the FAT12/16 fixed-size root, which has no cluster
        /// of its own.
        first_cluster: Option<u32>,
    },
    File {
        chain: ClusterChain,
        size: u32,
    },
}

impl NodeBody {
    pub fn is_dir(&self) -> bool {
        matches!(self, NodeBody::Dir { .. })
    }
}

/// One open FAT object -- a directory or a file -- plus enough context to
/// write its size/cluster back into its parent directory's entry when
/// the last handle to it drops.
pub struct Shared {
    pub id: NodeId,
    /// Strong: keeps the containing directory's buffer (and, transitively,
    /// its own parent chain up to the root) resident for as long as this
    /// object is open.
    pub parent: Option<Arc<RwLock<Shared>>>,
    pub sde_offset: u64,
    pub lfn_slot_count: usize,
    pub attr: u8,
    pub body: NodeBody,
    /// Set whenever size or first-cluster change since the last flush.
    pub dirty: bool,
}

impl Shared {
    pub fn new_root(engine: DirEngine, first_cluster: Option<u32>, attr: u8) -> Self {
        Self {
            id: NodeId::Root,
            parent: None,
            sde_offset: 0,
            lfn_slot_count: 0,
            attr,
            body: NodeBody::Dir { engine, first_cluster },
            dirty: false,
        }
    }

    pub fn new_dir(
        id: NodeId,
        parent: Arc<RwLock<Shared>>,
        sde_offset: u64,
        lfn_slot_count: usize,
        attr: u8,
        engine: DirEngine,
        first_cluster: u32,
    ) -> Self {
        Self {
            id,
            parent: Some(parent),
            sde_offset,
            lfn_slot_count,
            attr,
            body: NodeBody::Dir { engine, first_cluster: Some(first_cluster) },
            dirty: false,
        }
    }

    pub fn new_file(
        id: NodeId,
        parent: Arc<RwLock<Shared>>,
        sde_offset: u64,
        lfn_slot_count: usize,
        attr: u8,
        chain: ClusterChain,
        size: u32,
    ) -> Self {
        Self {
            id,
            parent: Some(parent),
            sde_offset,
            lfn_slot_count,
            attr,
            body: NodeBody::File { chain, size },
            dirty: false,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.body.is_dir()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Write this object's size/first-cluster back into its parent's
    /// directory entry, if dirty. Directories never need this: their size
    /// field is always 0 and their first cluster never changes once
    /// created.
    pub fn flush_to_parent(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let NodeBody::File { chain, size } = &self.body {
            if let Some(parent) = &self.parent {
                let mut parent = parent.write();
                if let NodeBody::Dir { engine, .. } = &mut parent.body {
                    engine.update_entry_size_cluster(
                        self.sde_offset,
                        *size,
                        chain.first_cluster().unwrap_or(0),
                    )?;
                }
            }
        }
        self.dirty = false;
        Ok(())
    }

    /// Flush this object's own on-disk buffer (directory listing, if a
    /// directory), its back-reference into its parent, and -- since
    /// `flush_to_parent` only lands the updated size/cluster in the
    /// parent's in-memory buffer -- the parent directory's listing itself,
    /// so a file's flush can never return `Ok` while its new size/cluster
    /// sits only in RAM.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_to_parent()?;
        if let Some(parent) = &self.parent {
            if let NodeBody::Dir { engine, .. } = &mut parent.write().body {
                engine.flush()?;
            }
        }
        if let NodeBody::Dir { engine, .. } = &mut self.body {
            engine.flush()?;
        }
        Ok(())
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("failed to flush {:?} on close: {:?}", self.id, e);
        }
    }
}

pub type SharedHandle = Arc<RwLock<Shared>>;

/// Per-volume registry of currently open objects, keyed by [`NodeId`], so
/// that two independent opens of the same file or directory share one
/// `Shared` instead of diverging.
pub struct Registry {
    table: Mutex<BTreeMap<NodeId, Weak<RwLock<Shared>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self { table: Mutex::new(BTreeMap::new()) }
    }

    pub fn lookup(&self, id: &NodeId) -> Option<SharedHandle> {
        self.table.lock().get(id).and_then(Weak::upgrade)
    }

    /// Insert a freshly built node, or return the existing live one if
    /// another handle raced and inserted first.
    pub fn insert_or_get(&self, node: Shared) -> SharedHandle {
        let id = node.id;
        let mut table = self.table.lock();
        if let Some(existing) = table.get(&id).and_then(Weak::upgrade) {
            return existing;
        }
        let handle = Arc::new(RwLock::new(node));
        table.insert(id, Arc::downgrade(&handle));
        handle
    }

    /// Drop the registry's own (weak) record of `id`, e.g. after the
    /// entry has been unlinked on disk.
    pub fn forget(&self, id: &NodeId) {
        self.table.lock().remove(id);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BackingStore, MemoryBackingStore};
    use crate::dirbuf::{DirBuffer, DirExtent};
    use crate::ATTR_DIRECTORY;

    fn make_engine() -> DirEngine {
        let store: Arc<dyn BackingStore> = Arc::new(MemoryBackingStore::new(1 << 16));
        let buffer = DirBuffer::new(
            store,
            DirExtent::FixedRegion { offset: 0, len: 512 },
            512,
            alloc::boxed::Box::new(|_| 0),
        )
        .unwrap();
        DirEngine::new(buffer, 512)
    }

    #[test]
    fn registry_shares_a_second_lookup() {
        let registry = Registry::new();
        let id = NodeId::Entry { dir_cluster: 5, sde_offset: 64 };
        let root_engine = make_engine();
        let root = Arc::new(RwLock::new(Shared::new_root(root_engine, None, ATTR_DIRECTORY)));

        let chain = ClusterChain::new(512);
        let node = Shared::new_file(id, root.clone(), 64, 0, 0, chain, 0);
        let handle_a = registry.insert_or_get(node);

        let looked_up = registry.lookup(&id).expect("should be findable");
        assert!(Arc::ptr_eq(&handle_a, &looked_up));
    }

    #[test]
    fn dropping_last_handle_flushes_size_into_parent() {
        let root_engine = make_engine();
        let root = Arc::new(RwLock::new(Shared::new_root(root_engine, None, ATTR_DIRECTORY)));
        {
            let mut root_w = root.write();
            if let NodeBody::Dir { engine, .. } = &mut root_w.body {
                let mut fat = crate::fat::FatCache::new(
                    Arc::new(MemoryBackingStore::new(1 << 16)),
                    crate::fat::FatType::Fat12,
                    alloc::vec![512],
                    512,
                    10,
                    512,
                    true,
                    0,
                )
                .unwrap();
                engine
                    .create_entry(&mut fat, "F.TXT", crate::ATTR_ARCHIVE, 0, 0, 0x4000, 0, 0)
                    .unwrap();
            }
        }

        let id = NodeId::Entry { dir_cluster: 0, sde_offset: 0 };
        let mut chain = ClusterChain::new(512);
        chain.append(9);
        let mut handle = Shared::new_file(id, root.clone(), 0, 0, crate::ATTR_ARCHIVE, chain, 123);
        handle.mark_dirty();
        drop(handle);

        let mut root_w = root.write();
        if let NodeBody::Dir { engine, .. } = &mut root_w.body {
            let found = engine.find_entry("F.TXT").unwrap().unwrap();
            assert_eq!(found.sde.file_size(), 123);
            assert_eq!(found.sde.first_cluster(), 9);
        }
    }
}
