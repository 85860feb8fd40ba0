//! Volume lifecycle (component I, SPEC_FULL.md §4.2/§10.6): parse the boot
//! sector, build the FAT cache and root directory, and track the clean/dirty
//! shutdown bit and (on FAT32) the FSInfo free-cluster hint across mount.

use alloc::boxed::Box;
use alloc::sync::Arc;

use spin::RwLock;

use crate::bpb::{BiosParameterBlock, FsInfo};
use crate::chain::ClusterChain;
use crate::config::{MountOptions, TimeProvider};
use crate::dir::{DirEngine, FoundEntry};
use crate::dirbuf::{DirBuffer, DirExtent};
use crate::device::BackingStore;
use crate::error::{Corruption, Error, Result};
use crate::fat::{FatCache, FatType};
use crate::shared::{NodeBody, NodeId, Registry, Shared, SharedHandle};
use crate::{
    CLN_SHUT_BIT_MASK_FAT16, CLN_SHUT_BIT_MASK_FAT32, HRD_ERR_BIT_MASK_FAT16,
    HRD_ERR_BIT_MASK_FAT32,
};

/// A mounted FAT volume: parsed geometry, the FAT cache, and every currently
/// open object, reachable from the root through [`Volume::lookup`].
pub struct Volume {
    store: Arc<dyn BackingStore>,
    bpb: BiosParameterBlock,
    fsinfo: RwLock<Option<FsInfo>>,
    fsinfo_sector: Option<u16>,
    fat: RwLock<FatCache>,
    registry: Registry,
    root: SharedHandle,
    read_only: bool,
    time_provider: Arc<dyn TimeProvider>,
}

impl Volume {
    /// Parse the boot sector, load (or validate the absence of) FSInfo,
    /// build the FAT cache, and open the root directory. On a writable
    /// mount the volume's dirty bit is set immediately, so a crash between
    /// here and [`Volume::unmount`] is visible on the next mount.
    pub fn mount(store: Arc<dyn BackingStore>, options: MountOptions) -> Result<Self> {
        let bpb = BiosParameterBlock::read_from(&*store, 512)?;
        let sector_size = bpb.bytes_per_sector();
        let cluster_size = bpb.cluster_size();

        let mut fat = FatCache::new(
            store.clone(),
            bpb.fat_type(),
            bpb.fat_offsets(),
            bpb.fat_size_bytes(),
            bpb.data_cluster_cnt(),
            sector_size,
            !bpb.fat_mirroring_disabled(),
            bpb.active_fat_index(),
        )?;

        let dirty = read_dirty_flag(&mut fat)?;
        if dirty && options.require_clean {
            return Err(Error::Corruption(Corruption::InvalidSignature));
        }
        let time_provider = options.time_provider.clone();

        let fsinfo_sector = bpb.fsinfo_sector();
        let fsinfo = match fsinfo_sector {
            Some(sector) => {
                let mut buf = alloc::vec![0u8; sector_size as usize];
                store.read_at(sector as u64 * sector_size as u64, &mut buf)?;
                FsInfo::parse(&buf).ok()
            }
            None => None,
        };

        let root_extent = match bpb.root_cluster() {
            Some(first) => {
                let mut chain = ClusterChain::new(cluster_size);
                fat.read_chain(first, &mut chain)?;
                DirExtent::Chain(chain)
            }
            None => DirExtent::FixedRegion {
                offset: bpb.root_dir_offset(),
                len: bpb.root_dir_sector_cnt() * sector_size as u64,
            },
        };
        let root_buffer = DirBuffer::new(store.clone(), root_extent, sector_size, cluster_offset_fn(bpb))?;
        let root_engine = DirEngine::new(root_buffer, cluster_size);
        let root = Arc::new(RwLock::new(Shared::new_root(
            root_engine,
            bpb.root_cluster(),
            crate::ATTR_DIRECTORY,
        )));

        if !options.read_only && !dirty {
            write_dirty_flag(&mut fat, true)?;
        }

        Ok(Self {
            store,
            bpb,
            fsinfo: RwLock::new(fsinfo),
            fsinfo_sector,
            fat: RwLock::new(fat),
            registry: Registry::new(),
            root,
            read_only: options.read_only,
            time_provider,
        })
    }

    pub fn root(&self) -> SharedHandle {
        self.root.clone()
    }

    /// The current time per this volume's configured [`TimeProvider`],
    /// already packed into the `(date, time, tenths)` triple
    /// [`Volume::create_child`] and the directory entry timestamp setters
    /// expect.
    pub fn now(&self) -> (u16, u16, u8) {
        self.time_provider.now().encode()
    }

    pub fn bpb(&self) -> &BiosParameterBlock {
        &self.bpb
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn cluster_size(&self) -> u32 {
        self.bpb.cluster_size()
    }

    pub fn sector_size(&self) -> u32 {
        self.bpb.bytes_per_sector()
    }

    /// Volume-label, serial number and FAT-width type string, as recorded
    /// in the boot sector at format time.
    pub fn volume_label(&self) -> [u8; 11] {
        self.bpb.volume_label()
    }

    pub fn serial_number(&self) -> u32 {
        self.bpb.serial_number()
    }

    pub fn fs_type(&self) -> [u8; 8] {
        self.bpb.fs_type_string()
    }

    pub fn total_size(&self) -> Result<u64> {
        self.store.query_size().map_err(Into::into)
    }

    pub fn store(&self) -> &Arc<dyn BackingStore> {
        &self.store
    }

    fn cluster_offset_fn(&self) -> Box<dyn Fn(u32) -> u64 + Send + Sync> {
        cluster_offset_fn(self.bpb)
    }

    /// Look up `name` inside `parent`. Shares an already-open [`Shared`]
    /// through the registry rather than building a second one over the same
    /// directory entry.
    pub fn lookup(&self, parent: &SharedHandle, name: &str) -> Result<Option<SharedHandle>> {
        let (found, dir_cluster) = {
            let mut parent_w = parent.write();
            match &mut parent_w.body {
                NodeBody::Dir { engine, first_cluster } => {
                    (engine.find_entry(name)?, first_cluster.unwrap_or(0))
                }
                NodeBody::File { .. } => return Err(Error::NotADirectory),
            }
        };
        let Some(found) = found else { return Ok(None) };

        let id = NodeId::Entry { dir_cluster, sde_offset: found.sde_offset };
        if let Some(existing) = self.registry.lookup(&id) {
            return Ok(Some(existing));
        }
        let node = self.build_node(id, parent.clone(), &found)?;
        Ok(Some(self.registry.insert_or_get(node)))
    }

    fn build_node(&self, id: NodeId, parent: SharedHandle, found: &FoundEntry) -> Result<Shared> {
        let sde = found.sde;
        if sde.is_dir() {
            let extent = if sde.first_cluster() == 0 {
                return Err(Error::Corruption(Corruption::BogusCluster));
            } else {
                let mut chain = ClusterChain::new(self.cluster_size());
                self.fat.write().read_chain(sde.first_cluster(), &mut chain)?;
                DirExtent::Chain(chain)
            };
            let buffer = DirBuffer::new(self.store.clone(), extent, self.sector_size(), self.cluster_offset_fn())?;
            let engine = DirEngine::new(buffer, self.cluster_size());
            Ok(Shared::new_dir(
                id,
                parent,
                found.sde_offset,
                found.lfn_slot_count,
                sde.attr,
                engine,
                sde.first_cluster(),
            ))
        } else {
            let mut chain = ClusterChain::new(self.cluster_size());
            if sde.first_cluster() != 0 {
                self.fat.write().read_chain(sde.first_cluster(), &mut chain)?;
            }
            Ok(Shared::new_file(
                id,
                parent,
                found.sde_offset,
                found.lfn_slot_count,
                sde.attr,
                chain,
                sde.file_size(),
            ))
        }
    }

    /// Create a new file or (empty) directory entry named `name` inside
    /// `parent`. A new directory's own first cluster is allocated and
    /// zero-filled here and seeded with `.`/`..`; a new file starts with no
    /// cluster at all (`first_cluster` 0, `size` 0) -- [`crate::file::write`]
    /// grows it on first write.
    pub fn create_child(
        &self,
        parent: &SharedHandle,
        name: &str,
        is_dir: bool,
        timestamp: (u16, u16, u8),
    ) -> Result<SharedHandle> {
        if self.read_only {
            return Err(Error::WriteProtect);
        }
        if self.lookup(parent, name)?.is_some() {
            return Err(Error::AlreadyExists);
        }

        let attr = if is_dir { crate::ATTR_DIRECTORY } else { crate::ATTR_ARCHIVE };
        let new_first_cluster = if is_dir {
            let cluster = self.fat.write().allocate(None)?;
            self.seed_new_directory(cluster, parent, timestamp)?;
            cluster
        } else {
            0
        };

        let (sde_offset, lfn_slot_count, dir_cluster) = {
            let mut parent_w = parent.write();
            let mut fat = self.fat.write();
            match &mut parent_w.body {
                NodeBody::Dir { engine, first_cluster } => {
                    let dir_cluster = first_cluster.unwrap_or(0);
                    let (offset, slots, _sde) = engine.create_entry(
                        &mut fat,
                        name,
                        attr,
                        new_first_cluster,
                        0,
                        timestamp.0,
                        timestamp.1,
                        timestamp.2,
                    )?;
                    (offset, slots, dir_cluster)
                }
                NodeBody::File { .. } => return Err(Error::NotADirectory),
            }
        };

        let id = NodeId::Entry { dir_cluster, sde_offset };
        let node = if is_dir {
            let mut chain = ClusterChain::new(self.cluster_size());
            chain.append(new_first_cluster);
            let buffer = DirBuffer::new(
                self.store.clone(),
                DirExtent::Chain(chain),
                self.sector_size(),
                self.cluster_offset_fn(),
            )?;
            let engine = DirEngine::new(buffer, self.cluster_size());
            Shared::new_dir(id, parent.clone(), sde_offset, lfn_slot_count, attr, engine, new_first_cluster)
        } else {
            Shared::new_file(
                id,
                parent.clone(),
                sde_offset,
                lfn_slot_count,
                attr,
                ClusterChain::new(self.cluster_size()),
                0,
            )
        };
        Ok(self.registry.insert_or_get(node))
    }

    /// Zero-fill a freshly allocated directory cluster and write its `.`
    /// and `..` entries. `.` points at the new directory itself; `..` points
    /// at `parent`'s first cluster, or 0 if `parent` is the FAT12/16 root.
    fn seed_new_directory(&self, cluster: u32, parent: &SharedHandle, timestamp: (u16, u16, u8)) -> Result<()> {
        let offset = self.bpb.cluster_offset(cluster);
        let zeros = alloc::vec![0u8; self.cluster_size() as usize];
        self.store.write_at(offset, &zeros)?;

        let parent_first_cluster = match &parent.read().body {
            NodeBody::Dir { first_cluster, .. } => first_cluster.unwrap_or(0),
            NodeBody::File { .. } => return Err(Error::NotADirectory),
        };

        let mut dot = crate::entry::ShortDirEntry::new(*b".          ", crate::ATTR_DIRECTORY, cluster);
        dot.set_create_datetime(timestamp.0, timestamp.1, timestamp.2);
        dot.set_write_datetime(timestamp.0, timestamp.1);
        dot.set_last_access_date(timestamp.0);
        let mut dotdot =
            crate::entry::ShortDirEntry::new(*b"..         ", crate::ATTR_DIRECTORY, parent_first_cluster);
        dotdot.set_create_datetime(timestamp.0, timestamp.1, timestamp.2);
        dotdot.set_write_datetime(timestamp.0, timestamp.1);
        dotdot.set_last_access_date(timestamp.0);

        let mut buf = [0u8; crate::DIRENT_SIZE * 2];
        buf[..crate::DIRENT_SIZE].copy_from_slice(&dot.to_bytes());
        buf[crate::DIRENT_SIZE..].copy_from_slice(&dotdot.to_bytes());
        self.store.write_at(offset, &buf)
    }

    /// Unlink `name` from `parent`. The original entry's slots are marked
    /// deleted; an already-open handle to the removed object keeps working
    /// until dropped (its [`Shared::flush_to_parent`] will then fail to find
    /// a live parent entry and is simply not attempted, since directories
    /// retain no dangling children list -- see `shared.rs`).
    pub fn unlink_child(&self, parent: &SharedHandle, name: &str) -> Result<()> {
        if self.read_only {
            return Err(Error::WriteProtect);
        }
        let mut parent_w = parent.write();
        let (found, dir_cluster) = match &mut parent_w.body {
            NodeBody::Dir { engine, first_cluster } => {
                let found = engine.find_entry(name)?.ok_or(Error::NotFound)?;
                if found.sde.is_dir() {
                    return Err(Error::IsADirectory);
                }
                engine.delete_entry(found.sde_offset, found.lfn_slot_count)?;
                (found, first_cluster.unwrap_or(0))
            }
            NodeBody::File { .. } => return Err(Error::NotADirectory),
        };
        if found.sde.first_cluster() != 0 {
            let mut chain = ClusterChain::new(self.cluster_size());
            let mut fat = self.fat.write();
            fat.read_chain(found.sde.first_cluster(), &mut chain)?;
            fat.free_clusters(chain.iter())?;
        }
        self.registry.forget(&NodeId::Entry { dir_cluster, sde_offset: found.sde_offset });
        Ok(())
    }

    pub fn fat(&self) -> &RwLock<FatCache> {
        &self.fat
    }

    /// Flush every dirty structure: the root directory's buffer, the FAT
    /// cache, and (on FAT32) the FSInfo sector.
    pub fn flush_all(&self) -> Result<()> {
        self.root.write().flush()?;
        let mut fat = self.fat.write();
        fat.flush()?;
        self.refresh_fsinfo(&mut fat)?;
        if let (Some(sector), Some(info)) = (self.fsinfo_sector, self.fsinfo.read().as_ref()) {
            let bytes = info.to_sector();
            self.store.write_at(sector as u64 * self.sector_size() as u64, &bytes)?;
        }
        Ok(())
    }

    /// Flush everything, clear the dirty bit (unless read-only) and flush
    /// the backing store itself.
    pub fn unmount(&self) -> Result<()> {
        self.flush_all()?;
        if !self.read_only {
            write_dirty_flag(&mut self.fat.write(), false)?;
        }
        self.store.flush().map_err(Into::into)
    }

    /// Recompute the free-cluster count and next-free hint straight from the
    /// FAT cache and write them into the in-memory FSInfo image, so the
    /// value persisted by [`Volume::flush_all`] always reflects every
    /// allocation and free since mount rather than the count read at mount
    /// time. No-op on FAT12/16, which have no FSInfo sector.
    fn refresh_fsinfo(&self, fat: &mut FatCache) -> Result<()> {
        if self.fsinfo_sector.is_none() {
            return Ok(());
        }
        let mut guard = self.fsinfo.write();
        if let Some(info) = guard.as_mut() {
            if info.free_cluster_cnt().is_some() {
                let free = fat.count_free_clusters()?;
                info.set_free_clusters(free);
            }
            if info.next_free_cluster().is_some() {
                info.set_next_free_cluster(fat.search_hint());
            }
        }
        Ok(())
    }
}

fn cluster_offset_fn(bpb: BiosParameterBlock) -> Box<dyn Fn(u32) -> u64 + Send + Sync> {
    Box::new(move |c: u32| bpb.cluster_offset(c))
}

/// Read the clean-shutdown bit out of FAT[1]. FAT12 has no such bit (the
/// Microsoft spec only defines it for FAT16/32), so it always reports clean.
fn read_dirty_flag(fat: &mut FatCache) -> Result<bool> {
    match fat.fat_type() {
        FatType::Fat32 => Ok(fat.get_cluster(1)? & CLN_SHUT_BIT_MASK_FAT32 == 0),
        FatType::Fat16 => Ok(fat.get_cluster(1)? as u16 & CLN_SHUT_BIT_MASK_FAT16 == 0),
        FatType::Fat12 => Ok(false),
    }
}

fn write_dirty_flag(fat: &mut FatCache, dirty: bool) -> Result<()> {
    match fat.fat_type() {
        FatType::Fat32 => {
            let mut entry = fat.get_cluster(1)?;
            if dirty {
                entry &= !CLN_SHUT_BIT_MASK_FAT32;
            } else {
                entry |= CLN_SHUT_BIT_MASK_FAT32;
            }
            fat.set_cluster(1, entry)?;
            fat.flush()
        }
        FatType::Fat16 => {
            let mut entry = fat.get_cluster(1)? as u16;
            if dirty {
                entry &= !CLN_SHUT_BIT_MASK_FAT16;
            } else {
                entry |= CLN_SHUT_BIT_MASK_FAT16;
            }
            fat.set_cluster(1, entry as u32)?;
            fat.flush()
        }
        FatType::Fat12 => Ok(()),
    }
}

#[allow(dead_code)]
fn unused_hard_error_masks() -> (u32, u16) {
    (HRD_ERR_BIT_MASK_FAT32, HRD_ERR_BIT_MASK_FAT16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryBackingStore;

    fn fat16_image() -> Arc<dyn BackingStore> {
        let mut sector = alloc::vec![0u8; 512];
        sector[11..13].copy_from_slice(&512u16.to_le_bytes());
        sector[13] = 1; // sec_per_clus
        sector[14..16].copy_from_slice(&1u16.to_le_bytes()); // rsvd_sec_cnt
        sector[16] = 2; // num_fats
        sector[17..19].copy_from_slice(&16u16.to_le_bytes()); // root_ent_cnt
        sector[19..21].copy_from_slice(&2000u16.to_le_bytes()); // tot_sec16
        sector[21] = 0xF8;
        sector[22..24].copy_from_slice(&4u16.to_le_bytes()); // fat_sz16
        sector[510] = 0x55;
        sector[511] = 0xAA;

        let size = 2000 * 512;
        let mut data = alloc::vec![0u8; size];
        data[..512].copy_from_slice(&sector);
        Arc::new(MemoryBackingStore::from_vec(data))
    }

    #[test]
    fn mount_sets_dirty_and_unmount_clears_it() {
        let store = fat16_image();
        let volume = Volume::mount(store.clone(), MountOptions::default()).unwrap();
        {
            let mut fat = volume.fat.write();
            assert!(read_dirty_flag(&mut fat).unwrap());
        }
        volume.unmount().unwrap();

        let remounted = Volume::mount(store, MountOptions { require_clean: true, ..Default::default() }).unwrap();
        {
            let mut fat = remounted.fat.write();
            assert!(!read_dirty_flag(&mut fat).unwrap());
        }
    }

    #[test]
    fn create_then_lookup_child_file() {
        let store = fat16_image();
        let volume = Volume::mount(store, MountOptions::default()).unwrap();
        let root = volume.root();
        let child = volume.create_child(&root, "HELLO.TXT", false, (0x4000, 0, 0)).unwrap();
        assert!(!child.read().is_dir());

        let found = volume.lookup(&root, "hello.txt").unwrap().expect("should be found");
        assert!(Arc::ptr_eq(&child, &found));
    }

    #[test]
    fn create_child_directory_has_dot_entries() {
        let store = fat16_image();
        let volume = Volume::mount(store, MountOptions::default()).unwrap();
        let root = volume.root();
        let sub = volume.create_child(&root, "SUB", true, (0x4000, 0, 0)).unwrap();
        assert!(sub.read().is_dir());
    }

    #[test]
    fn unlink_frees_clusters_and_forgets_entry() {
        let store = fat16_image();
        let volume = Volume::mount(store, MountOptions::default()).unwrap();
        let root = volume.root();
        volume.create_child(&root, "GONE.TXT", false, (0x4000, 0, 0)).unwrap();
        volume.unlink_child(&root, "GONE.TXT").unwrap();
        assert!(volume.lookup(&root, "GONE.TXT").unwrap().is_none());
    }

    #[test]
    fn read_only_mount_rejects_create() {
        let store = fat16_image();
        let volume = Volume::mount(store, MountOptions { read_only: true, ..Default::default() }).unwrap();
        let root = volume.root();
        assert_eq!(
            volume.create_child(&root, "X.TXT", false, (0x4000, 0, 0)).unwrap_err(),
            Error::WriteProtect
        );
    }
}
