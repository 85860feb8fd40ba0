//! VFS handle layer (component H, SPEC_FULL.md §4.8): directory and file
//! handles, path traversal, and the open/create/unlink/query surface that
//! ties every lower layer together behind one path-based API.
//!
//! Renaming an entry, removing a non-empty directory through this handle
//! layer, opening a symlink, and setting an entry's owner are all left
//! unimplemented here rather than given invented semantics: FAT has no
//! symlinks or ownership at all, and a correct cross-directory rename would
//! need a multi-step non-atomic sequence (re-link `..`, rebuild the LFN
//! checksum binding) that nothing in this crate can make atomic. Callers
//! get [`Error::NotSupported`] for all four.

use alloc::string::String;
use alloc::sync::Arc;

use spin::Mutex;

use crate::dir::FoundEntry;
use crate::entry::ShortDirEntry;
use crate::error::{Error, Result};
use crate::file;
use crate::path;
use crate::shared::{NodeBody, SharedHandle};
use crate::volume::Volume;

/// How [`Dir::open_file`] should treat an existing vs. missing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAction {
    /// Fail with [`Error::NotFound`] if the entry doesn't exist.
    Open,
    /// Fail with [`Error::AlreadyExists`] if the entry does exist.
    Create,
    /// Open the entry if present, otherwise create it.
    OpenOrCreate,
    /// Open the entry if present (truncating it to empty), otherwise create it.
    CreateReplace,
}

/// Access mode and creation behavior for [`Dir::open_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    pub action: OpenAction,
    pub write: bool,
    /// Every write lands at the current end of file regardless of the seek
    /// position.
    pub append: bool,
    /// Truncate an existing file to 0 bytes on successful open.
    pub truncate: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self { action: OpenAction::Open, write: false, append: false, truncate: false }
    }

    pub fn read_write() -> Self {
        Self { action: OpenAction::OpenOrCreate, write: true, append: false, truncate: false }
    }

    pub fn create_new() -> Self {
        Self { action: OpenAction::Create, write: true, append: false, truncate: false }
    }
}

/// Where a [`File::seek`] offset is measured from.
#[derive(Debug, Clone, Copy)]
pub enum SeekFrom {
    Start(u64),
    Current(i64),
    End(i64),
}

/// A directory entry's metadata, as returned by [`Dir::read`] and
/// [`Dir::query_info`].
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub name: String,
    pub attr: u8,
    pub size: u32,
    pub first_cluster: u32,
    pub create_date: u16,
    pub create_time: u16,
    pub create_tenths: u8,
    pub write_date: u16,
    pub write_time: u16,
    pub access_date: u16,
}

impl EntryInfo {
    fn from_sde(name: String, sde: &ShortDirEntry) -> Self {
        Self {
            name,
            attr: sde.attr,
            size: sde.file_size(),
            first_cluster: sde.first_cluster(),
            create_date: sde.crt_date,
            create_time: sde.crt_time,
            create_tenths: sde.crt_time_tenth,
            write_date: sde.wrt_date,
            write_time: sde.wrt_time,
            access_date: sde.lst_acc_date,
        }
    }

    fn from_found(found: &FoundEntry) -> Self {
        let name = found.long_name.clone().unwrap_or_else(|| found.sde.display_name());
        Self::from_sde(name, &found.sde)
    }

    pub fn is_dir(&self) -> bool {
        self.attr & crate::ATTR_DIRECTORY != 0
    }
}

/// An open directory or file, returned by [`Dir::open`].
pub enum Node {
    Dir(Dir),
    File(File),
}

impl Node {
    fn from_shared(volume: Arc<Volume>, node: SharedHandle) -> Self {
        let is_dir = node.read().is_dir();
        if is_dir {
            Node::Dir(Dir { volume, node })
        } else {
            Node::File(File { volume, node, cursor: Mutex::new(0), access: OpenFlags::read_only() })
        }
    }
}

/// Resolve `components` starting from `start`, stepping into each real
/// subdirectory via [`Volume::lookup`] and handling a literal `..` by
/// following the live parent link instead. A `.` never reaches here: the
/// path parser already dropped it.
fn resolve_components(volume: &Volume, start: &SharedHandle, components: &[String]) -> Result<SharedHandle> {
    let mut current = start.clone();
    for name in components {
        if !current.read().is_dir() {
            return Err(Error::NotADirectory);
        }
        if name == ".." {
            let parent = current.read().parent.clone();
            current = parent.unwrap_or(current);
            continue;
        }
        current = volume.lookup(&current, name)?.ok_or(Error::NotFound)?;
    }
    Ok(current)
}

/// An open directory handle.
pub struct Dir {
    volume: Arc<Volume>,
    node: SharedHandle,
}

impl Dir {
    /// The volume's root directory.
    pub fn root(volume: Arc<Volume>) -> Self {
        let node = volume.root();
        Self { volume, node }
    }

    fn start_for(&self, parsed: &path::ParsedPath) -> SharedHandle {
        if parsed.absolute {
            self.volume.root()
        } else {
            self.node.clone()
        }
    }

    /// Split `path` into its containing directory and final component name.
    fn resolve_parent(&self, p: &str) -> Result<(SharedHandle, String)> {
        let parsed = path::parse(p)?;
        let Some((last, ancestors)) = parsed.components.split_last() else {
            return Err(Error::InvalidName);
        };
        let start = self.start_for(&parsed);
        let parent = resolve_components(&self.volume, &start, ancestors)?;
        if !parent.read().is_dir() {
            return Err(Error::NotADirectory);
        }
        Ok((parent, last.clone()))
    }

    /// Open whatever `path` names -- a file or a directory.
    pub fn open(&self, p: &str) -> Result<Node> {
        let parsed = path::parse(p)?;
        let start = self.start_for(&parsed);
        let node = resolve_components(&self.volume, &start, &parsed.components)?;
        Ok(Node::from_shared(self.volume.clone(), node))
    }

    pub fn open_dir(&self, p: &str) -> Result<Dir> {
        match self.open(p)? {
            Node::Dir(d) => Ok(d),
            Node::File(_) => Err(Error::NotADirectory),
        }
    }

    /// Open (and, depending on `flags.action`, possibly create) a file.
    pub fn open_file(&self, p: &str, flags: OpenFlags) -> Result<File> {
        let (parent, name) = self.resolve_parent(p)?;
        let existing = self.volume.lookup(&parent, &name)?;

        if flags.write && self.volume.is_read_only() {
            return Err(Error::WriteProtect);
        }

        let node = match (existing, flags.action) {
            (Some(_), OpenAction::Create) => return Err(Error::AlreadyExists),
            (Some(n), _) => n,
            (None, OpenAction::Open) => return Err(Error::NotFound),
            (None, _) => self.volume.create_child(&parent, &name, false, self.volume.now())?,
        };
        if node.read().is_dir() {
            return Err(Error::IsADirectory);
        }

        let file = File { volume: self.volume.clone(), node, cursor: Mutex::new(0), access: flags };
        if flags.write && (flags.truncate || flags.action == OpenAction::CreateReplace) {
            file.set_size(0)?;
        }
        Ok(file)
    }

    pub fn create_dir(&self, p: &str) -> Result<Dir> {
        let (parent, name) = self.resolve_parent(p)?;
        if self.volume.lookup(&parent, &name)?.is_some() {
            return Err(Error::AlreadyExists);
        }
        let node = self.volume.create_child(&parent, &name, true, self.volume.now())?;
        Ok(Dir { volume: self.volume.clone(), node })
    }

    /// Remove a file entry. Directories are rejected with
    /// [`Error::IsADirectory`] -- removing a directory through this handle
    /// layer is unimplemented (see the module doc comment).
    pub fn unlink(&self, p: &str) -> Result<()> {
        let (parent, name) = self.resolve_parent(p)?;
        self.volume.unlink_child(&parent, &name)
    }

    pub fn rename(&self, _old: &str, _new: &str) -> Result<()> {
        Err(Error::NotSupported)
    }

    pub fn set_owner(&self, _p: &str, _uid: u32, _gid: u32) -> Result<()> {
        Err(Error::NotSupported)
    }

    pub fn set_attr(&self, p: &str, attr: u8) -> Result<()> {
        if self.volume.is_read_only() {
            return Err(Error::WriteProtect);
        }
        let (parent, name) = self.resolve_parent(p)?;
        let mut parent_w = parent.write();
        match &mut parent_w.body {
            NodeBody::Dir { engine, .. } => {
                let found = engine.find_entry(&name)?.ok_or(Error::NotFound)?;
                engine.update_entry_attr(found.sde_offset, attr)
            }
            NodeBody::File { .. } => Err(Error::NotADirectory),
        }
    }

    pub fn set_times(&self, p: &str, write_date: u16, write_time: u16, access_date: u16) -> Result<()> {
        if self.volume.is_read_only() {
            return Err(Error::WriteProtect);
        }
        let (parent, name) = self.resolve_parent(p)?;
        let mut parent_w = parent.write();
        match &mut parent_w.body {
            NodeBody::Dir { engine, .. } => {
                let found = engine.find_entry(&name)?.ok_or(Error::NotFound)?;
                engine.update_entry_times(found.sde_offset, write_date, write_time, access_date)
            }
            NodeBody::File { .. } => Err(Error::NotADirectory),
        }
    }

    /// Metadata for the entry named `p` relative to this directory, without
    /// opening it.
    pub fn query_info(&self, p: &str) -> Result<EntryInfo> {
        let (parent, name) = self.resolve_parent(p)?;
        let mut parent_w = parent.write();
        match &mut parent_w.body {
            NodeBody::Dir { engine, .. } => {
                let found = engine.find_entry(&name)?.ok_or(Error::NotFound)?;
                Ok(EntryInfo::from_found(&found))
            }
            NodeBody::File { .. } => Err(Error::NotADirectory),
        }
    }

    /// Read the next entry starting at `iter_offset` (0 to begin). Returns
    /// `(entry, next_offset)`, or `None` at end of directory. `.` and `..`
    /// are synthesized at offsets 0 and 1 regardless of on-disk content,
    /// including for the root, where `..` resolves to the same entry as `.`.
    pub fn read(&self, iter_offset: u64) -> Result<Option<(EntryInfo, u64)>> {
        let mut node = self.node.write();
        let (self_cluster, parent_cluster) = match &node.body {
            NodeBody::Dir { first_cluster, .. } => {
                let self_cluster = first_cluster.unwrap_or(0);
                let parent_cluster = match &node.parent {
                    Some(p) => match &p.read().body {
                        NodeBody::Dir { first_cluster, .. } => first_cluster.unwrap_or(0),
                        NodeBody::File { .. } => self_cluster,
                    },
                    None => self_cluster,
                };
                (self_cluster, parent_cluster)
            }
            NodeBody::File { .. } => return Err(Error::NotADirectory),
        };

        let dot = ShortDirEntry::new(*b".          ", crate::ATTR_DIRECTORY, self_cluster);
        let dotdot = ShortDirEntry::new(*b"..         ", crate::ATTR_DIRECTORY, parent_cluster);
        match &mut node.body {
            NodeBody::Dir { engine, .. } => match engine.read(iter_offset, &dot, &dotdot)? {
                Some((name, sde, next)) => Ok(Some((EntryInfo::from_sde(name, &sde), next))),
                None => Ok(None),
            },
            NodeBody::File { .. } => unreachable!("checked above"),
        }
    }

    /// Flush this directory's own on-disk listing.
    pub fn flush(&self) -> Result<()> {
        self.node.write().flush()
    }
}

/// An open file handle: the shared object plus a private read/write cursor
/// and the access mode it was opened with.
pub struct File {
    volume: Arc<Volume>,
    node: SharedHandle,
    cursor: Mutex<u64>,
    access: OpenFlags,
}

impl File {
    fn cluster_offset(&self) -> impl Fn(u32) -> u64 + Copy + '_ {
        move |c: u32| self.volume.bpb().cluster_offset(c)
    }

    pub fn size(&self) -> u32 {
        match &self.node.read().body {
            NodeBody::File { size, .. } => *size,
            NodeBody::Dir { .. } => 0,
        }
    }

    pub fn max_size(&self) -> u64 {
        file::MAX_FILE_SIZE
    }

    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut node = self.node.write();
        match &mut node.body {
            NodeBody::File { chain, size } => {
                file::read(&**self.volume.store(), self.cluster_offset(), chain, *size, offset, buf)
            }
            NodeBody::Dir { .. } => Err(Error::IsADirectory),
        }
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut cursor = self.cursor.lock();
        let n = self.read_at(*cursor, buf)?;
        *cursor += n as u64;
        Ok(n)
    }

    pub fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        if !self.access.write {
            return Err(Error::AccessDenied);
        }
        if self.volume.is_read_only() {
            return Err(Error::WriteProtect);
        }
        let cluster_offset = self.cluster_offset();
        let mut node = self.node.write();
        match &mut node.body {
            NodeBody::File { chain, size } => {
                let mut fat = self.volume.fat().write();
                let n = file::write(&**self.volume.store(), &mut fat, cluster_offset, chain, size, offset, buf)?;
                node.mark_dirty();
                Ok(n)
            }
            NodeBody::Dir { .. } => Err(Error::IsADirectory),
        }
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut cursor = self.cursor.lock();
        let offset = if self.access.append { self.size() as u64 } else { *cursor };
        let n = self.write_at(offset, buf)?;
        *cursor = offset + n as u64;
        Ok(n)
    }

    /// Move the cursor, clamped to `[0, 2^32-1]`. Landing exactly on
    /// `2^32` or beyond reports [`Error::FileTooBig`] rather than silently
    /// clamping down to the ceiling.
    pub fn seek(&self, pos: SeekFrom) -> Result<u64> {
        let mut cursor = self.cursor.lock();
        let base = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::Current(d) => *cursor as i64 + d,
            SeekFrom::End(d) => self.size() as i64 + d,
        };
        let clamped = base.max(0) as u64;
        if clamped > file::MAX_FILE_SIZE {
            return Err(Error::FileTooBig);
        }
        *cursor = clamped;
        Ok(clamped)
    }

    pub fn set_size(&self, new_size: u64) -> Result<()> {
        if !self.access.write {
            return Err(Error::AccessDenied);
        }
        if self.volume.is_read_only() {
            return Err(Error::WriteProtect);
        }
        if new_size > file::MAX_FILE_SIZE {
            return Err(Error::FileTooBig);
        }
        let mut node = self.node.write();
        match &mut node.body {
            NodeBody::File { chain, size } => {
                if *size as u64 == new_size {
                    return Ok(());
                }
                let mut fat = self.volume.fat().write();
                file::set_size(&mut fat, chain, size, new_size as u32)?;
                node.mark_dirty();
                Ok(())
            }
            NodeBody::Dir { .. } => Err(Error::IsADirectory),
        }
    }

    /// Flush this file's pending size/cluster change, in the order
    /// SPEC_FULL.md §5 requires: FAT cache to disk, then the parent
    /// directory entry, then the backing store itself.
    pub fn flush(&self) -> Result<()> {
        self.volume.fat().write().flush()?;
        self.node.write().flush()?;
        self.volume.store().flush().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MountOptions;
    use crate::device::{BackingStore, MemoryBackingStore};

    fn fat16_image() -> Arc<dyn BackingStore> {
        let mut sector = alloc::vec![0u8; 512];
        sector[11..13].copy_from_slice(&512u16.to_le_bytes());
        sector[13] = 1;
        sector[14..16].copy_from_slice(&1u16.to_le_bytes());
        sector[16] = 2;
        sector[17..19].copy_from_slice(&16u16.to_le_bytes());
        sector[19..21].copy_from_slice(&2000u16.to_le_bytes());
        sector[21] = 0xF8;
        sector[22..24].copy_from_slice(&4u16.to_le_bytes());
        sector[510] = 0x55;
        sector[511] = 0xAA;

        let size = 2000 * 512;
        let mut data = alloc::vec![0u8; size];
        data[..512].copy_from_slice(&sector);
        Arc::new(MemoryBackingStore::from_vec(data))
    }

    fn mount() -> Arc<Volume> {
        Arc::new(Volume::mount(fat16_image(), MountOptions::default()).unwrap())
    }

    #[test]
    fn create_write_read_round_trip() {
        let volume = mount();
        let root = Dir::root(volume);
        let file = root.open_file("hello.txt", OpenFlags::create_new()).unwrap();
        file.write(b"hello world").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut buf = [0u8; 11];
        let n = file.read(&mut buf).unwrap();
        assert_eq!(n, 11);
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn nested_path_traversal_with_dotdot() {
        let volume = mount();
        let root = Dir::root(volume);
        root.create_dir("sub").unwrap();
        {
            let sub = root.open_dir("sub").unwrap();
            sub.open_file("a.txt", OpenFlags::create_new()).unwrap();
        }
        let found = root.open("sub/../sub/a.txt").unwrap();
        assert!(matches!(found, Node::File(_)));
    }

    #[test]
    fn open_missing_file_fails_not_found() {
        let volume = mount();
        let root = Dir::root(volume);
        assert_eq!(root.open_file("missing.txt", OpenFlags::read_only()).unwrap_err(), Error::NotFound);
    }

    #[test]
    fn create_existing_fails_already_exists() {
        let volume = mount();
        let root = Dir::root(volume);
        root.open_file("a.txt", OpenFlags::create_new()).unwrap();
        assert_eq!(
            root.open_file("a.txt", OpenFlags::create_new()).unwrap_err(),
            Error::AlreadyExists
        );
    }

    #[test]
    fn unlink_removes_entry_and_rename_is_unsupported() {
        let volume = mount();
        let root = Dir::root(volume);
        root.open_file("gone.txt", OpenFlags::create_new()).unwrap();
        root.unlink("gone.txt").unwrap();
        assert_eq!(root.query_info("gone.txt").unwrap_err(), Error::NotFound);
        assert_eq!(root.rename("a", "b").unwrap_err(), Error::NotSupported);
    }

    #[test]
    fn seek_past_4gib_reports_file_too_big() {
        let volume = mount();
        let root = Dir::root(volume);
        let file = root.open_file("big.txt", OpenFlags::create_new()).unwrap();
        assert_eq!(file.seek(SeekFrom::Start(1u64 << 32)).unwrap_err(), Error::FileTooBig);
        assert_eq!(file.seek(SeekFrom::Start(u32::MAX as u64)).unwrap(), u32::MAX as u64);
    }

    #[test]
    fn readdir_synthesizes_dot_entries_first() {
        let volume = mount();
        let root = Dir::root(volume);
        root.create_dir("sub").unwrap();
        let sub = root.open_dir("sub").unwrap();
        let (first, next) = sub.read(0).unwrap().unwrap();
        assert_eq!(first.name, ".");
        let (second, _) = sub.read(next).unwrap().unwrap();
        assert_eq!(second.name, "..");
    }

    #[test]
    fn read_only_volume_rejects_open_for_write() {
        let store = fat16_image();
        {
            let volume = Volume::mount(store.clone(), MountOptions::default()).unwrap();
            let root = Dir::root(Arc::new(volume));
            root.open_file("a.txt", OpenFlags::create_new()).unwrap();
        }
        let volume = Arc::new(Volume::mount(store, MountOptions { read_only: true, ..Default::default() }).unwrap());
        let root = Dir::root(volume);
        assert_eq!(
            root.open_file("a.txt", OpenFlags::read_write()).unwrap_err(),
            Error::WriteProtect
        );
        let read_only = root.open_file("a.txt", OpenFlags::read_only()).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(read_only.read(&mut buf).unwrap(), 0);
    }
}
