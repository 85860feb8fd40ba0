//! The backing-store contract (component A).
//!
//! Everything above this module talks to storage exclusively through
//! [`BackingStore`]: a positioned, synchronous, block-addressable object.
//! It deliberately knows nothing about FAT, sectors, or clusters -- those
//! concepts live in [`crate::bpb`] and [`crate::fat`], layered on top.

use alloc::vec::Vec;
use core::any::Any;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    Read,
    Write,
    /// A short read happened somewhere other than end-of-file.
    ShortRead,
}

/// One scatter/gather segment: `len` bytes at `offset`.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub offset: u64,
    pub len: u32,
}

/// A positioned, block-addressable backing object.
///
/// All operations are synchronous; there is no implicit cursor. A "short
/// read" (fewer bytes returned than requested) is only legal at end of
/// file -- any short read inside the range this implementation expects to
/// exist is reported as [`DeviceError::ShortRead`], not silently tolerated.
pub trait BackingStore: Send + Sync + Any {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), DeviceError>;

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), DeviceError>;

    /// Scatter-write: each segment's bytes come from the matching slice in `bufs`.
    fn scatter_write_at(&self, segs: &[(Segment, &[u8])]) -> Result<(), DeviceError> {
        for (seg, buf) in segs {
            self.write_at(seg.offset, &buf[..seg.len as usize])?;
        }
        Ok(())
    }

    /// Scatter-read: each segment's bytes land in the matching slice in `bufs`.
    fn scatter_read_at(&self, segs: &mut [(Segment, &mut [u8])]) -> Result<(), DeviceError> {
        for (seg, buf) in segs.iter_mut() {
            self.read_at(seg.offset, &mut buf[..seg.len as usize])?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), DeviceError>;

    fn query_size(&self) -> Result<u64, DeviceError>;

    fn writeable(&self) -> bool {
        true
    }
}

/// A `Vec<u8>`-backed store for tests and small in-memory images.
///
/// Grounded on the teacher's own in-memory test fixtures and on the sibling
/// `rrbutani-fatfs` crate's `storage.rs`, which tests the same way: a plain
/// buffer behind the storage trait rather than a host file.
pub struct MemoryBackingStore {
    data: spin::Mutex<Vec<u8>>,
    writeable: bool,
}

impl MemoryBackingStore {
    pub fn new(size: usize) -> Self {
        Self {
            data: spin::Mutex::new(alloc::vec![0u8; size]),
            writeable: true,
        }
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data: spin::Mutex::new(data),
            writeable: true,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writeable = false;
        self
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data.into_inner()
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

impl BackingStore for MemoryBackingStore {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), DeviceError> {
        let data = self.data.lock();
        let start = offset as usize;
        let end = start.checked_add(buf.len()).ok_or(DeviceError::Read)?;
        if end > data.len() {
            return Err(DeviceError::ShortRead);
        }
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), DeviceError> {
        if !self.writeable {
            return Err(DeviceError::Write);
        }
        let mut data = self.data.lock();
        let start = offset as usize;
        let end = start.checked_add(buf.len()).ok_or(DeviceError::Write)?;
        if end > data.len() {
            return Err(DeviceError::Write);
        }
        data[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn query_size(&self) -> Result<u64, DeviceError> {
        Ok(self.data.lock().len() as u64)
    }

    fn writeable(&self) -> bool {
        self.writeable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_round_trip() {
        let store = MemoryBackingStore::new(1024);
        store.write_at(10, &[1, 2, 3, 4]).unwrap();
        let mut buf = [0u8; 4];
        store.read_at(10, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn read_only_rejects_writes() {
        let store = MemoryBackingStore::new(16).read_only();
        assert_eq!(store.write_at(0, &[1]), Err(DeviceError::Write));
    }

    #[test]
    fn out_of_range_read_is_short_read() {
        let store = MemoryBackingStore::new(4);
        let mut buf = [0u8; 8];
        assert_eq!(store.read_at(0, &mut buf), Err(DeviceError::ShortRead));
    }
}
