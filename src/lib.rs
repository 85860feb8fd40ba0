#![no_std]
//! A FAT12/16/32 filesystem implementation: BPB parsing, FAT cluster-map
//! caching, directory buffering with 8.3/LFN encoding, cluster-chain file
//! I/O, and a VFS handle layer tying them together (SPEC_FULL.md §1-10).

extern crate alloc;

pub mod block_cache;
pub mod bpb;
pub mod chain;
pub mod config;
pub mod cp437;
pub mod device;
pub mod dir;
pub mod dirbuf;
pub mod entry;
pub mod error;
pub mod fat;
pub mod file;
pub mod format;
pub mod path;
pub mod shared;
pub mod vfs;
pub mod volume;

pub const LEAD_SIGNATURE: u32 = 0x41615252;
pub const STRUCT_SIGNATURE: u32 = 0x61417272;
pub const TRAIL_SIGNATURE: u32 = 0xAA550000;

pub const ATTR_READ_ONLY: u8 = 0x01;
pub const ATTR_HIDDEN: u8 = 0x02;
pub const ATTR_SYSTEM: u8 = 0x04;
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;
pub const ATTR_LONG_NAME: u8 = ATTR_READ_ONLY | ATTR_HIDDEN | ATTR_SYSTEM | ATTR_VOLUME_ID;

pub const DIRENT_SIZE: usize = 32;
pub const LONG_NAME_LEN: u32 = 13;

/// Upper bound on cached blocks held by [`block_cache`] at once.
pub const BLOCK_CACHE_LIMIT: usize = 64;

pub const SPACE: u8 = 0x20;
pub const DOT: u8 = 0x2E;

/// For a short entry's `name[0]` and a long entry's `ord`: this slot and
/// every slot after it in the directory are free.
pub const DIR_ENTRY_LAST_AND_UNUSED: u8 = 0x00;
/// For a short entry's `name[0]` and a long entry's `ord`: this slot alone
/// has been deleted.
pub const DIR_ENTRY_UNUSED: u8 = 0xE5;
/// Mask on a long entry's `ord` marking the slot nearest the short entry
/// (the first one encountered scanning backwards from it).
pub const LAST_LONG_ENTRY: u8 = 0x40;

/// Microsoft's FAT-width cluster-count boundaries (SPEC_FULL.md §3.1).
pub const MAX_CLUSTER_FAT12: usize = 4085;
pub const MAX_CLUSTER_FAT16: usize = 65525;
pub const MAX_CLUSTER_FAT32: usize = 268435445;

/// FAT32 FAT[1] bit 27: clear means the volume was not unmounted cleanly.
pub const CLN_SHUT_BIT_MASK_FAT32: u32 = 0x08000000;
/// FAT32 FAT[1] bit 26: clear means a prior session saw a disk I/O error.
pub const HRD_ERR_BIT_MASK_FAT32: u32 = 0x04000000;
/// FAT16 FAT[1] bit 15: clear means the volume was not unmounted cleanly.
pub const CLN_SHUT_BIT_MASK_FAT16: u16 = 0x8000;
/// FAT16 FAT[1] bit 14: clear means a prior session saw a disk I/O error.
pub const HRD_ERR_BIT_MASK_FAT16: u16 = 0x4000;

pub(crate) fn read_le_u16(input: &[u8]) -> u16 {
    u16::from_le_bytes(input[0..2].try_into().unwrap())
}

pub(crate) fn read_le_u32(input: &[u8]) -> u32 {
    u32::from_le_bytes(input[0..4].try_into().unwrap())
}
