//! Mount-time and format-time configuration (ambient stack, SPEC_FULL.md §10.4).

use alloc::sync::Arc;

/// A FAT-encodable timestamp, independent of any particular clock source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    /// Calendar year, e.g. 2026. Clamped to the 1980 epoch on encode.
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    /// The FAT epoch itself: 1980-01-01 00:00:00.
    pub const EPOCH: Self = Self { year: 1980, month: 1, day: 1, hour: 0, minute: 0, second: 0 };

    /// Encode into the `(date, time, tenths)` triple every creation/write
    /// call in this crate takes, per the on-disk date/time packing in
    /// [`crate::entry`].
    pub fn encode(&self) -> (u16, u16, u8) {
        let date = crate::entry::encode_date(self.year, self.month, self.day);
        let time = crate::entry::encode_time(self.hour, self.minute, self.second);
        (date, time, 0)
    }
}

/// Supplies the current time for directory entry timestamps. A `no_std`
/// crate has no ambient clock, so callers plug one in at mount time --
/// grounded on the sibling `fatfs` crate's `TimeProvider` trait, which
/// solves the identical problem the same way.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// A `TimeProvider` that always reports the FAT epoch. The safe default
/// when no real clock is available; every created entry simply carries
/// 1980-01-01 as its timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTimeProvider;

impl TimeProvider for NullTimeProvider {
    fn now(&self) -> Timestamp {
        Timestamp::EPOCH
    }
}

/// How a volume is opened.
#[derive(Clone)]
pub struct MountOptions {
    /// Reject all mutating operations; `fat_mount` also skips setting the
    /// volume dirty flag when this is set.
    pub read_only: bool,
    /// Fail the mount if the volume dirty flag is already set (a previous
    /// session did not unmount cleanly).
    pub require_clean: bool,
    /// Clock used to stamp new and modified directory entries.
    pub time_provider: Arc<dyn TimeProvider>,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            require_clean: false,
            time_provider: Arc::new(NullTimeProvider),
        }
    }
}

/// How much of the volume a format pass actually overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Only the boot sector, FSInfo and FAT region are written.
    Quick,
    /// Additionally overwrite every data sector with the pattern byte
    /// (`0xF6`, matching the original source's format utility).
    Full,
}

#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    pub fill_mode: FillMode,
    /// Force a FAT width instead of picking one from the volume size table.
    pub fat_type: Option<crate::fat::FatType>,
    /// Force a cluster size in bytes; must be a power of two.
    pub bytes_per_cluster: Option<u32>,
    pub volume_label: Option<[u8; 11]>,
    /// Number of FAT copies to write. The original source always uses 2.
    pub num_fats: u8,
    /// Logical sector size. Must be a power of two; 0 picks 512.
    pub bytes_per_sector: u16,
    /// BPB geometry fields carried for interoperability only -- nothing in
    /// this crate reads them back. 0 auto-detects from the volume-size
    /// table.
    pub heads: u16,
    pub sectors_per_track: u16,
    /// FAT ID / media descriptor byte. 0 auto-detects.
    pub media: u8,
    /// FAT12/16 root directory entry count. 0 auto-detects. Ignored for
    /// FAT32.
    pub root_entries: u16,
    pub hidden_sectors: u32,
    /// `BS_VolID`/`BS_VolID32`. Deterministic rather than random, since this
    /// crate has no ambient entropy source in `no_std`.
    pub serial_number: u32,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Quick,
            fat_type: None,
            bytes_per_cluster: None,
            volume_label: None,
            num_fats: 2,
            bytes_per_sector: 512,
            heads: 0,
            sectors_per_track: 0,
            media: 0,
            root_entries: 0,
            hidden_sectors: 0,
            serial_number: 0,
        }
    }
}
