//! Volume formatter (component J, SPEC_FULL.md §4.9/§6.2/§6.4).
//!
//! Lays down a fresh boot sector, FSInfo sector (FAT32 only), and FAT
//! region over a backing store, picking geometry defaults from the
//! same volume-size table the original source's `RTFsFatVolFormat`
//! uses when the caller doesn't override them.

use alloc::vec;
use alloc::vec::Vec;

use crate::config::{FillMode, FormatOptions};
use crate::device::BackingStore;
use crate::error::{Error, Result};
use crate::fat::FatType;
use crate::{LEAD_SIGNATURE, STRUCT_SIGNATURE, TRAIL_SIGNATURE};

/// Fill pattern for the "long" (non-quick) format's data-area wipe.
const FULL_FORMAT_FILL: u8 = 0xF6;

const MAX_FAT12_DATA_CLUSTERS: u32 = crate::MAX_CLUSTER_FAT12 as u32 - 2;
const MAX_FAT16_DATA_CLUSTERS: u32 = crate::MAX_CLUSTER_FAT16 as u32 - 2;
const MAX_FAT32_DATA_CLUSTERS: u32 = crate::MAX_CLUSTER_FAT32 as u32 - 2;
const MAX_FAT12_TOTAL_CLUSTERS: u32 = MAX_FAT12_DATA_CLUSTERS + 2;
const MAX_FAT16_TOTAL_CLUSTERS: u32 = MAX_FAT16_DATA_CLUSTERS + 2;
const MAX_FAT32_TOTAL_CLUSTERS: u32 = MAX_FAT32_DATA_CLUSTERS + 2;

struct GeometryDefaults {
    max_bytes: u64,
    media: u8,
    heads: u16,
    sectors_per_track: u16,
    sectors_per_cluster: u8,
    root_entries: u16,
}

/// Volume-size-keyed defaults, straight out of the original source's
/// formatting table (`s_aDefaults`): 160K/180K/320K/360K/720K/1.2M/1.44M/
/// 2.88M floppies get their historical geometry, everything above that
/// auto-picks cluster size in [`pick_cluster_size`] instead.
const DEFAULTS: &[GeometryDefaults] = &[
    GeometryDefaults { max_bytes: 163_840, media: 0xFE, heads: 1, sectors_per_track: 8, sectors_per_cluster: 1, root_entries: 64 },
    GeometryDefaults { max_bytes: 184_320, media: 0xFC, heads: 1, sectors_per_track: 9, sectors_per_cluster: 2, root_entries: 64 },
    GeometryDefaults { max_bytes: 327_680, media: 0xFF, heads: 2, sectors_per_track: 8, sectors_per_cluster: 2, root_entries: 112 },
    GeometryDefaults { max_bytes: 368_640, media: 0xFD, heads: 2, sectors_per_track: 9, sectors_per_cluster: 2, root_entries: 112 },
    GeometryDefaults { max_bytes: 737_280, media: 0xF9, heads: 2, sectors_per_track: 9, sectors_per_cluster: 2, root_entries: 112 },
    GeometryDefaults { max_bytes: 1_228_800, media: 0xF9, heads: 2, sectors_per_track: 15, sectors_per_cluster: 2, root_entries: 112 },
    GeometryDefaults { max_bytes: 1_474_560, media: 0xF0, heads: 2, sectors_per_track: 18, sectors_per_cluster: 1, root_entries: 224 },
    GeometryDefaults { max_bytes: 2_949_120, media: 0xF0, heads: 2, sectors_per_track: 36, sectors_per_cluster: 2, root_entries: 224 },
    GeometryDefaults { max_bytes: 528_482_304, media: 0xF8, heads: 16, sectors_per_track: 63, sectors_per_cluster: 0, root_entries: 512 },
    GeometryDefaults { max_bytes: 7_927_234_560, media: 0xF8, heads: 240, sectors_per_track: 63, sectors_per_cluster: 0, root_entries: 512 },
    GeometryDefaults { max_bytes: 8_422_686_720, media: 0xF8, heads: 255, sectors_per_track: 63, sectors_per_cluster: 0, root_entries: 512 },
];

fn lookup_defaults(total_bytes: u64) -> &'static GeometryDefaults {
    DEFAULTS
        .iter()
        .find(|d| total_bytes <= d.max_bytes)
        .unwrap_or(&DEFAULTS[DEFAULTS.len() - 1])
}

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;

/// Cluster-size search for a single, already-decided FAT type: keep
/// doubling the candidate cluster size until the volume's sector count
/// fits that type's data-cluster ceiling, per §6.4.
fn cluster_size_for_type(fat_type: FatType, total_sectors: u64, sector_size: u32, overhead_sectors: u64, num_fats: u32) -> u32 {
    match fat_type {
        FatType::Fat12 => {
            let mut spc: u32 = 1;
            while spc < 128 && total_sectors > overhead_sectors + spc as u64 * MAX_FAT12_DATA_CLUSTERS as u64 + spc as u64 - 1 {
                spc <<= 1;
            }
            spc
        }
        FatType::Fat16 => {
            let mut spc: u32 = 1;
            while spc < 128 && total_sectors > overhead_sectors + spc as u64 * MAX_FAT16_DATA_CLUSTERS as u64 + spc as u64 - 1 {
                spc <<= 1;
            }
            spc
        }
        FatType::Fat32 => {
            // Windows wants a minimum 4KiB cluster and a max of 32KiB, and
            // keeping the FAT itself under 8MB per copy.
            let fat32_overhead = sector_size as u64 * 32 + 8 * MB * num_fats as u64;
            let mut spc: u32 = if sector_size as u64 >= 4 * KB { 1 } else { (4 * KB / sector_size as u64) as u32 };
            while spc < 128
                && (spc as u64 * sector_size as u64) < 32 * KB
                && total_sectors > fat32_overhead / sector_size as u64 + spc as u64 * (2 * MB / sector_size as u64)
            {
                spc <<= 1;
            }
            spc
        }
    }
}

/// Auto-detect both FAT type and cluster size for volumes too large to be
/// a historical floppy size, per §6.4: FAT12 if the volume fits its
/// ceiling even at the largest practical cluster, else FAT16, else FAT32.
fn pick_type_and_cluster_size(total_sectors: u64, sector_size: u32, root_entries: u16, num_fats: u32) -> (FatType, u32) {
    let fat12_overhead = sector_size as u64
        + align_up(MAX_FAT12_TOTAL_CLUSTERS as u64 * 3 / 2, sector_size as u64) * num_fats as u64
        + align_up(root_entries as u64 * 32, sector_size as u64);
    let fat16_overhead = sector_size as u64
        + align_up(MAX_FAT16_TOTAL_CLUSTERS as u64 * 2, sector_size as u64) * num_fats as u64
        + align_up(root_entries as u64 * 32, sector_size as u64);
    let total_bytes = total_sectors * sector_size as u64;

    let fat_type = if total_bytes <= fat12_overhead + MAX_FAT12_DATA_CLUSTERS as u64 * 4 * sector_size as u64 {
        FatType::Fat12
    } else if total_bytes <= fat16_overhead + MAX_FAT16_DATA_CLUSTERS as u64 * 128 * sector_size as u64 {
        FatType::Fat16
    } else {
        FatType::Fat32
    };
    let overhead_sectors = match fat_type {
        FatType::Fat12 => fat12_overhead / sector_size as u64,
        FatType::Fat16 | FatType::Fat32 => fat16_overhead / sector_size as u64,
    };
    let spc = cluster_size_for_type(fat_type, total_sectors, sector_size, overhead_sectors, num_fats);
    (fat_type, spc)
}

fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) / align * align
}

/// A formatted volume's geometry, returned so the caller can mount
/// immediately without re-deriving it from the written boot sector.
pub struct FormatResult {
    pub fat_type: FatType,
    pub sectors_per_cluster: u32,
    pub total_sectors: u64,
    pub fat_size_sectors: u32,
    pub data_cluster_cnt: u32,
}

/// Format `store`'s first `total_size` bytes as a FAT volume.
///
/// Writes the boot sector, the FSInfo sector and three boot-sector backup
/// copies (FAT32 only), every FAT copy initialized with the media byte and
/// an end-of-chain marker for the root directory's reserved first entries,
/// and a zeroed root directory region. With [`FillMode::Full`] the
/// remainder of the data area is additionally overwritten with the
/// `0xF6` pattern byte, matching the original source's "long format".
pub fn fat_format(store: &dyn BackingStore, total_size: u64, options: &FormatOptions) -> Result<FormatResult> {
    let sector_size: u32 = if options.bytes_per_sector == 0 { 512 } else { options.bytes_per_sector as u32 };
    if !sector_size.is_power_of_two() {
        return Err(Error::BogusFormat);
    }
    let num_fats = options.num_fats.max(1) as u32;
    let total_sectors_in_vol = total_size / sector_size as u64;

    let defaults = lookup_defaults(total_size);
    let heads = if options.heads != 0 { options.heads } else { defaults.heads };
    let sectors_per_track = if options.sectors_per_track != 0 { options.sectors_per_track } else { defaults.sectors_per_track };
    let media = if options.media != 0 { options.media } else { defaults.media };
    let mut root_entries = if options.root_entries != 0 { options.root_entries } else { defaults.root_entries };

    // An explicit `fat_type` is a hard override: once the caller has
    // named a width, nothing here is allowed to second-guess it. Only the
    // cluster size is still derived when the caller didn't also fix that.
    let (fat_type, sectors_per_cluster) = match (options.fat_type, options.bytes_per_cluster) {
        (Some(t), Some(bpc)) => (t, bpc / sector_size),
        (Some(t), None) => {
            let overhead = match t {
                FatType::Fat12 => {
                    sector_size as u64
                        + align_up(MAX_FAT12_TOTAL_CLUSTERS as u64 * 3 / 2, sector_size as u64) * num_fats as u64
                        + align_up(root_entries as u64 * 32, sector_size as u64)
                }
                FatType::Fat16 | FatType::Fat32 => {
                    sector_size as u64
                        + align_up(MAX_FAT16_TOTAL_CLUSTERS as u64 * 2, sector_size as u64) * num_fats as u64
                        + align_up(root_entries as u64 * 32, sector_size as u64)
                }
            } / sector_size as u64;
            (t, cluster_size_for_type(t, total_sectors_in_vol, sector_size, overhead, num_fats))
        }
        (None, Some(bpc)) => {
            let (t, _) = pick_type_and_cluster_size(total_sectors_in_vol, sector_size, root_entries, num_fats);
            (t, bpc / sector_size)
        }
        (None, None) if defaults.sectors_per_cluster != 0 => {
            (pick_type_and_cluster_size(total_sectors_in_vol, sector_size, root_entries, num_fats).0, defaults.sectors_per_cluster as u32)
        }
        (None, None) => pick_type_and_cluster_size(total_sectors_in_vol, sector_size, root_entries, num_fats),
    };
    if sectors_per_cluster == 0 || !sectors_per_cluster.is_power_of_two() {
        return Err(Error::BogusFormat);
    }

    let cluster_size = sectors_per_cluster * sector_size;
    let mut root_dir_bytes = align_up(root_entries as u64 * 32, sector_size as u64) as u32;
    if fat_type == FatType::Fat32 {
        root_entries = 0;
        root_dir_bytes = cluster_size;
    }

    let reserved_sectors: u32 = if fat_type == FatType::Fat32 { 32 } else { 1 };
    let reserved_fixed_bytes = if fat_type == FatType::Fat32 {
        reserved_sectors as u64 * sector_size as u64
    } else {
        sector_size as u64 + root_dir_bytes as u64
    };

    let max_clusters = match fat_type {
        FatType::Fat12 => MAX_FAT12_DATA_CLUSTERS,
        FatType::Fat16 => MAX_FAT16_DATA_CLUSTERS,
        FatType::Fat32 => MAX_FAT32_DATA_CLUSTERS,
    };

    let mut fat_size_bytes: u64 = sector_size as u64;
    if reserved_fixed_bytes + fat_size_bytes * num_fats as u64 >= total_size {
        return Err(Error::DiskFull);
    }
    let mut data_clusters = ((total_size - reserved_fixed_bytes - fat_size_bytes * num_fats as u64) / cluster_size as u64)
        .min(max_clusters as u64) as u32;

    // Fixed-point iteration: FAT size depends on cluster count and cluster
    // count depends on FAT size. Settles in at most a handful of rounds,
    // same as the original source's formatter.
    for _ in 0..4 {
        let prev = data_clusters;
        fat_size_bytes = match fat_type {
            FatType::Fat12 => (data_clusters.min(MAX_FAT12_TOTAL_CLUSTERS) as u64 * 3) / 2,
            FatType::Fat16 => data_clusters.min(MAX_FAT16_TOTAL_CLUSTERS) as u64 * 2,
            FatType::Fat32 => align_up(data_clusters.min(MAX_FAT32_TOTAL_CLUSTERS) as u64 * 4, 4 * KB),
        };
        fat_size_bytes = align_up(fat_size_bytes, sector_size as u64);
        if reserved_fixed_bytes + fat_size_bytes * num_fats as u64 >= total_size {
            return Err(Error::DiskFull);
        }
        data_clusters = ((total_size - reserved_fixed_bytes - fat_size_bytes * num_fats as u64) / cluster_size as u64)
            .min(max_clusters as u64) as u32;
        if data_clusters == prev {
            break;
        }
    }

    let fat_size_sectors = (fat_size_bytes / sector_size as u64) as u32;
    let total_sectors: u64 =
        data_clusters as u64 * sectors_per_cluster as u64 + (reserved_fixed_bytes + fat_size_bytes * num_fats as u64) / sector_size as u64;

    write_boot_sector(
        store,
        sector_size,
        sectors_per_cluster as u8,
        reserved_sectors,
        num_fats as u8,
        root_entries,
        total_sectors,
        media,
        fat_size_sectors,
        sectors_per_track,
        heads,
        options.hidden_sectors,
        fat_type,
        options.serial_number,
        options.volume_label,
    )?;

    let fat_offset_sectors = reserved_sectors as u64;
    if fat_type == FatType::Fat32 {
        write_fsinfo(store, sector_size, data_clusters)?;
        write_boot_sector_backups(store, sector_size, reserved_sectors)?;
    }

    write_fats(store, sector_size, fat_offset_sectors, fat_size_bytes, num_fats, fat_type, media)?;

    let root_offset = (fat_offset_sectors + fat_size_bytes * num_fats as u64 / sector_size as u64) * sector_size as u64;
    write_zeros(store, root_offset, root_dir_bytes as u64)?;

    if options.fill_mode == FillMode::Full {
        let data_start = root_offset + root_dir_bytes as u64;
        let data_end = total_sectors * sector_size as u64;
        if data_end > data_start {
            write_pattern(store, data_start, data_end - data_start, FULL_FORMAT_FILL)?;
        }
    }

    Ok(FormatResult { fat_type, sectors_per_cluster, total_sectors, fat_size_sectors, data_cluster_cnt: data_clusters })
}

#[allow(clippy::too_many_arguments)]
fn write_boot_sector(
    store: &dyn BackingStore,
    sector_size: u32,
    sectors_per_cluster: u8,
    reserved_sectors: u32,
    num_fats: u8,
    root_entries: u16,
    total_sectors: u64,
    media: u8,
    fat_size_sectors: u32,
    sectors_per_track: u16,
    heads: u16,
    hidden_sectors: u32,
    fat_type: FatType,
    serial_number: u32,
    volume_label: Option<[u8; 11]>,
) -> Result<()> {
    let mut s = vec![0u8; sector_size as usize];
    s[0] = 0xEB;
    s[1] = 0x3C;
    s[2] = 0x90;
    let oem = if fat_type == FatType::Fat32 { b"FAT32   " } else { b"IPRTRUST" };
    s[3..11].copy_from_slice(oem);
    s[11..13].copy_from_slice(&(sector_size as u16).to_le_bytes());
    s[13] = sectors_per_cluster;
    s[14..16].copy_from_slice(&(reserved_sectors as u16).to_le_bytes());
    s[16] = num_fats;
    // A reader must never see both total-sector fields nonzero at once.
    let fits_in_u16 = total_sectors != 0 && total_sectors <= u16::MAX as u64;
    s[17..19].copy_from_slice(&root_entries.to_le_bytes());
    if fits_in_u16 {
        s[19..21].copy_from_slice(&(total_sectors as u16).to_le_bytes());
    }
    s[21] = media;
    if fat_type != FatType::Fat32 {
        s[22..24].copy_from_slice(&(fat_size_sectors as u16).to_le_bytes());
    }
    s[24..26].copy_from_slice(&sectors_per_track.to_le_bytes());
    s[26..28].copy_from_slice(&heads.to_le_bytes());
    s[28..32].copy_from_slice(&hidden_sectors.to_le_bytes());
    if !fits_in_u16 {
        s[32..36].copy_from_slice(&(total_sectors as u32).to_le_bytes());
    }

    let label = volume_label.unwrap_or(*b"NO NAME    ");
    if fat_type == FatType::Fat32 {
        s[36..40].copy_from_slice(&fat_size_sectors.to_le_bytes());
        s[40..42].copy_from_slice(&0u16.to_le_bytes()); // ext_flags: mirror every FAT
        s[42..44].copy_from_slice(&0u16.to_le_bytes()); // fs_ver 0.0
        s[44..48].copy_from_slice(&2u32.to_le_bytes()); // root_clus: cluster 2
        s[48..50].copy_from_slice(&1u16.to_le_bytes()); // fs_info sector
        s[50..52].copy_from_slice(&6u16.to_le_bytes()); // backup boot sector
        s[64] = 0x80; // bs_drv_num
        s[66] = 0x29; // bs_boot_sig
        s[67..71].copy_from_slice(&serial_number.to_le_bytes());
        s[71..82].copy_from_slice(&label);
        s[82..90].copy_from_slice(b"FAT32   ");
    } else {
        s[36] = 0x80; // bs_drv_num
        s[38] = 0x29; // bs_boot_sig
        s[39..43].copy_from_slice(&serial_number.to_le_bytes());
        s[43..54].copy_from_slice(&label);
        let type_str: &[u8; 8] = match fat_type {
            FatType::Fat12 => b"FAT12   ",
            FatType::Fat16 => b"FAT16   ",
            FatType::Fat32 => unreachable!(),
        };
        s[54..62].copy_from_slice(type_str);
    }

    s[510] = 0x55;
    s[511] = 0xAA;
    store.write_at(0, &s)?;
    Ok(())
}

fn write_fsinfo(store: &dyn BackingStore, sector_size: u32, data_clusters: u32) -> Result<()> {
    let mut s = vec![0u8; sector_size as usize];
    s[0..4].copy_from_slice(&LEAD_SIGNATURE.to_le_bytes());
    s[484..488].copy_from_slice(&STRUCT_SIGNATURE.to_le_bytes());
    // One cluster already spent on the root directory itself.
    s[488..492].copy_from_slice(&(data_clusters.saturating_sub(1)).to_le_bytes());
    s[492..496].copy_from_slice(&3u32.to_le_bytes()); // next free hint: first cluster past root
    s[508..512].copy_from_slice(&TRAIL_SIGNATURE.to_le_bytes());
    store.write_at(sector_size as u64, &s)
        .map_err(Into::into)
}

/// Three copies of the boot sector at the conventional offset (sector 6),
/// plus zero-filling whatever reserved sectors aren't otherwise spoken for.
fn write_boot_sector_backups(store: &dyn BackingStore, sector_size: u32, reserved_sectors: u32) -> Result<()> {
    let mut boot = vec![0u8; sector_size as usize];
    store.read_at(0, &mut boot)?;
    write_zeros(store, 2 * sector_size as u64, (6u32.saturating_sub(2)) as u64 * sector_size as u64)?;
    for i in 0..3u32 {
        store.write_at((6 + i) as u64 * sector_size as u64, &boot)?;
    }
    let tail_start = 9u32;
    if reserved_sectors > tail_start {
        write_zeros(store, tail_start as u64 * sector_size as u64, (reserved_sectors - tail_start) as u64 * sector_size as u64)?;
    }
    Ok(())
}

fn write_fats(
    store: &dyn BackingStore,
    sector_size: u32,
    fat_offset_sectors: u64,
    fat_size_bytes: u64,
    num_fats: u32,
    fat_type: FatType,
    media: u8,
) -> Result<()> {
    let mut head = vec![0u8; sector_size as usize];
    match fat_type {
        FatType::Fat32 => {
            // Entry 0: media byte + reserved top bits set; entry 1: EOC,
            // doubling as the root directory's own chain terminator.
            head[0] = media;
            head[1] = 0xFF;
            head[2] = 0xFF;
            head[3] = 0xFF;
            head[4] = 0xFF;
            head[5] = 0xFF;
            head[6] = 0xFF;
            head[7] = 0x0F;
            head[8] = 0xFF;
            head[9] = 0xFF;
            head[10] = 0xFF;
            head[11] = 0x0F;
        }
        FatType::Fat16 => {
            head[0] = media;
            head[1] = 0xFF;
            head[2] = 0xFF;
            head[3] = 0xFF;
        }
        FatType::Fat12 => {
            head[0] = media;
            head[1] = 0xFF;
            head[2] = 0xFF;
        }
    }

    let fat_base = fat_offset_sectors * sector_size as u64;
    for copy in 0..num_fats as u64 {
        let offset = fat_base + copy * fat_size_bytes;
        store.write_at(offset, &head)?;
        if fat_size_bytes > sector_size as u64 {
            write_zeros(store, offset + sector_size as u64, fat_size_bytes - sector_size as u64)?;
        }
    }
    Ok(())
}

const ZERO_CHUNK: usize = 64 * 1024;

fn write_zeros(store: &dyn BackingStore, offset: u64, len: u64) -> Result<()> {
    write_pattern(store, offset, len, 0)
}

fn write_pattern(store: &dyn BackingStore, offset: u64, len: u64, byte: u8) -> Result<()> {
    let chunk: Vec<u8> = vec![byte; ZERO_CHUNK.min(len.max(1) as usize)];
    let mut remaining = len;
    let mut cur = offset;
    while remaining > 0 {
        let n = remaining.min(chunk.len() as u64) as usize;
        store.write_at(cur, &chunk[..n])?;
        cur += n as u64;
        remaining -= n as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bpb::BiosParameterBlock;
    use crate::device::MemoryBackingStore;

    /// The 1.44MB floppy scenario from SPEC_FULL.md §8.4: FAT12, 2 FATs, 2
    /// heads, 18 sectors/track, media 0xF0, 224 root entries, 9-sector FAT.
    #[test]
    fn formats_a_1_44mb_floppy() {
        let store = MemoryBackingStore::new(1_474_560);
        let result = fat_format(&store, 1_474_560, &FormatOptions::default()).unwrap();
        assert_eq!(result.fat_type, FatType::Fat12);
        assert_eq!(result.fat_size_sectors, 9);
        assert_eq!(result.sectors_per_cluster, 1);

        let snapshot = store.snapshot();
        let bpb = BiosParameterBlock::parse(&snapshot).unwrap();
        assert_eq!(bpb.bytes_per_sector(), 512);
        assert_eq!(bpb.fat_cnt(), 2);
        assert_eq!(bpb.fat_size_sectors(), 9);
        assert_eq!(bpb.root_dir_sector_cnt(), 14);
        assert_eq!(snapshot[21], 0xF0);
        assert_eq!(&snapshot[510..512], &[0x55, 0xAA]);
    }

    #[test]
    fn quick_format_leaves_data_area_untouched() {
        let store = MemoryBackingStore::new(1_474_560);
        fat_format(&store, 1_474_560, &FormatOptions::default()).unwrap();
        let snapshot = store.snapshot();
        assert!(snapshot[20_000..20_100].iter().all(|&b| b == 0));
    }

    #[test]
    fn full_format_fills_data_area_with_pattern() {
        let store = MemoryBackingStore::new(1_474_560);
        let options = FormatOptions { fill_mode: FillMode::Full, ..Default::default() };
        fat_format(&store, 1_474_560, &options).unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot[20_000], FULL_FORMAT_FILL);
    }

    #[test]
    fn formats_a_small_fat32_volume() {
        let size = 80 * MB;
        let store = MemoryBackingStore::new(size as usize);
        let options = FormatOptions { fat_type: Some(FatType::Fat32), ..Default::default() };
        let result = fat_format(&store, size, &options).unwrap();
        assert_eq!(result.fat_type, FatType::Fat32);

        let snapshot = store.snapshot();
        let bpb = BiosParameterBlock::parse(&snapshot).unwrap();
        assert_eq!(bpb.fat_type(), FatType::Fat32);
        assert_eq!(bpb.root_cluster(), Some(2));
        assert!(bpb.fsinfo_sector().is_some());
    }

    #[test]
    fn rejects_a_volume_too_small_to_format() {
        let store = MemoryBackingStore::new(4096);
        let err = fat_format(&store, 4096, &FormatOptions::default()).unwrap_err();
        assert_eq!(err, Error::DiskFull);
    }
}
