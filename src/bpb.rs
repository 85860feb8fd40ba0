//! BIOS Parameter Block (BPB) and boot sector (component I).
//!
//! The first sector of a FAT volume -- the boot sector -- carries the BPB.
//! Three shapes exist on disk: the original [`BasicBpb`] (36 bytes, common to
//! every FAT width), followed by either [`Bpb1216`] (FAT12/FAT16) or
//! [`Bpb32`] (FAT32) at offset 36. [`BiosParameterBlock`] parses whichever
//! shape is present and exposes the geometry arithmetic every other module
//! needs: sector-for-cluster, FAT offsets, root directory location.
//!
//! FAT type is never taken from what the volume claims about itself --
//! it is derived from the cluster count, per Microsoft's rule (see
//! [`crate::fat::FatType::from_cluster_count`]): no such thing as a FAT12
//! volume with >= 4085 clusters, no FAT16 volume with < 4085 or >= 65525
//! clusters, no FAT32 volume with < 65525 clusters.

use alloc::vec::Vec;

use crate::device::BackingStore;
use crate::error::{Corruption, Error, Result};
use crate::fat::FatType;
use crate::{read_le_u16, read_le_u32, LEAD_SIGNATURE, STRUCT_SIGNATURE, TRAIL_SIGNATURE};

const BOOT_SIG_OFFSET: usize = 510;

/// Fields common to every FAT width, occupying the first 36 bytes of the
/// boot sector.
#[derive(Debug, Clone, Copy)]
pub struct BasicBpb {
    pub bs_jmp_boot: [u8; 3],
    pub bs_oem_name: [u8; 8],
    /// Bytes per sector. 512, 1024, 2048 or 4096.
    pub byts_per_sec: u16,
    /// Sectors per allocation unit. Must be a power of two.
    pub sec_per_clus: u8,
    /// Sectors in the reserved region, including the boot sector itself.
    pub rsvd_sec_cnt: u16,
    /// Always 2 in practice; both copies are kept in sync unless the
    /// FAT32 "single active FAT" flag says otherwise.
    pub num_fats: u8,
    /// Root directory entry count. Zero on FAT32 (the root is a regular
    /// cluster chain there); nonzero fixes the size of the FAT12/16 root.
    pub root_ent_cnt: u16,
    /// Total sector count if it fits in 16 bits, else 0 (see `tot_sec32`).
    pub tot_sec16: u16,
    pub media: u8,
    /// FAT size in sectors for FAT12/16. Zero on FAT32 (see `fat_sz32`).
    pub fat_sz16: u16,
    pub sec_per_trk: u16,
    pub num_heads: u16,
    pub hidd_sec: u32,
    /// Total sector count when it doesn't fit in `tot_sec16`.
    pub tot_sec32: u32,
}

impl BasicBpb {
    const LEN: usize = 36;

    fn parse(b: &[u8]) -> Self {
        Self {
            bs_jmp_boot: [b[0], b[1], b[2]],
            bs_oem_name: b[3..11].try_into().unwrap(),
            byts_per_sec: read_le_u16(&b[11..13]),
            sec_per_clus: b[13],
            rsvd_sec_cnt: read_le_u16(&b[14..16]),
            num_fats: b[16],
            root_ent_cnt: read_le_u16(&b[17..19]),
            tot_sec16: read_le_u16(&b[19..21]),
            media: b[21],
            fat_sz16: read_le_u16(&b[22..24]),
            sec_per_trk: read_le_u16(&b[24..26]),
            num_heads: read_le_u16(&b[26..28]),
            hidd_sec: read_le_u32(&b[28..32]),
            tot_sec32: read_le_u32(&b[32..36]),
        }
    }
}

/// The FAT12/16 tail of the boot sector, starting at offset 36.
#[derive(Debug, Clone, Copy)]
pub struct Bpb1216 {
    pub bs_drv_num: u8,
    pub bs_reserved1: u8,
    pub bs_boot_sig: u8,
    pub bs_vol_id: u32,
    pub bs_vol_lab: [u8; 11],
    pub bs_fil_sys_type: [u8; 8],
}

impl Bpb1216 {
    const LEN: usize = 26;

    fn parse(b: &[u8]) -> Self {
        Self {
            bs_drv_num: b[0],
            bs_reserved1: b[1],
            bs_boot_sig: b[2],
            bs_vol_id: read_le_u32(&b[3..7]),
            bs_vol_lab: b[7..18].try_into().unwrap(),
            bs_fil_sys_type: b[18..26].try_into().unwrap(),
        }
    }
}

/// The FAT32 tail of the boot sector, starting at offset 36.
#[derive(Debug, Clone, Copy)]
pub struct Bpb32 {
    pub fat_sz32: u32,
    /// Bit 7 set means only one FAT (bits 0-3) is active; mirroring is off.
    pub ext_flags: u16,
    pub fs_ver: u16,
    pub root_clus: u32,
    pub fs_info: u16,
    pub bk_boot_sec: u16,
    pub bs_drv_num: u8,
    pub bs_reserved1: u8,
    pub bs_boot_sig: u8,
    pub bs_vol_id: u32,
    pub bs_vol_lab: [u8; 11],
    pub bs_fil_sys_type: [u8; 8],
}

impl Bpb32 {
    const LEN: usize = 54;

    fn parse(b: &[u8]) -> Self {
        Self {
            fat_sz32: read_le_u32(&b[0..4]),
            ext_flags: read_le_u16(&b[4..6]),
            fs_ver: read_le_u16(&b[6..8]),
            root_clus: read_le_u32(&b[8..12]),
            fs_info: read_le_u16(&b[12..14]),
            bk_boot_sec: read_le_u16(&b[14..16]),
            bs_drv_num: b[28],
            bs_reserved1: b[29],
            bs_boot_sig: b[30],
            bs_vol_id: read_le_u32(&b[31..35]),
            bs_vol_lab: b[35..46].try_into().unwrap(),
            bs_fil_sys_type: b[46..54].try_into().unwrap(),
        }
    }

    /// "Only FAT 0 is active" per the extended flags (SPEC_FULL.md §10.6).
    pub fn single_fat_active(&self) -> bool {
        self.ext_flags & 0x0080 != 0
    }

    pub fn active_fat_index(&self) -> usize {
        (self.ext_flags & 0x000F) as usize
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ExtendedBpb {
    Fat1216(Bpb1216),
    Fat32(Bpb32),
}

/// Which on-disk BPB shape was actually found, per SPEC_FULL.md §2's
/// "DOS 1.x heuristics, BPB 2.0/3.31/Extended/FAT32-EBPB detection". Carried
/// alongside [`BiosParameterBlock`] purely as provenance -- every geometry
/// field is already resolved into `basic`/`extended` regardless of which
/// shape produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BpbVersion {
    /// No BPB at all: a PC-DOS 1.0 boot sector, recognized by its short jump
    /// and build-date-string shape plus the FAT ID byte; geometry is the
    /// fixed single/double-sided floppy layout, not read from the sector.
    NoBpb,
    /// `tot_sec16` is authoritative; no sector/head/hidden-sector/`tot_sec32`
    /// fields and no extended boot signature.
    Dos20,
    /// Adds `sec_per_trk`/`num_heads`/`hidd_sec`/`tot_sec32` over BPB 2.0,
    /// still no extended boot signature.
    Dos331,
    /// FAT12/16 extended BPB, partial (`0x28`): serial trusted, label/fs-type
    /// not.
    Ext28,
    /// FAT12/16 extended BPB, full (`0x29`): serial, label and fs-type all
    /// trusted.
    Ext29,
    /// FAT32 EBPB, partial (`0x28`).
    Fat32Ebpb28,
    /// FAT32 EBPB, full (`0x29`).
    Fat32Ebpb29,
}

/// A parsed boot sector: the common prefix plus whichever extended tail
/// matched the volume.
#[derive(Debug, Clone, Copy)]
pub struct BiosParameterBlock {
    pub basic: BasicBpb,
    pub extended: ExtendedBpb,
    pub version: BpbVersion,
}

impl BiosParameterBlock {
    /// Parse a 512-byte-or-larger boot sector image carrying a normal BPB
    /// (boot signature `0x55 0xAA` present). Only the boot signature and
    /// gross field sanity are checked here; FAT-type-specific validation
    /// happens in [`Self::is_valid`]. A sector with no boot signature might
    /// still be a DOS 1.x volume -- see [`Self::parse_with_fat_hint`].
    pub fn parse(sector: &[u8]) -> Result<Self> {
        Self::parse_with_fat_hint(sector, None)
    }

    /// As [`Self::parse`], but additionally given the volume's first FAT
    /// sector so a boot sector lacking the `0x55 0xAA` signature can still be
    /// recognized as a PC-DOS 1.0 image (SPEC_FULL.md §2's "DOS 1.x
    /// heuristics"): those disks have no BPB, so the only way to confirm the
    /// guess is to check the FAT ID byte repeated at the head of the FAT.
    pub fn parse_with_fat_hint(sector: &[u8], fat_sector: Option<&[u8]>) -> Result<Self> {
        if sector.len() < 512 {
            return Err(Error::Corruption(Corruption::LengthMismatch));
        }
        if sector[BOOT_SIG_OFFSET] != 0x55 || sector[BOOT_SIG_OFFSET + 1] != 0xAA {
            if let Some(fat_sector) = fat_sector {
                if let Some(bpb) = Self::try_dos1x(sector, fat_sector) {
                    return Ok(bpb);
                }
            }
            return Err(Error::UnknownFormat);
        }

        let basic = BasicBpb::parse(&sector[0..BasicBpb::LEN]);
        let tail = &sector[BasicBpb::LEN..];

        // FAT32 never reuses fat_sz16; it is the one field that
        // unambiguously distinguishes the two tail shapes.
        let extended = if basic.fat_sz16 == 0 {
            ExtendedBpb::Fat32(Bpb32::parse(&tail[..Bpb32::LEN]))
        } else {
            ExtendedBpb::Fat1216(Bpb1216::parse(&tail[..Bpb1216::LEN]))
        };

        let version = match &extended {
            ExtendedBpb::Fat1216(b) => match b.bs_boot_sig {
                0x29 => BpbVersion::Ext29,
                0x28 => BpbVersion::Ext28,
                _ if basic.tot_sec16 == 0 && basic.tot_sec32 != 0 => BpbVersion::Dos331,
                _ => BpbVersion::Dos20,
            },
            ExtendedBpb::Fat32(b) if b.bs_boot_sig == 0x29 => BpbVersion::Fat32Ebpb29,
            ExtendedBpb::Fat32(_) => BpbVersion::Fat32Ebpb28,
        };

        let bpb = Self { basic, extended, version };
        if !bpb.is_valid() {
            return Err(Error::BogusFormat);
        }
        Ok(bpb)
    }

    /// Recognize a PC-DOS 1.0 boot sector: a `0xEB` short jump (second byte
    /// in `0x2F..0x80`, third byte not a `nop`) followed by zero padding up
    /// to the jump target, with the first FAT sector starting `FE/FF FF FF`
    /// (the FAT ID byte doubling as the media byte, repeated twice more).
    /// There is no BPB to read, so geometry is the fixed layout the format
    /// always used: 512-byte sectors, 2 FATs of 1 sector each, a 512-entry
    /// root directory, and a cluster size of 1 or 2 sectors depending on
    /// whether the media byte says single- or double-sided.
    fn try_dos1x(boot: &[u8], fat_sector: &[u8]) -> Option<Self> {
        if boot.len() < BasicBpb::LEN || fat_sector.len() < 3 {
            return None;
        }
        if boot[0] != 0xEB || boot[1] < 0x2F || boot[1] >= 0x80 || boot[2] == 0x90 {
            return None;
        }
        let off_jump = 2u32 + boot[1] as u32;
        let off_first_zero = 2 + 3 * 2 + 9; // jmp + 3 words + 9-byte build date
        if off_jump <= off_first_zero {
            return None;
        }
        let zero_len = (off_jump - off_first_zero).min(BasicBpb::LEN as u32 - off_first_zero) as usize;
        let pad_start = off_first_zero as usize;
        if !boot[pad_start..pad_start + zero_len].iter().all(|&b| b == 0) {
            return None;
        }

        let media = fat_sector[0];
        if (media != 0xFE && media != 0xFF) || fat_sector[1] != 0xFF || fat_sector[2] != 0xFF {
            return None;
        }

        let sec_per_clus: u8 = if media == 0xFE { 2 } else { 1 };
        let total_size: u32 = if media == 0xFE { 8 * 1 * 40 * 512 } else { 8 * 2 * 40 * 512 };
        let basic = BasicBpb {
            bs_jmp_boot: [boot[0], boot[1], boot[2]],
            bs_oem_name: [0; 8],
            byts_per_sec: 512,
            sec_per_clus,
            rsvd_sec_cnt: 1,
            num_fats: 2,
            root_ent_cnt: 512,
            tot_sec16: (total_size / 512) as u16,
            media,
            fat_sz16: 1,
            sec_per_trk: 0,
            num_heads: 0,
            hidd_sec: 0,
            tot_sec32: 0,
        };
        let extended = ExtendedBpb::Fat1216(Bpb1216 {
            bs_drv_num: 0,
            bs_reserved1: 0,
            bs_boot_sig: 0,
            bs_vol_id: 0,
            bs_vol_lab: [crate::SPACE; 11],
            bs_fil_sys_type: *b"FAT12   ",
        });
        let bpb = Self { basic, extended, version: BpbVersion::NoBpb };
        if !bpb.is_valid() {
            return None;
        }
        Some(bpb)
    }

    /// Read and parse sector 0 of `store`, falling back to the DOS 1.x
    /// heuristic (which needs the first FAT sector too) when the normal boot
    /// signature is absent.
    pub fn read_from(store: &dyn BackingStore, bytes_per_sector_hint: usize) -> Result<Self> {
        let mut sector = alloc::vec![0u8; bytes_per_sector_hint.max(512)];
        store.read_at(0, &mut sector)?;
        if sector[BOOT_SIG_OFFSET] == 0x55 && sector[BOOT_SIG_OFFSET + 1] == 0xAA {
            return Self::parse(&sector);
        }
        let mut fat_sector = alloc::vec![0u8; 512];
        store.read_at(512, &mut fat_sector)?;
        Self::parse_with_fat_hint(&sector, Some(&fat_sector))
    }

    fn fat_sz(&self) -> u64 {
        if self.basic.fat_sz16 != 0 {
            self.basic.fat_sz16 as u64
        } else {
            match &self.extended {
                ExtendedBpb::Fat32(b) => b.fat_sz32 as u64,
                ExtendedBpb::Fat1216(_) => 0,
            }
        }
    }

    fn tot_sec(&self) -> u64 {
        if self.basic.tot_sec16 != 0 {
            self.basic.tot_sec16 as u64
        } else {
            self.basic.tot_sec32 as u64
        }
    }

    pub fn bytes_per_sector(&self) -> u32 {
        self.basic.byts_per_sec as u32
    }

    pub fn sectors_per_cluster(&self) -> u32 {
        self.basic.sec_per_clus as u32
    }

    pub fn cluster_size(&self) -> u32 {
        self.bytes_per_sector() * self.sectors_per_cluster()
    }

    pub fn fat_cnt(&self) -> usize {
        self.basic.num_fats as usize
    }

    pub fn reserved_sector_cnt(&self) -> u32 {
        self.basic.rsvd_sec_cnt as u32
    }

    pub fn fat_size_sectors(&self) -> u64 {
        self.fat_sz()
    }

    pub fn fat_size_bytes(&self) -> u64 {
        self.fat_sz() * self.bytes_per_sector() as u64
    }

    /// Byte offset of the start of each FAT copy.
    pub fn fat_offsets(&self) -> Vec<u64> {
        let base = self.reserved_sector_cnt() as u64 * self.bytes_per_sector() as u64;
        let stride = self.fat_size_bytes();
        (0..self.fat_cnt() as u64)
            .map(|i| base + i * stride)
            .collect()
    }

    /// Sectors occupied by the FAT12/16 fixed-size root directory. Zero on
    /// FAT32, where the root is an ordinary cluster chain.
    pub fn root_dir_sector_cnt(&self) -> u64 {
        let bytes = self.basic.root_ent_cnt as u64 * 32;
        bytes.div_ceil(self.bytes_per_sector() as u64)
    }

    /// Byte offset of the FAT12/16 root directory region. Meaningless for
    /// FAT32.
    pub fn root_dir_offset(&self) -> u64 {
        let fat_region_sectors = self.fat_cnt() as u64 * self.fat_size_sectors();
        (self.reserved_sector_cnt() as u64 + fat_region_sectors) * self.bytes_per_sector() as u64
    }

    pub fn first_data_sector(&self) -> u64 {
        self.reserved_sector_cnt() as u64
            + self.fat_cnt() as u64 * self.fat_size_sectors()
            + self.root_dir_sector_cnt()
    }

    pub fn first_data_offset(&self) -> u64 {
        self.first_data_sector() * self.bytes_per_sector() as u64
    }

    /// Byte offset of the first byte of `cluster`. `cluster` must be >= 2.
    pub fn cluster_offset(&self, cluster: u32) -> u64 {
        assert!(cluster >= 2);
        self.first_data_offset() + (cluster as u64 - 2) * self.cluster_size() as u64
    }

    pub fn data_sector_cnt(&self) -> u64 {
        self.tot_sec()
            - self.reserved_sector_cnt() as u64
            - self.fat_cnt() as u64 * self.fat_size_sectors()
            - self.root_dir_sector_cnt()
    }

    /// Count of usable data clusters (cluster numbers start at 2).
    pub fn data_cluster_cnt(&self) -> u32 {
        (self.data_sector_cnt() / self.sectors_per_cluster() as u64) as u32
    }

    pub fn fat_type(&self) -> FatType {
        FatType::from_cluster_count(self.data_cluster_cnt())
    }

    /// Root directory first cluster. Only meaningful on FAT32.
    pub fn root_cluster(&self) -> Option<u32> {
        match &self.extended {
            ExtendedBpb::Fat32(b) => Some(b.root_clus),
            ExtendedBpb::Fat1216(_) => None,
        }
    }

    pub fn fsinfo_sector(&self) -> Option<u16> {
        match &self.extended {
            ExtendedBpb::Fat32(b) if b.fs_info != 0 && b.fs_info != 0xFFFF => Some(b.fs_info),
            _ => None,
        }
    }

    pub fn fat_mirroring_disabled(&self) -> bool {
        matches!(&self.extended, ExtendedBpb::Fat32(b) if b.single_fat_active())
    }

    pub fn active_fat_index(&self) -> usize {
        match &self.extended {
            ExtendedBpb::Fat32(b) if b.single_fat_active() => b.active_fat_index(),
            _ => 0,
        }
    }

    /// `BS_VolLab`/`BS_VolLab32`: the 11-byte space-padded volume label
    /// recorded in the boot sector. Distinct from (and not kept in sync
    /// with) a `VOLUME_ID` entry in the root directory.
    pub fn volume_label(&self) -> [u8; 11] {
        match &self.extended {
            ExtendedBpb::Fat1216(b) => b.bs_vol_lab,
            ExtendedBpb::Fat32(b) => b.bs_vol_lab,
        }
    }

    /// `BS_VolID`/`BS_VolID32`: the volume serial number stamped at format time.
    pub fn serial_number(&self) -> u32 {
        match &self.extended {
            ExtendedBpb::Fat1216(b) => b.bs_vol_id,
            ExtendedBpb::Fat32(b) => b.bs_vol_id,
        }
    }

    /// `BS_FilSysType`/`BS_FilSysType32`: an 8-byte informational string
    /// ("FAT12   ", "FAT16   ", "FAT32   "). Not authoritative -- FAT width
    /// is always derived from [`Self::fat_type`] instead.
    pub fn fs_type_string(&self) -> [u8; 8] {
        match &self.extended {
            ExtendedBpb::Fat1216(b) => b.bs_fil_sys_type,
            ExtendedBpb::Fat32(b) => b.bs_fil_sys_type,
        }
    }

    /// Gross structural sanity the original source checks before trusting
    /// a boot sector: consistent FAT-width field usage and nonzero sizes.
    pub fn is_valid(&self) -> bool {
        if self.basic.byts_per_sec == 0 || !self.basic.byts_per_sec.is_power_of_two() {
            return false;
        }
        if self.basic.sec_per_clus == 0 || !self.basic.sec_per_clus.is_power_of_two() {
            return false;
        }
        if self.fat_sz() == 0 || self.tot_sec() == 0 {
            return false;
        }
        match &self.extended {
            ExtendedBpb::Fat32(_) => self.basic.root_ent_cnt == 0 && self.basic.tot_sec16 == 0,
            ExtendedBpb::Fat1216(_) => self.basic.root_ent_cnt != 0,
        }
    }
}

/// FAT32's FSInfo sector: a cross-mount cache of the free-cluster count and
/// allocation hint (SPEC_FULL.md §10.6). Absent on FAT12/16.
#[derive(Debug, Clone, Copy)]
pub struct FsInfo {
    pub free_count: u32,
    pub nxt_free: u32,
}

impl FsInfo {
    pub const UNKNOWN: u32 = 0xFFFF_FFFF;

    pub fn parse(sector: &[u8]) -> Result<Self> {
        if sector.len() < 512 {
            return Err(Error::Corruption(Corruption::LengthMismatch));
        }
        let lead_sig = read_le_u32(&sector[0..4]);
        let struc_sig = read_le_u32(&sector[484..488]);
        let trail_sig = read_le_u32(&sector[508..512]);
        if lead_sig != LEAD_SIGNATURE || struc_sig != STRUCT_SIGNATURE || trail_sig != TRAIL_SIGNATURE
        {
            return Err(Error::Corruption(Corruption::InvalidSignature));
        }
        Ok(Self {
            free_count: read_le_u32(&sector[488..492]),
            nxt_free: read_le_u32(&sector[492..496]),
        })
    }

    /// Serialize into a fresh 512-byte sector image, zeroing reserved areas.
    pub fn to_sector(&self) -> Vec<u8> {
        let mut sector = alloc::vec![0u8; 512];
        sector[0..4].copy_from_slice(&LEAD_SIGNATURE.to_le_bytes());
        sector[484..488].copy_from_slice(&STRUCT_SIGNATURE.to_le_bytes());
        sector[488..492].copy_from_slice(&self.free_count.to_le_bytes());
        sector[492..496].copy_from_slice(&self.nxt_free.to_le_bytes());
        sector[508..512].copy_from_slice(&TRAIL_SIGNATURE.to_le_bytes());
        sector
    }

    pub fn free_cluster_cnt(&self) -> Option<u32> {
        if self.free_count == Self::UNKNOWN {
            None
        } else {
            Some(self.free_count)
        }
    }

    pub fn next_free_cluster(&self) -> Option<u32> {
        if self.nxt_free == Self::UNKNOWN {
            None
        } else {
            Some(self.nxt_free)
        }
    }

    pub fn set_free_clusters(&mut self, count: u32) {
        self.free_count = count;
    }

    pub fn set_next_free_cluster(&mut self, cluster: u32) {
        self.nxt_free = cluster;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fat16_sector() -> Vec<u8> {
        let mut s = alloc::vec![0u8; 512];
        s[11..13].copy_from_slice(&512u16.to_le_bytes()); // byts_per_sec
        s[13] = 4; // sec_per_clus
        s[14..16].copy_from_slice(&1u16.to_le_bytes()); // rsvd_sec_cnt
        s[16] = 2; // num_fats
        s[17..19].copy_from_slice(&512u16.to_le_bytes()); // root_ent_cnt
        s[19..21].copy_from_slice(&20000u16.to_le_bytes()); // tot_sec16
        s[21] = 0xF8;
        s[22..24].copy_from_slice(&32u16.to_le_bytes()); // fat_sz16
        s[510] = 0x55;
        s[511] = 0xAA;
        s
    }

    #[test]
    fn parses_fat16_geometry() {
        let bpb = BiosParameterBlock::parse(&sample_fat16_sector()).unwrap();
        assert!(matches!(bpb.extended, ExtendedBpb::Fat1216(_)));
        assert_eq!(bpb.bytes_per_sector(), 512);
        assert_eq!(bpb.root_dir_sector_cnt(), 32);
        assert_eq!(bpb.fat_type(), FatType::Fat16);
    }

    #[test]
    fn rejects_missing_boot_signature() {
        let mut s = sample_fat16_sector();
        s[511] = 0x00;
        assert_eq!(BiosParameterBlock::parse(&s).unwrap_err(), Error::UnknownFormat);
    }

    #[test]
    fn fat16_without_extended_signature_is_tagged_dos20() {
        let bpb = BiosParameterBlock::parse(&sample_fat16_sector()).unwrap();
        assert_eq!(bpb.version, BpbVersion::Dos20);
    }

    #[test]
    fn extended_boot_signature_0x29_is_tagged_ext29() {
        let mut s = sample_fat16_sector();
        s[38] = 0x29; // bs_boot_sig, offset 36 + 2
        let bpb = BiosParameterBlock::parse(&s).unwrap();
        assert_eq!(bpb.version, BpbVersion::Ext29);
    }

    /// A PC-DOS 1.0 boot sector: no BPB at all, recognized by the short jmp
    /// plus build-date shape and confirmed via the FAT ID byte.
    fn dos1x_images(media: u8) -> (Vec<u8>, Vec<u8>) {
        let mut boot = alloc::vec![0u8; 512];
        boot[0] = 0xEB;
        boot[1] = 0x3C;
        boot[2] = 0x00;
        let mut fat = alloc::vec![0u8; 512];
        fat[0] = media;
        fat[1] = 0xFF;
        fat[2] = 0xFF;
        (boot, fat)
    }

    #[test]
    fn dos1x_single_sided_floppy_geometry() {
        let (boot, fat) = dos1x_images(0xFE);
        let bpb = BiosParameterBlock::parse_with_fat_hint(&boot, Some(&fat)).unwrap();
        assert_eq!(bpb.version, BpbVersion::NoBpb);
        assert_eq!(bpb.bytes_per_sector(), 512);
        assert_eq!(bpb.cluster_size(), 1024);
        assert_eq!(bpb.fat_cnt(), 2);
        assert_eq!(bpb.fat_type(), FatType::Fat12);
    }

    #[test]
    fn dos1x_double_sided_floppy_geometry() {
        let (boot, fat) = dos1x_images(0xFF);
        let bpb = BiosParameterBlock::parse_with_fat_hint(&boot, Some(&fat)).unwrap();
        assert_eq!(bpb.version, BpbVersion::NoBpb);
        assert_eq!(bpb.cluster_size(), 512);
        assert_eq!(bpb.fat_type(), FatType::Fat12);
    }

    #[test]
    fn dos1x_without_fat_hint_is_unknown_format() {
        let (boot, _fat) = dos1x_images(0xFE);
        assert_eq!(BiosParameterBlock::parse(&boot).unwrap_err(), Error::UnknownFormat);
    }

    #[test]
    fn dos1x_rejects_wrong_fat_id_bytes() {
        let (boot, mut fat) = dos1x_images(0xFE);
        fat[1] = 0x00;
        assert_eq!(
            BiosParameterBlock::parse_with_fat_hint(&boot, Some(&fat)).unwrap_err(),
            Error::UnknownFormat
        );
    }

    #[test]
    fn fsinfo_round_trips() {
        let mut info = FsInfo { free_count: 100, nxt_free: 3 };
        let sector = info.to_sector();
        let parsed = FsInfo::parse(&sector).unwrap();
        assert_eq!(parsed.free_cluster_cnt(), Some(100));
        info.set_free_clusters(200);
        assert_eq!(info.free_count, 200);
    }
}
