//! Directory engine (component F): 8.3/LFN encoding and decoding, entry
//! lookup, short-name generation, entry creation and the synthetic `.`/`..`
//! read iteration (SPEC_FULL.md §4.6).
//!
//! This module owns slot-level bookkeeping only. The cluster chain for a
//! *new file's own data* is allocated by the caller (the VFS layer,
//! [`crate::vfs`]) before [`DirEngine::create_entry`] is called -- the
//! engine only ever allocates clusters to grow *its own* directory listing.

use alloc::string::String;
use alloc::vec::Vec;

use crate::cp437;
use crate::dirbuf::DirBuffer;
use crate::entry::{pack_lfn_chunk, LongDirEntry, ShortDirEntry};
use crate::error::{Error, Result};
use crate::fat::FatCache;
use crate::{
    ATTR_LONG_NAME, ATTR_VOLUME_ID, DIRENT_SIZE, DIR_ENTRY_LAST_AND_UNUSED, DIR_ENTRY_UNUSED, SPACE,
};

/// Convert a plain name to its padded 11-byte 8.3 form, or `None` if the
/// name cannot be represented that way at all (SPEC_FULL.md §4.6.1).
pub fn to_8dot3(name: &str) -> Option<[u8; 11]> {
    let chars: Vec<char> = name.chars().collect();
    if chars.is_empty() || chars.len() > 12 {
        return None;
    }
    let dot_idx = chars.iter().position(|&c| c == '.');
    let (base, ext) = match dot_idx {
        None => (&chars[..], &chars[chars.len()..]),
        Some(i) => (&chars[..i], &chars[i + 1..]),
    };
    if base.is_empty() || base.len() > 8 || ext.len() > 3 {
        return None;
    }
    if ext.iter().any(|&c| c == '.') {
        return None;
    }
    let mut out = [SPACE; 11];
    for (i, &c) in base.iter().enumerate() {
        out[i] = cp437_8_3_byte(c)?;
    }
    for (i, &c) in ext.iter().enumerate() {
        out[8 + i] = cp437_8_3_byte(c)?;
    }
    if out[0] == 0xE5 {
        out[0] = 0x05;
    }
    Some(out)
}

fn cp437_8_3_byte(c: char) -> Option<u8> {
    let byte = cp437::valid_in_8_3(c.to_ascii_uppercase() as u32);
    if byte == cp437::INVALID || byte == cp437::LFN_ONLY {
        None
    } else {
        Some(byte as u8)
    }
}

/// Whether `base`/`ext` (the two dot-separated segments of a plain-ASCII
/// name already known to satisfy [`to_8dot3`]) each use a single case
/// throughout, and if so which case-flag bits (byte 12) capture it. `None`
/// means the segment mixes upper- and lower-case letters and therefore
/// needs an LFN to be represented losslessly.
fn case_flags_for(name: &str) -> Option<u8> {
    let (base, ext) = match name.find('.') {
        Some(i) => (&name[..i], &name[i + 1..]),
        None => (name, ""),
    };
    let base_lower = case_uniform(base)?;
    let ext_lower = case_uniform(ext)?;
    let mut flags = 0u8;
    if base_lower {
        flags |= 0x08;
    }
    if ext_lower {
        flags |= 0x10;
    }
    Some(flags)
}

fn case_uniform(segment: &str) -> Option<bool> {
    let has_lower = segment.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = segment.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        None
    } else {
        Some(has_lower)
    }
}

/// True if `name` needs an LFN (cannot round-trip through a bare 8.3
/// entry plus its case-flag byte).
pub fn needs_lfn(name: &str, short: Option<&[u8; 11]>) -> bool {
    short.is_none() || case_flags_for(name).is_none()
}

/// Accumulates LFN continuation slots into a decoded name while a
/// directory scan walks backwards-to-forwards through a slot group.
struct LfnAccumulator {
    expected_next: u8,
    checksum: u8,
    units: Vec<u16>,
}

impl LfnAccumulator {
    fn start(slot: &LongDirEntry) -> Self {
        let order = slot.order();
        let mut units = alloc::vec![0u16; order as usize * 13];
        let idx = (order as usize - 1) * 13;
        units[idx..idx + 13].copy_from_slice(&slot.raw_name_units());
        Self {
            expected_next: order - 1,
            checksum: slot.checksum(),
            units,
        }
    }

    fn accept(&mut self, slot: &LongDirEntry) -> bool {
        if slot.is_last_slot() || slot.order() != self.expected_next || slot.checksum() != self.checksum {
            return false;
        }
        let idx = (slot.order() as usize - 1) * 13;
        self.units[idx..idx + 13].copy_from_slice(&slot.raw_name_units());
        self.expected_next -= 1;
        true
    }

    fn complete(&self) -> bool {
        self.expected_next == 0
    }

    fn decode(&self) -> String {
        let trimmed: Vec<u16> = self
            .units
            .iter()
            .copied()
            .take_while(|&u| u != 0x0000 && u != 0xFFFF)
            .collect();
        String::from_utf16_lossy(&trimmed)
    }
}

/// Result of a successful [`DirEngine::find_entry`].
pub struct FoundEntry {
    /// Byte offset of the short entry itself.
    pub sde_offset: u64,
    /// Number of LFN slots immediately preceding the short entry (0 if none).
    pub lfn_slot_count: usize,
    pub sde: ShortDirEntry,
    pub long_name: Option<String>,
}

/// One directory's slot-level view: lookup, creation, growth, and
/// `.`/`..`-synthesizing iteration, layered over a [`DirBuffer`].
pub struct DirEngine {
    buffer: DirBuffer,
    entry_count: usize,
    cluster_size: u32,
}

impl DirEngine {
    pub fn new(buffer: DirBuffer, cluster_size: u32) -> Self {
        let entry_count = (buffer.len() / DIRENT_SIZE as u64) as usize;
        Self {
            buffer,
            entry_count,
            cluster_size,
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    fn total_bytes(&self) -> u64 {
        self.entry_count as u64 * DIRENT_SIZE as u64
    }

    fn read_raw(&mut self, offset: u64) -> Result<[u8; DIRENT_SIZE]> {
        let v = self.buffer.read_at(offset, DIRENT_SIZE)?;
        let mut out = [0u8; DIRENT_SIZE];
        out.copy_from_slice(&v);
        Ok(out)
    }

    /// §4.6.3: look up `name`, trying an exact 8.3 match first and an LFN
    /// group decode second.
    pub fn find_entry(&mut self, name: &str) -> Result<Option<FoundEntry>> {
        let want_short = to_8dot3(name);
        let mut acc: Option<LfnAccumulator> = None;
        let mut offset = 0u64;
        while offset < self.total_bytes() {
            let raw = self.read_raw(offset)?;
            if raw[0] == DIR_ENTRY_UNUSED {
                acc = None;
                offset += DIRENT_SIZE as u64;
                continue;
            }
            if raw[0] == DIR_ENTRY_LAST_AND_UNUSED {
                return Ok(None);
            }
            if raw[11] == ATTR_LONG_NAME {
                let slot = LongDirEntry::from_bytes(&raw);
                if slot.is_last_slot() {
                    acc = Some(LfnAccumulator::start(&slot));
                } else if let Some(a) = acc.as_mut() {
                    if !a.accept(&slot) {
                        acc = None;
                    }
                }
                offset += DIRENT_SIZE as u64;
                continue;
            }

            let sde = ShortDirEntry::from_bytes(&raw);
            if !sde.is_volume_id() {
                if let Some(short) = want_short {
                    let mut candidate = sde.name;
                    if candidate[0] == 0x05 {
                        candidate[0] = 0xE5;
                    }
                    if candidate == short {
                        return Ok(Some(FoundEntry {
                            sde_offset: offset,
                            lfn_slot_count: 0,
                            sde,
                            long_name: None,
                        }));
                    }
                }
                if let Some(a) = &acc {
                    if a.complete() && a.checksum == sde.checksum() {
                        let decoded = a.decode();
                        if decoded.eq_ignore_ascii_case(name) {
                            let slot_count = decoded_slot_count(&decoded);
                            return Ok(Some(FoundEntry {
                                sde_offset: offset,
                                lfn_slot_count: slot_count,
                                sde,
                                long_name: Some(decoded),
                            }));
                        }
                    }
                }
            }
            acc = None;
            offset += DIRENT_SIZE as u64;
        }
        Ok(None)
    }

    fn short_name_exists(&mut self, candidate: &[u8; 11]) -> Result<bool> {
        let mut offset = 0u64;
        while offset < self.total_bytes() {
            let raw = self.read_raw(offset)?;
            if raw[0] == DIR_ENTRY_LAST_AND_UNUSED {
                return Ok(false);
            }
            if raw[0] != DIR_ENTRY_UNUSED && raw[11] != ATTR_LONG_NAME && &raw[0..11] == candidate {
                return Ok(true);
            }
            offset += DIRENT_SIZE as u64;
        }
        Ok(false)
    }

    /// §4.6.4: generate a unique 8.3 alias for a long name, escalating
    /// through the three templates the spec names.
    fn generate_short_name(&mut self, long_name: &str) -> Result<[u8; 11]> {
        let (raw_base, raw_ext) = split_base_ext(long_name);
        let base = lossy_8_3_chars(&raw_base, 8);
        let ext = lossy_8_3_chars(&raw_ext, 3);

        for n in 1u32..=9 {
            let candidate = build_candidate(&base, 6, &alloc::format!("~{}", n), &ext);
            if !self.short_name_exists(&candidate)? {
                return Ok(candidate);
            }
        }
        for n in 10u32..=99 {
            let candidate = build_candidate(&base, 5, &alloc::format!("~{}", n), &ext);
            if !self.short_name_exists(&candidate)? {
                return Ok(candidate);
            }
        }
        for n in 0u32..8192 {
            let candidate = build_candidate(&base, 2, &alloc::format!("~{:05X}", n & 0xFFFFF), &ext);
            if !self.short_name_exists(&candidate)? {
                return Ok(candidate);
            }
        }
        Err(Error::AlreadyExists)
    }

    /// §4.6.5: build and insert the directory entry (or entries, if an LFN
    /// is required) for `name`. The caller has already allocated
    /// `first_cluster`'s chain (empty/0 if `file_size` is 0).
    #[allow(clippy::too_many_arguments)]
    pub fn create_entry(
        &mut self,
        fat: &mut FatCache,
        name: &str,
        attr: u8,
        first_cluster: u32,
        file_size: u32,
        create_date: u16,
        create_time: u16,
        create_tenths: u8,
    ) -> Result<(u64, usize, ShortDirEntry)> {
        if name == "." || name == ".." {
            return Err(Error::InvalidName);
        }
        let short = to_8dot3(name);
        let use_lfn = needs_lfn(name, short.as_ref());

        let (sde_name, case_flags) = if use_lfn {
            (self.generate_short_name(name)?, 0u8)
        } else {
            (short.unwrap(), case_flags_for(name).unwrap_or(0))
        };

        let mut sde = ShortDirEntry::new(sde_name, attr, first_cluster);
        sde.nt_res = case_flags;
        sde.set_create_datetime(create_date, create_time, create_tenths);
        sde.set_write_datetime(create_date, create_time);
        sde.set_last_access_date(create_date);
        sde.set_file_size(file_size);

        let mut lfn_slots: Vec<LongDirEntry> = Vec::new();
        if use_lfn {
            for c in name.chars() {
                if !cp437::valid_in_lfn(c as u32) {
                    return Err(Error::InvalidName);
                }
            }
            let units: Vec<u16> = name.encode_utf16().collect();
            if units.len() > 255 {
                return Err(Error::FilenameTooLong);
            }
            let checksum = sde.checksum();
            let chunks: Vec<&[u16]> = units.chunks(13).collect();
            let slot_count = chunks.len().max(1);
            for (i, chunk) in chunks.iter().enumerate() {
                let order = (i + 1) as u8;
                let packed = pack_lfn_chunk(chunk);
                lfn_slots.push(LongDirEntry::new(order, i + 1 == slot_count, &packed, checksum));
            }
            if chunks.is_empty() {
                lfn_slots.push(LongDirEntry::new(1, true, &pack_lfn_chunk(&[]), checksum));
            }
            lfn_slots.reverse(); // highest-order slot is written first, nearest the start
        }

        let needed = lfn_slots.len() + 1;
        let start = self.find_free_run(fat, needed)?;

        let mut offset = start;
        for slot in &lfn_slots {
            if let Err(e) = self.buffer.write_at(offset, &slot.to_bytes()) {
                self.invalidate_partial(start, offset);
                return Err(e);
            }
            offset += DIRENT_SIZE as u64;
        }
        if let Err(e) = self.buffer.write_at(offset, &sde.to_bytes()) {
            self.invalidate_partial(start, offset);
            return Err(e);
        }
        Ok((offset, lfn_slots.len(), sde))
    }

    fn invalidate_partial(&mut self, start: u64, up_to: u64) {
        let mut offset = start;
        while offset < up_to {
            let _ = self.buffer.write_at(offset, &[DIR_ENTRY_UNUSED]);
            offset += DIRENT_SIZE as u64;
        }
    }

    /// Mark the short entry at `sde_offset` and its `lfn_slot_count`
    /// preceding LFN slots as deleted (0xE5).
    pub fn delete_entry(&mut self, sde_offset: u64, lfn_slot_count: usize) -> Result<()> {
        self.buffer.write_at(sde_offset, &[DIR_ENTRY_UNUSED])?;
        let mut offset = sde_offset;
        for _ in 0..lfn_slot_count {
            offset -= DIRENT_SIZE as u64;
            self.buffer.write_at(offset, &[DIR_ENTRY_UNUSED])?;
        }
        Ok(())
    }

    /// Rewrite the size and first-cluster fields of the short entry at
    /// `sde_offset` -- the directory-entry half of [`crate::file`]'s
    /// `set_size`/flush path.
    pub fn update_entry_size_cluster(&mut self, sde_offset: u64, size: u32, first_cluster: u32) -> Result<()> {
        let raw = self.read_raw(sde_offset)?;
        let mut sde = ShortDirEntry::from_bytes(&raw);
        sde.set_file_size(size);
        sde.set_first_cluster(first_cluster);
        self.buffer.write_at(sde_offset, &sde.to_bytes())
    }

    /// Rewrite the attribute byte of the short entry at `sde_offset`.
    pub fn update_entry_attr(&mut self, sde_offset: u64, attr: u8) -> Result<()> {
        let raw = self.read_raw(sde_offset)?;
        let mut sde = ShortDirEntry::from_bytes(&raw);
        sde.attr = attr;
        self.buffer.write_at(sde_offset, &sde.to_bytes())
    }

    /// Rewrite the write-timestamp and last-access-date fields of the short
    /// entry at `sde_offset`.
    pub fn update_entry_times(
        &mut self,
        sde_offset: u64,
        write_date: u16,
        write_time: u16,
        access_date: u16,
    ) -> Result<()> {
        let raw = self.read_raw(sde_offset)?;
        let mut sde = ShortDirEntry::from_bytes(&raw);
        sde.set_write_datetime(write_date, write_time);
        sde.set_last_access_date(access_date);
        self.buffer.write_at(sde_offset, &sde.to_bytes())
    }

    fn find_free_run(&mut self, fat: &mut FatCache, needed: usize) -> Result<u64> {
        loop {
            if let Some(start) = self.scan_free_run(needed)? {
                return Ok(start);
            }
            if self.buffer.is_fixed_region() || self.entry_count >= 65536 {
                return Err(Error::DiskFull);
            }
            self.grow(fat, needed)?;
        }
    }

    fn scan_free_run(&mut self, needed: usize) -> Result<Option<u64>> {
        let total = self.total_bytes();
        let mut run_start: Option<u64> = None;
        let mut run_len = 0usize;
        let mut offset = 0u64;
        while offset < total {
            let raw = self.read_raw(offset)?;
            if raw[0] == DIR_ENTRY_LAST_AND_UNUSED {
                let start = run_start.unwrap_or(offset);
                let available = ((total - start) / DIRENT_SIZE as u64) as usize;
                return Ok(if available >= needed { Some(start) } else { None });
            } else if raw[0] == DIR_ENTRY_UNUSED {
                if run_start.is_none() {
                    run_start = Some(offset);
                }
                run_len += 1;
                if run_len >= needed {
                    return Ok(run_start);
                }
            } else {
                run_start = None;
                run_len = 0;
            }
            offset += DIRENT_SIZE as u64;
        }
        Ok(None)
    }

    /// §4.6.6: allocate enough clusters to cover `min_new_entries` and
    /// append them to the directory's own chain, zero-filling each on disk
    /// before linking it in.
    fn grow(&mut self, fat: &mut FatCache, min_new_entries: usize) -> Result<()> {
        if self.buffer.is_fixed_region() {
            return Err(Error::NotSupported);
        }
        let needed_bytes = (min_new_entries * DIRENT_SIZE) as u64;
        let clusters_needed = core::cmp::max(1, needed_bytes.div_ceil(self.cluster_size as u64)) as usize;
        for _ in 0..clusters_needed {
            let prev = self.buffer.last_cluster();
            let new_cluster = fat.allocate(prev)?;
            self.buffer.zero_fill_cluster(new_cluster, self.cluster_size)?;
            self.buffer.append_cluster(new_cluster)?;
        }
        self.entry_count = (self.buffer.len() / DIRENT_SIZE as u64) as usize;
        Ok(())
    }

    fn first_two_entries_are_dot_slots(&mut self) -> Result<bool> {
        if self.entry_count < 2 {
            return Ok(false);
        }
        let e0 = self.read_raw(0)?;
        let e1 = self.read_raw(DIRENT_SIZE as u64)?;
        Ok(&e0[0..11] == b".          " && &e1[0..11] == b"..         ")
    }

    /// §4.6.7: iterate the directory, synthesizing `.` and `..` at offsets
    /// 0 and 1 regardless of on-disk content, and skipping real `.`/`..`
    /// entries exactly once if present. Returns `(name, entry, next_offset)`.
    pub fn read(
        &mut self,
        iter_offset: u64,
        dot_sde: &ShortDirEntry,
        dotdot_sde: &ShortDirEntry,
    ) -> Result<Option<(String, ShortDirEntry, u64)>> {
        if iter_offset == 0 {
            return Ok(Some((String::from("."), *dot_sde, 1)));
        }
        if iter_offset == 1 {
            return Ok(Some((String::from(".."), *dotdot_sde, 2)));
        }

        let mut offset = iter_offset - 2;
        if iter_offset == 2 && self.first_two_entries_are_dot_slots()? {
            offset = 2 * DIRENT_SIZE as u64;
        }

        loop {
            if offset >= self.total_bytes() {
                return Ok(None);
            }
            let raw = self.read_raw(offset)?;
            if raw[0] == DIR_ENTRY_LAST_AND_UNUSED {
                return Ok(None);
            }
            if raw[0] == DIR_ENTRY_UNUSED {
                offset += DIRENT_SIZE as u64;
                continue;
            }
            if raw[11] == ATTR_LONG_NAME {
                let first_slot = LongDirEntry::from_bytes(&raw);
                if !first_slot.is_last_slot() {
                    offset += DIRENT_SIZE as u64;
                    continue;
                }
                let group_start = offset;
                let mut acc = LfnAccumulator::start(&first_slot);
                let mut cursor = offset + DIRENT_SIZE as u64;
                let mut ok = true;
                while !acc.complete() {
                    if cursor >= self.total_bytes() {
                        ok = false;
                        break;
                    }
                    let raw2 = self.read_raw(cursor)?;
                    if raw2[11] != ATTR_LONG_NAME {
                        ok = false;
                        break;
                    }
                    let slot = LongDirEntry::from_bytes(&raw2);
                    if !acc.accept(&slot) {
                        ok = false;
                        break;
                    }
                    cursor += DIRENT_SIZE as u64;
                }
                if !ok || cursor >= self.total_bytes() {
                    offset = group_start + DIRENT_SIZE as u64;
                    continue;
                }
                let sde_raw = self.read_raw(cursor)?;
                let sde = ShortDirEntry::from_bytes(&sde_raw);
                if sde.is_deleted() || sde.is_volume_id() || sde.checksum() != acc.checksum {
                    offset = cursor + DIRENT_SIZE as u64;
                    continue;
                }
                let next = cursor + DIRENT_SIZE as u64 + 2;
                return Ok(Some((acc.decode(), sde, next)));
            }

            let sde = ShortDirEntry::from_bytes(&raw);
            if sde.is_volume_id() {
                offset += DIRENT_SIZE as u64;
                continue;
            }
            let name = display_8_3(&sde);
            let next = offset + DIRENT_SIZE as u64 + 2;
            return Ok(Some((name, sde, next)));
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.buffer.flush()
    }
}

fn decoded_slot_count(decoded: &str) -> usize {
    let units = decoded.encode_utf16().count().max(1);
    units.div_ceil(13)
}

fn split_base_ext(name: &str) -> (Vec<char>, Vec<char>) {
    let chars: Vec<char> = name.chars().collect();
    match chars.iter().rposition(|&c| c == '.') {
        Some(i) if i > 0 => (chars[..i].to_vec(), chars[i + 1..].to_vec()),
        _ => (chars, Vec::new()),
    }
}

/// Lossily transcode up to `max` code points into CP437 8.3-legal bytes,
/// substituting `_` for anything that can't be represented (SPEC_FULL.md
/// §4.6.4), dropping spaces and dots along the way.
fn lossy_8_3_chars(chars: &[char], max: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(max);
    for &c in chars {
        if out.len() >= max {
            break;
        }
        if c == ' ' || c == '.' {
            continue;
        }
        let byte = cp437::valid_in_8_3(c.to_ascii_uppercase() as u32);
        out.push(if byte == cp437::INVALID || byte == cp437::LFN_ONLY {
            b'_'
        } else {
            byte as u8
        });
    }
    out
}

fn build_candidate(base: &[u8], base_max: usize, suffix: &str, ext: &[u8]) -> [u8; 11] {
    let mut out = [SPACE; 11];
    let take = base.len().min(base_max);
    out[..take].copy_from_slice(&base[..take]);
    let mut pos = take;
    for b in suffix.bytes() {
        out[pos] = b;
        pos += 1;
    }
    for (i, &b) in ext.iter().take(3).enumerate() {
        out[8 + i] = b;
    }
    out
}

/// CP437-decode an 8.3 entry's name into display form ("NAME.EXT",
/// extension omitted if blank), honoring the case-flag byte and the
/// `0x05`-means-`0xE5` escape.
fn display_8_3(sde: &ShortDirEntry) -> String {
    let mut name = sde.name;
    if name[0] == 0x05 {
        name[0] = 0xE5;
    }
    let mut s = String::new();
    for &b in &name[0..8] {
        if b == SPACE {
            break;
        }
        let mut ch = char::from_u32(cp437::DISPLAY[b as usize] as u32).unwrap_or('_');
        if sde.nt_res & 0x08 != 0 {
            ch = ch.to_ascii_lowercase();
        }
        s.push(ch);
    }
    let ext: Vec<u8> = name[8..11].iter().copied().take_while(|&b| b != SPACE).collect();
    if !ext.is_empty() {
        s.push('.');
        for &b in &ext {
            let mut ch = char::from_u32(cp437::DISPLAY[b as usize] as u32).unwrap_or('_');
            if sde.nt_res & 0x10 != 0 {
                ch = ch.to_ascii_lowercase();
            }
            s.push(ch);
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BackingStore, MemoryBackingStore};
    use crate::dirbuf::DirExtent;
    use crate::fat::FatType;
    use crate::ATTR_ARCHIVE;
    use alloc::sync::Arc;

    fn fixed_engine(capacity_entries: usize) -> DirEngine {
        let store: Arc<dyn BackingStore> = Arc::new(MemoryBackingStore::new(1 << 20));
        let len = (capacity_entries * DIRENT_SIZE) as u64;
        let buffer = DirBuffer::new(
            store,
            DirExtent::FixedRegion { offset: 0, len },
            512,
            alloc::boxed::Box::new(|_| 0),
        )
        .unwrap();
        DirEngine::new(buffer, 512)
    }

    #[test]
    fn to_8dot3_accepts_and_rejects() {
        assert_eq!(to_8dot3("HELLO.TXT").unwrap(), *b"HELLO   TXT");
        assert!(to_8dot3("toolongname.txt").is_none());
        assert!(to_8dot3("hello.text").is_none()); // ext too long
        assert!(to_8dot3("").is_none());
    }

    #[test]
    fn short_entry_create_then_find() {
        let mut engine = fixed_engine(16);
        let mut fat = FatCache::new(
            Arc::new(MemoryBackingStore::new(1 << 20)),
            FatType::Fat12,
            alloc::vec![512],
            512,
            10,
            512,
            true,
            0,
        )
        .unwrap();
        let (offset, _, sde) = engine
            .create_entry(&mut fat, "HELLO.TXT", ATTR_ARCHIVE, 2, 100, 0x4000, 0, 0)
            .unwrap();
        assert_eq!(offset, 0);
        assert_eq!(sde.display_name(), "HELLO.TXT");

        let found = engine.find_entry("hello.txt").unwrap().unwrap();
        assert_eq!(found.sde_offset, 0);
        assert_eq!(found.lfn_slot_count, 0);
    }

    #[test]
    fn long_name_round_trips_through_lfn() {
        let mut engine = fixed_engine(16);
        let mut fat = FatCache::new(
            Arc::new(MemoryBackingStore::new(1 << 20)),
            FatType::Fat12,
            alloc::vec![512],
            512,
            10,
            512,
            true,
            0,
        )
        .unwrap();
        let name = "A long filename.txt";
        let (_offset, _lfn_slot_count, _sde) = engine
            .create_entry(&mut fat, name, ATTR_ARCHIVE, 2, 0, 0x4000, 0, 0)
            .unwrap();
        let found = engine.find_entry(name).unwrap().unwrap();
        assert_eq!(found.long_name.as_deref(), Some(name));
        assert_eq!(found.lfn_slot_count, 2);
    }

    #[test]
    fn dot_and_dotdot_are_synthetic_at_offsets_0_and_1() {
        let mut engine = fixed_engine(4);
        let dot = ShortDirEntry::new(*b".          ", crate::ATTR_DIRECTORY, 5);
        let dotdot = ShortDirEntry::new(*b"..         ", crate::ATTR_DIRECTORY, 0);
        let (name0, _, next0) = engine.read(0, &dot, &dotdot).unwrap().unwrap();
        assert_eq!(name0, ".");
        assert_eq!(next0, 1);
        let (name1, _, next1) = engine.read(1, &dot, &dotdot).unwrap().unwrap();
        assert_eq!(name1, "..");
        assert_eq!(next1, 2);
    }

    #[test]
    fn deleted_entry_is_skipped_on_relookup() {
        let mut engine = fixed_engine(16);
        let mut fat = FatCache::new(
            Arc::new(MemoryBackingStore::new(1 << 20)),
            FatType::Fat12,
            alloc::vec![512],
            512,
            10,
            512,
            true,
            0,
        )
        .unwrap();
        let (offset, _, _) = engine
            .create_entry(&mut fat, "GONE.TXT", ATTR_ARCHIVE, 2, 0, 0x4000, 0, 0)
            .unwrap();
        engine.delete_entry(offset, 0).unwrap();
        assert!(engine.find_entry("GONE.TXT").unwrap().is_none());
    }
}
