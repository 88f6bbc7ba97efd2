use crate::{format_capped_bytes, format_fourcc, read_array16, read_bytes, read_u16_be, read_u32_be, read_version_and_flags, write_version_and_flags, Mp4Error, Result};

use super::generic::{expect_header, Mp4Box};

/// Extended type of the PIFF sample encryption box, A2394F52-5A9B-4F14-A244-6C427C648DF4.
pub const PIFF_SAMPLE_ENCRYPTION: [u8; 16] = [
    0xA2, 0x39, 0x4F, 0x52, 0x5A, 0x9B, 0x4F, 0x14,
    0xA2, 0x44, 0x6C, 0x42, 0x7C, 0x64, 0x8D, 0xF4,
];

/// Per-sample entries carry a subsample table.
pub const PIFF_USE_SUBSAMPLES: u32 = 0x000002;

// Header bytes in front of the first entry: size, `uuid`, extended type, version/flags, count.
pub const PIFF_ENTRIES_OFFSET: usize = 8 + 16 + 4 + 4;

// The `PiffSampleEncryptionBox` struct represents the `uuid` box Smooth Streaming uses to carry
// per-sample IVs (and optionally subsample maps) ahead of the standard `senc` box.
//
// Fields:
// - `flags`: 0 or `PIFF_USE_SUBSAMPLES`; overriding the track defaults is not supported.
// - `sample_count`: number of entries.
// - `entries`: the raw entry bytes, exactly what ends up as auxiliary information.
#[derive(Clone, Default)]
pub struct PiffSampleEncryptionBox {
    pub flags: u32,
    pub sample_count: u32,
    pub entries: Vec<u8>,
}

impl PiffSampleEncryptionBox {
    pub fn uses_subsamples(&self) -> bool {
        self.flags & PIFF_USE_SUBSAMPLES != 0
    }

    /// Size in bytes of every sample's auxiliary record, given the IV size from `tenc`.
    pub fn sample_info_sizes(&self, iv_size: usize) -> Result<Vec<usize>> {
        let min_size = if self.uses_subsamples() { iv_size + 2 } else { iv_size };
        if (self.sample_count as u64) * (min_size as u64) > self.entries.len() as u64 {
            return Err(Mp4Error::malformed(format!(
                "{} samples do not fit in {} bytes of sample encryption entries",
                self.sample_count,
                self.entries.len()
            )));
        }
        let mut sizes = Vec::new();
        let mut offset = 0;
        for _ in 0..self.sample_count {
            let size = if self.uses_subsamples() {
                let subsample_count = read_u16_be(&self.entries, offset + iv_size)? as usize;
                iv_size + 2 + 6 * subsample_count
            } else {
                iv_size
            };
            sizes.push(size);
            offset += size;
        }
        if offset != self.entries.len() {
            return Err(Mp4Error::malformed(format!(
                "sample encryption entries cover {} bytes, box holds {}",
                offset,
                self.entries.len()
            )));
        }
        Ok(sizes)
    }
}

impl std::fmt::Debug for PiffSampleEncryptionBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiffSampleEncryptionBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("flags", &format!("0x{:06X}", self.flags))
            .field("sample_count", &self.sample_count)
            .field("entries", &format_capped_bytes(&self.entries))
            .finish()
    }
}

impl Mp4Box for PiffSampleEncryptionBox {
    fn box_type(&self) -> [u8; 4] { *b"uuid" }

    fn box_size(&self) -> u32 {
        (PIFF_ENTRIES_OFFSET + self.entries.len()) as u32
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        buffer.extend_from_slice(&PIFF_SAMPLE_ENCRYPTION);
        write_version_and_flags(buffer, 0, self.flags);
        buffer.extend_from_slice(&self.sample_count.to_be_bytes());
        buffer.extend_from_slice(&self.entries);
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"uuid")?;
        let body = &data[..header.end()];
        if read_array16(body, 8)? != PIFF_SAMPLE_ENCRYPTION {
            return Err(Mp4Error::malformed("uuid box is not a PIFF sample encryption box"));
        }
        let (_, flags) = read_version_and_flags(body, 24)?;
        if flags & !PIFF_USE_SUBSAMPLES != 0 {
            return Err(Mp4Error::unsupported(format!("PIFF sample encryption flags 0x{:06X}", flags)));
        }
        let sample_count = read_u32_be(body, 28)?;
        let entries = read_bytes(body, PIFF_ENTRIES_OFFSET, header.size.saturating_sub(PIFF_ENTRIES_OFFSET))?.to_vec();

        Ok((PiffSampleEncryptionBox { flags, sample_count, entries }, header.size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsample_entries_have_variable_size() {
        // sample 1: iv + 1 subsample, sample 2: iv + 2 subsamples
        let mut entries = vec![0u8; 8];
        entries.extend_from_slice(&1u16.to_be_bytes());
        entries.extend_from_slice(&[0; 6]);
        entries.extend_from_slice(&[0; 8]);
        entries.extend_from_slice(&2u16.to_be_bytes());
        entries.extend_from_slice(&[0; 12]);

        let senc = PiffSampleEncryptionBox { flags: PIFF_USE_SUBSAMPLES, sample_count: 2, entries };
        assert_eq!(senc.sample_info_sizes(8).unwrap(), vec![16, 22]);

        let mut out = Vec::new();
        senc.write_box(&mut out);
        let (parsed, _) = PiffSampleEncryptionBox::read_box(&out).unwrap();
        assert_eq!(parsed.sample_count, 2);
        assert!(parsed.uses_subsamples());
    }

    #[test]
    fn plain_entries_must_match_iv_size() {
        let senc = PiffSampleEncryptionBox { flags: 0, sample_count: 3, entries: vec![0; 20] };
        assert!(matches!(senc.sample_info_sizes(8), Err(Mp4Error::Malformed(_))));
    }

    #[test]
    fn sample_count_beyond_entries_is_rejected() {
        let plain = PiffSampleEncryptionBox { flags: 0, sample_count: u32::MAX, entries: vec![0; 16] };
        assert!(matches!(plain.sample_info_sizes(8), Err(Mp4Error::Malformed(_))));

        let subsamples = PiffSampleEncryptionBox { flags: PIFF_USE_SUBSAMPLES, sample_count: 2, entries: vec![0; 16] };
        assert!(matches!(subsamples.sample_info_sizes(8), Err(Mp4Error::Malformed(_))));
    }
}
