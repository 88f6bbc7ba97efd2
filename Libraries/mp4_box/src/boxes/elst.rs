use crate::{format_fourcc, read_u16_be, read_u32_be, read_u64_be, read_version_and_flags, write_version_and_flags, Mp4Error, Result};

use super::generic::{expect_header, Mp4Box};

// The `ElstBox` struct represents an Edit List Box.
// Each entry maps a span of the presentation timeline onto the media timeline.
//
// Fields:
// - `version`: 0 stores durations/times in 32 bits, 1 in 64 bits.
// - `entries`: edit entries in presentation order.
#[derive(Clone, Default)]
pub struct ElstBox { // Edit List Box
    pub version: u8,
    pub entries: Vec<ElstEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElstEntry {
    pub segment_duration: u64,  // in movie timescale units, 0 means "until the end"
    pub media_time: i64,        // -1 marks an empty edit
    pub media_rate_integer: i16,
    pub media_rate_fraction: i16,
}

impl Default for ElstEntry {
    fn default() -> Self {
        ElstEntry {
            segment_duration: 0,
            media_time: 0,
            media_rate_integer: 1,
            media_rate_fraction: 0,
        }
    }
}

impl std::fmt::Debug for ElstBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElstBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("version", &self.version)
            .field("entries", &self.entries)
            .finish()
    }
}

impl Mp4Box for ElstBox {
    fn box_type(&self) -> [u8; 4] { *b"elst" }

    fn box_size(&self) -> u32 {
        let entry_size = if self.version == 1 { 20 } else { 12 };
        8 + 4 + 4 + entry_size * self.entries.len() as u32
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, self.version, 0);
        buffer.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        for entry in &self.entries {
            if self.version == 1 {
                buffer.extend_from_slice(&entry.segment_duration.to_be_bytes());
                buffer.extend_from_slice(&entry.media_time.to_be_bytes());
            } else {
                buffer.extend_from_slice(&(entry.segment_duration as u32).to_be_bytes());
                buffer.extend_from_slice(&(entry.media_time as i32).to_be_bytes());
            }
            buffer.extend_from_slice(&entry.media_rate_integer.to_be_bytes());
            buffer.extend_from_slice(&entry.media_rate_fraction.to_be_bytes());
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"elst")?;
        let body = &data[..header.end()];
        let (version, _) = read_version_and_flags(body, 8)?;
        if version > 1 {
            return Err(Mp4Error::unsupported(format!("elst version {}", version)));
        }
        let entry_count = read_u32_be(body, 12)?;

        let mut entries = Vec::new();
        let mut offset = 16;
        for _ in 0..entry_count {
            let (segment_duration, media_time) = if version == 1 {
                let pair = (read_u64_be(body, offset)?, read_u64_be(body, offset + 8)? as i64);
                offset += 16;
                pair
            } else {
                let pair = (read_u32_be(body, offset)? as u64, read_u32_be(body, offset + 4)? as i32 as i64);
                offset += 8;
                pair
            };
            entries.push(ElstEntry {
                segment_duration,
                media_time,
                media_rate_integer: read_u16_be(body, offset)? as i16,
                media_rate_fraction: read_u16_be(body, offset + 2)? as i16,
            });
            offset += 4;
        }

        Ok((ElstBox { version, entries }, header.size))
    }
}
