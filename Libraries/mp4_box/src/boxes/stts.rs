use crate::{format_fourcc, read_u32_be, write_version_and_flags, Result};

use super::generic::{expect_header, Mp4Box};

// The `SttsBox` struct represents a Time-to-Sample Box.
// Fragmented tracks leave it empty; sample timing lives in the fragments' `trun` boxes.
#[derive(Clone, Default)]
pub struct SttsBox { // Time-to-Sample Box
    pub entries: Vec<SttsEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SttsEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

impl std::fmt::Debug for SttsBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SttsBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("entries", &self.entries)
            .finish()
    }
}

impl Mp4Box for SttsBox {
    fn box_type(&self) -> [u8; 4] { *b"stts" }

    fn box_size(&self) -> u32 {
        8 + 4 + 4 + 8 * self.entries.len() as u32
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, 0);
        buffer.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        for entry in &self.entries {
            buffer.extend_from_slice(&entry.sample_count.to_be_bytes());
            buffer.extend_from_slice(&entry.sample_delta.to_be_bytes());
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"stts")?;
        let body = &data[..header.end()];
        let count = read_u32_be(body, 12)? as usize;
        let mut entries = Vec::new();
        for i in 0..count {
            let offset = 16 + i * 8;
            entries.push(SttsEntry {
                sample_count: read_u32_be(body, offset)?,
                sample_delta: read_u32_be(body, offset + 4)?,
            });
        }
        Ok((SttsBox { entries }, header.size))
    }
}
