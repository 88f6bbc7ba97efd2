use crate::{format_fourcc, read_u32_be, write_version_and_flags, Result};

use super::generic::{expect_header, Mp4Box};

// The `StscBox` struct represents a Sample-to-Chunk Box.
#[derive(Clone, Default)]
pub struct StscBox { // Sample-to-Chunk Box
    pub entries: Vec<StscEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

impl std::fmt::Debug for StscBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StscBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("entries", &self.entries)
            .finish()
    }
}

impl Mp4Box for StscBox {
    fn box_type(&self) -> [u8; 4] { *b"stsc" }

    fn box_size(&self) -> u32 {
        8 + 4 + 4 + 12 * self.entries.len() as u32
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, 0);
        buffer.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        for entry in &self.entries {
            buffer.extend_from_slice(&entry.first_chunk.to_be_bytes());
            buffer.extend_from_slice(&entry.samples_per_chunk.to_be_bytes());
            buffer.extend_from_slice(&entry.sample_description_index.to_be_bytes());
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"stsc")?;
        let body = &data[..header.end()];
        let count = read_u32_be(body, 12)? as usize;
        let mut entries = Vec::new();
        for i in 0..count {
            let offset = 16 + i * 12;
            entries.push(StscEntry {
                first_chunk: read_u32_be(body, offset)?,
                samples_per_chunk: read_u32_be(body, offset + 4)?,
                sample_description_index: read_u32_be(body, offset + 8)?,
            });
        }
        Ok((StscBox { entries }, header.size))
    }
}
