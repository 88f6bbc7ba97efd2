use crate::{format_fourcc, read_u32_be, write_version_and_flags, Result};

use super::generic::{expect_header, Mp4Box};

// The `StcoBox` struct represents a Chunk Offset Box holding 32-bit file offsets.
#[derive(Clone, Default)]
pub struct StcoBox { // Chunk Offset Box
    pub chunk_offsets: Vec<u32>,
}

impl std::fmt::Debug for StcoBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StcoBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("chunk_offsets", &self.chunk_offsets)
            .finish()
    }
}

impl Mp4Box for StcoBox {
    fn box_type(&self) -> [u8; 4] { *b"stco" }

    fn box_size(&self) -> u32 {
        8 + 4 + 4 + 4 * self.chunk_offsets.len() as u32
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, 0);
        buffer.extend_from_slice(&(self.chunk_offsets.len() as u32).to_be_bytes());
        for offset in &self.chunk_offsets {
            buffer.extend_from_slice(&offset.to_be_bytes());
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"stco")?;
        let body = &data[..header.end()];
        let count = read_u32_be(body, 12)? as usize;
        let chunk_offsets = (0..count)
            .map(|i| read_u32_be(body, 16 + i * 4))
            .collect::<Result<Vec<_>>>()?;
        Ok((StcoBox { chunk_offsets }, header.size))
    }
}
