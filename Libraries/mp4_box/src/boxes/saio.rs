use crate::{format_fourcc, read_u32_be, read_u64_be, read_version_and_flags, write_version_and_flags, Result};

use super::generic::{expect_header, Mp4Box};

// The `SaioBox` struct represents a Sample Auxiliary Information Offsets Box.
// A single offset means the auxiliary data of all samples is stored contiguously.
#[derive(Clone, Default)]
pub struct SaioBox { // Sample Auxiliary Information Offsets Box
    pub offsets: Vec<u32>,
}

impl std::fmt::Debug for SaioBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaioBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("offsets", &self.offsets)
            .finish()
    }
}

impl Mp4Box for SaioBox {
    fn box_type(&self) -> [u8; 4] { *b"saio" }

    fn box_size(&self) -> u32 {
        8 + 4 + 4 + 4 * self.offsets.len() as u32
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, 0);
        buffer.extend_from_slice(&(self.offsets.len() as u32).to_be_bytes());
        for offset in &self.offsets {
            buffer.extend_from_slice(&offset.to_be_bytes());
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"saio")?;
        let body = &data[..header.end()];
        let (version, flags) = read_version_and_flags(body, 8)?;
        let mut offset = 12;
        if flags & 1 != 0 {
            offset += 8;
        }
        let count = read_u32_be(body, offset)? as usize;
        offset += 4;
        let mut offsets = Vec::with_capacity(count.min(body.len() / 4));
        for _ in 0..count {
            if version == 0 {
                offsets.push(read_u32_be(body, offset)?);
                offset += 4;
            } else {
                offsets.push(read_u64_be(body, offset)? as u32);
                offset += 8;
            }
        }
        Ok((SaioBox { offsets }, header.size))
    }
}
