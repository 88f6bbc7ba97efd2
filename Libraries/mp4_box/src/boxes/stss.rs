use crate::{format_fourcc, read_u32_be, write_version_and_flags, Result};

use super::generic::{expect_header, Mp4Box};

// The `StssBox` struct represents a Sync Sample Box listing the 1-based numbers of key frames.
// Only video tracks carry one.
#[derive(Clone, Default)]
pub struct StssBox { // Sync Sample Box
    pub sample_numbers: Vec<u32>,
}

impl std::fmt::Debug for StssBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StssBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("sample_numbers", &self.sample_numbers)
            .finish()
    }
}

impl Mp4Box for StssBox {
    fn box_type(&self) -> [u8; 4] { *b"stss" }

    fn box_size(&self) -> u32 {
        8 + 4 + 4 + 4 * self.sample_numbers.len() as u32
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, 0);
        buffer.extend_from_slice(&(self.sample_numbers.len() as u32).to_be_bytes());
        for number in &self.sample_numbers {
            buffer.extend_from_slice(&number.to_be_bytes());
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"stss")?;
        let body = &data[..header.end()];
        let count = read_u32_be(body, 12)? as usize;
        let sample_numbers = (0..count)
            .map(|i| read_u32_be(body, 16 + i * 4))
            .collect::<Result<Vec<_>>>()?;
        Ok((StssBox { sample_numbers }, header.size))
    }
}
