use crate::{format_fourcc, read_u32_be, write_version_and_flags, Result};

use super::generic::{expect_header, Mp4Box};

// The `StszBox` struct represents a Sample Size Box.
//
// Fields:
// - `sample_size`: when non-zero every sample has this size and `entry_sizes` stays empty.
// - `sample_count`: number of samples in the track.
// - `entry_sizes`: per-sample sizes when `sample_size` is zero.
#[derive(Clone, Default)]
pub struct StszBox { // Sample Size Box
    pub sample_size: u32,
    pub sample_count: u32,
    pub entry_sizes: Vec<u32>,
}

impl std::fmt::Debug for StszBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StszBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("sample_size", &self.sample_size)
            .field("sample_count", &self.sample_count)
            .field("entry_sizes", &self.entry_sizes.len())
            .finish()
    }
}

impl Mp4Box for StszBox {
    fn box_type(&self) -> [u8; 4] { *b"stsz" }

    fn box_size(&self) -> u32 {
        8 + 4 + 4 + 4 + 4 * self.entry_sizes.len() as u32
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, 0);
        buffer.extend_from_slice(&self.sample_size.to_be_bytes());
        buffer.extend_from_slice(&self.sample_count.to_be_bytes());
        for size in &self.entry_sizes {
            buffer.extend_from_slice(&size.to_be_bytes());
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"stsz")?;
        let body = &data[..header.end()];
        let sample_size = read_u32_be(body, 12)?;
        let sample_count = read_u32_be(body, 16)?;
        let entry_sizes = if sample_size == 0 {
            (0..sample_count as usize)
                .map(|i| read_u32_be(body, 20 + i * 4))
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };
        Ok((StszBox { sample_size, sample_count, entry_sizes }, header.size))
    }
}
