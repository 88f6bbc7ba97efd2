use crate::{format_fourcc, read_bytes, read_u32_be, read_u8, read_version_and_flags, write_version_and_flags, Result};

use super::generic::{expect_header, Mp4Box};

// The `SaizBox` struct represents a Sample Auxiliary Information Sizes Box.
// When every sample carries the same amount of auxiliary data only `default_sample_info_size`
// is stored, otherwise `sample_info_sizes` lists one size per sample.
#[derive(Clone, Default)]
pub struct SaizBox { // Sample Auxiliary Information Sizes Box
    pub default_sample_info_size: u8,
    pub sample_count: u32,
    pub sample_info_sizes: Vec<u8>,
}

impl std::fmt::Debug for SaizBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaizBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("default_sample_info_size", &self.default_sample_info_size)
            .field("sample_count", &self.sample_count)
            .field("sample_info_sizes", &self.sample_info_sizes)
            .finish()
    }
}

impl Mp4Box for SaizBox {
    fn box_type(&self) -> [u8; 4] { *b"saiz" }

    fn box_size(&self) -> u32 {
        let table = if self.default_sample_info_size == 0 { self.sample_info_sizes.len() as u32 } else { 0 };
        8 + 4 + 1 + 4 + table
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, 0);
        buffer.push(self.default_sample_info_size);
        buffer.extend_from_slice(&self.sample_count.to_be_bytes());
        if self.default_sample_info_size == 0 {
            buffer.extend_from_slice(&self.sample_info_sizes);
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"saiz")?;
        let body = &data[..header.end()];
        let (_, flags) = read_version_and_flags(body, 8)?;
        let mut offset = 12;
        if flags & 1 != 0 {
            offset += 8;  // aux_info_type + aux_info_type_parameter
        }
        let default_sample_info_size = read_u8(body, offset)?;
        let sample_count = read_u32_be(body, offset + 1)?;
        let sample_info_sizes = if default_sample_info_size == 0 {
            read_bytes(body, offset + 5, sample_count as usize)?.to_vec()
        } else {
            Vec::new()
        };
        Ok((
            SaizBox { default_sample_info_size, sample_count, sample_info_sizes },
            header.size,
        ))
    }
}
