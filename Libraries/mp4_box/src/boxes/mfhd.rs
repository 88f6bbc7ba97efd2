use crate::{format_fourcc, read_u32_be, write_version_and_flags, Result};

use super::generic::{expect_header, Mp4Box};

// The `MfhdBox` struct represents a Movie Fragment Header Box carrying the fragment sequence number.
#[derive(Clone, Default)]
pub struct MfhdBox { // Movie Fragment Header Box
    pub sequence_number: u32,
}

impl std::fmt::Debug for MfhdBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MfhdBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("sequence_number", &self.sequence_number)
            .finish()
    }
}

impl Mp4Box for MfhdBox {
    fn box_type(&self) -> [u8; 4] { *b"mfhd" }

    fn box_size(&self) -> u32 {
        8 + 4 + 4
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, 0);
        buffer.extend_from_slice(&self.sequence_number.to_be_bytes());
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"mfhd")?;
        let sequence_number = read_u32_be(&data[..header.end()], 12)?;
        Ok((MfhdBox { sequence_number }, header.size))
    }
}
