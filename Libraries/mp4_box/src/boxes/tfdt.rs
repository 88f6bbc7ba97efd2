use crate::{format_fourcc, read_u32_be, read_u64_be, read_version_and_flags, write_version_and_flags, Mp4Error, Result};

use super::generic::{expect_header, Mp4Box};

// The `TfdtBox` struct represents a Track Fragment Decode Time Box.
// It gives the decode time of the first sample of the fragment in media timescale units.
#[derive(Default, Clone)]
pub struct TfdtBox { // Track Fragment Decode Time Box
    pub version: u8,            // 0 = 32-bit, 1 = 64-bit
    pub base_decode_time: u64,
}

impl TfdtBox {
    pub fn v1(base_decode_time: u64) -> Self {
        TfdtBox { version: 1, base_decode_time }
    }
}

impl std::fmt::Debug for TfdtBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfdtBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("version", &self.version)
            .field("base_decode_time", &self.base_decode_time)
            .finish()
    }
}

impl Mp4Box for TfdtBox {
    fn box_type(&self) -> [u8; 4] { *b"tfdt" }

    fn box_size(&self) -> u32 {
        8 + 4 + if self.version == 1 { 8 } else { 4 }
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, self.version, 0);
        if self.version == 1 {
            buffer.extend_from_slice(&self.base_decode_time.to_be_bytes());
        } else {
            buffer.extend_from_slice(&(self.base_decode_time as u32).to_be_bytes());
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"tfdt")?;
        let body = &data[..header.end()];
        let (version, _) = read_version_and_flags(body, 8)?;
        let base_decode_time = match version {
            1 => read_u64_be(body, 12)?,
            0 => read_u32_be(body, 12)? as u64,
            v => return Err(Mp4Error::unsupported(format!("tfdt version {}", v))),
        };
        Ok((TfdtBox { version, base_decode_time }, header.size))
    }
}
