use crate::{format_fourcc, read_u32_be, write_version_and_flags, Result};

use super::generic::{expect_header, Mp4Box};

// The `TrexBox` struct represents a Track Extends Box.
// It supplies per-track defaults that fragments fall back on when their `tfhd`/`trun` omit a
// value.
#[derive(Clone)]
pub struct TrexBox { // Track Extends Box
    pub track_id: u32,
    pub default_sample_description_index: u32,
    pub default_sample_duration: u32,
    pub default_sample_size: u32,
    pub default_sample_flags: u32,
}

impl Default for TrexBox {
    fn default() -> Self {
        TrexBox {
            track_id: 1,
            default_sample_description_index: 1,
            default_sample_duration: 0,
            default_sample_size: 0,
            default_sample_flags: 0,
        }
    }
}

impl std::fmt::Debug for TrexBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrexBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("track_id", &self.track_id)
            .field("default_sample_description_index", &self.default_sample_description_index)
            .field("default_sample_duration", &self.default_sample_duration)
            .field("default_sample_size", &self.default_sample_size)
            .field("default_sample_flags", &format!("0x{:08X}", self.default_sample_flags))
            .finish()
    }
}

impl Mp4Box for TrexBox {
    fn box_type(&self) -> [u8; 4] { *b"trex" }

    fn box_size(&self) -> u32 {
        8 + 4 + 20
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, 0);
        buffer.extend_from_slice(&self.track_id.to_be_bytes());
        buffer.extend_from_slice(&self.default_sample_description_index.to_be_bytes());
        buffer.extend_from_slice(&self.default_sample_duration.to_be_bytes());
        buffer.extend_from_slice(&self.default_sample_size.to_be_bytes());
        buffer.extend_from_slice(&self.default_sample_flags.to_be_bytes());
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"trex")?;
        let body = &data[..header.end()];
        Ok((
            TrexBox {
                track_id: read_u32_be(body, 12)?,
                default_sample_description_index: read_u32_be(body, 16)?,
                default_sample_duration: read_u32_be(body, 20)?,
                default_sample_size: read_u32_be(body, 24)?,
                default_sample_flags: read_u32_be(body, 28)?,
            },
            header.size,
        ))
    }
}
