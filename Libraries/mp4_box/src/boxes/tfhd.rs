use crate::{format_fourcc, read_u32_be, read_u64_be, read_version_and_flags, write_version_and_flags, Result};

use super::generic::{expect_header, Mp4Box};

pub const TFHD_BASE_DATA_OFFSET: u32 = 0x000001;
pub const TFHD_SAMPLE_DESCRIPTION_INDEX: u32 = 0x000002;
pub const TFHD_DEFAULT_SAMPLE_DURATION: u32 = 0x000008;
pub const TFHD_DEFAULT_SAMPLE_SIZE: u32 = 0x000010;
pub const TFHD_DEFAULT_SAMPLE_FLAGS: u32 = 0x000020;

// The `TfhdBox` struct represents a Track Fragment Header Box.
// It names the track the fragment belongs to and overrides the `trex` defaults; every optional
// field is present exactly when its flag bit is set.
#[derive(Clone)]
pub struct TfhdBox { // Track Fragment Header Box
    pub flags: u32,
    pub track_id: u32,
    pub base_data_offset: Option<u64>,
    pub sample_description_index: Option<u32>,
    pub default_sample_duration: Option<u32>,
    pub default_sample_size: Option<u32>,
    pub default_sample_flags: Option<u32>,
}

impl Default for TfhdBox {
    fn default() -> Self {
        TfhdBox {
            flags: 0,
            track_id: 1,
            base_data_offset: None,
            sample_description_index: None,
            default_sample_duration: None,
            default_sample_size: None,
            default_sample_flags: None,
        }
    }
}

impl std::fmt::Debug for TfhdBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfhdBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("flags", &format!("0x{:06X}", self.flags))
            .field("track_id", &self.track_id)
            .field("base_data_offset", &self.base_data_offset)
            .field("sample_description_index", &self.sample_description_index)
            .field("default_sample_duration", &self.default_sample_duration)
            .field("default_sample_size", &self.default_sample_size)
            .field("default_sample_flags", &self.default_sample_flags)
            .finish()
    }
}

impl Mp4Box for TfhdBox {
    fn box_type(&self) -> [u8; 4] { *b"tfhd" }

    fn box_size(&self) -> u32 {
        let mut size = 8 + 4 + 4; // header + version/flags + track_id
        if self.flags & TFHD_BASE_DATA_OFFSET != 0 { size += 8; }
        if self.flags & TFHD_SAMPLE_DESCRIPTION_INDEX != 0 { size += 4; }
        if self.flags & TFHD_DEFAULT_SAMPLE_DURATION != 0 { size += 4; }
        if self.flags & TFHD_DEFAULT_SAMPLE_SIZE != 0 { size += 4; }
        if self.flags & TFHD_DEFAULT_SAMPLE_FLAGS != 0 { size += 4; }
        size
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, self.flags);
        buffer.extend_from_slice(&self.track_id.to_be_bytes());

        if self.flags & TFHD_BASE_DATA_OFFSET != 0 {
            buffer.extend_from_slice(&self.base_data_offset.unwrap_or(0).to_be_bytes());
        }
        if self.flags & TFHD_SAMPLE_DESCRIPTION_INDEX != 0 {
            buffer.extend_from_slice(&self.sample_description_index.unwrap_or(1).to_be_bytes());
        }
        if self.flags & TFHD_DEFAULT_SAMPLE_DURATION != 0 {
            buffer.extend_from_slice(&self.default_sample_duration.unwrap_or(0).to_be_bytes());
        }
        if self.flags & TFHD_DEFAULT_SAMPLE_SIZE != 0 {
            buffer.extend_from_slice(&self.default_sample_size.unwrap_or(0).to_be_bytes());
        }
        if self.flags & TFHD_DEFAULT_SAMPLE_FLAGS != 0 {
            buffer.extend_from_slice(&self.default_sample_flags.unwrap_or(0).to_be_bytes());
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"tfhd")?;
        let body = &data[..header.end()];
        let (_, flags) = read_version_and_flags(body, 8)?;
        let track_id = read_u32_be(body, 12)?;
        let mut offset = 16;

        let next_u32 = |flag: u32, offset: &mut usize| -> Result<Option<u32>> {
            if flags & flag == 0 {
                return Ok(None);
            }
            let value = read_u32_be(body, *offset)?;
            *offset += 4;
            Ok(Some(value))
        };

        let base_data_offset = if flags & TFHD_BASE_DATA_OFFSET != 0 {
            let value = read_u64_be(body, offset)?;
            offset += 8;
            Some(value)
        } else {
            None
        };
        let sample_description_index = next_u32(TFHD_SAMPLE_DESCRIPTION_INDEX, &mut offset)?;
        let default_sample_duration = next_u32(TFHD_DEFAULT_SAMPLE_DURATION, &mut offset)?;
        let default_sample_size = next_u32(TFHD_DEFAULT_SAMPLE_SIZE, &mut offset)?;
        let default_sample_flags = next_u32(TFHD_DEFAULT_SAMPLE_FLAGS, &mut offset)?;

        Ok((
            TfhdBox {
                flags,
                track_id,
                base_data_offset,
                sample_description_index,
                default_sample_duration,
                default_sample_size,
                default_sample_flags,
            },
            header.size,
        ))
    }
}
