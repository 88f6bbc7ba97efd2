use crate::{format_fourcc, read_u16_be, read_u32_be, read_u64_be, read_version_and_flags, write_version_and_flags, Mp4Error, Result};

use super::generic::{expect_header, Mp4Box};
use super::mvhd::UNITY_MATRIX;

// The `TkhdBox` struct represents a Track Header Box.
// It identifies the track and carries its presentation size.
//
// Fields:
// - `flags`: 0x1 enabled, 0x2 in movie, 0x4 in preview.
// - `track_id`: must match the track id used by `trex` and by the fragments' `tfhd`.
// - `volume`: 8.8 fixed-point, 0x0100 for audio and 0 for video.
// - `width` / `height`: 16.16 fixed-point presentation size, zero for audio.
#[derive(Clone)]
pub struct TkhdBox { // Track Header Box
    pub version: u8,
    pub flags: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    pub duration: u64,
    pub layer: u16,
    pub alternate_group: u16,
    pub volume: u16,
    pub width: u32,
    pub height: u32,
}

impl Default for TkhdBox {
    fn default() -> Self {
        TkhdBox {
            version: 0,
            flags: 0x000003,  // enabled, in movie
            creation_time: 0,
            modification_time: 0,
            track_id: 1,
            duration: 0,
            layer: 0,
            alternate_group: 0,
            volume: 0,
            width: 0,
            height: 0,
        }
    }
}

impl std::fmt::Debug for TkhdBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TkhdBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("version", &self.version)
            .field("flags", &format!("0x{:06X}", self.flags))
            .field("track_id", &self.track_id)
            .field("duration", &self.duration)
            .field("volume", &format!("0x{:04X}", self.volume))
            .field("width", &format!("{} px", self.width >> 16))
            .field("height", &format!("{} px", self.height >> 16))
            .finish()
    }
}

impl Mp4Box for TkhdBox {
    fn box_type(&self) -> [u8; 4] { *b"tkhd" }

    // header (8) + version/flags (4) + times and id (20|32) + reserved (8)
    // + layer/group/volume/reserved (8) + matrix (36) + width/height (8)
    fn box_size(&self) -> u32 {
        let time_fields = if self.version == 1 { 32 } else { 20 };
        8 + 4 + time_fields + 8 + 8 + 36 + 8
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, self.version, self.flags);

        if self.version == 1 {
            buffer.extend_from_slice(&self.creation_time.to_be_bytes());
            buffer.extend_from_slice(&self.modification_time.to_be_bytes());
            buffer.extend_from_slice(&self.track_id.to_be_bytes());
            buffer.extend_from_slice(&[0; 4]);  // reserved
            buffer.extend_from_slice(&self.duration.to_be_bytes());
        } else {
            buffer.extend_from_slice(&(self.creation_time as u32).to_be_bytes());
            buffer.extend_from_slice(&(self.modification_time as u32).to_be_bytes());
            buffer.extend_from_slice(&self.track_id.to_be_bytes());
            buffer.extend_from_slice(&[0; 4]);  // reserved
            buffer.extend_from_slice(&(self.duration as u32).to_be_bytes());
        }

        buffer.extend_from_slice(&[0; 8]);  // reserved
        buffer.extend_from_slice(&self.layer.to_be_bytes());
        buffer.extend_from_slice(&self.alternate_group.to_be_bytes());
        buffer.extend_from_slice(&self.volume.to_be_bytes());
        buffer.extend_from_slice(&[0; 2]);  // reserved
        for value in UNITY_MATRIX {
            buffer.extend_from_slice(&value.to_be_bytes());
        }
        buffer.extend_from_slice(&self.width.to_be_bytes());
        buffer.extend_from_slice(&self.height.to_be_bytes());
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"tkhd")?;
        let body = &data[..header.end()];
        let (version, flags) = read_version_and_flags(body, 8)?;

        let (creation_time, modification_time, track_id, duration, mut offset) = match version {
            1 => (
                read_u64_be(body, 12)?,
                read_u64_be(body, 20)?,
                read_u32_be(body, 28)?,
                read_u64_be(body, 36)?,
                44,
            ),
            0 => (
                read_u32_be(body, 12)? as u64,
                read_u32_be(body, 16)? as u64,
                read_u32_be(body, 20)?,
                read_u32_be(body, 28)? as u64,
                32,
            ),
            v => return Err(Mp4Error::unsupported(format!("tkhd version {}", v))),
        };

        offset += 8;  // reserved
        let layer = read_u16_be(body, offset)?;
        let alternate_group = read_u16_be(body, offset + 2)?;
        let volume = read_u16_be(body, offset + 4)?;
        offset += 8 + 36;  // layer/group/volume/reserved + matrix
        let width = read_u32_be(body, offset)?;
        let height = read_u32_be(body, offset + 4)?;

        Ok((
            TkhdBox {
                version,
                flags,
                creation_time,
                modification_time,
                track_id,
                duration,
                layer,
                alternate_group,
                volume,
                width,
                height,
            },
            header.size,
        ))
    }
}
