use crate::{format_fourcc, read_u16_be, read_u32_be, read_u64_be, read_version_and_flags, write_version_and_flags, Mp4Error, Result};

use super::generic::{expect_header, Mp4Box};

// The `MvhdBox` struct represents a Movie Header Box.
// It carries the presentation-wide timescale, the duration (zero for fragmented files) and the
// next free track id.
//
// Fields:
// - `version`: 0 stores times in 32 bits, 1 stores them in 64 bits.
// - `creation_time` / `modification_time`: seconds since 1904-01-01.
// - `timescale`: time units per second used by `duration`.
// - `rate`: 16.16 fixed-point playback rate (0x00010000 is 1.0).
// - `volume`: 8.8 fixed-point volume (0x0100 is 1.0).
// - `next_track_id`: id to use for the next track added.
#[derive(Clone)]
pub struct MvhdBox { // Movie Header Box
    pub version: u8,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub rate: u32,
    pub volume: u16,
    pub next_track_id: u32,
}

impl Default for MvhdBox {
    fn default() -> Self {
        MvhdBox {
            version: 0,
            creation_time: 0,
            modification_time: 0,
            timescale: 10_000_000,
            duration: 0,
            rate: 0x00010000,
            volume: 0x0100,
            next_track_id: 2,
        }
    }
}

impl std::fmt::Debug for MvhdBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MvhdBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("version", &self.version)
            .field("creation_time", &self.creation_time)
            .field("modification_time", &self.modification_time)
            .field("timescale", &self.timescale)
            .field("duration", &self.duration)
            .field("rate", &format!("0x{:08X}", self.rate))
            .field("volume", &format!("0x{:04X}", self.volume))
            .field("next_track_id", &self.next_track_id)
            .finish()
    }
}

pub(crate) const UNITY_MATRIX: [u32; 9] = [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000];

impl Mp4Box for MvhdBox {
    fn box_type(&self) -> [u8; 4] { *b"mvhd" }

    fn box_size(&self) -> u32 {
        let time_fields_size = if self.version == 1 { 28 } else { 16 };
        8 + 4 + time_fields_size + 80  // header + version/flags + time fields + rest
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, self.version, 0);

        if self.version == 1 {
            buffer.extend_from_slice(&self.creation_time.to_be_bytes());
            buffer.extend_from_slice(&self.modification_time.to_be_bytes());
            buffer.extend_from_slice(&self.timescale.to_be_bytes());
            buffer.extend_from_slice(&self.duration.to_be_bytes());
        } else {
            buffer.extend_from_slice(&(self.creation_time as u32).to_be_bytes());
            buffer.extend_from_slice(&(self.modification_time as u32).to_be_bytes());
            buffer.extend_from_slice(&self.timescale.to_be_bytes());
            buffer.extend_from_slice(&(self.duration as u32).to_be_bytes());
        }

        buffer.extend_from_slice(&self.rate.to_be_bytes());
        buffer.extend_from_slice(&self.volume.to_be_bytes());
        buffer.extend_from_slice(&[0; 10]);  // reserved
        for value in UNITY_MATRIX {
            buffer.extend_from_slice(&value.to_be_bytes());
        }
        buffer.extend_from_slice(&[0; 24]);  // pre_defined
        buffer.extend_from_slice(&self.next_track_id.to_be_bytes());
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"mvhd")?;
        let body = &data[..header.end()];
        let (version, _) = read_version_and_flags(body, 8)?;
        let mut offset = 12;

        let (creation_time, modification_time, timescale, duration) = match version {
            1 => {
                let times = (
                    read_u64_be(body, offset)?,
                    read_u64_be(body, offset + 8)?,
                    read_u32_be(body, offset + 16)?,
                    read_u64_be(body, offset + 20)?,
                );
                offset += 28;
                times
            }
            0 => {
                let times = (
                    read_u32_be(body, offset)? as u64,
                    read_u32_be(body, offset + 4)? as u64,
                    read_u32_be(body, offset + 8)?,
                    read_u32_be(body, offset + 12)? as u64,
                );
                offset += 16;
                times
            }
            v => return Err(Mp4Error::unsupported(format!("mvhd version {}", v))),
        };

        let rate = read_u32_be(body, offset)?;
        let volume = read_u16_be(body, offset + 4)?;
        // Skip rate/volume (6) + reserved (10) + matrix (36) + pre_defined (24)
        let next_track_id = read_u32_be(body, offset + 6 + 10 + 36 + 24)?;

        Ok((
            MvhdBox {
                version,
                creation_time,
                modification_time,
                timescale,
                duration,
                rate,
                volume,
                next_track_id,
            },
            header.size,
        ))
    }
}
