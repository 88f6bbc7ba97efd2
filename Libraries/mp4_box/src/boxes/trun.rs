use crate::{format_fourcc, read_u32_be, read_version_and_flags, write_version_and_flags, Result};

use super::generic::{expect_header, Mp4Box};

pub const TRUN_DATA_OFFSET: u32 = 0x000001;
pub const TRUN_FIRST_SAMPLE_FLAGS: u32 = 0x000004;
pub const TRUN_SAMPLE_DURATION: u32 = 0x000100;
pub const TRUN_SAMPLE_SIZE: u32 = 0x000200;
pub const TRUN_SAMPLE_FLAGS: u32 = 0x000400;
pub const TRUN_SAMPLE_COMPOSITION_TIME_OFFSET: u32 = 0x000800;

/// The `TrunBox` struct represents a Track Fragment Run Box.
/// It lists the samples of a fragment; which per-sample fields are stored is chosen by `flags`.
///
/// Fields:
/// - `data_offset`: offset of the first sample relative to the enclosing `moof`.
/// - `samples`: one entry per sample, fields not selected by `flags` are ignored on write.
#[derive(Clone)]
pub struct TrunBox { // Track Fragment Run Box
    pub version: u8,
    pub flags: u32,
    pub data_offset: Option<i32>,
    pub first_sample_flags: Option<u32>,
    pub samples: Vec<TrunSample>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrunSample {
    pub duration: u32,
    pub size: u32,
    pub flags: u32,
    pub composition_time_offset: u32,
}

impl Default for TrunBox {
    fn default() -> Self {
        TrunBox {
            version: 0,
            flags: TRUN_DATA_OFFSET | TRUN_SAMPLE_SIZE,
            data_offset: Some(0),
            first_sample_flags: None,
            samples: Vec::new(),
        }
    }
}

impl TrunBox {
    fn per_sample_size(&self) -> u32 {
        [TRUN_SAMPLE_DURATION, TRUN_SAMPLE_SIZE, TRUN_SAMPLE_FLAGS, TRUN_SAMPLE_COMPOSITION_TIME_OFFSET]
            .iter()
            .filter(|flag| self.flags & **flag != 0)
            .count() as u32 * 4
    }
}

impl std::fmt::Debug for TrunBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrunBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("version", &self.version)
            .field("flags", &format!("0x{:06X}", self.flags))
            .field("data_offset", &self.data_offset)
            .field("sample_count", &self.samples.len())
            .finish()
    }
}

impl Mp4Box for TrunBox {
    fn box_type(&self) -> [u8; 4] { *b"trun" }

    fn box_size(&self) -> u32 {
        let mut size = 8 + 4 + 4;  // header + version/flags + sample_count
        if self.flags & TRUN_DATA_OFFSET != 0 { size += 4; }
        if self.flags & TRUN_FIRST_SAMPLE_FLAGS != 0 { size += 4; }
        size + self.per_sample_size() * self.samples.len() as u32
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, self.version, self.flags);
        buffer.extend_from_slice(&(self.samples.len() as u32).to_be_bytes());
        if self.flags & TRUN_DATA_OFFSET != 0 {
            buffer.extend_from_slice(&self.data_offset.unwrap_or(0).to_be_bytes());
        }
        if self.flags & TRUN_FIRST_SAMPLE_FLAGS != 0 {
            buffer.extend_from_slice(&self.first_sample_flags.unwrap_or(0).to_be_bytes());
        }
        for sample in &self.samples {
            if self.flags & TRUN_SAMPLE_DURATION != 0 {
                buffer.extend_from_slice(&sample.duration.to_be_bytes());
            }
            if self.flags & TRUN_SAMPLE_SIZE != 0 {
                buffer.extend_from_slice(&sample.size.to_be_bytes());
            }
            if self.flags & TRUN_SAMPLE_FLAGS != 0 {
                buffer.extend_from_slice(&sample.flags.to_be_bytes());
            }
            if self.flags & TRUN_SAMPLE_COMPOSITION_TIME_OFFSET != 0 {
                buffer.extend_from_slice(&sample.composition_time_offset.to_be_bytes());
            }
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"trun")?;
        let body = &data[..header.end()];
        let (version, flags) = read_version_and_flags(body, 8)?;
        let sample_count = read_u32_be(body, 12)?;
        let mut offset = 16;

        let optional = |flag: u32, offset: &mut usize| -> Result<Option<u32>> {
            if flags & flag == 0 {
                return Ok(None);
            }
            let value = read_u32_be(body, *offset)?;
            *offset += 4;
            Ok(Some(value))
        };

        let data_offset = optional(TRUN_DATA_OFFSET, &mut offset)?.map(|v| v as i32);
        let first_sample_flags = optional(TRUN_FIRST_SAMPLE_FLAGS, &mut offset)?;

        let mut samples = Vec::with_capacity(sample_count.min(4096) as usize);
        for _ in 0..sample_count {
            samples.push(TrunSample {
                duration: optional(TRUN_SAMPLE_DURATION, &mut offset)?.unwrap_or(0),
                size: optional(TRUN_SAMPLE_SIZE, &mut offset)?.unwrap_or(0),
                flags: optional(TRUN_SAMPLE_FLAGS, &mut offset)?.unwrap_or(0),
                composition_time_offset: optional(TRUN_SAMPLE_COMPOSITION_TIME_OFFSET, &mut offset)?.unwrap_or(0),
            });
        }

        Ok((
            TrunBox { version, flags, data_offset, first_sample_flags, samples },
            header.size,
        ))
    }
}
