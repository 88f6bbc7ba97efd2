use crate::{format_fourcc, read_u16_be, read_u32_be, Result};

use super::esds::EsdsBox;
use super::generic::{child_boxes, write_child, BoxHeader, Mp4Box, UnknownBox};
use super::sinf::SinfBox;

const AUDIO_ENTRY_FIELDS: usize = 28;

// The `AudioSampleEntry` struct represents an `mp4a` (or, when protected, `enca`) sample entry.
//
// Fields:
// - `channel_count` / `sample_size`: 2 channels of 16-bit samples unless told otherwise.
// - `sample_rate`: in Hz; stored on the wire as 16.16 fixed point.
// - `esds`: carries the AudioSpecificConfig.
#[derive(Clone)]
pub struct AudioSampleEntry {
    pub format: [u8; 4],
    pub data_reference_index: u16,
    pub channel_count: u16,
    pub sample_size: u16,
    pub sample_rate: u32,
    pub esds: Option<EsdsBox>,
    pub sinf: Option<SinfBox>,
    pub extra: Vec<UnknownBox>,
}

impl Default for AudioSampleEntry {
    fn default() -> Self {
        AudioSampleEntry {
            format: *b"mp4a",
            data_reference_index: 1,
            channel_count: 2,
            sample_size: 16,
            sample_rate: 48_000,
            esds: Some(EsdsBox::default()),
            sinf: None,
            extra: Vec::new(),
        }
    }
}

impl std::fmt::Debug for AudioSampleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSampleEntry")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("channel_count", &self.channel_count)
            .field("sample_size", &self.sample_size)
            .field("sample_rate", &self.sample_rate)
            .field("esds", &self.esds)
            .field("sinf", &self.sinf)
            .field("extra", &self.extra)
            .finish()
    }
}

impl Mp4Box for AudioSampleEntry {
    fn box_type(&self) -> [u8; 4] { self.format }

    fn box_size(&self) -> u32 {
        8 + AUDIO_ENTRY_FIELDS as u32
            + self.esds.as_ref().map_or(0, |e| e.box_size())
            + self.sinf.as_ref().map_or(0, |s| s.box_size())
            + self.extra.iter().map(|b| b.box_size()).sum::<u32>()
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        buffer.extend_from_slice(&[0; 6]);  // reserved
        buffer.extend_from_slice(&self.data_reference_index.to_be_bytes());
        buffer.extend_from_slice(&[0; 8]);  // reserved
        buffer.extend_from_slice(&self.channel_count.to_be_bytes());
        buffer.extend_from_slice(&self.sample_size.to_be_bytes());
        buffer.extend_from_slice(&[0; 4]);  // pre_defined + reserved
        buffer.extend_from_slice(&(self.sample_rate << 16).to_be_bytes());

        if let Some(esds) = &self.esds {
            write_child(esds, buffer);
        }
        if let Some(sinf) = &self.sinf {
            write_child(sinf, buffer);
        }
        for child in &self.extra {
            write_child(child, buffer);
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = BoxHeader::read(data, 0, data.len())?;
        let body = &data[..header.end()];

        let mut entry = AudioSampleEntry {
            format: header.box_type,
            data_reference_index: read_u16_be(body, 14)?,
            channel_count: read_u16_be(body, 24)?,
            sample_size: read_u16_be(body, 26)?,
            sample_rate: read_u32_be(body, 32)? >> 16,
            esds: None,
            sinf: None,
            extra: Vec::new(),
        };

        for child in child_boxes(data, 8 + AUDIO_ENTRY_FIELDS, header.end())? {
            let child_data = &data[child.start..child.end()];
            match &child.box_type {
                b"esds" => entry.esds = Some(EsdsBox::read_box(child_data)?.0),
                b"sinf" => entry.sinf = Some(SinfBox::read_box(child_data)?.0),
                _ => entry.extra.push(UnknownBox::read_box(child_data)?.0),
            }
        }

        Ok((entry, header.size))
    }
}
