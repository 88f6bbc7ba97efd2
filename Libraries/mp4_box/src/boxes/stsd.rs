use crate::{format_fourcc, read_u32_be, write_version_and_flags, Mp4Error, Result};

use super::avc1::VisualSampleEntry;
use super::generic::{child_boxes, expect_header, write_child, Mp4Box, UnknownBox};
use super::mp4a::AudioSampleEntry;

// The `StsdBox` struct represents a Sample Description Box.
// A protected track lists its `encv`/`enca` entry first, followed by the clear entry.
#[derive(Clone, Default)]
pub struct StsdBox { // Sample Description Box
    pub entries: Vec<SampleEntry>,
}

#[derive(Clone, Debug)]
pub enum SampleEntry {
    Visual(VisualSampleEntry),
    Audio(AudioSampleEntry),
    Unknown(UnknownBox),
}

impl SampleEntry {
    pub fn format(&self) -> [u8; 4] {
        match self {
            SampleEntry::Visual(entry) => entry.format,
            SampleEntry::Audio(entry) => entry.format,
            SampleEntry::Unknown(entry) => entry.btype,
        }
    }

    fn size(&self) -> u32 {
        match self {
            SampleEntry::Visual(entry) => entry.box_size(),
            SampleEntry::Audio(entry) => entry.box_size(),
            SampleEntry::Unknown(entry) => entry.box_size(),
        }
    }

    fn write(&self, buffer: &mut Vec<u8>) {
        match self {
            SampleEntry::Visual(entry) => write_child(entry, buffer),
            SampleEntry::Audio(entry) => write_child(entry, buffer),
            SampleEntry::Unknown(entry) => write_child(entry, buffer),
        }
    }

    fn read(data: &[u8], format: &[u8; 4]) -> Result<Self> {
        Ok(match format {
            b"avc1" | b"avc3" | b"encv" => SampleEntry::Visual(VisualSampleEntry::read_box(data)?.0),
            b"mp4a" | b"enca" => SampleEntry::Audio(AudioSampleEntry::read_box(data)?.0),
            _ => SampleEntry::Unknown(UnknownBox::read_box(data)?.0),
        })
    }
}

impl std::fmt::Debug for StsdBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StsdBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("entries", &self.entries)
            .finish()
    }
}

impl Mp4Box for StsdBox {
    fn box_type(&self) -> [u8; 4] { *b"stsd" }

    fn box_size(&self) -> u32 {
        8 + 4 + 4 + self.entries.iter().map(|e| e.size()).sum::<u32>()
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, 0);
        buffer.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        for entry in &self.entries {
            entry.write(buffer);
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"stsd")?;
        let entry_count = read_u32_be(&data[..header.end()], 12)? as usize;

        let mut entries = Vec::new();
        for child in child_boxes(data, 16, header.end())? {
            entries.push(SampleEntry::read(&data[child.start..child.end()], &child.box_type)?);
        }
        if entries.len() != entry_count {
            return Err(Mp4Error::malformed(format!(
                "stsd declares {} entries but holds {}",
                entry_count,
                entries.len()
            )));
        }

        Ok((StsdBox { entries }, header.size))
    }
}
