use crate::{format_fourcc, read_bytes, read_u16_be, read_u8, Result};

use super::avcc::AvccBox;
use super::generic::{child_boxes, write_child, BoxHeader, Mp4Box, UnknownBox};
use super::sinf::SinfBox;

const VISUAL_ENTRY_FIELDS: usize = 78;

// The `VisualSampleEntry` struct represents an `avc1` (or, when protected, `encv`) sample entry.
//
// Fields:
// - `format`: `avc1` for clear streams, `encv` when a `sinf` describes the protection.
// - `width` / `height`: coded size in pixels.
// - `avcc`: decoder configuration; absent for non AVC codecs, whose config ends up in `extra`.
// - `sinf`: protection scheme information for `encv` entries.
// - `extra`: other child boxes (`pasp`, `btrt`, ...) kept as-is.
#[derive(Clone)]
pub struct VisualSampleEntry {
    pub format: [u8; 4],
    pub data_reference_index: u16,
    pub width: u16,
    pub height: u16,
    pub compressor_name: String,
    pub avcc: Option<AvccBox>,
    pub sinf: Option<SinfBox>,
    pub extra: Vec<UnknownBox>,
}

impl Default for VisualSampleEntry {
    fn default() -> Self {
        VisualSampleEntry {
            format: *b"avc1",
            data_reference_index: 1,
            width: 0,
            height: 0,
            compressor_name: String::new(),
            avcc: Some(AvccBox::default()),
            sinf: None,
            extra: Vec::new(),
        }
    }
}

impl std::fmt::Debug for VisualSampleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualSampleEntry")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("width", &self.width)
            .field("height", &self.height)
            .field("compressor_name", &self.compressor_name)
            .field("avcc", &self.avcc)
            .field("sinf", &self.sinf)
            .field("extra", &self.extra)
            .finish()
    }
}

impl Mp4Box for VisualSampleEntry {
    fn box_type(&self) -> [u8; 4] { self.format }

    fn box_size(&self) -> u32 {
        8 + VISUAL_ENTRY_FIELDS as u32
            + self.avcc.as_ref().map_or(0, |a| a.box_size())
            + self.sinf.as_ref().map_or(0, |s| s.box_size())
            + self.extra.iter().map(|b| b.box_size()).sum::<u32>()
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        buffer.extend_from_slice(&[0; 6]);  // reserved
        buffer.extend_from_slice(&self.data_reference_index.to_be_bytes());
        buffer.extend_from_slice(&[0; 16]);  // pre_defined + reserved
        buffer.extend_from_slice(&self.width.to_be_bytes());
        buffer.extend_from_slice(&self.height.to_be_bytes());
        buffer.extend_from_slice(&0x0048_0000u32.to_be_bytes());  // 72 dpi horizontal
        buffer.extend_from_slice(&0x0048_0000u32.to_be_bytes());  // 72 dpi vertical
        buffer.extend_from_slice(&[0; 4]);  // reserved
        buffer.extend_from_slice(&1u16.to_be_bytes());  // frame_count

        // compressorname: length prefixed, padded to 32 bytes
        let name = self.compressor_name.as_bytes();
        let name_len = name.len().min(31);
        buffer.push(name_len as u8);
        buffer.extend_from_slice(&name[..name_len]);
        buffer.extend(std::iter::repeat(0).take(31 - name_len));

        buffer.extend_from_slice(&0x0018u16.to_be_bytes());  // depth
        buffer.extend_from_slice(&(-1i16).to_be_bytes());    // pre_defined

        if let Some(avcc) = &self.avcc {
            write_child(avcc, buffer);
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

        let data_reference_index = read_u16_be(body, 14)?;
        let width = read_u16_be(body, 32)?;
        let height = read_u16_be(body, 34)?;
        let name_len = (read_u8(body, 50)? as usize).min(31);
        let compressor_name = String::from_utf8_lossy(read_bytes(body, 51, name_len)?).to_string();

        let mut entry = VisualSampleEntry {
            format: header.box_type,
            data_reference_index,
            width,
            height,
            compressor_name,
            avcc: None,
            sinf: None,
            extra: Vec::new(),
        };

        for child in child_boxes(data, 8 + VISUAL_ENTRY_FIELDS, header.end())? {
            let child_data = &data[child.start..child.end()];
            match &child.box_type {
                b"avcC" => entry.avcc = Some(AvccBox::read_box(child_data)?.0),
                b"sinf" => entry.sinf = Some(SinfBox::read_box(child_data)?.0),
                _ => entry.extra.push(UnknownBox::read_box(child_data)?.0),
            }
        }

        Ok((entry, header.size))
    }
}

