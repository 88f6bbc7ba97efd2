use crate::{format_fourcc, Result};

use super::generic::{expect_header, find_box, read_child, require_box, write_child, Mp4Box};
use super::{edts::EdtsBox, mdia::MdiaBox, tkhd::TkhdBox};

// The `TrakBox` struct represents a Track Box.
// It contains the following sub-boxes:
// - `tkhd`: track id, flags and presentation size.
// - `edts`: optional edit list shifting the media timeline.
// - `mdia`: media header, handler and sample descriptions.
#[derive(Default, Clone)]
pub struct TrakBox { // Track Box
    pub tkhd: TkhdBox,
    pub edts: Option<EdtsBox>,
    pub mdia: MdiaBox,
}

impl TrakBox {
    pub fn is_video(&self) -> bool {
        &self.mdia.hdlr.handler_type == b"vide"
    }
}

impl std::fmt::Debug for TrakBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("TrakBox");
        dbg.field("box_size", &self.box_size())
           .field("box_type", &format_fourcc(&self.box_type()))
           .field("tkhd", &self.tkhd);
        if self.edts.is_some() { dbg.field("edts", &self.edts); }
        dbg.field("mdia", &self.mdia).finish()
    }
}

impl Mp4Box for TrakBox {
    fn box_type(&self) -> [u8; 4] { *b"trak" }

    fn box_size(&self) -> u32 {
        8 + self.tkhd.box_size()
          + self.edts.as_ref().map_or(0, |b| b.box_size())
          + self.mdia.box_size()
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_child(&self.tkhd, buffer);
        if let Some(edts) = &self.edts {
            write_child(edts, buffer);
        }
        write_child(&self.mdia, buffer);
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"trak")?;
        let (start, end) = (header.body_start(), header.end());
        let edts = match find_box(data, start, end, b"edts")? {
            Some(edts) => Some(read_child(data, &edts)?),
            None => None,
        };
        Ok((
            TrakBox {
                tkhd: read_child(data, &require_box(data, start, end, b"tkhd")?)?,
                edts,
                mdia: read_child(data, &require_box(data, start, end, b"mdia")?)?,
            },
            header.size,
        ))
    }
}
