use crate::{format_fourcc, Result};

use super::generic::{expect_header, read_child, require_box, write_child, Mp4Box};
use super::{hdlr::HdlrBox, mdhd::MdhdBox, minf::MinfBox};

// The `MdiaBox` struct represents a Media Box: the media header, the handler and the media
// information of one track.
#[derive(Default, Clone)]
pub struct MdiaBox { // Media Box
    pub mdhd: MdhdBox,
    pub hdlr: HdlrBox,
    pub minf: MinfBox,
}

impl std::fmt::Debug for MdiaBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MdiaBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("mdhd", &self.mdhd)
            .field("hdlr", &self.hdlr)
            .field("minf", &self.minf)
            .finish()
    }
}

impl Mp4Box for MdiaBox {
    fn box_type(&self) -> [u8; 4] { *b"mdia" }

    fn box_size(&self) -> u32 {
        8 + self.mdhd.box_size() + self.hdlr.box_size() + self.minf.box_size()
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_child(&self.mdhd, buffer);
        write_child(&self.hdlr, buffer);
        write_child(&self.minf, buffer);
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"mdia")?;
        let (start, end) = (header.body_start(), header.end());
        Ok((
            MdiaBox {
                mdhd: read_child(data, &require_box(data, start, end, b"mdhd")?)?,
                hdlr: read_child(data, &require_box(data, start, end, b"hdlr")?)?,
                minf: read_child(data, &require_box(data, start, end, b"minf")?)?,
            },
            header.size,
        ))
    }
}
