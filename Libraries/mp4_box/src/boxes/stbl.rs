use crate::{format_fourcc, Result};

use super::generic::{child_boxes, expect_header, read_child, write_child, Mp4Box};
use super::{stco::StcoBox, stsc::StscBox, stsd::StsdBox, stss::StssBox, stsz::StszBox, stts::SttsBox};

// The `StblBox` struct represents a Sample Table Box.
// In a fragmented movie only `stsd` carries information; the sample tables are present but empty.
#[derive(Default, Clone)]
pub struct StblBox { // Sample Table Box
    pub stsd: StsdBox,
    pub stts: SttsBox,
    pub stsc: StscBox,
    pub stco: StcoBox,
    pub stsz: StszBox,
    pub stss: Option<StssBox>,  // video only
}

impl std::fmt::Debug for StblBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StblBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("stsd", &self.stsd)
            .field("stts", &self.stts)
            .field("stsc", &self.stsc)
            .field("stco", &self.stco)
            .field("stsz", &self.stsz)
            .field("stss", &self.stss)
            .finish()
    }
}

impl Mp4Box for StblBox {
    fn box_type(&self) -> [u8; 4] { *b"stbl" }

    fn box_size(&self) -> u32 {
        8 + self.stsd.box_size()
          + self.stts.box_size()
          + self.stsc.box_size()
          + self.stco.box_size()
          + self.stsz.box_size()
          + self.stss.as_ref().map_or(0, |b| b.box_size())
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_child(&self.stsd, buffer);
        write_child(&self.stts, buffer);
        write_child(&self.stsc, buffer);
        write_child(&self.stco, buffer);
        write_child(&self.stsz, buffer);
        if let Some(stss) = &self.stss {
            write_child(stss, buffer);
        }
    }

    // Missing tables read as empty ones; only `stsd` is mandatory.
    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"stbl")?;
        let mut stbl = StblBox::default();
        let mut has_stsd = false;

        for child in child_boxes(data, header.body_start(), header.end())? {
            match &child.box_type {
                b"stsd" => {
                    stbl.stsd = read_child(data, &child)?;
                    has_stsd = true;
                }
                b"stts" => stbl.stts = read_child(data, &child)?,
                b"stsc" => stbl.stsc = read_child(data, &child)?,
                b"stco" => stbl.stco = read_child(data, &child)?,
                b"stsz" => stbl.stsz = read_child(data, &child)?,
                b"stss" => stbl.stss = Some(read_child(data, &child)?),
                _ => {}
            }
        }

        if !has_stsd {
            return Err(crate::Mp4Error::malformed("stbl without stsd"));
        }
        Ok((stbl, header.size))
    }
}
