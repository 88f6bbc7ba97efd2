use crate::{format_fourcc, Mp4Error, Result};

use super::generic::{child_boxes, expect_header, read_child, write_child, Mp4Box};
use super::{dinf::DinfBox, smhd::SmhdBox, stbl::StblBox, vmhd::VmhdBox};

// The `MinfBox` struct represents a Media Information Box.
// Exactly one of `vmhd` (video) or `smhd` (audio) is expected.
#[derive(Default, Clone)]
pub struct MinfBox { // Media Information Box
    pub vmhd: Option<VmhdBox>,
    pub smhd: Option<SmhdBox>,
    pub dinf: DinfBox,
    pub stbl: StblBox,
}

impl std::fmt::Debug for MinfBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("MinfBox");
        dbg.field("box_size", &self.box_size())
           .field("box_type", &format_fourcc(&self.box_type()));
        if self.vmhd.is_some() { dbg.field("vmhd", &self.vmhd); }
        if self.smhd.is_some() { dbg.field("smhd", &self.smhd); }
        dbg.field("dinf", &self.dinf)
           .field("stbl", &self.stbl)
           .finish()
    }
}

impl Mp4Box for MinfBox {
    fn box_type(&self) -> [u8; 4] { *b"minf" }

    fn box_size(&self) -> u32 {
        8 + self.vmhd.as_ref().map_or(0, |b| b.box_size())
          + self.smhd.as_ref().map_or(0, |b| b.box_size())
          + self.dinf.box_size()
          + self.stbl.box_size()
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        if let Some(vmhd) = &self.vmhd {
            write_child(vmhd, buffer);
        }
        if let Some(smhd) = &self.smhd {
            write_child(smhd, buffer);
        }
        write_child(&self.dinf, buffer);
        write_child(&self.stbl, buffer);
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"minf")?;
        let mut vmhd = None;
        let mut smhd = None;
        let mut dinf = None;
        let mut stbl = None;

        for child in child_boxes(data, header.body_start(), header.end())? {
            match &child.box_type {
                b"vmhd" => vmhd = Some(read_child(data, &child)?),
                b"smhd" => smhd = Some(read_child(data, &child)?),
                b"dinf" => dinf = Some(read_child(data, &child)?),
                b"stbl" => stbl = Some(read_child(data, &child)?),
                _ => {}
            }
        }

        let stbl = stbl.ok_or_else(|| Mp4Error::malformed("minf without stbl"))?;
        Ok((
            MinfBox { vmhd, smhd, dinf: dinf.unwrap_or_default(), stbl },
            header.size,
        ))
    }
}
