use crate::{format_fourcc, Mp4Error, Result};

use super::generic::{child_boxes, expect_header, read_child, write_child, Mp4Box};
use super::{mfhd::MfhdBox, traf::TrafBox};

// The `MoofBox` struct represents a Movie Fragment Box: a sequence number and one `traf` per
// track present in the fragment.
#[derive(Default, Clone)]
pub struct MoofBox { // Movie Fragment Box
    pub mfhd: MfhdBox,
    pub trafs: Vec<TrafBox>,
}

impl std::fmt::Debug for MoofBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoofBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("mfhd", &self.mfhd)
            .field("trafs", &self.trafs)
            .finish()
    }
}

impl Mp4Box for MoofBox {
    fn box_type(&self) -> [u8; 4] { *b"moof" }

    fn box_size(&self) -> u32 {
        8 + self.mfhd.box_size() + self.trafs.iter().map(|t| t.box_size()).sum::<u32>()
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_child(&self.mfhd, buffer);
        for traf in &self.trafs {
            write_child(traf, buffer);
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"moof")?;
        let mut mfhd = None;
        let mut trafs = Vec::new();

        for child in child_boxes(data, header.body_start(), header.end())? {
            match &child.box_type {
                b"mfhd" => mfhd = Some(read_child(data, &child)?),
                b"traf" => trafs.push(read_child(data, &child)?),
                _ => {}
            }
        }

        let mfhd = mfhd.ok_or_else(|| Mp4Error::malformed("moof without mfhd"))?;
        Ok((MoofBox { mfhd, trafs }, header.size))
    }
}
