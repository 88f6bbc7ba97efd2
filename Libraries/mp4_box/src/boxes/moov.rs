use crate::{format_fourcc, Mp4Error, Result};

use super::generic::{child_boxes, expect_header, read_child, write_child, Mp4Box};
use super::{mvex::MvexBox, mvhd::MvhdBox, pssh::PsshBox, trak::TrakBox};

// The `MoovBox` struct represents a Movie Box, the container for all movie level metadata.
// It contains the following fields:
// - `mvhd`: the Movie Header Box.
// - `pssh`: protection system headers, one per DRM system.
// - `mvex`: present when the movie continues in fragments.
// - `traks`: one Track Box per track.
// Children are written in that order.
#[derive(Default, Clone)]
pub struct MoovBox { // Movie Box
    pub mvhd: MvhdBox,
    pub pssh: Vec<PsshBox>,
    pub traks: Vec<TrakBox>,
    pub mvex: Option<MvexBox>,
}

impl std::fmt::Debug for MoovBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("MoovBox");
        dbg.field("box_size", &self.box_size())
           .field("box_type", &format_fourcc(&self.box_type()))
           .field("mvhd", &self.mvhd);
        if !self.pssh.is_empty() { dbg.field("pssh", &self.pssh); }
        dbg.field("traks", &self.traks);
        if self.mvex.is_some() { dbg.field("mvex", &self.mvex); }
        dbg.finish()
    }
}

impl Mp4Box for MoovBox {
    fn box_type(&self) -> [u8; 4] { *b"moov" }

    fn box_size(&self) -> u32 {
        8 + self.mvhd.box_size()
          + self.pssh.iter().map(|p| p.box_size()).sum::<u32>()
          + self.traks.iter().map(|t| t.box_size()).sum::<u32>()
          + self.mvex.as_ref().map_or(0, |b| b.box_size())
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_child(&self.mvhd, buffer);
        for pssh in &self.pssh {
            write_child(pssh, buffer);
        }
        if let Some(mvex) = &self.mvex {
            write_child(mvex, buffer);
        }
        for trak in &self.traks {
            write_child(trak, buffer);
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"moov")?;
        let mut mvhd = None;
        let mut pssh = Vec::new();
        let mut traks = Vec::new();
        let mut mvex = None;

        for child in child_boxes(data, header.body_start(), header.end())? {
            match &child.box_type {
                b"mvhd" => mvhd = Some(read_child(data, &child)?),
                b"pssh" => pssh.push(read_child(data, &child)?),
                b"trak" => traks.push(read_child(data, &child)?),
                b"mvex" => mvex = Some(read_child(data, &child)?),
                _ => {}
            }
        }

        let mvhd = mvhd.ok_or_else(|| Mp4Error::malformed("moov without mvhd"))?;
        if traks.is_empty() {
            return Err(Mp4Error::malformed("moov must contain at least one trak"));
        }

        Ok((MoovBox { mvhd, pssh, traks, mvex }, header.size))
    }
}
