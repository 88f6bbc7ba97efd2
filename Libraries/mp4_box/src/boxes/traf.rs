use crate::{format_fourcc, Mp4Error, Result};

use super::generic::{child_boxes, expect_header, read_child, write_child, Mp4Box};
use super::piff::{PiffSampleEncryptionBox, PIFF_SAMPLE_ENCRYPTION};
use super::{saio::SaioBox, saiz::SaizBox, tfdt::TfdtBox, tfhd::TfhdBox, trun::TrunBox};

// The `TrafBox` struct represents a Track Fragment Box.
// Children are written in the order: tfhd, tfdt, trun, saiz, saio, PIFF sample encryption.
#[derive(Default, Clone)]
pub struct TrafBox { // Track Fragment Box
    pub tfhd: TfhdBox,
    pub tfdt: Option<TfdtBox>,
    pub trun: Option<TrunBox>,
    pub saiz: Option<SaizBox>,
    pub saio: Option<SaioBox>,
    pub sample_encryption: Option<PiffSampleEncryptionBox>,
}

impl std::fmt::Debug for TrafBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("TrafBox");
        dbg.field("box_size", &self.box_size())
           .field("box_type", &format_fourcc(&self.box_type()))
           .field("tfhd", &self.tfhd);
        if self.tfdt.is_some() { dbg.field("tfdt", &self.tfdt); }
        if self.trun.is_some() { dbg.field("trun", &self.trun); }
        if self.saiz.is_some() { dbg.field("saiz", &self.saiz); }
        if self.saio.is_some() { dbg.field("saio", &self.saio); }
        if self.sample_encryption.is_some() { dbg.field("sample_encryption", &self.sample_encryption); }
        dbg.finish()
    }
}

impl Mp4Box for TrafBox {
    fn box_type(&self) -> [u8; 4] { *b"traf" }

    fn box_size(&self) -> u32 {
        8 + self.tfhd.box_size()
          + self.tfdt.as_ref().map_or(0, |b| b.box_size())
          + self.trun.as_ref().map_or(0, |b| b.box_size())
          + self.saiz.as_ref().map_or(0, |b| b.box_size())
          + self.saio.as_ref().map_or(0, |b| b.box_size())
          + self.sample_encryption.as_ref().map_or(0, |b| b.box_size())
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_child(&self.tfhd, buffer);
        if let Some(tfdt) = &self.tfdt {
            write_child(tfdt, buffer);
        }
        if let Some(trun) = &self.trun {
            write_child(trun, buffer);
        }
        if let Some(saiz) = &self.saiz {
            write_child(saiz, buffer);
        }
        if let Some(saio) = &self.saio {
            write_child(saio, buffer);
        }
        if let Some(senc) = &self.sample_encryption {
            write_child(senc, buffer);
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"traf")?;
        let mut tfhd = None;
        let mut traf = TrafBox::default();

        for child in child_boxes(data, header.body_start(), header.end())? {
            match &child.box_type {
                b"tfhd" => tfhd = Some(read_child(data, &child)?),
                b"tfdt" => traf.tfdt = Some(read_child(data, &child)?),
                b"trun" => traf.trun = Some(read_child(data, &child)?),
                b"saiz" => traf.saiz = Some(read_child(data, &child)?),
                b"saio" => traf.saio = Some(read_child(data, &child)?),
                b"uuid" if data.get(child.start + 8..child.start + 24) == Some(&PIFF_SAMPLE_ENCRYPTION[..]) => {
                    traf.sample_encryption = Some(read_child(data, &child)?);
                }
                _ => {}
            }
        }

        traf.tfhd = tfhd.ok_or_else(|| Mp4Error::malformed("traf without tfhd"))?;
        Ok((traf, header.size))
    }
}
