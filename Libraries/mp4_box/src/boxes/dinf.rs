use crate::{format_fourcc, Result};

use super::dref::DrefBox;
use super::generic::{expect_header, require_box, write_child, Mp4Box};

// The `DinfBox` struct represents a Data Information Box, a plain container for `dref`.
#[derive(Clone, Default)]
pub struct DinfBox {
    pub dref: DrefBox,
}

impl std::fmt::Debug for DinfBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DinfBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("dref", &self.dref)
            .finish()
    }
}

impl Mp4Box for DinfBox {
    fn box_type(&self) -> [u8; 4] { *b"dinf" }

    fn box_size(&self) -> u32 {
        8 + self.dref.box_size()
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_child(&self.dref, buffer);
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"dinf")?;
        let dref = require_box(data, header.body_start(), header.end(), b"dref")?;
        let (dref, _) = DrefBox::read_box(&data[dref.start..dref.end()])?;
        Ok((DinfBox { dref }, header.size))
    }
}
