use crate::{format_fourcc, Result};

use super::elst::ElstBox;
use super::generic::{expect_header, require_box, write_child, Mp4Box};

// The `EdtsBox` struct represents an Edit Box, a container for a single `elst`.
#[derive(Clone, Default)]
pub struct EdtsBox {
    pub elst: ElstBox,
}

impl std::fmt::Debug for EdtsBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdtsBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("elst", &self.elst)
            .finish()
    }
}

impl Mp4Box for EdtsBox {
    fn box_type(&self) -> [u8; 4] { *b"edts" }

    fn box_size(&self) -> u32 {
        8 + self.elst.box_size()
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_child(&self.elst, buffer);
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"edts")?;
        let elst = require_box(data, header.body_start(), header.end(), b"elst")?;
        let (elst, _) = ElstBox::read_box(&data[elst.start..elst.end()])?;
        Ok((EdtsBox { elst }, header.size))
    }
}
