use crate::{format_fourcc, read_u16_be, write_version_and_flags, Result};

use super::generic::{expect_header, Mp4Box};

// The `VmhdBox` struct represents a Video Media Header Box.
// Flags are always 1; graphics mode 0 (copy) and a zero opcolor.
#[derive(Clone, Default)]
pub struct VmhdBox { // Video Media Header Box
    pub graphics_mode: u16,
    pub opcolor: [u16; 3],
}

impl std::fmt::Debug for VmhdBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmhdBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("graphics_mode", &self.graphics_mode)
            .field("opcolor", &self.opcolor)
            .finish()
    }
}

impl Mp4Box for VmhdBox {
    fn box_type(&self) -> [u8; 4] { *b"vmhd" }

    fn box_size(&self) -> u32 {
        8 + 4 + 2 + 6
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, 1);
        buffer.extend_from_slice(&self.graphics_mode.to_be_bytes());
        for c in self.opcolor {
            buffer.extend_from_slice(&c.to_be_bytes());
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"vmhd")?;
        let body = &data[..header.end()];
        Ok((
            VmhdBox {
                graphics_mode: read_u16_be(body, 12)?,
                opcolor: [read_u16_be(body, 14)?, read_u16_be(body, 16)?, read_u16_be(body, 18)?],
            },
            header.size,
        ))
    }
}
