use crate::{format_capped_bytes, format_fourcc, Result};

use super::generic::{expect_header, Mp4Box};

// The `MdatBox` struct represents a Media Data Box holding the raw sample bytes of a fragment.
#[derive(Default, Clone)]
pub struct MdatBox { // Media Data Box
    pub data: Vec<u8>,
}

impl std::fmt::Debug for MdatBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MdatBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("data", &format_capped_bytes(&self.data))
            .finish()
    }
}

impl Mp4Box for MdatBox {
    fn box_type(&self) -> [u8; 4] { *b"mdat" }

    fn box_size(&self) -> u32 {
        8 + self.data.len() as u32
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        buffer.extend_from_slice(&self.data);
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"mdat")?;
        Ok((
            MdatBox { data: data[header.body_start()..header.end()].to_vec() },
            header.size,
        ))
    }
}
