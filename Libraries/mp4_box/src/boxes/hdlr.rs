use crate::{format_fourcc, read_fourcc, write_version_and_flags, Result};

use super::generic::{expect_header, Mp4Box};

// The `HdlrBox` struct represents a Handler Reference Box.
// It tells the sink which kind of media the track carries.
//
// Fields:
// - `handler_type`: `vide` for video, `soun` for audio.
// - `name`: human readable handler name, written null-terminated.
#[derive(Clone)]
pub struct HdlrBox {
    pub handler_type: [u8; 4],
    pub name: String,
}

impl HdlrBox {
    pub fn video() -> Self {
        HdlrBox { handler_type: *b"vide", name: "VideoHandler".to_string() }
    }

    pub fn audio() -> Self {
        HdlrBox { handler_type: *b"soun", name: "SoundHandler".to_string() }
    }
}

impl Default for HdlrBox {
    fn default() -> Self {
        HdlrBox::video()
    }
}

impl std::fmt::Debug for HdlrBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HdlrBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("handler_type", &format_fourcc(&self.handler_type))
            .field("name", &self.name)
            .finish()
    }
}

impl Mp4Box for HdlrBox {
    fn box_type(&self) -> [u8; 4] { *b"hdlr" }

    fn box_size(&self) -> u32 {
        8 + 4 + 4 + 4 + 12 + (self.name.len() as u32 + 1)  // +1 for null-terminator
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, 0);
        buffer.extend_from_slice(&0u32.to_be_bytes());  // pre_defined
        buffer.extend_from_slice(&self.handler_type);
        buffer.extend_from_slice(&[0; 12]);  // reserved
        buffer.extend_from_slice(self.name.as_bytes());
        buffer.push(0);
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"hdlr")?;
        let body = &data[..header.end()];
        let handler_type = read_fourcc(body, 16)?;

        let name_start = 32.min(body.len());
        let name_end = body[name_start..]
            .iter()
            .position(|&b| b == 0)
            .map(|pos| name_start + pos)
            .unwrap_or(body.len());
        let name = String::from_utf8_lossy(&body[name_start..name_end]).to_string();

        Ok((HdlrBox { handler_type, name }, header.size))
    }
}
