use crate::{format_fourcc, read_u16_be, write_version_and_flags, Result};

use super::generic::{expect_header, Mp4Box};

// The `SmhdBox` struct represents a Sound Media Header Box.
// `balance` is 8.8 fixed-point, 0 is centre.
#[derive(Clone, Default)]
pub struct SmhdBox { // Sound Media Header Box
    pub balance: u16,
}

impl std::fmt::Debug for SmhdBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmhdBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("balance", &self.balance)
            .finish()
    }
}

impl Mp4Box for SmhdBox {
    fn box_type(&self) -> [u8; 4] { *b"smhd" }

    fn box_size(&self) -> u32 {
        8 + 4 + 4
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, 0);
        buffer.extend_from_slice(&self.balance.to_be_bytes());
        buffer.extend_from_slice(&[0; 2]);  // reserved
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"smhd")?;
        let balance = read_u16_be(&data[..header.end()], 12)?;
        Ok((SmhdBox { balance }, header.size))
    }
}
