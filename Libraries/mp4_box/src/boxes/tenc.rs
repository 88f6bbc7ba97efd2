use crate::{format_fourcc, read_array16, read_u8, read_version_and_flags, write_version_and_flags, Result};

use super::generic::{expect_header, Mp4Box};

// The `TencBox` struct represents a Track Encryption Box.
// It holds the default protection parameters for every sample of the track.
//
// Fields:
// - `is_protected`: 1 when samples are encrypted by default.
// - `per_sample_iv_size`: 0, 8 or 16.
// - `default_kid`: key id in big-endian UUID byte order.
#[derive(Clone)]
pub struct TencBox { // Track Encryption Box
    pub is_protected: u8,
    pub per_sample_iv_size: u8,
    pub default_kid: [u8; 16],
}

impl Default for TencBox {
    fn default() -> Self {
        TencBox {
            is_protected: 1,
            per_sample_iv_size: 8,
            default_kid: [0; 16],
        }
    }
}

impl std::fmt::Debug for TencBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TencBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("is_protected", &self.is_protected)
            .field("per_sample_iv_size", &self.per_sample_iv_size)
            .field("default_kid", &uuid::Uuid::from_bytes(self.default_kid))
            .finish()
    }
}

impl Mp4Box for TencBox {
    fn box_type(&self) -> [u8; 4] { *b"tenc" }

    fn box_size(&self) -> u32 {
        8 + 4 + 4 + 16
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, 0);
        buffer.extend_from_slice(&[0, 0]);  // reserved
        buffer.push(self.is_protected);
        buffer.push(self.per_sample_iv_size);
        buffer.extend_from_slice(&self.default_kid);
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"tenc")?;
        let body = &data[..header.end()];
        let _ = read_version_and_flags(body, 8)?;
        Ok((
            TencBox {
                is_protected: read_u8(body, 14)?,
                per_sample_iv_size: read_u8(body, 15)?,
                default_kid: read_array16(body, 16)?,
            },
            header.size,
        ))
    }
}
