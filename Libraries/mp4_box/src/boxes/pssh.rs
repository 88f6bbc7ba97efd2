use crate::{format_capped_bytes, format_fourcc, read_array16, read_bytes, read_u32_be, read_version_and_flags, write_version_and_flags, Mp4Error, Result};

use super::generic::{expect_header, Mp4Box};

// The `PsshBox` struct represents a Protection System Specific Header Box.
// It carries opaque initialization data for one DRM system.
//
// Fields:
// - `system_id`: UUID of the protection system, big-endian.
// - `key_ids`: only written for version 1.
// - `data`: system specific payload (for PlayReady, the PlayReady object).
#[derive(Clone, Default)]
pub struct PsshBox { // Protection System Specific Header Box
    pub version: u8,
    pub system_id: [u8; 16],
    pub key_ids: Vec<[u8; 16]>,
    pub data: Vec<u8>,
}

impl PsshBox {
    pub fn new(system_id: [u8; 16], data: Vec<u8>) -> Self {
        PsshBox { version: 0, system_id, key_ids: Vec::new(), data }
    }
}

impl std::fmt::Debug for PsshBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PsshBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("version", &self.version)
            .field("system_id", &uuid::Uuid::from_bytes(self.system_id))
            .field("key_ids", &self.key_ids.iter().map(|k| uuid::Uuid::from_bytes(*k)).collect::<Vec<_>>())
            .field("data", &format_capped_bytes(&self.data))
            .finish()
    }
}

impl Mp4Box for PsshBox {
    fn box_type(&self) -> [u8; 4] { *b"pssh" }

    fn box_size(&self) -> u32 {
        let key_ids = if self.version > 0 { 4 + 16 * self.key_ids.len() } else { 0 };
        (8 + 4 + 16 + key_ids + 4 + self.data.len()) as u32
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, self.version, 0);
        buffer.extend_from_slice(&self.system_id);
        if self.version > 0 {
            buffer.extend_from_slice(&(self.key_ids.len() as u32).to_be_bytes());
            for kid in &self.key_ids {
                buffer.extend_from_slice(kid);
            }
        }
        buffer.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        buffer.extend_from_slice(&self.data);
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"pssh")?;
        let body = &data[..header.end()];
        let (version, _) = read_version_and_flags(body, 8)?;
        if version > 1 {
            return Err(Mp4Error::unsupported(format!("pssh version {}", version)));
        }
        let system_id = read_array16(body, 12)?;

        let mut offset = 28;
        let mut key_ids = Vec::new();
        if version > 0 {
            let count = read_u32_be(body, offset)?;
            offset += 4;
            for _ in 0..count {
                key_ids.push(read_array16(body, offset)?);
                offset += 16;
            }
        }
        let data_len = read_u32_be(body, offset)? as usize;
        let payload = read_bytes(body, offset + 4, data_len)?.to_vec();

        Ok((
            PsshBox { version, system_id, key_ids, data: payload },
            header.size,
        ))
    }
}
