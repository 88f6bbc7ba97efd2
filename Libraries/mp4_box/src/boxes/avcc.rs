use crate::{format_capped_bytes, format_fourcc, read_bytes, read_u16_be, read_u8, Mp4Error, Result};

use super::generic::{expect_header, Mp4Box};

// The `AvccBox` struct represents an AVC Decoder Configuration Record (`avcC`).
// It hands the decoder the H.264 parameter sets it needs before the first frame.
//
// Fields:
// - `profile_indication` / `profile_compatibility` / `level_indication`: copied from the SPS.
// - `length_size_minus_one`: NAL length prefix size minus one, 3 for 4-byte prefixes.
// - `sequence_parameter_sets` / `picture_parameter_sets`: raw NAL units without start codes.
#[derive(Clone)]
pub struct AvccBox { // AVC Configuration Box
    pub profile_indication: u8,
    pub profile_compatibility: u8,
    pub level_indication: u8,
    pub length_size_minus_one: u8,
    pub sequence_parameter_sets: Vec<Vec<u8>>,
    pub picture_parameter_sets: Vec<Vec<u8>>,
}

impl AvccBox {
    /// Main profile, level 3.0, a single SPS/PPS pair.
    pub fn with_parameter_sets(sps: &[u8], pps: &[u8]) -> Self {
        AvccBox {
            sequence_parameter_sets: vec![sps.to_vec()],
            picture_parameter_sets: vec![pps.to_vec()],
            ..AvccBox::default()
        }
    }
}

impl Default for AvccBox {
    fn default() -> Self {
        AvccBox {
            profile_indication: 0x4D,
            profile_compatibility: 0x40,
            level_indication: 0x1E,
            length_size_minus_one: 3,
            sequence_parameter_sets: Vec::new(),
            picture_parameter_sets: Vec::new(),
        }
    }
}

impl std::fmt::Debug for AvccBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvccBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("profile_indication", &format!("0x{:02X}", self.profile_indication))
            .field("profile_compatibility", &format!("0x{:02X}", self.profile_compatibility))
            .field("level_indication", &format!("0x{:02X}", self.level_indication))
            .field("sps", &self.sequence_parameter_sets.iter().map(|s| format_capped_bytes(s)).collect::<Vec<_>>())
            .field("pps", &self.picture_parameter_sets.iter().map(|p| format_capped_bytes(p)).collect::<Vec<_>>())
            .finish()
    }
}

impl Mp4Box for AvccBox {
    fn box_type(&self) -> [u8; 4] { *b"avcC" }

    fn box_size(&self) -> u32 {
        let sets: usize = self.sequence_parameter_sets.iter()
            .chain(self.picture_parameter_sets.iter())
            .map(|set| 2 + set.len())
            .sum();
        8 + 6 + 1 + sets as u32
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        buffer.push(1);  // configurationVersion
        buffer.push(self.profile_indication);
        buffer.push(self.profile_compatibility);
        buffer.push(self.level_indication);
        buffer.push(0xFC | (self.length_size_minus_one & 0x03));
        buffer.push(0xE0 | (self.sequence_parameter_sets.len() as u8 & 0x1F));
        for sps in &self.sequence_parameter_sets {
            buffer.extend_from_slice(&(sps.len() as u16).to_be_bytes());
            buffer.extend_from_slice(sps);
        }
        buffer.push(self.picture_parameter_sets.len() as u8);
        for pps in &self.picture_parameter_sets {
            buffer.extend_from_slice(&(pps.len() as u16).to_be_bytes());
            buffer.extend_from_slice(pps);
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"avcC")?;
        let body = &data[..header.end()];
        let configuration_version = read_u8(body, 8)?;
        if configuration_version != 1 {
            return Err(Mp4Error::unsupported(format!("avcC configuration version {}", configuration_version)));
        }

        let mut offset = 14;
        let read_sets = |count: usize, offset: &mut usize| -> Result<Vec<Vec<u8>>> {
            let mut sets = Vec::with_capacity(count);
            for _ in 0..count {
                let len = read_u16_be(body, *offset)? as usize;
                sets.push(read_bytes(body, *offset + 2, len)?.to_vec());
                *offset += 2 + len;
            }
            Ok(sets)
        };

        let sps_count = (read_u8(body, 13)? & 0x1F) as usize;
        let sequence_parameter_sets = read_sets(sps_count, &mut offset)?;
        let pps_count = read_u8(body, offset)? as usize;
        offset += 1;
        let picture_parameter_sets = read_sets(pps_count, &mut offset)?;

        Ok((
            AvccBox {
                profile_indication: read_u8(body, 9)?,
                profile_compatibility: read_u8(body, 10)?,
                level_indication: read_u8(body, 11)?,
                length_size_minus_one: read_u8(body, 12)? & 0x03,
                sequence_parameter_sets,
                picture_parameter_sets,
            },
            header.size,
        ))
    }
}
