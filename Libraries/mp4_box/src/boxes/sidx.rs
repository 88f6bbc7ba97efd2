use crate::{format_fourcc, read_u16_be, read_u32_be, read_u64_be, read_version_and_flags, write_version_and_flags, Mp4Error, Result};

use super::generic::{expect_header, Mp4Box};

// The `SidxBox` struct represents a Segment Index Box.
// It indexes a track as a run of contiguous subsegments; offsets are relative to the first byte
// after the `sidx` box itself.
//
// Fields:
// - `reference_id`: stream the index applies to.
// - `timescale`: units of `earliest_presentation_time` and subsegment durations.
// - `first_offset`: gap between the end of this box and the first subsegment.
// - `references`: one entry per subsegment, in file order.
#[derive(Clone, Default)]
pub struct SidxBox { // Segment Index Box
    pub version: u8,
    pub reference_id: u32,
    pub timescale: u32,
    pub earliest_presentation_time: u64,
    pub first_offset: u64,
    pub references: Vec<SidxReference>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SidxReference {
    pub reference_type: bool,  // true when the reference points at another sidx
    pub referenced_size: u32,  // 31 bits
    pub subsegment_duration: u32,
    pub sap: u32,              // starts_with_SAP, SAP_type and SAP_delta_time packed as on the wire
}

impl std::fmt::Debug for SidxBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SidxBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("version", &self.version)
            .field("reference_id", &self.reference_id)
            .field("timescale", &self.timescale)
            .field("earliest_presentation_time", &self.earliest_presentation_time)
            .field("first_offset", &self.first_offset)
            .field("references", &self.references)
            .finish()
    }
}

impl Mp4Box for SidxBox {
    fn box_type(&self) -> [u8; 4] { *b"sidx" }

    fn box_size(&self) -> u32 {
        let times = if self.version == 0 { 8 } else { 16 };
        8 + 4 + 8 + times + 4 + 12 * self.references.len() as u32
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, self.version, 0);
        buffer.extend_from_slice(&self.reference_id.to_be_bytes());
        buffer.extend_from_slice(&self.timescale.to_be_bytes());
        if self.version == 0 {
            buffer.extend_from_slice(&(self.earliest_presentation_time as u32).to_be_bytes());
            buffer.extend_from_slice(&(self.first_offset as u32).to_be_bytes());
        } else {
            buffer.extend_from_slice(&self.earliest_presentation_time.to_be_bytes());
            buffer.extend_from_slice(&self.first_offset.to_be_bytes());
        }
        buffer.extend_from_slice(&0u16.to_be_bytes());  // reserved
        buffer.extend_from_slice(&(self.references.len() as u16).to_be_bytes());
        for reference in &self.references {
            let type_and_size = ((reference.reference_type as u32) << 31) | (reference.referenced_size & 0x7FFF_FFFF);
            buffer.extend_from_slice(&type_and_size.to_be_bytes());
            buffer.extend_from_slice(&reference.subsegment_duration.to_be_bytes());
            buffer.extend_from_slice(&reference.sap.to_be_bytes());
        }
    }

    // The declared size must be exactly the size implied by the reference count.
    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"sidx")?;
        let body = &data[..header.end()];
        let (version, _) = read_version_and_flags(body, 8)?;
        let reference_id = read_u32_be(body, 12)?;
        let timescale = read_u32_be(body, 16)?;

        let (earliest_presentation_time, first_offset, mut offset) = match version {
            0 => (read_u32_be(body, 20)? as u64, read_u32_be(body, 24)? as u64, 28),
            1 => (read_u64_be(body, 20)?, read_u64_be(body, 28)?, 36),
            v => return Err(Mp4Error::unsupported(format!("sidx version {}", v))),
        };

        offset += 2;  // reserved
        let reference_count = read_u16_be(body, offset)?;
        offset += 2;

        let mut references = Vec::with_capacity(reference_count as usize);
        for _ in 0..reference_count {
            let type_and_size = read_u32_be(body, offset)?;
            references.push(SidxReference {
                reference_type: type_and_size & 0x8000_0000 != 0,
                referenced_size: type_and_size & 0x7FFF_FFFF,
                subsegment_duration: read_u32_be(body, offset + 4)?,
                sap: read_u32_be(body, offset + 8)?,
            });
            offset += 12;
        }

        if offset != header.size {
            return Err(Mp4Error::malformed(format!(
                "sidx declares {} bytes but its references end at {}",
                header.size, offset
            )));
        }

        Ok((
            SidxBox {
                version,
                reference_id,
                timescale,
                earliest_presentation_time,
                first_offset,
                references,
            },
            header.size,
        ))
    }
}
