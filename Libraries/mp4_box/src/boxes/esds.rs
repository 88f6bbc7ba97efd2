use crate::{format_capped_bytes, format_fourcc, read_bytes, read_u8, Mp4Error, Result};

use super::generic::{expect_header, Mp4Box};

const ES_DESCRIPTOR_TAG: u8 = 0x03;
const DECODER_CONFIG_TAG: u8 = 0x04;
const DECODER_SPECIFIC_INFO_TAG: u8 = 0x05;
const SL_CONFIG_TAG: u8 = 0x06;

// The `EsdsBox` struct represents an Elementary Stream Descriptor Box for MPEG-4 audio.
// Only the AudioSpecificConfig varies between streams; the surrounding descriptors are written
// with fixed values (ES id 1, object type 0x40 AAC, stream type audio, predefined SL config 2).
#[derive(Clone, Default)]
pub struct EsdsBox {
    pub audio_specific_config: Vec<u8>,
}

impl EsdsBox {
    fn decoder_config_len(&self) -> usize {
        13 + 2 + self.audio_specific_config.len()
    }

    fn es_descriptor_len(&self) -> usize {
        3 + 2 + self.decoder_config_len() + 3
    }
}

impl std::fmt::Debug for EsdsBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EsdsBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("audio_specific_config", &format_capped_bytes(&self.audio_specific_config))
            .finish()
    }
}

impl Mp4Box for EsdsBox {
    fn box_type(&self) -> [u8; 4] { *b"esds" }

    fn box_size(&self) -> u32 {
        (8 + 4 + 2 + self.es_descriptor_len()) as u32
    }

    // Descriptor lengths use the single byte form, so the config must stay under 100 bytes.
    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        buffer.extend_from_slice(&[0; 4]);  // version + flags

        buffer.push(ES_DESCRIPTOR_TAG);
        buffer.push(self.es_descriptor_len() as u8);
        buffer.extend_from_slice(&1u16.to_be_bytes());  // ES_ID
        buffer.push(0);  // no dependency, url or OCR stream

        buffer.push(DECODER_CONFIG_TAG);
        buffer.push(self.decoder_config_len() as u8);
        buffer.push(0x40);  // objectTypeIndication: MPEG-4 audio
        buffer.push(0x15);  // streamType audio, upstream 0, reserved 1
        buffer.extend_from_slice(&[0; 3]);  // bufferSizeDB
        buffer.extend_from_slice(&[0; 4]);  // maxBitrate
        buffer.extend_from_slice(&[0; 4]);  // avgBitrate

        buffer.push(DECODER_SPECIFIC_INFO_TAG);
        buffer.push(self.audio_specific_config.len() as u8);
        buffer.extend_from_slice(&self.audio_specific_config);

        buffer.push(SL_CONFIG_TAG);
        buffer.push(1);
        buffer.push(2);  // predefined: reserved for MP4 files
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"esds")?;
        let body = &data[..header.end()];

        let mut offset = 12;
        let (tag, _) = read_descriptor_header(body, &mut offset)?;
        if tag != ES_DESCRIPTOR_TAG {
            return Err(Mp4Error::malformed(format!("esds starts with descriptor tag {}", tag)));
        }
        offset += 2;  // ES_ID
        let es_flags = read_u8(body, offset)?;
        offset += 1;
        if es_flags & 0x80 != 0 {
            offset += 2;
        }
        if es_flags & 0x40 != 0 {
            offset += 1 + read_u8(body, offset)? as usize;
        }
        if es_flags & 0x20 != 0 {
            offset += 2;
        }

        let (tag, _) = read_descriptor_header(body, &mut offset)?;
        if tag != DECODER_CONFIG_TAG {
            return Err(Mp4Error::malformed(format!("expected decoder config descriptor, found tag {}", tag)));
        }
        offset += 13;

        let audio_specific_config = match read_descriptor_header(body, &mut offset) {
            Ok((DECODER_SPECIFIC_INFO_TAG, len)) => read_bytes(body, offset, len)?.to_vec(),
            _ => Vec::new(),
        };

        Ok((EsdsBox { audio_specific_config }, header.size))
    }
}

// Reads a descriptor tag and its variable length size (up to four 7-bit groups).
fn read_descriptor_header(data: &[u8], offset: &mut usize) -> Result<(u8, usize)> {
    let tag = read_u8(data, *offset)?;
    *offset += 1;
    let mut len = 0usize;
    for _ in 0..4 {
        let byte = read_u8(data, *offset)?;
        *offset += 1;
        len = (len << 7) | (byte & 0x7F) as usize;
        if byte & 0x80 == 0 {
            break;
        }
    }
    Ok((tag, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_fixed_descriptor_layout() {
        let esds = EsdsBox { audio_specific_config: vec![0x12, 0x10] };
        let mut out = Vec::new();
        esds.write_box(&mut out);

        let mut expected = vec![0, 0, 0, 0, 0x03, 0x19, 0x00, 0x01, 0x00, 0x04, 0x11, 0x40, 0x15];
        expected.extend_from_slice(&[0; 11]);
        expected.extend_from_slice(&[0x05, 0x02, 0x12, 0x10, 0x06, 0x01, 0x02]);
        assert_eq!(&out[8..], &expected[..]);
        assert_eq!(out.len(), esds.box_size() as usize);

        let (parsed, _) = EsdsBox::read_box(&out).unwrap();
        assert_eq!(parsed.audio_specific_config, vec![0x12, 0x10]);
    }
}
