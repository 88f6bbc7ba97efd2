use crate::{format_fourcc, read_u16_be, read_u32_be, read_u64_be, read_version_and_flags, write_version_and_flags, Mp4Error, Result};

use super::generic::{expect_header, Mp4Box};

// The `MdhdBox` struct represents a Media Header Box.
// It carries the media timescale, which every sample timestamp of the track (including the
// fragments' base decode times) is expressed in.
//
// Fields:
// - `timescale`: media time units per second.
// - `duration`: media duration in `timescale` units, zero for fragmented tracks.
// - `language`: ISO 639-2/T code packed as three 5-bit letters.
#[derive(Clone)]
pub struct MdhdBox { // Media Header Box
    pub version: u8,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub language: String,
}

impl Default for MdhdBox {
    fn default() -> Self {
        MdhdBox {
            version: 0,
            creation_time: 0,
            modification_time: 0,
            timescale: 10_000_000,
            duration: 0,
            language: "und".to_string(),
        }
    }
}

impl std::fmt::Debug for MdhdBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MdhdBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("version", &self.version)
            .field("timescale", &self.timescale)
            .field("duration", &self.duration)
            .field("language", &self.language)
            .finish()
    }
}

impl Mp4Box for MdhdBox {
    fn box_type(&self) -> [u8; 4] { *b"mdhd" }

    fn box_size(&self) -> u32 {
        let variable = if self.version == 1 { 28 } else { 16 };
        8 + 4 + variable + 4  // header + version/flags + times + language/pre_defined
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, self.version, 0);

        if self.version == 1 {
            buffer.extend_from_slice(&self.creation_time.to_be_bytes());
            buffer.extend_from_slice(&self.modification_time.to_be_bytes());
            buffer.extend_from_slice(&self.timescale.to_be_bytes());
            buffer.extend_from_slice(&self.duration.to_be_bytes());
        } else {
            buffer.extend_from_slice(&(self.creation_time as u32).to_be_bytes());
            buffer.extend_from_slice(&(self.modification_time as u32).to_be_bytes());
            buffer.extend_from_slice(&self.timescale.to_be_bytes());
            buffer.extend_from_slice(&(self.duration as u32).to_be_bytes());
        }

        buffer.extend_from_slice(&encode_language(&self.language).to_be_bytes());
        buffer.extend_from_slice(&0u16.to_be_bytes());  // pre_defined
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"mdhd")?;
        let body = &data[..header.end()];
        let (version, _) = read_version_and_flags(body, 8)?;

        let (creation_time, modification_time, timescale, duration, lang_offset) = match version {
            1 => (
                read_u64_be(body, 12)?,
                read_u64_be(body, 20)?,
                read_u32_be(body, 28)?,
                read_u64_be(body, 32)?,
                40,
            ),
            0 => (
                read_u32_be(body, 12)? as u64,
                read_u32_be(body, 16)? as u64,
                read_u32_be(body, 20)?,
                read_u32_be(body, 24)? as u64,
                28,
            ),
            v => return Err(Mp4Error::unsupported(format!("mdhd version {}", v))),
        };

        let language = decode_language(read_u16_be(body, lang_offset)?);

        Ok((
            MdhdBox {
                version,
                creation_time,
                modification_time,
                timescale,
                duration,
                language,
            },
            header.size,
        ))
    }
}

/// Packs a three letter ISO 639-2/T code. Anything else maps to "und".
fn encode_language(lang: &str) -> u16 {
    let bytes = lang.as_bytes();
    let valid = bytes.len() == 3 && bytes.iter().all(|b| b.is_ascii_lowercase());
    let bytes = if valid { bytes } else { b"und" };
    (((bytes[0] - 0x60) as u16) << 10) |
    (((bytes[1] - 0x60) as u16) << 5)  |
    ((bytes[2] - 0x60) as u16)
}

fn decode_language(code: u16) -> String {
    let mut lang = String::new();
    lang.push((((code >> 10) & 0x1F) + 0x60) as u8 as char);
    lang.push((((code >> 5) & 0x1F) + 0x60) as u8 as char);
    lang.push(((code & 0x1F) + 0x60) as u8 as char);
    lang
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undetermined_language_packs_to_known_code() {
        assert_eq!(encode_language("und"), 0x55C4);
        assert_eq!(encode_language("??"), 0x55C4);
        assert_eq!(decode_language(0x55C4), "und");
    }
}
