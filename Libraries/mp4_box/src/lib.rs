//! # Fragmented MP4 for adaptive streaming
//!
//! Streaming clients that feed a buffered-media sink deal with two halves of an ISO-BMFF
//! stream: an **initialization segment** (`moov` and its children, describing the tracks and
//! codecs) and a sequence of **media fragments** (`moof` + `mdat` pairs carrying the samples).
//!
//! ## Box layout
//! Every box starts with a 4-byte big-endian size followed by a 4-byte ASCII type. Container
//! boxes (`moov`, `trak`, `mdia`, `minf`, `stbl`, `moof`, `traf`, ...) hold child boxes as their
//! payload, full boxes prefix their payload with a version byte and 24 bits of flags.
//!
//! ## What this library covers
//! - The `boxes` module defines the subset of boxes needed to describe one audio or video track
//!   in a fragmented file, plus the segment index (`sidx`), protection (`pssh`, `sinf`, `tenc`)
//!   and sample auxiliary information (`saiz`, `saio`) boxes.
//! - The `reader` module scans box headers, splits initialization data from the media that
//!   follows it and decodes segment index boxes into byte/time references.
//! - The `writer` module synthesizes an initialization segment for sources that only describe
//!   their codec parameters in a manifest.
//! - The `fragment` module rewrites incoming fragments so a standards-compliant sink accepts
//!   them: it inserts a decode time box and moves vendor encryption metadata into `saiz`/`saio`.
//!
//! Every size or offset read from input is bounds-checked; a box whose size is zero or
//! points past the end of the buffer is reported as [`Mp4Error::Malformed`].

pub mod boxes;
pub mod error;
pub mod fragment;
pub mod reader;
pub mod writer;

pub use error::{Mp4Error, Result};

pub fn format_fourcc(fourcc: &[u8; 4]) -> String {
    std::str::from_utf8(fourcc).unwrap_or("????").to_string()
}

pub fn format_capped_bytes(data: &[u8]) -> String {
    let capped = &data[..data.len().min(8)];
    if data.len() > 8 {
        format!("{:?} ...", capped)
    } else {
        format!("{:?}", capped)
    }
}

pub fn read_bytes(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            Mp4Error::malformed(format!(
                "read of {} bytes at offset {} past end of {} byte buffer",
                len,
                offset,
                data.len()
            ))
        })
}

pub fn read_u8(data: &[u8], offset: usize) -> Result<u8> {
    Ok(read_bytes(data, offset, 1)?[0])
}

pub fn read_u16_be(data: &[u8], offset: usize) -> Result<u16> {
    let b = read_bytes(data, offset, 2)?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

pub fn read_u32_be(data: &[u8], offset: usize) -> Result<u32> {
    let b = read_bytes(data, offset, 4)?;
    Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

pub fn read_u64_be(data: &[u8], offset: usize) -> Result<u64> {
    let b = read_bytes(data, offset, 8)?;
    Ok(u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
}

pub fn read_fourcc(data: &[u8], offset: usize) -> Result<[u8; 4]> {
    let b = read_bytes(data, offset, 4)?;
    Ok([b[0], b[1], b[2], b[3]])
}

pub fn read_array16(data: &[u8], offset: usize) -> Result<[u8; 16]> {
    let mut out = [0u8; 16];
    out.copy_from_slice(read_bytes(data, offset, 16)?);
    Ok(out)
}

/// Reads the version byte and 24-bit flags of a full box payload starting at `offset`.
pub fn read_version_and_flags(data: &[u8], offset: usize) -> Result<(u8, u32)> {
    let b = read_bytes(data, offset, 4)?;
    let flags = ((b[1] as u32) << 16) | ((b[2] as u32) << 8) | b[3] as u32;
    Ok((b[0], flags))
}

pub fn write_version_and_flags(buffer: &mut Vec<u8>, version: u8, flags: u32) {
    buffer.push(version);
    buffer.push(((flags >> 16) & 0xFF) as u8);
    buffer.push(((flags >> 8) & 0xFF) as u8);
    buffer.push((flags & 0xFF) as u8);
}

/// Overwrites a big-endian u32 in place.
pub fn patch_u32_be(buffer: &mut [u8], offset: usize, value: u32) -> Result<()> {
    let end = offset
        .checked_add(4)
        .filter(|end| *end <= buffer.len())
        .ok_or_else(|| Mp4Error::malformed(format!("patch at offset {} past end of buffer", offset)))?;
    buffer[offset..end].copy_from_slice(&value.to_be_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_bounds_checked() {
        let data = [0x00, 0x00, 0x01, 0x02, 0xFF];
        assert_eq!(read_u32_be(&data, 0), Ok(0x0102));
        assert_eq!(read_u8(&data, 4), Ok(0xFF));
        assert!(matches!(read_u32_be(&data, 2), Err(Mp4Error::Malformed(_))));
        assert!(matches!(read_bytes(&data, usize::MAX, 2), Err(Mp4Error::Malformed(_))));
    }

    #[test]
    fn version_and_flags_round_trip() {
        let mut buffer = Vec::new();
        write_version_and_flags(&mut buffer, 1, 0x000305);
        assert_eq!(buffer, vec![1, 0, 3, 5]);
        assert_eq!(read_version_and_flags(&buffer, 0), Ok((1, 0x000305)));
    }

    #[test]
    fn patch_rejects_out_of_range() {
        let mut buffer = vec![0u8; 6];
        patch_u32_be(&mut buffer, 2, 0xAABBCCDD).unwrap();
        assert_eq!(&buffer[2..], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert!(patch_u32_be(&mut buffer, 3, 1).is_err());
    }
}
