use crate::{format_capped_bytes, format_fourcc, read_fourcc, read_u32_be, Mp4Error, Result};

// The `Mp4Box` trait defines a generic interface for the boxes this library reads and writes.
//
// Required Methods:
// - `box_type`: Returns the 4-byte type identifier of the box.
// - `box_size`: Calculates the total size of the box in bytes, including the 8-byte header.
// - `write_box`: Serializes the box (header included) into a buffer.
// - `read_box`: Parses a box that starts at offset 0 of the given slice.
pub trait Mp4Box {
    fn box_type(&self) -> [u8; 4];

    fn box_size(&self) -> u32;

    fn write_box(&self, buffer: &mut Vec<u8>);

    /// Reads a box from the given byte slice.
    /// Returns a tuple of (BoxInstance, bytes_consumed).
    fn read_box(data: &[u8]) -> Result<(Self, usize)> where Self: Sized;

    // Writes the 8-byte size/type header shared by every box.
    fn write_header(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.box_size().to_be_bytes());
        buffer.extend_from_slice(&self.box_type());
    }
}

/// Writes a child box and checks that it produced exactly the number of bytes it declared.
/// A mismatch means a box implementation is broken, so it is treated as a bug.
pub fn write_child<B: Mp4Box>(child: &B, buffer: &mut Vec<u8>) {
    let current_size = buffer.len();
    let child_size = child.box_size() as usize;
    child.write_box(buffer);
    if buffer.len() != current_size + child_size {
        panic!(
            "Error writing {} box: expected size {}, got {}",
            format_fourcc(&child.box_type()),
            child_size,
            buffer.len() - current_size
        );
    }
}

/// Location of one box inside a byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    pub start: usize,
    pub size: usize,
    pub box_type: [u8; 4],
}

impl BoxHeader {
    pub const LEN: usize = 8;

    pub fn end(&self) -> usize {
        self.start + self.size
    }

    pub fn body_start(&self) -> usize {
        self.start + Self::LEN
    }

    /// Reads the header at `offset`. The box must lie entirely within `data[..limit]`.
    pub fn read(data: &[u8], offset: usize, limit: usize) -> Result<Self> {
        let limit = limit.min(data.len());
        if offset.saturating_add(Self::LEN) > limit {
            return Err(Mp4Error::malformed(format!(
                "truncated box header at offset {} (limit {})",
                offset, limit
            )));
        }
        let size = read_u32_be(data, offset)? as usize;
        let box_type = read_fourcc(data, offset + 4)?;
        match size {
            0 => Err(Mp4Error::malformed(format!(
                "{} box at offset {} declares size zero",
                format_fourcc(&box_type),
                offset
            ))),
            1 => Err(Mp4Error::unsupported(format!(
                "{} box at offset {} uses a 64-bit size",
                format_fourcc(&box_type),
                offset
            ))),
            s if s < Self::LEN => Err(Mp4Error::malformed(format!(
                "{} box at offset {} declares size {} smaller than its header",
                format_fourcc(&box_type),
                offset,
                s
            ))),
            s if offset + s > limit => Err(Mp4Error::malformed(format!(
                "{} box at offset {} with size {} runs past the end ({})",
                format_fourcc(&box_type),
                offset,
                s,
                limit
            ))),
            s => Ok(BoxHeader { start: offset, size: s, box_type }),
        }
    }
}

/// Validates the header at the start of `data` against the expected type.
pub fn expect_header(data: &[u8], expected: &[u8; 4]) -> Result<BoxHeader> {
    let header = BoxHeader::read(data, 0, data.len())?;
    if &header.box_type != expected {
        return Err(Mp4Error::malformed(format!(
            "expected {} box, found {}",
            format_fourcc(expected),
            format_fourcc(&header.box_type)
        )));
    }
    Ok(header)
}

/// Lists the sibling boxes that exactly tile `data[start..end]`.
pub fn child_boxes(data: &[u8], start: usize, end: usize) -> Result<Vec<BoxHeader>> {
    let mut children = Vec::new();
    let mut offset = start;
    while offset < end {
        let header = BoxHeader::read(data, offset, end)?;
        offset = header.end();
        children.push(header);
    }
    Ok(children)
}

/// Finds the first sibling of type `target` inside `data[start..end]`.
pub fn find_box(data: &[u8], start: usize, end: usize, target: &[u8; 4]) -> Result<Option<BoxHeader>> {
    let mut offset = start;
    while offset < end {
        let header = BoxHeader::read(data, offset, end)?;
        if &header.box_type == target {
            return Ok(Some(header));
        }
        offset = header.end();
    }
    Ok(None)
}

/// Like [`find_box`] but a missing box is an error.
pub fn require_box(data: &[u8], start: usize, end: usize, target: &[u8; 4]) -> Result<BoxHeader> {
    find_box(data, start, end, target)?.ok_or_else(|| {
        Mp4Error::malformed(format!("required {} box not found", format_fourcc(target)))
    })
}

/// Parses the child located by `header` as a `B`.
pub fn read_child<B: Mp4Box>(data: &[u8], header: &BoxHeader) -> Result<B> {
    B::read_box(&data[header.start..header.end()]).map(|(child, _)| child)
}

// The `UnknownBox` struct represents a box that this library does not model.
// The payload is carried verbatim so it can be written back unchanged.
#[derive(Clone)]
pub struct UnknownBox {
    pub btype: [u8; 4], // The type of the box (4 bytes)
    pub data: Vec<u8>,  // Raw payload, header excluded
}

impl Default for UnknownBox {
    fn default() -> Self {
        UnknownBox {
            btype: *b"xxxx",
            data: Vec::new(),
        }
    }
}

impl std::fmt::Debug for UnknownBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnknownBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("data", &format_capped_bytes(&self.data))
            .finish()
    }
}

impl Mp4Box for UnknownBox {
    fn box_type(&self) -> [u8; 4] {
        self.btype
    }

    fn box_size(&self) -> u32 {
        8 + self.data.len() as u32
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        buffer.extend_from_slice(&self.data);
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = BoxHeader::read(data, 0, data.len())?;
        Ok((
            UnknownBox {
                btype: header.box_type,
                data: data[header.body_start()..header.end()].to_vec(),
            },
            header.size,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn header_rejects_zero_and_overlong_sizes() {
        let zero = [0, 0, 0, 0, b'f', b'r', b'e', b'e'];
        assert!(matches!(BoxHeader::read(&zero, 0, zero.len()), Err(Mp4Error::Malformed(_))));

        let mut long = raw_box(b"free", &[0; 4]);
        long[3] = 64;
        assert!(matches!(BoxHeader::read(&long, 0, long.len()), Err(Mp4Error::Malformed(_))));

        let large = [0, 0, 0, 1, b'm', b'd', b'a', b't', 0, 0, 0, 0, 0, 0, 0, 16];
        assert!(matches!(BoxHeader::read(&large, 0, large.len()), Err(Mp4Error::Unsupported(_))));
    }

    #[test]
    fn finds_sibling_boxes() {
        let mut data = raw_box(b"free", &[1, 2, 3]);
        data.extend(raw_box(b"skip", &[]));
        data.extend(raw_box(b"mdat", &[9; 5]));

        let children = child_boxes(&data, 0, data.len()).unwrap();
        assert_eq!(children.len(), 3);
        assert_eq!(&children[2].box_type, b"mdat");
        assert_eq!(children[2].start, 19);

        let mdat = find_box(&data, 0, data.len(), b"mdat").unwrap().unwrap();
        assert_eq!(mdat.size, 13);
        assert!(find_box(&data, 0, data.len(), b"moov").unwrap().is_none());
        assert!(require_box(&data, 0, data.len(), b"moov").is_err());
    }

    #[test]
    fn unknown_box_keeps_payload() {
        let data = raw_box(b"uuid", &[7; 20]);
        let (parsed, size) = UnknownBox::read_box(&data).unwrap();
        assert_eq!(size, 28);
        let mut out = Vec::new();
        parsed.write_box(&mut out);
        assert_eq!(out, data);
    }
}
