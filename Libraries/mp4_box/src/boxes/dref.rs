use crate::{format_fourcc, read_u32_be, read_version_and_flags, write_version_and_flags, Mp4Error, Result};

use super::generic::{child_boxes, expect_header, write_child, Mp4Box};

// The `DrefBox` struct represents a Data Reference Box.
// Fragmented streams keep their samples in the same file, so the single `url ` entry carries
// flag 0x000001 (self-contained) and no location.
#[derive(Clone)]
pub struct DrefBox {
    pub entries: Vec<DataEntryUrlBox>,
}

#[derive(Clone)]
pub struct DataEntryUrlBox {
    pub flags: u32,  // 0x000001 indicates data is in the same file
    pub location: Option<String>,
}

impl Default for DrefBox {
    fn default() -> Self {
        DrefBox { entries: vec![DataEntryUrlBox::default()] }
    }
}

impl Default for DataEntryUrlBox {
    fn default() -> Self {
        DataEntryUrlBox { flags: 0x000001, location: None }
    }
}

impl std::fmt::Debug for DrefBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrefBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("entries", &self.entries)
            .finish()
    }
}

impl std::fmt::Debug for DataEntryUrlBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("DataEntryUrlBox");
        dbg.field("flags", &format!("0x{:06X}", self.flags));
        if let Some(loc) = &self.location {
            dbg.field("location", loc);
        }
        dbg.finish()
    }
}

impl Mp4Box for DrefBox {
    fn box_type(&self) -> [u8; 4] { *b"dref" }

    fn box_size(&self) -> u32 {
        8 + 4 + 4 + self.entries.iter().map(|e| e.box_size()).sum::<u32>()
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, 0);
        buffer.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        for entry in &self.entries {
            write_child(entry, buffer);
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"dref")?;
        let body = &data[..header.end()];
        let entry_count = read_u32_be(body, 12)? as usize;

        let mut entries = Vec::new();
        for child in child_boxes(body, 16, body.len())? {
            if &child.box_type == b"url " {
                let (entry, _) = DataEntryUrlBox::read_box(&body[child.start..child.end()])?;
                entries.push(entry);
            }
        }
        if entries.len() != entry_count {
            return Err(Mp4Error::malformed(format!(
                "dref declares {} entries but holds {}",
                entry_count,
                entries.len()
            )));
        }

        Ok((DrefBox { entries }, header.size))
    }
}

impl Mp4Box for DataEntryUrlBox {
    fn box_type(&self) -> [u8; 4] { *b"url " }

    fn box_size(&self) -> u32 {
        let location = self.location.as_ref().map(|l| l.len() as u32 + 1).unwrap_or(0);
        8 + 4 + location
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        write_version_and_flags(buffer, 0, self.flags);
        if let Some(location) = &self.location {
            buffer.extend_from_slice(location.as_bytes());
            buffer.push(0);
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"url ")?;
        let body = &data[..header.end()];
        let (_, flags) = read_version_and_flags(body, 8)?;
        let location = if body.len() > 12 {
            let raw = &body[12..];
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            Some(String::from_utf8_lossy(&raw[..end]).to_string())
        } else {
            None
        };
        Ok((DataEntryUrlBox { flags, location }, header.size))
    }
}
