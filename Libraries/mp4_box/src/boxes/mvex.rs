use crate::{format_fourcc, Result};

use super::generic::{child_boxes, expect_header, write_child, Mp4Box};
use super::trex::TrexBox;

// The `MvexBox` struct represents a Movie Extends Box.
// Its presence announces that the movie continues in fragments; it holds one `trex` per track.
#[derive(Clone)]
pub struct MvexBox {
    pub trex_entries: Vec<TrexBox>,
}

impl Default for MvexBox {
    fn default() -> Self {
        MvexBox { trex_entries: vec![TrexBox::default()] }
    }
}

impl std::fmt::Debug for MvexBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MvexBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("trex_entries", &self.trex_entries)
            .finish()
    }
}

impl Mp4Box for MvexBox {
    fn box_type(&self) -> [u8; 4] { *b"mvex" }

    fn box_size(&self) -> u32 {
        8 + self.trex_entries.iter().map(|t| t.box_size()).sum::<u32>()
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);
        for trex in &self.trex_entries {
            write_child(trex, buffer);
        }
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"mvex")?;
        let mut trex_entries = Vec::new();
        for child in child_boxes(data, header.body_start(), header.end())? {
            if &child.box_type == b"trex" {
                let (trex, _) = TrexBox::read_box(&data[child.start..child.end()])?;
                trex_entries.push(trex);
            }
        }
        Ok((MvexBox { trex_entries }, header.size))
    }
}
