use crate::{format_fourcc, read_fourcc, read_u32_be, read_version_and_flags, write_version_and_flags, Result};

use super::generic::{expect_header, require_box, write_child, Mp4Box};
use super::tenc::TencBox;

// The `SinfBox` struct represents a Protection Scheme Information Box.
// It sits inside an `encv`/`enca` sample entry and names the format the samples decode to once
// decrypted, the protection scheme, and the scheme parameters (`schi/tenc`).
#[derive(Clone)]
pub struct SinfBox { // Protection Scheme Information Box
    pub original_format: [u8; 4],  // frma
    pub scheme_type: [u8; 4],      // schm
    pub scheme_version: u32,
    pub tenc: TencBox,             // schi/tenc
}

impl SinfBox {
    pub fn cenc(original_format: [u8; 4], tenc: TencBox) -> Self {
        SinfBox {
            original_format,
            scheme_type: *b"cenc",
            scheme_version: 0x0001_0000,
            tenc,
        }
    }

    fn schi_size(&self) -> u32 {
        8 + self.tenc.box_size()
    }
}

impl Default for SinfBox {
    fn default() -> Self {
        SinfBox::cenc(*b"avc1", TencBox::default())
    }
}

impl std::fmt::Debug for SinfBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinfBox")
            .field("box_size", &self.box_size())
            .field("box_type", &format_fourcc(&self.box_type()))
            .field("original_format", &format_fourcc(&self.original_format))
            .field("scheme_type", &format_fourcc(&self.scheme_type))
            .field("scheme_version", &format!("0x{:08X}", self.scheme_version))
            .field("tenc", &self.tenc)
            .finish()
    }
}

impl Mp4Box for SinfBox {
    fn box_type(&self) -> [u8; 4] { *b"sinf" }

    // sinf header + frma (12) + schm (20) + schi
    fn box_size(&self) -> u32 {
        8 + 12 + 20 + self.schi_size()
    }

    fn write_box(&self, buffer: &mut Vec<u8>) {
        self.write_header(buffer);

        buffer.extend_from_slice(&12u32.to_be_bytes());
        buffer.extend_from_slice(b"frma");
        buffer.extend_from_slice(&self.original_format);

        buffer.extend_from_slice(&20u32.to_be_bytes());
        buffer.extend_from_slice(b"schm");
        write_version_and_flags(buffer, 0, 0);
        buffer.extend_from_slice(&self.scheme_type);
        buffer.extend_from_slice(&self.scheme_version.to_be_bytes());

        buffer.extend_from_slice(&self.schi_size().to_be_bytes());
        buffer.extend_from_slice(b"schi");
        write_child(&self.tenc, buffer);
    }

    fn read_box(data: &[u8]) -> Result<(Self, usize)> {
        let header = expect_header(data, b"sinf")?;
        let (start, end) = (header.body_start(), header.end());

        let frma = require_box(data, start, end, b"frma")?;
        let original_format = read_fourcc(&data[..frma.end()], frma.body_start())?;

        let schm = require_box(data, start, end, b"schm")?;
        let schm_data = &data[..schm.end()];
        let _ = read_version_and_flags(schm_data, schm.body_start())?;
        let scheme_type = read_fourcc(schm_data, schm.body_start() + 4)?;
        let scheme_version = read_u32_be(schm_data, schm.body_start() + 8)?;

        let schi = require_box(data, start, end, b"schi")?;
        let tenc = require_box(data, schi.body_start(), schi.end(), b"tenc")?;
        let (tenc, _) = TencBox::read_box(&data[tenc.start..tenc.end()])?;

        Ok((
            SinfBox { original_format, scheme_type, scheme_version, tenc },
            header.size,
        ))
    }
}
