//! Rewrites Smooth Streaming fragments into the shape a fragmented MP4 sink accepts.
//!
//! Smooth Streaming servers send `moof` + `mdat` pairs without a `tfdt` (the decode time lives
//! in the manifest) and, for protected content, with per-sample IVs in a PIFF `uuid` box instead
//! of `saiz`/`saio` auxiliary information. Both are fixed up here at byte level; the input is
//! never modified so a failed rewrite leaves the caller's buffer as it was.

use tracing::trace;

use crate::boxes::generic::{require_box, BoxHeader, Mp4Box};
use crate::boxes::piff::PiffSampleEncryptionBox;
use crate::boxes::saio::SaioBox;
use crate::boxes::saiz::SaizBox;
use crate::boxes::tfdt::TfdtBox;
use crate::boxes::trun::TRUN_DATA_OFFSET;
use crate::{format_fourcc, patch_u32_be, read_u32_be, read_version_and_flags, Mp4Error, Result};

/// IV size used by Smooth Streaming PlayReady content.
pub const PIFF_IV_SIZE: usize = 8;

// Offsets inside the boxes that get patched.
const TFHD_TRACK_ID: usize = 12;
const TRUN_SAMPLE_COUNT: usize = 12;
const TRUN_DATA_OFFSET_FIELD: usize = 16;

// Box locations of one fragment, all relative to the start of the buffer.
struct FragmentLayout {
    moof: BoxHeader,
    traf: BoxHeader,
    tfhd: BoxHeader,
    trun: BoxHeader,
}

impl FragmentLayout {
    fn locate(data: &[u8]) -> Result<Self> {
        let moof = BoxHeader::read(data, 0, data.len())?;
        if &moof.box_type != b"moof" {
            return Err(Mp4Error::malformed(format!(
                "fragment starts with {} instead of moof",
                format_fourcc(&moof.box_type)
            )));
        }
        let traf = require_box(data, moof.body_start(), moof.end(), b"traf")?;
        let tfhd = require_box(data, traf.body_start(), traf.end(), b"tfhd")?;
        let trun = require_box(data, traf.body_start(), traf.end(), b"trun")?;

        if tfhd.size < TFHD_TRACK_ID + 4 {
            return Err(Mp4Error::malformed("tfhd too small to hold a track id"));
        }
        let (_, flags) = read_version_and_flags(data, trun.body_start())?;
        if flags & TRUN_DATA_OFFSET == 0 {
            return Err(Mp4Error::unsupported("trun without a data offset"));
        }
        if trun.size < TRUN_DATA_OFFSET_FIELD + 4 {
            return Err(Mp4Error::malformed("trun too small to hold a data offset"));
        }

        Ok(FragmentLayout { moof, traf, tfhd, trun })
    }

    fn sample_count(&self, data: &[u8]) -> Result<u32> {
        read_u32_be(data, self.trun.start + TRUN_SAMPLE_COUNT)
    }

    fn data_offset_position(&self) -> usize {
        self.trun.start + TRUN_DATA_OFFSET_FIELD
    }
}

/// Inserts a `tfdt` carrying `base_media_decode_time` and, when `is_encrypted`, moves the PIFF
/// sample encryption data into `saiz`/`saio` plus the front of `mdat`.
///
/// The fragment's track id is forced to 1 to match the synthesized initialization segment.
pub fn rewrite_fragment_for_playback(fragment: &[u8], base_media_decode_time: u64, is_encrypted: bool) -> Result<Vec<u8>> {
    let with_decode_time = insert_decode_time(fragment, base_media_decode_time)?;
    if is_encrypted {
        relocate_sample_encryption(&with_decode_time)
    } else {
        Ok(with_decode_time)
    }
}

/// Places a version 1 `tfdt` directly in front of the `trun` and grows every enclosing size.
pub fn insert_decode_time(fragment: &[u8], base_media_decode_time: u64) -> Result<Vec<u8>> {
    let layout = FragmentLayout::locate(fragment)?;
    let tfdt = TfdtBox::v1(base_media_decode_time);
    let grow = tfdt.box_size() as usize;

    let mut out = Vec::with_capacity(fragment.len() + grow);
    out.extend_from_slice(&fragment[..layout.trun.start]);
    tfdt.write_box(&mut out);
    out.extend_from_slice(&fragment[layout.trun.start..]);

    patch_u32_be(&mut out, layout.tfhd.start + TFHD_TRACK_ID, 1)?;
    grow_u32(&mut out, layout.moof.start, grow)?;
    grow_u32(&mut out, layout.traf.start, grow)?;
    // trun moved forward by `grow` bytes, and so did the samples it points at
    grow_u32(&mut out, layout.data_offset_position() + grow, grow)?;

    trace!(base_media_decode_time, size = out.len(), "inserted tfdt");
    Ok(out)
}

/// Replaces the PIFF `uuid` box that closes the `traf` with `saiz` + `saio`, and prepends its
/// per-sample entries to the `mdat` payload.
pub fn relocate_sample_encryption(fragment: &[u8]) -> Result<Vec<u8>> {
    let layout = FragmentLayout::locate(fragment)?;
    let sample_count = layout.sample_count(fragment)?;

    let uuid = require_box(fragment, layout.trun.start, layout.traf.end(), b"uuid")?;
    let (senc, _) = PiffSampleEncryptionBox::read_box(&fragment[uuid.start..uuid.end()])?;
    if senc.sample_count != sample_count {
        return Err(Mp4Error::malformed(format!(
            "sample encryption lists {} samples, trun lists {}",
            senc.sample_count, sample_count
        )));
    }
    if uuid.end() != layout.traf.end() || layout.traf.end() != layout.moof.end() {
        return Err(Mp4Error::malformed("sample encryption box does not close the fragment"));
    }

    let mdat = BoxHeader::read(fragment, layout.moof.end(), fragment.len())?;
    if &mdat.box_type != b"mdat" {
        return Err(Mp4Error::malformed(format!(
            "expected mdat after moof, found {}",
            format_fourcc(&mdat.box_type)
        )));
    }

    // fails unless the per-sample records add up to exactly the entry bytes
    let sizes = senc.sample_info_sizes(PIFF_IV_SIZE)?;
    let aux_total = senc.entries.len();

    let saiz = if senc.uses_subsamples() {
        let sample_info_sizes = sizes
            .iter()
            .map(|size| u8::try_from(*size).map_err(|_| Mp4Error::unsupported(format!("auxiliary record of {} bytes", size))))
            .collect::<Result<Vec<u8>>>()?;
        SaizBox { default_sample_info_size: 0, sample_count, sample_info_sizes }
    } else {
        SaizBox { default_sample_info_size: PIFF_IV_SIZE as u8, sample_count, sample_info_sizes: Vec::new() }
    };

    let mut saio = SaioBox { offsets: vec![0] };
    let mdat_pos = uuid.start + saiz.box_size() as usize + saio.box_size() as usize;
    saio.offsets[0] = to_u32(mdat_pos + 8)?;

    let payload = &fragment[mdat.body_start()..mdat.end()];
    let mdat_size = to_u32(8 + aux_total + payload.len())?;

    let mut out = Vec::with_capacity(fragment.len() + 64);
    out.extend_from_slice(&fragment[..uuid.start]);
    saiz.write_box(&mut out);
    saio.write_box(&mut out);
    out.extend_from_slice(&mdat_size.to_be_bytes());
    out.extend_from_slice(b"mdat");
    out.extend_from_slice(&senc.entries);
    out.extend_from_slice(payload);
    out.extend_from_slice(&fragment[mdat.end()..]);

    patch_u32_be(&mut out, layout.moof.start, to_u32(mdat_pos - layout.moof.start)?)?;
    patch_u32_be(&mut out, layout.traf.start, to_u32(mdat_pos - layout.traf.start)?)?;
    patch_u32_be(&mut out, layout.data_offset_position(), to_u32(mdat_pos + 8 + aux_total)?)?;

    trace!(sample_count, aux_total, subsamples = senc.uses_subsamples(), "relocated sample encryption data");
    Ok(out)
}

fn grow_u32(buffer: &mut [u8], offset: usize, by: usize) -> Result<()> {
    let current = read_u32_be(buffer, offset)?;
    let grown = current
        .checked_add(to_u32(by)?)
        .ok_or_else(|| Mp4Error::malformed(format!("value at offset {} overflows", offset)))?;
    patch_u32_be(buffer, offset, grown)
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Mp4Error::unsupported(format!("{} does not fit in 32 bits", value)))
}
